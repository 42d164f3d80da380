//! Core record types flowing through the pipeline.
//!
//! Every stage produces new immutable records; nothing is mutated in place.
//! Serialized field names are snake_case and timestamps RFC 3339.

use chrono::{DateTime, Duration, Utc};
use mindshare_common::StanceMeasure;
use serde::{Deserialize, Serialize};

/// Identifier of a tracked voice.
pub type VoiceId = String;
/// Identifier of a tracked topic.
pub type TopicId = String;
/// Identifier of a content item.
pub type ContentId = String;

// ============================================================================
// Reference Data
// ============================================================================

/// Platform a voice publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Reddit,
    HackerNews,
    Wikipedia,
    Usgs,
    Rss,
    Twitter,
    Youtube,
    #[serde(other)]
    Other,
}

impl Platform {
    /// Parse a loosely written platform name. Unknown names map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "reddit" => Self::Reddit,
            "hacker_news" | "hackernews" | "hn" => Self::HackerNews,
            "wikipedia" | "wiki" => Self::Wikipedia,
            "usgs" => Self::Usgs,
            "rss" | "feed" => Self::Rss,
            "twitter" | "x" => Self::Twitter,
            "youtube" | "yt" => Self::Youtube,
            _ => Self::Other,
        }
    }

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reddit => "reddit",
            Self::HackerNews => "hacker_news",
            Self::Wikipedia => "wikipedia",
            Self::Usgs => "usgs",
            Self::Rss => "rss",
            Self::Twitter => "twitter",
            Self::Youtube => "youtube",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked content author or persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub id: VoiceId,
    pub display_name: String,
    pub platform: Platform,
    #[serde(default)]
    pub category: String,
}

/// A tracked subject with the seed keywords used to link content to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub label: String,
    /// Ordered set of seed keywords or phrases
    pub keywords: Vec<String>,
}

// ============================================================================
// Per-run Records
// ============================================================================

/// A content item as handed over by the ingest boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContentItem {
    pub id: ContentId,
    pub voice_id: VoiceId,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// A candidate link between a content item and a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTopicLink {
    pub content_id: ContentId,
    pub topic_id: TopicId,
    /// Distinct matched keywords / seed keyword count, in [0, 1]
    pub confidence: f64,
    /// Distinct matched seed keywords, in catalog order
    pub matched_keywords: Vec<String>,
}

/// Scored stance of one content item on one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceRecord {
    pub voice_id: VoiceId,
    pub topic_id: TopicId,
    pub content_id: ContentId,
    pub timestamp: DateTime<Utc>,
    /// Against (-1) to for (+1)
    pub stance: f64,
    pub confidence: f64,
}

/// A topic mention counted towards mindshare.
///
/// Every link counts as attention, including those whose stance was
/// filtered out by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMention {
    pub voice_id: VoiceId,
    pub topic_id: TopicId,
    pub content_id: ContentId,
    pub timestamp: DateTime<Utc>,
}

impl From<&StanceRecord> for TopicMention {
    fn from(record: &StanceRecord) -> Self {
        Self {
            voice_id: record.voice_id.clone(),
            topic_id: record.topic_id.clone(),
            content_id: record.content_id.clone(),
            timestamp: record.timestamp,
        }
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// Build the stable id of a stance bin.
pub fn bin_id(voice_id: &str, topic_id: &str, bin_start: DateTime<Utc>) -> String {
    format!("{}:{}:{}", voice_id, topic_id, bin_start.timestamp_millis())
}

/// Aggregated stance of one voice on one topic within one bin.
///
/// Bins are sparse: no records means no bin, never a zero-valued one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceBin {
    pub id: String,
    pub voice_id: VoiceId,
    pub topic_id: TopicId,
    pub bin_start: DateTime<Utc>,
    pub bin_width_secs: i64,
    pub mean_stance: f64,
    pub count: usize,
    pub weighted_mean: f64,
    /// True when the bin had zero confidence mass and `weighted_mean` is the plain mean
    pub weighted_fallback: bool,
}

impl StanceBin {
    /// Exclusive end of the bin.
    pub fn bin_end(&self) -> DateTime<Utc> {
        self.bin_start + Duration::seconds(self.bin_width_secs)
    }

    /// The stance statistic selected by `measure`.
    pub fn value(&self, measure: StanceMeasure) -> f64 {
        match measure {
            StanceMeasure::Mean => self.mean_stance,
            StanceMeasure::Weighted => self.weighted_mean,
        }
    }
}

/// Attention share of one voice on one topic within one bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindshareBin {
    pub voice_id: VoiceId,
    pub topic_id: TopicId,
    pub bin_start: DateTime<Utc>,
    pub bin_width_secs: i64,
    /// Distinct linked content items
    pub volume: u64,
    /// volume / total volume across all voices for this topic and bin
    pub share: f64,
    /// Whether the full voice universe was accounted for in this topic and bin
    pub complete: bool,
}

// ============================================================================
// Events
// ============================================================================

/// Direction of a stance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    TowardSupport,
    TowardOpposition,
}

/// An abrupt stance change between two adjacent non-empty bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceFlipEvent {
    pub id: String,
    pub voice_id: VoiceId,
    pub topic_id: TopicId,
    /// Start of the later bin
    pub flip_time: DateTime<Utc>,
    pub stance_before: f64,
    pub stance_after: f64,
    pub magnitude: f64,
    pub direction: FlipDirection,
    /// Before and after have strictly opposite signs
    pub sign_reversal: bool,
    /// Ids of the two compared bins, earlier first
    pub supporting_bin_ids: Vec<String>,
}

/// A token whose frequency rose across a flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordBurst {
    pub keyword: String,
    pub before_frequency: f64,
    pub after_frequency: f64,
    pub delta: f64,
}

/// Keyword rationale attached to a flip event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipExplanation {
    pub flip_id: String,
    pub voice_id: VoiceId,
    pub topic_id: TopicId,
    pub keywords: Vec<KeywordBurst>,
    pub items_before: usize,
    pub items_after: usize,
}
