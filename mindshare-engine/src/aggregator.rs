//! Time-bin aggregation of stance and mindshare.
//!
//! Bins are aligned to the Unix epoch (`floor(ts / width) * width`), so
//! bins computed from different record sets line up and can be merged.
//!
//! Output is a pure function of the input *set*: records are summed in a
//! canonical order and emitted in sorted order, so two calls produce
//! bit-identical results.
//!
//! Mindshare shares are only normalized after every mention has been
//! accumulated; the denominator for a (topic, bin) needs the whole voice
//! universe. See [`MindshareScope`] for partial inputs.

use chrono::{DateTime, Duration, Utc};
use mindshare_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::types::{bin_id, MindshareBin, StanceBin, StanceRecord, TopicId, TopicMention, VoiceId};

// ============================================================================
// Bin Width
// ============================================================================

/// Strictly positive bin width, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BinWidth {
    secs: i64,
}

impl BinWidth {
    pub fn from_secs(secs: i64) -> Result<Self> {
        if secs <= 0 {
            return Err(Error::config(format!(
                "bin width must be positive, got {secs}s"
            )));
        }
        Ok(Self { secs })
    }

    pub fn from_duration(duration: Duration) -> Result<Self> {
        Self::from_secs(duration.num_seconds())
    }

    pub fn hours(hours: i64) -> Result<Self> {
        Self::from_secs(hours.saturating_mul(3600))
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn millis(&self) -> i64 {
        self.secs.saturating_mul(1000)
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.secs)
    }

    /// Epoch-aligned start of the bin containing `ts`, in epoch milliseconds.
    pub fn bin_start_millis(&self, ts: DateTime<Utc>) -> i64 {
        let width = self.millis();
        ts.timestamp_millis().div_euclid(width) * width
    }

    /// Epoch-aligned start of the bin containing `ts`.
    pub fn bin_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        millis_to_datetime(self.bin_start_millis(ts)).unwrap_or(ts)
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

// ============================================================================
// Mindshare Scope
// ============================================================================

/// Full-universe volume totals per (topic, bin start in epoch ms).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeBaseline {
    totals: BTreeMap<(TopicId, i64), u64>,
}

impl VolumeBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, topic_id: impl Into<TopicId>, bin_start: DateTime<Utc>, total: u64) {
        self.totals
            .insert((topic_id.into(), bin_start.timestamp_millis()), total);
    }

    pub fn get(&self, topic_id: &str, bin_start: DateTime<Utc>) -> Option<u64> {
        self.totals
            .get(&(topic_id.to_string(), bin_start.timestamp_millis()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Sum volumes of previously computed mindshare bins.
    pub fn from_bins(bins: &[MindshareBin]) -> Self {
        let mut baseline = Self::new();
        for bin in bins {
            *baseline
                .totals
                .entry((bin.topic_id.clone(), bin.bin_start.timestamp_millis()))
                .or_insert(0) += bin.volume;
        }
        baseline
    }
}

/// Which voices a mindshare computation is expected to cover.
///
/// - `universe`: every voice that could hold share of a topic
/// - `supplied`: voices whose complete content is in the input, so their
///   absence from a bin means zero volume rather than missing data
/// - `baseline`: optional full-universe totals for partial inputs
///
/// A (topic, bin) is complete when every universe voice is either supplied
/// or has a mention in that bin. The default scope has an empty universe
/// and treats the input as the whole world, so all bins are complete.
#[derive(Debug, Clone, Default)]
pub struct MindshareScope {
    pub universe: BTreeSet<VoiceId>,
    pub supplied: BTreeSet<VoiceId>,
    pub baseline: Option<VolumeBaseline>,
}

impl MindshareScope {
    /// Every universe voice's content is supplied.
    pub fn full(universe: BTreeSet<VoiceId>) -> Self {
        Self {
            supplied: universe.clone(),
            universe,
            baseline: None,
        }
    }

    /// No voice is known to be fully supplied; a bin is complete only when
    /// every universe voice mentions the topic in it.
    pub fn observed(universe: BTreeSet<VoiceId>) -> Self {
        Self::partial(universe, BTreeSet::new())
    }

    /// Only some voices' content is supplied.
    pub fn partial(universe: BTreeSet<VoiceId>, supplied: BTreeSet<VoiceId>) -> Self {
        Self {
            universe,
            supplied,
            baseline: None,
        }
    }

    pub fn with_baseline(mut self, baseline: VolumeBaseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    fn covers_bin<T>(&self, present: &BTreeMap<&str, T>) -> bool {
        self.universe
            .iter()
            .all(|v| self.supplied.contains(v) || present.contains_key(v.as_str()))
    }
}

// ============================================================================
// Output
// ============================================================================

/// Aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateOutput {
    /// Sorted by (voice, topic, bin_start)
    pub stance_bins: Vec<StanceBin>,
    /// Sorted by (topic, bin_start, voice)
    pub mindshare_bins: Vec<MindshareBin>,
    /// True when every (topic, bin) is complete
    pub complete: bool,
    pub incomplete_bins: usize,
}

impl AggregateOutput {
    /// Per-(topic, bin) totals, usable as a baseline for later partial runs.
    pub fn volume_baseline(&self) -> VolumeBaseline {
        VolumeBaseline::from_bins(&self.mindshare_bins)
    }

    /// Stance bins grouped per (voice, topic), chronological.
    pub fn stance_series(&self) -> BTreeMap<(VoiceId, TopicId), Vec<&StanceBin>> {
        group_series(&self.stance_bins)
    }
}

/// Group stance bins per (voice, topic) in chronological order.
pub fn group_series(bins: &[StanceBin]) -> BTreeMap<(VoiceId, TopicId), Vec<&StanceBin>> {
    let mut series: BTreeMap<(VoiceId, TopicId), Vec<&StanceBin>> = BTreeMap::new();
    for bin in bins {
        series
            .entry((bin.voice_id.clone(), bin.topic_id.clone()))
            .or_default()
            .push(bin);
    }
    for bins in series.values_mut() {
        bins.sort_by_key(|b| b.bin_start);
    }
    series
}

// ============================================================================
// Aggregation
// ============================================================================

/// Aggregate stance records. Mindshare volumes are counted from the records.
pub fn aggregate(records: &[StanceRecord], width: BinWidth, scope: &MindshareScope) -> AggregateOutput {
    let mentions: Vec<TopicMention> = records.iter().map(TopicMention::from).collect();
    aggregate_with_mentions(records, &mentions, width, scope)
}

/// Aggregate stance records, counting mindshare from a separate mention list.
pub fn aggregate_with_mentions(
    records: &[StanceRecord],
    mentions: &[TopicMention],
    width: BinWidth,
    scope: &MindshareScope,
) -> AggregateOutput {
    let stance_bins = stance_bins(records, width);
    let mindshare_bins = mindshare_bins(mentions, width, scope);

    let incomplete_keys: BTreeSet<(&str, DateTime<Utc>)> = mindshare_bins
        .iter()
        .filter(|b| !b.complete)
        .map(|b| (b.topic_id.as_str(), b.bin_start))
        .collect();
    let incomplete_bins = incomplete_keys.len();
    let complete = incomplete_bins == 0;

    if !complete {
        warn!(
            incomplete_bins,
            universe = scope.universe.len(),
            supplied = scope.supplied.len(),
            has_baseline = scope.baseline.is_some(),
            "Mindshare computed over an incomplete voice universe; shares may not sum to 1"
        );
    }

    debug!(
        records = records.len(),
        mentions = mentions.len(),
        stance_bins = stance_bins.len(),
        mindshare_bins = mindshare_bins.len(),
        "Aggregation finished"
    );

    AggregateOutput {
        stance_bins,
        mindshare_bins,
        complete,
        incomplete_bins,
    }
}

/// Sparse stance bins per (voice, topic, bin).
pub fn stance_bins(records: &[StanceRecord], width: BinWidth) -> Vec<StanceBin> {
    let mut groups: BTreeMap<(&str, &str, i64), Vec<&StanceRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((
                record.voice_id.as_str(),
                record.topic_id.as_str(),
                width.bin_start_millis(record.timestamp),
            ))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .filter_map(|((voice_id, topic_id, start_ms), mut members)| {
            let bin_start = millis_to_datetime(start_ms)?;
            members.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.content_id.cmp(&b.content_id))
                    .then_with(|| a.stance.total_cmp(&b.stance))
                    .then_with(|| a.confidence.total_cmp(&b.confidence))
            });

            let count = members.len();
            let mut stance_sum = 0.0;
            let mut weighted_sum = 0.0;
            let mut confidence_sum = 0.0;
            for r in &members {
                stance_sum += r.stance;
                weighted_sum += r.stance * r.confidence;
                confidence_sum += r.confidence;
            }

            let mean_stance = stance_sum / count as f64;
            let (weighted_mean, weighted_fallback) = if confidence_sum > 0.0 {
                (weighted_sum / confidence_sum, false)
            } else {
                (mean_stance, true)
            };

            Some(StanceBin {
                id: bin_id(voice_id, topic_id, bin_start),
                voice_id: voice_id.to_string(),
                topic_id: topic_id.to_string(),
                bin_start,
                bin_width_secs: width.secs(),
                mean_stance,
                count,
                weighted_mean,
                weighted_fallback,
            })
        })
        .collect()
}

/// Mindshare bins per (topic, bin, voice).
pub fn mindshare_bins(
    mentions: &[TopicMention],
    width: BinWidth,
    scope: &MindshareScope,
) -> Vec<MindshareBin> {
    // Phase 1: accumulate distinct content per (topic, bin, voice)
    let mut volumes: BTreeMap<(&str, i64), BTreeMap<&str, BTreeSet<&str>>> = BTreeMap::new();
    for m in mentions {
        volumes
            .entry((m.topic_id.as_str(), width.bin_start_millis(m.timestamp)))
            .or_default()
            .entry(m.voice_id.as_str())
            .or_default()
            .insert(m.content_id.as_str());
    }

    // Phase 2: normalize, only once every bin is fully accumulated
    let mut out = Vec::new();

    for ((topic_id, start_ms), per_voice) in volumes {
        let Some(bin_start) = millis_to_datetime(start_ms) else {
            continue;
        };
        let present_total: u64 = per_voice.values().map(|c| c.len() as u64).sum();

        let (denominator, complete) = if scope.covers_bin(&per_voice) {
            (present_total, true)
        } else {
            match scope
                .baseline
                .as_ref()
                .and_then(|b| b.get(topic_id, bin_start))
            {
                Some(total) => {
                    if total < present_total {
                        warn!(
                            topic_id,
                            bin_start = %bin_start,
                            baseline = total,
                            present = present_total,
                            "Volume baseline is below observed volume; using observed"
                        );
                    }
                    (total.max(present_total), total == present_total)
                }
                None => (present_total, false),
            }
        };

        for (voice_id, content) in per_voice {
            let volume = content.len() as u64;
            out.push(MindshareBin {
                voice_id: voice_id.to_string(),
                topic_id: topic_id.to_string(),
                bin_start,
                bin_width_secs: width.secs(),
                volume,
                share: volume as f64 / denominator as f64,
                complete,
            });
        }
    }

    out
}
