//! Keyword burst explanation for stance flips.
//!
//! Compares token frequencies in the flip voice's content just before and
//! just after the flip time and reports the tokens whose share of the
//! vocabulary grew the most.

use chrono::{DateTime, Duration, Utc};
use mindshare_common::{BurstConfig, Error, Result, Validate};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::text::{normalize, tokens};
use crate::types::{FlipExplanation, KeywordBurst, RawContentItem, StanceFlipEvent, VoiceId};

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "if", "then", "of", "to", "in", "on", "for",
        "with", "as", "by", "is", "are", "was", "were", "be", "been", "being", "that", "this",
        "these", "those", "it", "its", "it's", "at", "from", "into", "over", "under", "about",
        "after", "before", "between", "during", "without", "within", "than", "not", "no",
        "yes", "more", "most", "less", "least", "very", "much", "many", "some", "any", "such",
        "we", "you", "they", "them", "their", "our", "your", "his", "her", "she", "him", "who",
        "what", "which", "when", "where", "why", "how", "all", "can", "will", "would",
        "should", "could", "has", "have", "had", "just", "also", "now", "today", "there",
        "here", "out", "up", "down", "one", "new", "say", "says", "said", "get", "got",
        "don't", "doesn't", "isn't", "can't", "won't", "i'm", "i've", "we're", "they're",
        "again", "still", "really", "so", "too", "only", "even", "because", "while", "own",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Default)]
struct WindowCounts {
    counts: HashMap<String, u64>,
    total: u64,
    items: usize,
}

impl WindowCounts {
    fn frequency(&self, token: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts.get(token).copied().unwrap_or(0) as f64 / self.total as f64
    }
}

/// Explains flips by keyword frequency bursts.
#[derive(Debug, Clone)]
pub struct BurstExplainer {
    window: Duration,
    top_n: usize,
    min_token_len: usize,
    extra_stopwords: HashSet<String>,
}

impl BurstExplainer {
    /// `window_secs` is the width of each side of the comparison.
    pub fn new(config: &BurstConfig, window_secs: u64) -> Result<Self> {
        config.validate().map_err(Error::from)?;
        let secs = i64::try_from(window_secs).unwrap_or(i64::MAX);
        if secs <= 0 {
            return Err(Error::config("burst window must be positive"));
        }
        Ok(Self {
            window: Duration::seconds(secs),
            top_n: config.top_n,
            min_token_len: config.min_token_len,
            extra_stopwords: config
                .extra_stopwords
                .iter()
                .map(|w| normalize(w.trim()))
                .collect(),
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Explain one flip from the content around it.
    ///
    /// Only the flip voice's items are considered; `content` may hold
    /// anything.
    pub fn explain(&self, flip: &StanceFlipEvent, content: &[RawContentItem]) -> FlipExplanation {
        let own: Vec<&RawContentItem> = content
            .iter()
            .filter(|item| item.voice_id == flip.voice_id)
            .collect();
        self.explain_items(flip, &own)
    }

    /// Explain many flips, grouping content per voice once.
    pub fn explain_all(
        &self,
        flips: &[StanceFlipEvent],
        content: &[RawContentItem],
    ) -> Vec<FlipExplanation> {
        let mut by_voice: BTreeMap<&VoiceId, Vec<&RawContentItem>> = BTreeMap::new();
        for item in content {
            by_voice.entry(&item.voice_id).or_default().push(item);
        }

        flips
            .iter()
            .map(|flip| {
                let items = by_voice.get(&flip.voice_id).map_or(&[][..], Vec::as_slice);
                self.explain_items(flip, items)
            })
            .collect()
    }

    fn explain_items(&self, flip: &StanceFlipEvent, items: &[&RawContentItem]) -> FlipExplanation {
        let t = flip.flip_time;
        let before = self.count_window(items, t - self.window, t);
        let after = self.count_window(items, t, t + self.window);

        let mut bursts: Vec<(KeywordBurst, u64)> = after
            .counts
            .iter()
            .filter_map(|(token, &after_count)| {
                let before_frequency = before.frequency(token);
                let after_frequency = after.frequency(token);
                let delta = after_frequency - before_frequency;
                (delta > 0.0).then(|| {
                    (
                        KeywordBurst {
                            keyword: token.clone(),
                            before_frequency,
                            after_frequency,
                            delta,
                        },
                        after_count,
                    )
                })
            })
            .collect();

        bursts.sort_by(|(a, a_count), (b, b_count)| {
            b.delta
                .total_cmp(&a.delta)
                .then_with(|| b_count.cmp(a_count))
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        bursts.truncate(self.top_n);

        debug!(
            flip_id = %flip.id,
            items_before = before.items,
            items_after = after.items,
            keywords = bursts.len(),
            "Flip explained"
        );

        FlipExplanation {
            flip_id: flip.id.clone(),
            voice_id: flip.voice_id.clone(),
            topic_id: flip.topic_id.clone(),
            keywords: bursts.into_iter().map(|(burst, _)| burst).collect(),
            items_before: before.items,
            items_after: after.items,
        }
    }

    fn count_window(
        &self,
        items: &[&RawContentItem],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> WindowCounts {
        let mut window = WindowCounts::default();
        for item in items.iter().filter(|i| i.timestamp >= from && i.timestamp < to) {
            window.items += 1;
            let text = normalize(&item.text);
            for token in tokens(&text) {
                if let Some(word) = self.keep(token.text) {
                    *window.counts.entry(word.to_string()).or_insert(0) += 1;
                    window.total += 1;
                }
            }
        }
        window
    }

    /// Cleaned token, or `None` if it should not be counted.
    fn keep<'a>(&self, token: &'a str) -> Option<&'a str> {
        let word = token.strip_suffix("'s").unwrap_or(token);
        if word.chars().count() < self.min_token_len
            || word.chars().all(|c| c.is_ascii_digit())
            || STOPWORDS.contains(word)
            || self.extra_stopwords.contains(word)
        {
            return None;
        }
        Some(word)
    }
}
