//! Stance scoring.
//!
//! Lexicon polarity restricted to the sentences that mention the linked
//! topic. Whole-document tone is deliberately not used.

use mindshare_common::{Error, LexiconConfig, Result, ScorerConfig, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::text::{normalize, sentence_spans, tokens};
use crate::types::{ContentTopicLink, RawContentItem, StanceRecord};

/// Tokens after a negator that it still applies to.
const NEGATION_REACH: usize = 3;
/// Weight multiplier for a polarity word right after an intensifier.
const INTENSIFIER_BOOST: f64 = 1.5;

/// Polarity lexicon.
#[derive(Debug, Clone)]
pub struct Lexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
    negators: HashSet<String>,
    intensifiers: HashSet<String>,
}

impl Lexicon {
    pub fn from_config(config: &LexiconConfig) -> Self {
        let set = |words: &[String]| words.iter().map(|w| normalize(w.trim())).collect();
        Self {
            positive: set(&config.positive),
            negative: set(&config.negative),
            negators: set(&config.negators),
            intensifiers: set(&config.intensifiers),
        }
    }

    /// Base polarity of a token, if it is a lexicon word.
    pub fn polarity(&self, token: &str) -> Option<f64> {
        if self.positive.contains(token) {
            Some(1.0)
        } else if self.negative.contains(token) {
            Some(-1.0)
        } else {
            None
        }
    }

    fn is_negator(&self, token: &str) -> bool {
        self.negators.contains(token)
    }

    fn is_intensifier(&self, token: &str) -> bool {
        self.intensifiers.contains(token)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::from_config(&LexiconConfig::default())
    }
}

/// Result of scoring one link, including why nothing was emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoreOutcome {
    Scored { record: StanceRecord },
    /// Evidence was found but confidence stayed under the minimum
    BelowConfidence { confidence: f64 },
    /// No lexicon word near a matched keyword
    NoEvidence,
}

impl ScoreOutcome {
    pub fn into_record(self) -> Option<StanceRecord> {
        match self {
            Self::Scored { record } => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Polarity {
    net: f64,
    magnitude: f64,
    hits: usize,
}

/// Lexicon-based stance scorer.
#[derive(Debug, Clone)]
pub struct StanceScorer {
    lexicon: Lexicon,
    min_confidence: f64,
    context_sentences: usize,
    evidence_saturation: usize,
}

impl StanceScorer {
    pub fn new(config: &ScorerConfig) -> Result<Self> {
        config.validate().map_err(Error::from)?;
        Ok(Self {
            lexicon: Lexicon::from_config(&config.lexicon),
            min_confidence: config.min_confidence,
            context_sentences: config.context_sentences,
            evidence_saturation: config.evidence_saturation,
        })
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Score a link. `None` when filtered (not an error).
    pub fn score(&self, item: &RawContentItem, link: &ContentTopicLink) -> Option<StanceRecord> {
        self.evaluate(item, link).into_record()
    }

    /// Score a link and report why it was filtered, if it was.
    pub fn evaluate(&self, item: &RawContentItem, link: &ContentTopicLink) -> ScoreOutcome {
        let text = normalize(&item.text);
        let keywords: Vec<String> = link
            .matched_keywords
            .iter()
            .map(|k| normalize(k.trim()))
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return ScoreOutcome::NoEvidence;
        }

        // Hits are located in the whole text; a keyword may span a sentence break
        let sentences = sentence_spans(&text);
        let mut selected = BTreeSet::new();
        for keyword in &keywords {
            for (start, matched) in text.match_indices(keyword.as_str()) {
                let end = start + matched.len();
                for (idx, span) in sentences.iter().enumerate() {
                    if span.start < end && start < span.end {
                        let from = idx.saturating_sub(self.context_sentences);
                        let to = (idx + self.context_sentences).min(sentences.len() - 1);
                        selected.extend(from..=to);
                    }
                }
            }
        }

        // Keyword words themselves carry topic, not stance
        let keyword_words: HashSet<&str> = keywords
            .iter()
            .flat_map(|k| tokens(k).map(|t| t.text))
            .collect();

        let mut polarity = Polarity::default();
        for idx in selected {
            self.score_sentence(&text[sentences[idx].clone()], &keyword_words, &mut polarity);
        }

        if polarity.hits == 0 {
            return ScoreOutcome::NoEvidence;
        }

        let stance = if polarity.net == 0.0 {
            0.0
        } else {
            (polarity.net / polarity.magnitude).clamp(-1.0, 1.0)
        };

        let evidence = (polarity.hits as f64 / self.evidence_saturation as f64).min(1.0);
        let confidence = (link.confidence * evidence).clamp(0.0, 1.0);

        if confidence < self.min_confidence {
            return ScoreOutcome::BelowConfidence { confidence };
        }

        ScoreOutcome::Scored {
            record: StanceRecord {
                voice_id: item.voice_id.clone(),
                topic_id: link.topic_id.clone(),
                content_id: item.id.clone(),
                timestamp: item.timestamp,
                stance,
                confidence,
            },
        }
    }

    fn score_sentence(&self, sentence: &str, skip: &HashSet<&str>, acc: &mut Polarity) {
        let mut negation_left = 0usize;
        let mut intensified = false;

        for token in tokens(sentence) {
            let word = token.text;

            if self.lexicon.is_negator(word) {
                negation_left = NEGATION_REACH;
                intensified = false;
                continue;
            }
            if self.lexicon.is_intensifier(word) {
                intensified = true;
                continue;
            }

            match self.lexicon.polarity(word).filter(|_| !skip.contains(word)) {
                Some(mut weight) => {
                    if intensified {
                        weight *= INTENSIFIER_BOOST;
                    }
                    if negation_left > 0 {
                        weight = -weight;
                    }
                    acc.net += weight;
                    acc.magnitude += weight.abs();
                    acc.hits += 1;
                    negation_left = 0;
                    intensified = false;
                }
                None => {
                    negation_left = negation_left.saturating_sub(1);
                    intensified = false;
                }
            }
        }
    }
}

impl Default for StanceScorer {
    fn default() -> Self {
        let config = ScorerConfig::default();
        Self {
            lexicon: Lexicon::from_config(&config.lexicon),
            min_confidence: config.min_confidence,
            context_sentences: config.context_sentences,
            evidence_saturation: config.evidence_saturation,
        }
    }
}
