//! Topic linking.
//!
//! Matches content text against every topic's seed keywords with a single
//! Aho-Corasick automaton. Matching is case-insensitive substring/phrase
//! matching; confidence is the fraction of a topic's keywords found.

use aho_corasick::{AhoCorasick, MatchKind};
use mindshare_common::{Error, Result};
use tracing::debug;

use crate::catalog::Catalog;
use crate::text::normalize;
use crate::types::{ContentTopicLink, RawContentItem, Topic, TopicId};

struct LinkTarget {
    topic_id: TopicId,
    keywords: Vec<String>,
}

/// Precompiled linker for a fixed topic set.
pub struct TopicLinker {
    automaton: AhoCorasick,
    /// pattern id -> (topic index, keyword index) pairs sharing that pattern
    pattern_owners: Vec<Vec<(usize, usize)>>,
    targets: Vec<LinkTarget>,
}

impl std::fmt::Debug for TopicLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicLinker")
            .field("topics", &self.targets.len())
            .field("patterns", &self.pattern_owners.len())
            .finish()
    }
}

impl TopicLinker {
    /// Compile a linker. Topics with no usable keyword are a configuration error.
    pub fn new(topics: &[Topic]) -> Result<Self> {
        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_owners: Vec<Vec<(usize, usize)>> = Vec::new();
        let mut targets = Vec::with_capacity(topics.len());

        for (topic_idx, topic) in topics.iter().enumerate() {
            let mut keywords: Vec<String> = Vec::with_capacity(topic.keywords.len());
            for raw in &topic.keywords {
                let keyword = normalize(raw.trim());
                if keyword.is_empty() || keywords.contains(&keyword) {
                    continue;
                }
                let keyword_idx = keywords.len();
                match patterns.iter().position(|p| *p == keyword) {
                    Some(pid) => pattern_owners[pid].push((topic_idx, keyword_idx)),
                    None => {
                        patterns.push(keyword.clone());
                        pattern_owners.push(vec![(topic_idx, keyword_idx)]);
                    }
                }
                keywords.push(keyword);
            }

            if keywords.is_empty() {
                return Err(Error::config(format!(
                    "topic '{}' has an empty keyword set and can never be linked",
                    topic.id
                )));
            }

            targets.push(LinkTarget {
                topic_id: topic.id.clone(),
                keywords,
            });
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .map_err(|e| Error::config(format!("failed to compile topic keywords: {e}")))?;

        debug!(
            topics = targets.len(),
            patterns = patterns.len(),
            "Topic linker compiled"
        );

        Ok(Self {
            automaton,
            pattern_owners,
            targets,
        })
    }

    /// Compile a linker for every topic of a catalog.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self> {
        Self::new(catalog.topics())
    }

    /// Link one item. Returns links in topic order; no match yields an empty list.
    pub fn link(&self, item: &RawContentItem) -> Vec<ContentTopicLink> {
        if item.text.trim().is_empty() || self.targets.is_empty() {
            return Vec::new();
        }

        let text = normalize(&item.text);
        let mut matched: Vec<Vec<bool>> = self
            .targets
            .iter()
            .map(|t| vec![false; t.keywords.len()])
            .collect();

        for m in self.automaton.find_overlapping_iter(&text) {
            for &(topic_idx, keyword_idx) in &self.pattern_owners[m.pattern().as_usize()] {
                matched[topic_idx][keyword_idx] = true;
            }
        }

        self.targets
            .iter()
            .zip(matched)
            .filter_map(|(target, hits)| build_link(item, target, &hits))
            .collect()
    }
}

fn build_link(item: &RawContentItem, target: &LinkTarget, hits: &[bool]) -> Option<ContentTopicLink> {
    let matched_keywords: Vec<String> = target
        .keywords
        .iter()
        .zip(hits)
        .filter(|(_, hit)| **hit)
        .map(|(k, _)| k.clone())
        .collect();

    if matched_keywords.is_empty() {
        return None;
    }

    let confidence = (matched_keywords.len() as f64 / target.keywords.len() as f64).clamp(0.0, 1.0);

    Some(ContentTopicLink {
        content_id: item.id.clone(),
        topic_id: target.topic_id.clone(),
        confidence,
        matched_keywords,
    })
}

/// Link one item against a topic list without precompiling.
///
/// Topics without keywords are skipped; use [`TopicLinker`] (or catalog
/// loading) to reject them up front.
pub fn link(item: &RawContentItem, topics: &[Topic]) -> Vec<ContentTopicLink> {
    if item.text.trim().is_empty() {
        return Vec::new();
    }

    let text = normalize(&item.text);
    topics
        .iter()
        .filter_map(|topic| {
            let mut keywords: Vec<String> = Vec::new();
            for raw in &topic.keywords {
                let k = normalize(raw.trim());
                if !k.is_empty() && !keywords.contains(&k) {
                    keywords.push(k);
                }
            }
            if keywords.is_empty() {
                return None;
            }
            let hits: Vec<bool> = keywords.iter().map(|k| text.contains(k.as_str())).collect();
            let target = LinkTarget {
                topic_id: topic.id.clone(),
                keywords,
            };
            build_link(item, &target, &hits)
        })
        .collect()
}
