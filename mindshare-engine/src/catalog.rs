//! Voice and topic catalog.
//!
//! The catalog is immutable reference data. It is validated once at load:
//! ids must be unique and non-empty, and every topic needs at least one
//! seed keyword, otherwise it could never be linked.

use mindshare_common::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::text::normalize;
use crate::types::{Topic, Voice};

/// On-disk shape of a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub voices: Vec<Voice>,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// Validated voice and topic catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    voices: Vec<Voice>,
    topics: Vec<Topic>,
    voice_index: HashMap<String, usize>,
    topic_index: HashMap<String, usize>,
}

impl Catalog {
    /// Build and validate a catalog.
    ///
    /// Topic keywords are trimmed, lower-cased and de-duplicated with their
    /// first occurrence kept.
    pub fn new(voices: Vec<Voice>, topics: Vec<Topic>) -> Result<Self> {
        let mut voice_index = HashMap::with_capacity(voices.len());
        let mut clean_voices = Vec::with_capacity(voices.len());

        for mut voice in voices {
            voice.id = voice.id.trim().to_string();
            if voice.id.is_empty() {
                return Err(Error::config("voice with empty id"));
            }
            if voice_index.contains_key(&voice.id) {
                return Err(Error::config(format!("duplicate voice id '{}'", voice.id)));
            }
            voice_index.insert(voice.id.clone(), clean_voices.len());
            clean_voices.push(voice);
        }

        let mut topic_index = HashMap::with_capacity(topics.len());
        let mut clean_topics = Vec::with_capacity(topics.len());

        for topic in topics {
            let topic = normalize_topic(topic)?;
            if topic_index.contains_key(&topic.id) {
                return Err(Error::config(format!("duplicate topic id '{}'", topic.id)));
            }
            topic_index.insert(topic.id.clone(), clean_topics.len());
            clean_topics.push(topic);
        }

        debug!(
            voices = clean_voices.len(),
            topics = clean_topics.len(),
            "Catalog loaded"
        );

        Ok(Self {
            voices: clean_voices,
            topics: clean_topics,
            voice_index,
            topic_index,
        })
    }

    /// Parse and validate a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json).context("parsing catalog")?;
        Self::new(file.voices, file.topics)
    }

    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("reading catalog {}", path.display()))?;
        Self::from_json(&content).context(format!("loading catalog {}", path.display()))
    }

    /// Serializable form of this catalog.
    pub fn to_file(&self) -> CatalogFile {
        CatalogFile {
            voices: self.voices.clone(),
            topics: self.topics.clone(),
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn voice(&self, id: &str) -> Option<&Voice> {
        self.voice_index.get(id).map(|&i| &self.voices[i])
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topic_index.get(id).map(|&i| &self.topics[i])
    }

    pub fn contains_voice(&self, id: &str) -> bool {
        self.voice_index.contains_key(id)
    }

    /// All voice ids, sorted.
    pub fn voice_ids(&self) -> BTreeSet<String> {
        self.voices.iter().map(|v| v.id.clone()).collect()
    }
}

fn normalize_topic(mut topic: Topic) -> Result<Topic> {
    topic.id = topic.id.trim().to_string();
    if topic.id.is_empty() {
        return Err(Error::config("topic with empty id"));
    }

    let mut seen = HashSet::new();
    let original_len = topic.keywords.len();
    let keywords: Vec<String> = topic
        .keywords
        .iter()
        .map(|k| normalize(k.trim()))
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect();

    if keywords.is_empty() {
        return Err(Error::config(format!(
            "topic '{}' has an empty keyword set",
            topic.id
        )));
    }

    if keywords.len() != original_len {
        warn!(
            topic_id = %topic.id,
            given = original_len,
            kept = keywords.len(),
            "Dropped blank or duplicate topic keywords"
        );
    }

    topic.keywords = keywords;
    Ok(topic)
}
