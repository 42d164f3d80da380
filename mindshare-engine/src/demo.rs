//! Deterministic demo data.
//!
//! Voices keep a fixed lean per topic, so their stance series are flat,
//! except the first `flip_voices` voices, who turn against immigration at
//! `flip_bin` and start talking about shelters at the same time. The
//! pipeline run over a demo dataset therefore has known flips to find.

use chrono::{DateTime, Duration, TimeZone, Utc};
use mindshare_common::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::types::{Platform, RawContentItem, Topic, Voice};

/// Topic whose stance reverses for scripted voices.
pub const SCRIPTED_TOPIC: &str = "immigration";

const VOICE_NAMES: &[(&str, Platform, &str)] = &[
    ("Harbor Watch", Platform::Reddit, "community"),
    ("The Civic Desk", Platform::Rss, "news"),
    ("Byte Ledger", Platform::HackerNews, "tech"),
    ("Northline Radio", Platform::Youtube, "media"),
    ("Dana Okafor", Platform::Twitter, "commentator"),
    ("Open Policy Wiki", Platform::Wikipedia, "reference"),
    ("Main Street Weekly", Platform::Rss, "news"),
    ("Lena Varga", Platform::Twitter, "commentator"),
];

const TOPICS: &[(&str, &str, &[&str])] = &[
    ("immigration", "Immigration", &["immigration", "border", "asylum"]),
    ("climate", "Climate", &["climate", "emissions", "carbon"]),
    (
        "ai",
        "Artificial Intelligence",
        &["artificial intelligence", "machine learning", "chatbot"],
    ),
    ("economy", "Economy", &["economy", "inflation", "jobs"]),
];

const SUPPORT_TEMPLATES: &[&str] = &[
    "I strongly support the {kw} reform, it is good for everyone",
    "Great progress on {kw} this week, a real benefit",
    "The new {kw} policy is fair and effective",
    "Hopeful about {kw} after the latest hearing, a promising step",
];

const OPPOSE_TEMPLATES: &[&str] = &[
    "The {kw} situation is a disaster and a crisis",
    "I oppose the new {kw} plan, it is reckless",
    "Current {kw} policy is broken and harmful",
    "Another failure on {kw}, the approach is wrong",
];

const NEUTRAL_TEMPLATES: &[&str] = &[
    "Committee publishes figures on {kw} today",
    "Thread: what the {kw} numbers mean for the region",
];

const BURST_SENTENCES: &[&str] = &[
    "Shelters are overwhelmed, new shelters are full after the surge.",
    "Overwhelmed shelters cannot cope and more shelters open every night.",
];

/// Demo generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub seed: u64,
    pub voices: usize,
    pub bins: usize,
    pub items_per_bin: usize,
    pub start: DateTime<Utc>,
    pub bin_width_secs: i64,
    /// Number of voices, from the first, whose immigration stance reverses
    pub flip_voices: usize,
    /// Bin index at which the reversal happens
    pub flip_bin: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            voices: 6,
            bins: 12,
            items_per_bin: 3,
            start: Utc
                .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            bin_width_secs: 3600,
            flip_voices: 2,
            flip_bin: 6,
        }
    }
}

/// Generated catalog and content.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub catalog: Catalog,
    pub items: Vec<RawContentItem>,
}

/// Seeded demo data generator.
#[derive(Debug, Clone)]
pub struct DemoGenerator {
    config: DemoConfig,
}

impl DemoGenerator {
    pub fn new(config: DemoConfig) -> Result<Self> {
        if config.voices == 0 || config.voices > VOICE_NAMES.len() * 10 {
            return Err(Error::config(format!(
                "demo voices must be between 1 and {}",
                VOICE_NAMES.len() * 10
            )));
        }
        if config.bins < 2 {
            return Err(Error::config("demo needs at least 2 bins"));
        }
        if config.items_per_bin == 0 {
            return Err(Error::config("demo items_per_bin must be at least 1"));
        }
        if config.bin_width_secs <= 0 {
            return Err(Error::config("demo bin width must be positive"));
        }
        if config.flip_voices > 0 && (config.flip_bin == 0 || config.flip_bin >= config.bins) {
            return Err(Error::config(format!(
                "demo flip_bin must be within 1..{}",
                config.bins
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// Build the dataset. The same config always yields the same data.
    pub fn generate(&self) -> Result<DemoDataset> {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let voices: Vec<Voice> = (0..cfg.voices)
            .map(|i| {
                let (name, platform, category) = VOICE_NAMES[i % VOICE_NAMES.len()];
                let round = i / VOICE_NAMES.len();
                Voice {
                    id: format!("voice-{:02}", i + 1),
                    display_name: if round == 0 {
                        name.to_string()
                    } else {
                        format!("{name} {}", round + 1)
                    },
                    platform,
                    category: category.to_string(),
                }
            })
            .collect();

        let topics: Vec<Topic> = TOPICS
            .iter()
            .map(|(id, label, keywords)| Topic {
                id: (*id).to_string(),
                label: (*label).to_string(),
                keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            })
            .collect();

        let scripted_idx = topics
            .iter()
            .position(|t| t.id == SCRIPTED_TOPIC)
            .unwrap_or(0);

        // Fixed lean per (voice, topic): true = supportive
        let leans: Vec<Vec<bool>> = voices
            .iter()
            .map(|_| topics.iter().map(|_| rng.gen_bool(0.5)).collect())
            .collect();

        let mut items = Vec::with_capacity(cfg.voices * cfg.bins * cfg.items_per_bin);
        for bin in 0..cfg.bins {
            let bin_start = cfg.start + Duration::seconds(cfg.bin_width_secs * bin as i64);
            for (v, voice) in voices.iter().enumerate() {
                let scripted = v < cfg.flip_voices;
                for n in 0..cfg.items_per_bin {
                    // Scripted voices post on the scripted topic first in every bin
                    let topic_idx = if scripted && n == 0 {
                        scripted_idx
                    } else {
                        rng.gen_range(0..topics.len())
                    };
                    let topic = &topics[topic_idx];
                    let keyword = &topic.keywords[rng.gen_range(0..topic.keywords.len())];

                    let after_flip = scripted && topic_idx == scripted_idx && bin >= cfg.flip_bin;
                    let supportive = if scripted && topic_idx == scripted_idx {
                        bin < cfg.flip_bin
                    } else {
                        leans[v][topic_idx]
                    };

                    let neutral = !(scripted && topic_idx == scripted_idx) && rng.gen_bool(0.15);
                    let templates = if neutral {
                        NEUTRAL_TEMPLATES
                    } else if supportive {
                        SUPPORT_TEMPLATES
                    } else {
                        OPPOSE_TEMPLATES
                    };
                    let mut text =
                        templates[rng.gen_range(0..templates.len())].replace("{kw}", keyword);
                    if after_flip {
                        text.push_str(". ");
                        text.push_str(BURST_SENTENCES[rng.gen_range(0..BURST_SENTENCES.len())]);
                    }

                    let offset = rng.gen_range(0..cfg.bin_width_secs);
                    items.push(RawContentItem {
                        id: format!("{}-{:04}-{}", voice.id, bin, n),
                        voice_id: voice.id.clone(),
                        platform: voice.platform,
                        timestamp: bin_start + Duration::seconds(offset),
                        text,
                    });
                }
            }
        }

        items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        Ok(DemoDataset {
            catalog: Catalog::new(voices, topics)?,
            items,
        })
    }
}
