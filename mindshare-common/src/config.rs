//! Configuration management for the mindshare pipeline.
//!
//! The pipeline reads a single JSON file at `~/.mindshare/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (MINDSHARE_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `MINDSHARE_LOG_LEVEL` → observability.log_level
//! - `MINDSHARE_LOG_FORMAT` → observability.log_format
//! - `MINDSHARE_BIN_WIDTH` → pipeline.bin_width
//! - `MINDSHARE_FLIP_THRESHOLD` → pipeline.flips.min_magnitude
//!
//! Durations are human strings: `"30m"`, `"1h"`, `"2d"`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::parse_duration_secs;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".mindshare"),
        |dirs| dirs.home_dir().join(".mindshare"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(path).map_or_else(|_| path.to_string(), |p| p.into_owned()))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("MINDSHARE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("MINDSHARE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(width) = std::env::var("MINDSHARE_BIN_WIDTH") {
            self.pipeline.bin_width = width;
        }
        if let Ok(threshold) = std::env::var("MINDSHARE_FLIP_THRESHOLD") {
            match threshold.parse() {
                Ok(t) => self.pipeline.flips.min_magnitude = t,
                Err(_) => tracing::warn!(
                    value = %threshold,
                    "Ignoring unparseable MINDSHARE_FLIP_THRESHOLD"
                ),
            }
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to force to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Pipeline
// ============================================================================

/// Pipeline tuning shared by all stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Width of an aggregation bin (e.g. "1h", "1d")
    #[serde(default = "default_bin_width")]
    pub bin_width: String,

    /// Links below this confidence are dropped before scoring
    #[serde(default)]
    pub min_link_confidence: f64,

    /// Link and score items on the rayon thread pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Stance scorer settings
    #[serde(default)]
    pub scorer: ScorerConfig,

    /// Flip detector settings
    #[serde(default)]
    pub flips: FlipConfig,

    /// Burst explainer settings
    #[serde(default)]
    pub burst: BurstConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bin_width: default_bin_width(),
            min_link_confidence: 0.0,
            parallel: true,
            scorer: ScorerConfig::default(),
            flips: FlipConfig::default(),
            burst: BurstConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Bin width in seconds, as written in `bin_width`.
    pub fn bin_width_secs(&self) -> crate::Result<u64> {
        parse_duration_secs(&self.bin_width)
            .map_err(|e| crate::Error::config(format!("pipeline.bin_width: {e}")))
    }

    /// Burst window in seconds. Defaults to one bin width.
    pub fn burst_window_secs(&self) -> crate::Result<u64> {
        match self.burst.window.as_deref() {
            Some(window) => parse_duration_secs(window)
                .map_err(|e| crate::Error::config(format!("pipeline.burst.window: {e}"))),
            None => self.bin_width_secs(),
        }
    }
}

fn default_bin_width() -> String {
    "1h".to_string()
}

fn default_true() -> bool {
    true
}

/// Stance scorer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Records below this confidence are filtered out
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Neighbouring sentences scored on each side of a keyword sentence
    #[serde(default)]
    pub context_sentences: usize,

    /// Number of lexicon hits at which evidence is considered saturated
    #[serde(default = "default_evidence_saturation")]
    pub evidence_saturation: usize,

    /// Polarity lexicon
    #[serde(default)]
    pub lexicon: LexiconConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            context_sentences: 0,
            evidence_saturation: default_evidence_saturation(),
            lexicon: LexiconConfig::default(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.15
}

fn default_evidence_saturation() -> usize {
    3
}

/// Word lists driving polarity scoring.
///
/// Every list is replaceable; the defaults are a small general-purpose
/// English lexicon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Words expressing support
    #[serde(default = "default_positive")]
    pub positive: Vec<String>,

    /// Words expressing opposition
    #[serde(default = "default_negative")]
    pub negative: Vec<String>,

    /// Words that flip the polarity of the next few tokens
    #[serde(default = "default_negators")]
    pub negators: Vec<String>,

    /// Words that amplify the next polarity word
    #[serde(default = "default_intensifiers")]
    pub intensifiers: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            positive: default_positive(),
            negative: default_negative(),
            negators: default_negators(),
            intensifiers: default_intensifiers(),
        }
    }
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn default_positive() -> Vec<String> {
    to_strings(&[
        "support", "supports", "supported", "supporting", "good", "great", "benefit",
        "benefits", "agree", "agrees", "favor", "favour", "approve", "approves", "love",
        "excellent", "positive", "progress", "win", "wins", "strong", "welcome", "praise",
        "success", "successful", "hope", "hopeful", "right", "necessary", "important",
        "best", "better", "endorse", "endorses", "champion", "defend", "defends", "fair",
        "promising", "helpful", "win-win", "backing", "brilliant", "safe", "effective",
    ])
}

fn default_negative() -> Vec<String> {
    to_strings(&[
        "oppose", "opposes", "opposed", "bad", "terrible", "reject", "rejects",
        "harm", "harmful", "dangerous", "fail", "fails", "failure", "wrong", "hate",
        "crisis", "disaster", "corrupt", "worse", "worst", "ban", "threat", "awful",
        "disagree", "disagrees", "condemn", "condemns", "scam", "problem", "weak",
        "reckless", "unfair", "useless", "broken", "chaos", "ineffective", "unsafe",
        "overblown", "hoax", "misguided",
    ])
}

fn default_negators() -> Vec<String> {
    to_strings(&[
        "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't",
        "won't", "can't", "cannot", "nor", "hardly", "without", "against",
    ])
}

fn default_intensifiers() -> Vec<String> {
    to_strings(&[
        "very", "really", "extremely", "strongly", "totally", "absolutely", "deeply",
        "completely", "so", "truly",
    ])
}

/// Which bin statistic the flip detector compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StanceMeasure {
    /// Arithmetic mean of record stances
    Mean,
    /// Confidence-weighted mean (plain mean when confidence mass is zero)
    #[default]
    Weighted,
}

/// Flip detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipConfig {
    /// Minimum |after - before| for a flip
    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,

    /// Largest distance, in bin widths, between two compared bins.
    /// 1 means only directly adjacent bins are compared.
    #[serde(default = "default_max_gap_bins")]
    pub max_gap_bins: u32,

    /// Statistic compared between bins
    #[serde(default)]
    pub measure: StanceMeasure,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            min_magnitude: default_min_magnitude(),
            max_gap_bins: default_max_gap_bins(),
            measure: StanceMeasure::default(),
        }
    }
}

fn default_min_magnitude() -> f64 {
    0.5
}

fn default_max_gap_bins() -> u32 {
    1
}

/// Burst explainer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Window on each side of the flip (defaults to one bin width)
    #[serde(default)]
    pub window: Option<String>,

    /// Keywords returned per flip
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Shorter tokens are ignored
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Stop-words added to the built-in list
    #[serde(default)]
    pub extra_stopwords: Vec<String>,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            window: None,
            top_n: default_top_n(),
            min_token_len: default_min_token_len(),
            extra_stopwords: Vec::new(),
        }
    }
}

fn default_top_n() -> usize {
    5
}

fn default_min_token_len() -> usize {
    3
}
