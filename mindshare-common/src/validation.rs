//! Configuration validation.
//!
//! Bad thresholds are fatal at load time; nothing here falls back to a
//! default silently.

use thiserror::Error;

use crate::config::{
    BurstConfig, Config, FlipConfig, LexiconConfig, ObservabilityConfig, PipelineConfig,
    ScorerConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl From<ValidationError> for crate::Error {
    fn from(e: ValidationError) -> Self {
        crate::Error::Config(e.to_string())
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_unit_interval(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("{value} is outside [0, 1]")));
    }
    Ok(())
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        Err(ValidationError::Multiple(errors))
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(e);
        }

        collect(errors)
    }

    /// Load, apply env overrides and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        match self.bin_width_secs() {
            Ok(0) => errors.push(invalid("pipeline.bin_width", "must be positive")),
            Ok(_) => {}
            Err(e) => errors.push(invalid("pipeline.bin_width", e.to_string())),
        }

        match self.burst_window_secs() {
            Ok(0) => errors.push(invalid("pipeline.burst.window", "must be positive")),
            Ok(_) => {}
            // An unparseable bin width is already reported above
            Err(e) if self.burst.window.is_some() => {
                errors.push(invalid("pipeline.burst.window", e.to_string()))
            }
            Err(_) => {}
        }

        if let Err(e) = check_unit_interval("pipeline.min_link_confidence", self.min_link_confidence)
        {
            errors.push(e);
        }

        for result in [self.scorer.validate(), self.flips.validate(), self.burst.validate()] {
            if let Err(e) = result {
                errors.push(e);
            }
        }

        collect(errors)
    }
}

impl Validate for ScorerConfig {
    fn validate(&self) -> ValidationResult<()> {
        check_unit_interval("pipeline.scorer.min_confidence", self.min_confidence)?;

        if self.evidence_saturation == 0 {
            return Err(invalid(
                "pipeline.scorer.evidence_saturation",
                "must be at least 1",
            ));
        }

        self.lexicon.validate()
    }
}

impl Validate for LexiconConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.positive.is_empty() && self.negative.is_empty() {
            return Err(ValidationError::MissingField {
                field: "pipeline.scorer.lexicon.positive/negative".into(),
            });
        }
        Ok(())
    }
}

impl Validate for FlipConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.min_magnitude.is_finite() || self.min_magnitude <= 0.0 {
            return Err(invalid(
                "pipeline.flips.min_magnitude",
                format!("{} must be a positive number", self.min_magnitude),
            ));
        }

        if self.max_gap_bins == 0 {
            return Err(invalid("pipeline.flips.max_gap_bins", "must be at least 1"));
        }

        Ok(())
    }
}

impl Validate for BurstConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.top_n == 0 {
            return Err(invalid("pipeline.burst.top_n", "must be at least 1"));
        }
        Ok(())
    }
}
