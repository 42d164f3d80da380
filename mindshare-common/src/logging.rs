//! Logging utilities for the pipeline.
//!
//! Structured logging via `tracing`, in JSON or human-readable form.
//!
//! # Noise Filtering
//!
//! Dependency modules that log on their own are held at `warn` so that
//! pipeline logs stay readable at `debug`.

use std::time::Instant;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Modules forced to `warn` unless `RUST_LOG` says otherwise.
pub const NOISY_MODULES: &[&str] = &["rayon", "rayon_core"];

/// Build the EnvFilter with noise suppression.
fn build_filter(log_level: &str, excluded_targets: &[String]) -> EnvFilter {
    // Environment variable wins
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }
    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    EnvFilter::new(&directives)
}

/// Initialize logging.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for structured JSON, anything else for pretty output
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Like `init_logging`, with additional modules held at `warn`.
pub fn init_logging_with_exclusions(log_level: &str, log_format: &str, excluded_targets: &[String]) {
    let filter = build_filter(log_level, excluded_targets);

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len() + excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new id for a pipeline run.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Measures one pipeline stage and logs its duration when finished.
#[derive(Debug)]
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    /// Start timing a stage.
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }

    /// Stage name.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Log the elapsed time with an output count and return the milliseconds.
    pub fn finish(self, produced: usize) -> u64 {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        tracing::debug!(
            stage = self.stage,
            produced,
            duration_ms = elapsed_ms,
            "Stage finished"
        );
        elapsed_ms
    }
}

/// Create a tracing span for a pipeline run.
///
/// # Example
///
/// ```ignore
/// let span = run_span!(run_id, items = items.len());
/// let _enter = span.enter();
/// ```
#[macro_export]
macro_rules! run_span {
    ($run_id:expr) => {
        tracing::info_span!("pipeline_run", run_id = %$run_id)
    };
    ($run_id:expr, $($field:tt)*) => {
        tracing::info_span!("pipeline_run", run_id = %$run_id, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36); // UUID format
    }

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("aggregate");
        assert_eq!(timer.stage(), "aggregate");
        let ms = timer.finish(3);
        assert!(ms < 10_000);
    }

    #[test]
    fn test_filter_holds_dependency_targets_at_warn() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = build_filter("debug", &["mindshare_engine::burst".to_string()])
            .to_string()
            .to_lowercase();
        assert!(filter.contains("rayon=warn"));
        assert!(filter.contains("rayon_core=warn"));
        assert!(filter.contains("mindshare_engine::burst=warn"));
        assert!(!filter.contains("globset"));
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("debug", "pretty");
        init_logging("info", "json");
    }
}
