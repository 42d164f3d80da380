//! JSON report written by the CLI.

use chrono::{DateTime, Utc};
use mindshare_common::{Error, PipelineConfig, Result, ResultExt, StanceMeasure};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ingest::SkippedItem;
use crate::pipeline::{PipelineOutput, PipelineStats};
use crate::types::{FlipExplanation, MindshareBin, StanceBin, StanceFlipEvent};

/// Bumped on any breaking change to the report layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Settings that shaped the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub bin_width_secs: i64,
    pub min_link_confidence: f64,
    pub min_stance_confidence: f64,
    pub flip_min_magnitude: f64,
    pub flip_max_gap_bins: u32,
    pub flip_measure: StanceMeasure,
    pub burst_top_n: usize,
}

impl ReportSettings {
    pub fn from_config(config: &PipelineConfig, bin_width_secs: i64) -> Self {
        Self {
            bin_width_secs,
            min_link_confidence: config.min_link_confidence,
            min_stance_confidence: config.scorer.min_confidence,
            flip_min_magnitude: config.flips.min_magnitude,
            flip_max_gap_bins: config.flips.max_gap_bins,
            flip_measure: config.flips.measure,
            burst_top_n: config.burst.top_n,
        }
    }
}

/// Top-level report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub schema_version: u32,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub settings: ReportSettings,
    /// False when some mindshare bins miss part of the voice universe
    pub complete: bool,
    pub stats: PipelineStats,
    pub stance_bins: Vec<StanceBin>,
    pub mindshare_bins: Vec<MindshareBin>,
    pub flips: Vec<StanceFlipEvent>,
    pub explanations: Vec<FlipExplanation>,
    pub skipped: Vec<SkippedItem>,
}

impl PipelineReport {
    pub fn new(output: PipelineOutput, config: &PipelineConfig) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: output.run_id,
            generated_at: Utc::now(),
            settings: ReportSettings::from_config(config, output.bin_width_secs),
            complete: output.complete,
            stats: output.stats,
            stance_bins: output.stance_bins,
            mindshare_bins: output.mindshare_bins,
            flips: output.flips,
            explanations: output.explanations,
            skipped: output.skipped,
        }
    }

    /// Explanation attached to a flip, if any.
    pub fn explanation_for(&self, flip_id: &str) -> Option<&FlipExplanation> {
        self.explanations.iter().find(|e| e.flip_id == flip_id)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write a report as pretty JSON.
pub fn write_json(path: &Path, report: &PipelineReport) -> Result<()> {
    let json = report.to_json_string()?;
    std::fs::write(path, json).context(format!("Failed to write report to {}", path.display()))
}

/// Read a report back. Reports from another schema version are rejected.
pub fn read_json(path: &Path) -> Result<PipelineReport> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read report from {}", path.display()))?;
    let report: PipelineReport = serde_json::from_str(&content)
        .context(format!("Failed to parse report {}", path.display()))?;
    if report.schema_version != SCHEMA_VERSION {
        return Err(Error::InvalidInput(format!(
            "report schema version {} is not supported (expected {})",
            report.schema_version, SCHEMA_VERSION
        )));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DemoConfig, DemoGenerator};
    use crate::pipeline::Pipeline;

    fn demo_report() -> PipelineReport {
        let data = DemoGenerator::new(DemoConfig::default())
            .unwrap()
            .generate()
            .unwrap();
        let config = PipelineConfig::default();
        let output = Pipeline::new(data.catalog, &config).unwrap().run(data.items);
        PipelineReport::new(output, &config)
    }

    #[test]
    fn test_report_layout() {
        let report = demo_report();
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json_string().unwrap()).unwrap();

        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["settings"]["bin_width_secs"], 3600);
        assert_eq!(value["settings"]["flip_measure"], "weighted");
        assert!(value["stats"]["items_received"].as_u64().unwrap() > 0);
        let flip = &value["flips"][0];
        assert!(flip["flip_time"].as_str().unwrap().ends_with('Z'));
        assert!(flip["direction"] == "toward_opposition" || flip["direction"] == "toward_support");
        assert!(report.explanation_for(flip["id"].as_str().unwrap()).is_some());
    }

    #[test]
    fn test_write_and_read_back() {
        let report = demo_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json(&path, &report).unwrap();
        let loaded = read_json(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.flips, report.flips);
        assert_eq!(loaded.stats, report.stats);
    }

    #[test]
    fn test_other_schema_version_rejected() {
        let mut report = demo_report();
        report.schema_version = SCHEMA_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json(&path, &report).unwrap();
        let err = read_json(&path).unwrap_err();
        assert!(err.to_string().contains("schema version"));
    }
}
