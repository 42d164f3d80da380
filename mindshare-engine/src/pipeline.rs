//! End-to-end pipeline: ingest, link, score, aggregate, detect, explain.
//!
//! A [`Pipeline`] is built once from a catalog and a validated
//! configuration and can then run any number of independent batches. It
//! holds no mutable state; every run is an explicit call.

use mindshare_common::logging::{generate_run_id, StageTimer};
use mindshare_common::util::format_duration_secs;
use mindshare_common::{Error, PipelineConfig, Result, Validate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use crate::aggregator::{aggregate_with_mentions, BinWidth, MindshareScope};
use crate::burst::BurstExplainer;
use crate::catalog::Catalog;
use crate::flips::FlipDetector;
use crate::ingest::{self, IngestReport, SkippedItem};
use crate::linker::TopicLinker;
use crate::scorer::{ScoreOutcome, StanceScorer};
use crate::types::{
    ContentTopicLink, FlipExplanation, MindshareBin, RawContentItem, StanceBin, StanceFlipEvent,
    StanceRecord, TopicMention,
};

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub items_received: usize,
    pub items_skipped: usize,
    /// Skip counts by reason label
    pub skipped: BTreeMap<String, usize>,
    pub links: usize,
    pub links_below_threshold: usize,
    pub records_scored: usize,
    pub records_below_confidence: usize,
    pub records_without_evidence: usize,
    pub stance_bins: usize,
    pub mindshare_bins: usize,
    pub incomplete_bins: usize,
    pub flips: usize,
    pub duration_ms: u64,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub run_id: String,
    pub bin_width_secs: i64,
    pub records: Vec<StanceRecord>,
    pub stance_bins: Vec<StanceBin>,
    pub mindshare_bins: Vec<MindshareBin>,
    pub flips: Vec<StanceFlipEvent>,
    pub explanations: Vec<FlipExplanation>,
    /// False when any mindshare bin could not account for the full voice universe
    pub complete: bool,
    pub skipped: Vec<SkippedItem>,
    pub stats: PipelineStats,
}

struct ItemResult {
    links: Vec<ContentTopicLink>,
    below_threshold: usize,
    outcomes: Vec<ScoreOutcome>,
}

/// Configured stance and mindshare pipeline.
#[derive(Debug)]
pub struct Pipeline {
    catalog: Catalog,
    linker: TopicLinker,
    scorer: StanceScorer,
    detector: FlipDetector,
    explainer: BurstExplainer,
    width: BinWidth,
    min_link_confidence: f64,
    parallel: bool,
}

impl Pipeline {
    /// Build a pipeline. Any configuration problem fails here, before data is seen.
    pub fn new(catalog: Catalog, config: &PipelineConfig) -> Result<Self> {
        config.validate().map_err(Error::from)?;

        let width_secs = i64::try_from(config.bin_width_secs()?)
            .map_err(|_| Error::config("pipeline.bin_width is too large"))?;
        let width = BinWidth::from_secs(width_secs)?;
        let linker = TopicLinker::from_catalog(&catalog)?;
        let scorer = StanceScorer::new(&config.scorer)?;
        let detector = FlipDetector::new(&config.flips)?.with_parallel(config.parallel);
        let explainer = BurstExplainer::new(&config.burst, config.burst_window_secs()?)?;

        Ok(Self {
            catalog,
            linker,
            scorer,
            detector,
            explainer,
            width,
            min_link_confidence: config.min_link_confidence,
            parallel: config.parallel,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bin_width(&self) -> BinWidth {
        self.width
    }

    /// Run over typed items. A mindshare bin is complete only when every
    /// catalog voice mentions the topic in it.
    pub fn run(&self, items: Vec<RawContentItem>) -> PipelineOutput {
        let scope = MindshareScope::observed(self.catalog.voice_ids());
        self.run_with_scope(items, &scope)
    }

    /// Run over typed items with an explicit mindshare scope.
    pub fn run_with_scope(&self, items: Vec<RawContentItem>, scope: &MindshareScope) -> PipelineOutput {
        let report = ingest::screen(items, &self.catalog);
        self.execute(report, scope)
    }

    /// Run over raw feed records, normalizing them first.
    pub fn run_raw(&self, records: Vec<Value>) -> PipelineOutput {
        let scope = MindshareScope::observed(self.catalog.voice_ids());
        self.run_raw_with_scope(records, &scope)
    }

    /// Run over raw feed records with an explicit mindshare scope.
    pub fn run_raw_with_scope(&self, records: Vec<Value>, scope: &MindshareScope) -> PipelineOutput {
        let report = ingest::normalize(records, &self.catalog);
        self.execute(report, scope)
    }

    fn process_item(&self, item: &RawContentItem) -> ItemResult {
        let (links, dropped): (Vec<_>, Vec<_>) = self
            .linker
            .link(item)
            .into_iter()
            .partition(|l| l.confidence >= self.min_link_confidence);
        let outcomes = links.iter().map(|l| self.scorer.evaluate(item, l)).collect();
        ItemResult {
            links,
            below_threshold: dropped.len(),
            outcomes,
        }
    }

    fn execute(&self, report: IngestReport, scope: &MindshareScope) -> PipelineOutput {
        let started = Instant::now();
        let run_id = generate_run_id();
        let span = mindshare_common::run_span!(
            run_id,
            items = report.received(),
            bin_width = %format_duration_secs(self.width.secs().unsigned_abs())
        );
        let _enter = span.enter();

        let mut stats = PipelineStats {
            items_received: report.received(),
            items_skipped: report.skipped.len(),
            ..PipelineStats::default()
        };
        for skipped in &report.skipped {
            *stats.skipped.entry(skipped.reason.label().to_string()).or_insert(0) += 1;
        }
        let IngestReport { items, skipped } = report;

        let timer = StageTimer::start("link_score");
        let results: Vec<ItemResult> = if self.parallel {
            items.par_iter().map(|item| self.process_item(item)).collect()
        } else {
            items.iter().map(|item| self.process_item(item)).collect()
        };

        let mut records = Vec::new();
        let mut mentions = Vec::new();
        for (item, result) in items.iter().zip(results) {
            stats.links_below_threshold += result.below_threshold;
            for (link, outcome) in result.links.into_iter().zip(result.outcomes) {
                stats.links += 1;
                mentions.push(TopicMention {
                    voice_id: item.voice_id.clone(),
                    topic_id: link.topic_id,
                    content_id: item.id.clone(),
                    timestamp: item.timestamp,
                });
                match outcome {
                    ScoreOutcome::Scored { record } => records.push(record),
                    ScoreOutcome::BelowConfidence { .. } => stats.records_below_confidence += 1,
                    ScoreOutcome::NoEvidence => stats.records_without_evidence += 1,
                }
            }
        }
        stats.records_scored = records.len();
        timer.finish(records.len());

        let timer = StageTimer::start("aggregate");
        let aggregate = aggregate_with_mentions(&records, &mentions, self.width, scope);
        timer.finish(aggregate.stance_bins.len() + aggregate.mindshare_bins.len());

        let timer = StageTimer::start("detect_flips");
        let flips = self.detector.detect(&aggregate.stance_bins);
        timer.finish(flips.len());

        let timer = StageTimer::start("explain");
        let explanations = self.explainer.explain_all(&flips, &items);
        timer.finish(explanations.len());

        stats.stance_bins = aggregate.stance_bins.len();
        stats.mindshare_bins = aggregate.mindshare_bins.len();
        stats.incomplete_bins = aggregate.incomplete_bins;
        stats.flips = flips.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            items = stats.items_received,
            skipped = stats.items_skipped,
            links = stats.links,
            scored = stats.records_scored,
            stance_bins = stats.stance_bins,
            flips = stats.flips,
            complete = aggregate.complete,
            duration_ms = stats.duration_ms,
            "Pipeline run finished"
        );

        PipelineOutput {
            run_id,
            bin_width_secs: self.width.secs(),
            records,
            stance_bins: aggregate.stance_bins,
            mindshare_bins: aggregate.mindshare_bins,
            flips,
            explanations,
            complete: aggregate.complete,
            skipped,
            stats,
        }
    }
}
