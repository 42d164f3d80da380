//! Mindshare Engine
//!
//! Turns a stream of public content (posts, articles, videos) from tracked
//! voices into per-topic stance time series, attention shares, and stance
//! flip events with a keyword explanation of each flip.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         mindshare-engine                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  raw JSON ─▶ ingest ─▶ RawContentItem                                │
//! │                           │                                          │
//! │                           ▼                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────────────┐     │
//! │  │ Topic       │──▶│ Stance      │──▶│ Time-Bin Aggregator     │     │
//! │  │ Linker      │   │ Scorer      │   │ StanceBin, MindshareBin │     │
//! │  └─────────────┘   └─────────────┘   └─────────────────────────┘     │
//! │         │ mentions                              │                    │
//! │         └───────────────────────────────────────┤                    │
//! │                                                 ▼                    │
//! │                     ┌─────────────────┐   ┌─────────────────┐        │
//! │                     │ Burst Explainer │◀──│  Flip Detector  │        │
//! │                     └─────────────────┘   └─────────────────┘        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Stance
//! A number in [-1, 1] from "against" to "for", scored only from the
//! sentences that mention the topic.
//!
//! ## Mindshare
//! A voice's share of all topic mentions within a time bin. Shares are
//! normalized once every mention is counted. A bin that is missing any
//! voice of the universe is flagged incomplete.
//!
//! ## Flip
//! A change of at least `min_magnitude` between two adjacent non-empty bins
//! of one (voice, topic) series. Gaps are never bridged by default.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod aggregator;
pub mod burst;
pub mod catalog;
pub mod demo;
pub mod flips;
pub mod ingest;
pub mod linker;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod text;
pub mod types;

pub use aggregator::{
    aggregate, aggregate_with_mentions, AggregateOutput, BinWidth, MindshareScope, VolumeBaseline,
};
pub use burst::BurstExplainer;
pub use catalog::{Catalog, CatalogFile};
pub use flips::{detect_flips, FlipDetector};
pub use ingest::{IngestReport, SkipReason, SkippedItem};
pub use linker::TopicLinker;
pub use pipeline::{Pipeline, PipelineOutput, PipelineStats};
pub use report::PipelineReport;
pub use scorer::{ScoreOutcome, StanceScorer};
pub use types::{
    ContentTopicLink, FlipDirection, FlipExplanation, KeywordBurst, MindshareBin, Platform,
    RawContentItem, StanceBin, StanceFlipEvent, StanceRecord, Topic, TopicMention, Voice,
};
