//! End-to-end tests for the stance and mindshare pipeline.
//!
//! Content → Topic linking → Stance scoring → Aggregation → Flips → Explanations

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::BTreeSet;

use mindshare_common::PipelineConfig;
use mindshare_engine::aggregator::{aggregate, BinWidth, MindshareScope, VolumeBaseline};
use mindshare_engine::demo::{DemoConfig, DemoGenerator, SCRIPTED_TOPIC};
use mindshare_engine::{
    Catalog, FlipDirection, Pipeline, Platform, RawContentItem, StanceRecord, Topic, Voice,
};

// ============================================================================
// Test Data Generators
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()
}

fn voice(id: &str, platform: Platform) -> Voice {
    Voice {
        id: id.to_string(),
        display_name: id.to_string(),
        platform,
        category: "test".to_string(),
    }
}

fn catalog() -> Catalog {
    Catalog::new(
        vec![
            voice("anchor", Platform::Youtube),
            voice("blogger", Platform::Rss),
            voice("poster", Platform::Reddit),
        ],
        vec![
            Topic {
                id: "immigration".into(),
                label: "Immigration".into(),
                keywords: vec!["immigration".into(), "border".into()],
            },
            Topic {
                id: "climate".into(),
                label: "Climate".into(),
                keywords: vec!["climate".into(), "emissions".into()],
            },
        ],
    )
    .unwrap()
}

fn item(id: &str, voice: &str, minutes: i64, text: &str) -> RawContentItem {
    RawContentItem {
        id: id.to_string(),
        voice_id: voice.to_string(),
        platform: Platform::Other,
        timestamp: t0() + Duration::minutes(minutes),
        text: text.to_string(),
    }
}

fn record(voice: &str, id: &str, minutes: i64) -> StanceRecord {
    StanceRecord {
        voice_id: voice.to_string(),
        topic_id: "immigration".to_string(),
        content_id: id.to_string(),
        timestamp: t0() + Duration::minutes(minutes),
        stance: 0.5,
        confidence: 1.0,
    }
}

// ============================================================================
// Demo Dataset
// ============================================================================

#[test]
fn test_demo_dataset_flips_are_found() {
    let demo = DemoConfig::default();
    let data = DemoGenerator::new(demo.clone()).unwrap().generate().unwrap();

    let mut config = PipelineConfig::default();
    config.burst.top_n = 10;
    let output = Pipeline::new(data.catalog, &config).unwrap().run(data.items);

    let flip_time = demo.start + Duration::seconds(demo.bin_width_secs * demo.flip_bin as i64);
    assert_eq!(output.complete, output.mindshare_bins.iter().all(|b| b.complete));
    assert_eq!(output.stats.items_skipped, 0);
    assert_eq!(output.flips.len(), demo.flip_voices);

    for flip in &output.flips {
        assert_eq!(flip.topic_id, SCRIPTED_TOPIC);
        assert_eq!(flip.flip_time, flip_time);
        assert_eq!(flip.direction, FlipDirection::TowardOpposition);
        assert!(flip.sign_reversal);
        assert!((flip.magnitude - 2.0).abs() < 1e-9);
    }

    assert_eq!(output.explanations.len(), output.flips.len());
    for explanation in &output.explanations {
        assert!(explanation.items_before > 0);
        assert!(explanation.items_after > 0);
        assert!(explanation.keywords.iter().all(|k| k.delta > 0.0));
        assert!(explanation.keywords.iter().any(|k| k.keyword == "shelters"));
    }
}

#[test]
fn test_demo_mindshare_sums_to_one() {
    let data = DemoGenerator::new(DemoConfig::default())
        .unwrap()
        .generate()
        .unwrap();
    let output = Pipeline::new(data.catalog, &PipelineConfig::default())
        .unwrap()
        .run(data.items);

    let keys: BTreeSet<(String, DateTime<Utc>)> = output
        .mindshare_bins
        .iter()
        .map(|b| (b.topic_id.clone(), b.bin_start))
        .collect();
    for (topic, start) in keys {
        let sum: f64 = output
            .mindshare_bins
            .iter()
            .filter(|b| b.topic_id == topic && b.bin_start == start)
            .map(|b| b.share)
            .sum();
        assert!((sum - 1.0).abs() < 1e-9, "{topic} at {start}: {sum}");
    }
}

// ============================================================================
// Documented Scenarios
// ============================================================================

#[test]
fn test_immigration_link_confidence() {
    let pipeline = Pipeline::new(catalog(), &PipelineConfig::default()).unwrap();
    let linker = mindshare_engine::TopicLinker::from_catalog(pipeline.catalog()).unwrap();

    let one = linker.link(&item("1", "anchor", 0, "Immigration is on the agenda"));
    assert_eq!(one.len(), 1);
    assert!((one[0].confidence - 0.5).abs() < 1e-12);

    let both = linker.link(&item("2", "anchor", 0, "Immigration and the border"));
    assert!((both[0].confidence - 1.0).abs() < 1e-12);
}

#[test]
fn test_partial_universe_is_flagged() {
    let universe: BTreeSet<String> = ["anchor", "blogger", "poster"]
        .into_iter()
        .map(String::from)
        .collect();
    let width = BinWidth::hours(1).unwrap();

    // Full run establishes the universe total for the bin
    let full_records = vec![
        record("anchor", "a1", 5),
        record("blogger", "b1", 10),
        record("blogger", "b2", 15),
        record("poster", "p1", 20),
    ];
    let full = aggregate(&full_records, width, &MindshareScope::full(universe.clone()));
    assert!(full.complete);
    let baseline: VolumeBaseline = full.volume_baseline();

    // Later run only has the anchor's content
    let supplied: BTreeSet<String> = ["anchor".to_string()].into_iter().collect();
    let scope = MindshareScope::partial(universe, supplied).with_baseline(baseline);
    let partial = aggregate(&[record("anchor", "a1", 5)], width, &scope);

    assert!(!partial.complete);
    assert_eq!(partial.mindshare_bins.len(), 1);
    let bin = &partial.mindshare_bins[0];
    assert!(!bin.complete);
    assert!((bin.share - 0.25).abs() < 1e-12);
    let sum: f64 = partial.mindshare_bins.iter().map(|b| b.share).sum();
    assert!((sum - 1.0).abs() > 1e-9);
}

#[test]
fn test_pipeline_flags_bin_missing_known_voices() {
    let pipeline = Pipeline::new(catalog(), &PipelineConfig::default()).unwrap();
    let output = pipeline.run(vec![
        item("1", "anchor", 5, "Immigration policy is good"),
        item("2", "anchor", 65, "Immigration policy is good"),
        item("3", "blogger", 70, "The border is quiet"),
        item("4", "poster", 75, "Immigration and the border"),
    ]);

    let hour = |h: i64| t0() + Duration::hours(h);
    let flags: Vec<(DateTime<Utc>, bool)> = output
        .mindshare_bins
        .iter()
        .map(|b| (b.bin_start, b.complete))
        .collect();
    assert_eq!(
        flags,
        vec![(hour(0), false), (hour(1), true), (hour(1), true), (hour(1), true)]
    );
    assert!(!output.complete);
    assert_eq!(output.stats.incomplete_bins, 1);
}

#[test]
fn test_gap_in_series_is_not_a_flip() {
    let pipeline = Pipeline::new(catalog(), &PipelineConfig::default()).unwrap();
    let output = pipeline.run(vec![
        item("1", "poster", 10, "The border plan is good and fair and necessary"),
        // nothing in hour 1
        item("2", "poster", 130, "The border plan is a disaster, wrong and harmful"),
    ]);

    assert_eq!(output.stance_bins.len(), 2);
    assert!(output.flips.is_empty());
}

#[test]
fn test_topics_are_scored_independently() {
    let pipeline = Pipeline::new(catalog(), &PipelineConfig::default()).unwrap();
    let output = pipeline.run(vec![
        item(
            "1",
            "anchor",
            10,
            "Border controls are good and necessary. Climate targets are a disaster.",
        ),
    ]);

    let stance = |topic: &str| {
        output
            .stance_bins
            .iter()
            .find(|b| b.topic_id == topic)
            .map(|b| b.mean_stance)
    };
    // Each topic only sees its own sentence
    assert_eq!(stance("immigration"), Some(1.0));
    assert_eq!(stance("climate"), Some(-1.0));
    assert_eq!(output.stats.records_scored, 2);
    assert_eq!(output.mindshare_bins.len(), 2);
}

// ============================================================================
// Ingest Boundary
// ============================================================================

#[test]
fn test_raw_feed_with_bad_records() {
    let pipeline = Pipeline::new(catalog(), &PipelineConfig::default()).unwrap();
    let output = pipeline.run_raw(vec![
        json!({"id": "ok-1", "author": "anchor", "published_at": "2024-09-01T00:05:00Z",
               "title": "Border policy is good, fair and effective"}),
        json!({"id": "ok-2", "voiceId": "blogger", "timestamp": 1_725_149_400_000i64,
               "body": "Immigration reform is a disaster and wrong"}),
        json!({"id": "ok-2", "voiceId": "blogger", "timestamp": 1_725_149_400_000i64,
               "body": "duplicate"}),
        json!({"id": "no-voice", "timestamp": 0, "text": "border"}),
        json!({"id": "stranger", "voice_id": "ghost", "timestamp": 0, "text": "border"}),
        json!({"id": "blank", "voice_id": "poster", "timestamp": 0, "text": ""}),
        json!([1, 2, 3]),
    ]);

    assert_eq!(output.stats.items_received, 7);
    assert_eq!(output.stats.items_skipped, 5);
    assert_eq!(output.stats.skipped.len(), 5);
    assert_eq!(output.stats.records_scored, 2);
    assert_eq!(output.stance_bins.len(), 2);
    // poster never mentions immigration
    assert!(!output.complete);
}

#[test]
fn test_catalog_with_empty_topic_is_rejected() {
    let err = Catalog::new(
        vec![voice("anchor", Platform::Youtube)],
        vec![Topic {
            id: "empty".into(),
            label: "Empty".into(),
            keywords: vec!["  ".into()],
        }],
    )
    .unwrap_err();
    assert!(err.is_config());
}
