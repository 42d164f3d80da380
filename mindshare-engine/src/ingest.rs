//! Ingest boundary.
//!
//! Feed records arrive as loosely typed JSON. They are turned into explicit
//! [`RawContentItem`]s here, once; downstream stages never see raw JSON.
//! Bad records are skipped with a reason, never raised.

use chrono::{DateTime, NaiveDateTime, Utc};
use mindshare_common::util::truncate_with_ellipsis;
use mindshare_common::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::types::{Platform, RawContentItem};

/// Numeric timestamps above this are epoch milliseconds, below are seconds.
const MILLIS_THRESHOLD: f64 = 1e11;

const VOICE_FIELDS: &[&str] = &["voice_id", "voiceId", "author"];
const TEXT_FIELDS: &[&str] = &["text", "body", "title"];
const TIME_FIELDS: &[&str] = &["timestamp", "created_at", "published_at", "time"];

/// Why a record was dropped at the ingest boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing content id")]
    MissingId,
    #[error("missing voice id")]
    MissingVoice,
    #[error("voice '{voice_id}' is not in the catalog")]
    UnknownVoice { voice_id: String },
    #[error("empty text")]
    EmptyText,
    #[error("unparseable timestamp '{raw}'")]
    BadTimestamp { raw: String },
    #[error("duplicate content id")]
    DuplicateId,
}

impl SkipReason {
    /// Short stable label, used as a counter key.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotAnObject => "not_an_object",
            Self::MissingId => "missing_id",
            Self::MissingVoice => "missing_voice",
            Self::UnknownVoice { .. } => "unknown_voice",
            Self::EmptyText => "empty_text",
            Self::BadTimestamp { .. } => "bad_timestamp",
            Self::DuplicateId => "duplicate_id",
        }
    }
}

/// A skipped record and its position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub index: usize,
    pub id: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Accepted items and the records that were dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub items: Vec<RawContentItem>,
    pub skipped: Vec<SkippedItem>,
}

impl IngestReport {
    pub fn received(&self) -> usize {
        self.items.len() + self.skipped.len()
    }
}

/// Normalize raw feed records against the catalog.
pub fn normalize(records: Vec<Value>, catalog: &Catalog) -> IngestReport {
    let mut report = IngestReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let id = match &record {
            Value::Object(map) => string_field(map, &["id"]),
            _ => None,
        };
        match parse_record(record, catalog) {
            Ok(item) if !seen.insert(item.id.clone()) => {
                report.skipped.push(SkippedItem {
                    index,
                    id,
                    reason: SkipReason::DuplicateId,
                });
            }
            Ok(item) => report.items.push(item),
            Err(reason) => report.skipped.push(SkippedItem { index, id, reason }),
        }
    }

    log_skips("normalize", &report);
    report
}

/// Re-check already typed items: empty text, unknown voice, duplicate id.
pub fn screen(items: Vec<RawContentItem>, catalog: &Catalog) -> IngestReport {
    let mut report = IngestReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let reason = if item.id.trim().is_empty() {
            Some(SkipReason::MissingId)
        } else if item.voice_id.trim().is_empty() {
            Some(SkipReason::MissingVoice)
        } else if !catalog.contains_voice(&item.voice_id) {
            Some(SkipReason::UnknownVoice {
                voice_id: item.voice_id.clone(),
            })
        } else if item.text.trim().is_empty() {
            Some(SkipReason::EmptyText)
        } else if !seen.insert(item.id.clone()) {
            Some(SkipReason::DuplicateId)
        } else {
            None
        };

        match reason {
            Some(reason) => report.skipped.push(SkippedItem {
                index,
                id: Some(item.id),
                reason,
            }),
            None => report.items.push(item),
        }
    }

    log_skips("screen", &report);
    report
}

fn log_skips(stage: &'static str, report: &IngestReport) {
    for skipped in &report.skipped {
        debug!(
            stage,
            index = skipped.index,
            id = ?skipped.id,
            reason = %skipped.reason,
            "Skipping content item"
        );
    }
    if !report.skipped.is_empty() {
        warn!(
            stage,
            accepted = report.items.len(),
            skipped = report.skipped.len(),
            "Some content items were skipped"
        );
    }
}

fn parse_record(record: Value, catalog: &Catalog) -> std::result::Result<RawContentItem, SkipReason> {
    let Value::Object(map) = record else {
        return Err(SkipReason::NotAnObject);
    };

    let id = string_field(&map, &["id"]).ok_or(SkipReason::MissingId)?;
    let voice_id = string_field(&map, VOICE_FIELDS).ok_or(SkipReason::MissingVoice)?;
    let Some(voice) = catalog.voice(&voice_id) else {
        return Err(SkipReason::UnknownVoice { voice_id });
    };

    let text = TEXT_FIELDS
        .iter()
        .filter_map(|f| map.get(*f).and_then(Value::as_str))
        .find(|t| !t.trim().is_empty())
        .ok_or(SkipReason::EmptyText)?
        .to_string();

    let raw_time = TIME_FIELDS
        .iter()
        .find_map(|f| map.get(*f).filter(|v| !v.is_null()))
        .ok_or_else(|| SkipReason::BadTimestamp { raw: String::new() })?;
    let timestamp = parse_timestamp(raw_time).ok_or_else(|| SkipReason::BadTimestamp {
        raw: match raw_time {
            Value::String(s) => truncate_with_ellipsis(s, 64),
            other => truncate_with_ellipsis(&other.to_string(), 64),
        },
    })?;

    let platform = map
        .get("platform")
        .and_then(Value::as_str)
        .map_or(voice.platform, Platform::parse);

    Ok(RawContentItem {
        id,
        voice_id,
        platform,
        timestamp,
        text,
    })
}

/// First non-empty string (or number, rendered) among `fields`.
fn string_field(map: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| match map.get(*f)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse an RFC 3339 string or a numeric epoch timestamp.
///
/// Numbers above 10^11 are read as milliseconds, anything else as seconds.
/// Strings of digits are treated like numbers.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<f64>() {
                return from_epoch(n);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    let millis = if n.abs() > MILLIS_THRESHOLD { n } else { n * 1000.0 };
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// Read feed records from a JSON array file or a JSONL file.
///
/// Malformed JSONL lines are kept as `null`, so they are reported as
/// skipped at their line index instead of aborting the load.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read items from {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .context(format!("Failed to parse items from {}", path.display()));
    }

    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(value) => records.push(value),
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Malformed JSONL record");
                records.push(Value::Null);
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Topic, Voice};
    use chrono::TimeZone;
    use serde_json::json;
    use std::io::Write;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Voice {
                    id: "alice".into(),
                    display_name: "Alice".into(),
                    platform: Platform::Reddit,
                    category: String::new(),
                },
                Voice {
                    id: "bob".into(),
                    display_name: "Bob".into(),
                    platform: Platform::Youtube,
                    category: String::new(),
                },
            ],
            vec![Topic {
                id: "climate".into(),
                label: "Climate".into(),
                keywords: vec!["climate".into()],
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_accepts_field_aliases() {
        let report = normalize(
            vec![
                json!({"id": "1", "voice_id": "alice", "timestamp": "2024-01-01T10:00:00Z", "text": "a"}),
                json!({"id": 2, "voiceId": "bob", "created_at": 1_704_103_200, "body": "b"}),
                json!({"id": "3", "author": "bob", "time": 1_704_103_200_000i64, "title": "c", "platform": "hn"}),
            ],
            &catalog(),
        );

        assert!(report.skipped.is_empty());
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.items[0].platform, Platform::Reddit);
        assert_eq!(report.items[1].id, "2");
        assert_eq!(report.items[1].platform, Platform::Youtube);
        assert_eq!(report.items[2].platform, Platform::HackerNews);
        assert_eq!(report.items[1].timestamp, report.items[2].timestamp);
        assert_eq!(
            report.items[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_normalize_skips_with_reasons() {
        let report = normalize(
            vec![
                json!("just a string"),
                json!({"voice_id": "alice", "timestamp": 0, "text": "x"}),
                json!({"id": "a", "timestamp": 0, "text": "x"}),
                json!({"id": "b", "voice_id": "mallory", "timestamp": 0, "text": "x"}),
                json!({"id": "c", "voice_id": "alice", "timestamp": 0, "text": "   "}),
                json!({"id": "d", "voice_id": "alice", "timestamp": "yesterday", "text": "x"}),
                json!({"id": "e", "voice_id": "alice", "timestamp": 0, "text": "x"}),
                json!({"id": "e", "voice_id": "bob", "timestamp": 0, "text": "y"}),
            ],
            &catalog(),
        );

        let labels: Vec<&str> = report.skipped.iter().map(|s| s.reason.label()).collect();
        assert_eq!(
            labels,
            vec![
                "not_an_object",
                "missing_id",
                "missing_voice",
                "unknown_voice",
                "empty_text",
                "bad_timestamp",
                "duplicate_id",
            ]
        );
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.received(), 8);
        assert_eq!(report.skipped[6].index, 7);
        assert_eq!(
            report.skipped[5].reason,
            SkipReason::BadTimestamp {
                raw: "yesterday".into()
            }
        );
    }

    #[test]
    fn test_parse_timestamp_units() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&json!(1_704_067_200)), Some(expected));
        assert_eq!(parse_timestamp(&json!(1_704_067_200_000i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("1704067200")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-01T01:00:00+01:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-01 00:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!(true)), None);
        assert_eq!(parse_timestamp(&json!("not a date")), None);
    }

    #[test]
    fn test_screen_typed_items() {
        let item = |id: &str, voice: &str, text: &str| RawContentItem {
            id: id.into(),
            voice_id: voice.into(),
            platform: Platform::Rss,
            timestamp: Utc::now(),
            text: text.into(),
        };
        let report = screen(
            vec![
                item("1", "alice", "ok"),
                item("2", "zed", "ok"),
                item("3", "bob", ""),
                item("1", "bob", "again"),
            ],
            &catalog(),
        );
        assert_eq!(report.items.len(), 1);
        let labels: Vec<&str> = report.skipped.iter().map(|s| s.reason.label()).collect();
        assert_eq!(labels, vec!["unknown_voice", "empty_text", "duplicate_id"]);
    }

    #[test]
    fn test_skip_reason_serializes_tagged() {
        let skipped = SkippedItem {
            index: 3,
            id: Some("x".into()),
            reason: SkipReason::UnknownVoice {
                voice_id: "zed".into(),
            },
        };
        let value = serde_json::to_value(&skipped).unwrap();
        assert_eq!(value["reason"], "unknown_voice");
        assert_eq!(value["voice_id"], "zed");
        assert_eq!(value["index"], 3);
    }

    #[test]
    fn test_load_records_array_and_jsonl() {
        let mut array = tempfile::NamedTempFile::new().unwrap();
        write!(array, r#"[{{"id": "1"}}, {{"id": "2"}}]"#).unwrap();
        assert_eq!(load_records(array.path()).unwrap().len(), 2);

        let mut lines = tempfile::NamedTempFile::new().unwrap();
        writeln!(lines, r#"{{"id": "1"}}"#).unwrap();
        writeln!(lines).unwrap();
        writeln!(lines, "{{broken").unwrap();
        writeln!(lines, r#"{{"id": "3"}}"#).unwrap();
        let records = load_records(lines.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[1].is_null());
    }

    #[test]
    fn test_load_records_missing_file() {
        let err = load_records(Path::new("/nonexistent/items.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read items"));
    }
}
