use std::fmt;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::datetime::parse_instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Where a record came from. Only the rendering side looks at this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Primary,
    Secondary,
}

impl Source {
    pub fn from_tag(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("secondary") | Some("region") => Self::Secondary,
            _ => Self::Primary,
        }
    }

    pub fn is_interactive(self) -> bool {
        self == Self::Primary
    }
}

/// A record as delivered by the fetch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    #[serde(default)]
    pub id: Option<ActivityId>,

    #[serde(default, alias = "plannedStartAt", alias = "planned_start_at")]
    pub start: Option<String>,

    #[serde(default, alias = "plannedEndAt", alias = "planned_end_at")]
    pub end: Option<String>,

    #[serde(default, alias = "subject")]
    pub label: Option<String>,

    #[serde(default, alias = "activityStatus", alias = "activity_status")]
    pub status_tag: Option<String>,

    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityInterval {
    pub id: ActivityId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
    pub status_tag: Option<String>,
    pub source: Source,
}

impl ActivityInterval {
    /// `end` earlier than `start` collapses to a zero-length interval.
    pub fn new(id: ActivityId, start: DateTime<Utc>, end: Option<DateTime<Utc>>, label: impl Into<String>) -> Self {
        let end = end.filter(|end| *end > start).unwrap_or(start);
        Self {
            id,
            start,
            end,
            label: label.into(),
            status_tag: None,
            source: Source::Primary,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status_tag
            .as_deref()
            .map(|s| {
                let s = s.trim();
                s.eq_ignore_ascii_case("completed") || s == "완료"
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    MissingStart,
    UnparsableStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    MissingId,
    UnparsableEnd,
    EndBeforeStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Issue {
    /// The record was dropped.
    Malformed(MalformedReason),
    /// The record was kept, with `end := start` or a positional id.
    Degenerate(DegenerateReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub index: usize,
    pub id: Option<ActivityId>,
    pub issue: Issue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Normalized {
    pub intervals: Vec<ActivityInterval>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Normalized {
    pub fn dropped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.issue, Issue::Malformed(_)))
            .count()
    }
}

#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn normalize(records: &[RawActivity], tz: Tz) -> Normalized {
    let mut out = Normalized::default();

    for (index, raw) in records.iter().enumerate() {
        let mut report = |issue: Issue| {
            out.diagnostics.push(Diagnostic {
                index,
                id: raw.id.clone(),
                issue,
            })
        };

        let start_raw = raw.start.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let Some(start_raw) = start_raw else {
            warn!(index, id = ?raw.id, "activity record without start; dropping");
            report(Issue::Malformed(MalformedReason::MissingStart));
            continue;
        };
        let Some(start) = parse_instant(start_raw, tz) else {
            warn!(index, id = ?raw.id, start = start_raw, "unparsable start; dropping");
            report(Issue::Malformed(MalformedReason::UnparsableStart));
            continue;
        };

        let id = match raw.id.clone() {
            Some(id) => id,
            None => {
                let fallback = fallback_id(index);
                debug!(index, %fallback, "activity record without id; using its position");
                report(Issue::Degenerate(DegenerateReason::MissingId));
                fallback
            }
        };

        let end_raw = raw.end.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let end = match end_raw {
            None => start,
            Some(text) => match parse_instant(text, tz) {
                None => {
                    debug!(index, %id, end = text, "unparsable end; using start");
                    report(Issue::Degenerate(DegenerateReason::UnparsableEnd));
                    start
                }
                Some(end) if end < start => {
                    debug!(index, %id, "end before start; using start");
                    report(Issue::Degenerate(DegenerateReason::EndBeforeStart));
                    start
                }
                Some(end) => end,
            },
        };

        out.intervals.push(ActivityInterval {
            id,
            start,
            end,
            label: raw.label.clone().unwrap_or_default(),
            status_tag: raw.status_tag.clone(),
            source: Source::from_tag(raw.source.as_deref()),
        });
    }

    debug!(
        kept = out.intervals.len(),
        dropped = out.dropped(),
        "normalized activity records"
    );
    out
}

/// Id for a record that arrived without one; text, so it never collides with
/// numeric ids from the API.
fn fallback_id(index: usize) -> ActivityId {
    ActivityId::Text(format!("#{index}"))
}

pub fn parse_records(json: &str) -> anyhow::Result<Vec<RawActivity>> {
    serde_json::from_str(json).context("activity input must be a JSON array of records")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn raw(id: i64, start: Option<&str>, end: Option<&str>) -> RawActivity {
        RawActivity {
            id: Some(ActivityId::Number(id)),
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            label: Some(format!("visit {id}")),
            status_tag: None,
            source: None,
        }
    }

    #[test]
    fn drops_records_without_start() {
        let records = vec![
            raw(1, None, Some("2026-02-17T10:00:00Z")),
            raw(2, Some("2026-02-17T09:00:00Z"), None),
            raw(3, Some("garbage"), None),
        ];
        let out = normalize(&records, chrono_tz::UTC);

        assert_eq!(out.intervals.len(), 1);
        assert_eq!(out.intervals[0].id, ActivityId::Number(2));
        assert_eq!(out.dropped(), 2);
        assert_eq!(out.diagnostics[0].issue, Issue::Malformed(MalformedReason::MissingStart));
        assert_eq!(out.diagnostics[1].issue, Issue::Malformed(MalformedReason::UnparsableStart));
    }

    #[test]
    fn records_without_id_are_kept_under_their_position() {
        let mut nameless = raw(0, Some("2026-02-17T09:00:00Z"), Some("2026-02-17T09:30:00Z"));
        nameless.id = None;
        let mut empty = raw(0, None, None);
        empty.id = None;
        let records = vec![raw(1, Some("2026-02-17T08:00:00Z"), None), nameless, empty];
        let out = normalize(&records, chrono_tz::UTC);

        assert_eq!(out.intervals.len(), 2);
        assert_eq!(out.intervals[1].id, ActivityId::Text("#1".to_string()));
        assert_eq!(out.intervals[1].label, "visit 0");
        assert_eq!(out.dropped(), 1);
        assert_eq!(
            out.diagnostics.iter().map(|d| (d.index, d.issue)).collect::<Vec<_>>(),
            vec![
                (1, Issue::Degenerate(DegenerateReason::MissingId)),
                (2, Issue::Malformed(MalformedReason::MissingStart)),
            ]
        );
    }

    #[test]
    fn end_defaults_to_start() {
        let records = vec![
            raw(1, Some("2026-02-17T09:00:00Z"), None),
            raw(2, Some("2026-02-17T09:00:00Z"), Some("2026-02-17T08:00:00Z")),
            raw(3, Some("2026-02-17T09:00:00Z"), Some("soon")),
        ];
        let out = normalize(&records, chrono_tz::UTC);

        assert_eq!(out.intervals.len(), 3);
        assert!(out.intervals.iter().all(|i| i.end == i.start));
        assert_eq!(out.dropped(), 0);
        assert_eq!(
            out.diagnostics.iter().map(|d| d.issue).collect::<Vec<_>>(),
            vec![
                Issue::Degenerate(DegenerateReason::EndBeforeStart),
                Issue::Degenerate(DegenerateReason::UnparsableEnd),
            ]
        );
    }

    #[test]
    fn accepts_api_field_aliases() {
        let json = r#"[
            {"id": 7, "subject": "Credit review", "plannedStartAt": "2026-02-17T09:00:00Z",
             "planned_end_at": "2026-02-17T10:00:00Z", "activityStatus": "완료", "source": "region"},
            {"id": "lead-9", "start": "2026-02-17T11:00:00Z"}
        ]"#;
        let records = parse_records(json).expect("parse records");
        let out = normalize(&records, chrono_tz::UTC);

        assert_eq!(out.intervals.len(), 2);
        let first = &out.intervals[0];
        assert_eq!(first.label, "Credit review");
        assert_eq!(first.source, Source::Secondary);
        assert!(first.is_completed());
        assert!(!first.source.is_interactive());
        assert_eq!(
            first.end,
            Utc.with_ymd_and_hms(2026, 2, 17, 10, 0, 0).single().expect("valid")
        );
        assert_eq!(out.intervals[1].id, ActivityId::Text("lead-9".to_string()));
        assert_eq!(out.intervals[1].id.to_string(), "lead-9");
    }

    #[test]
    fn normalize_does_not_touch_input() {
        let records = vec![raw(1, Some("2026-02-17T09:00:00Z"), Some("2026-02-17T08:00:00Z"))];
        let before = format!("{records:?}");
        let _ = normalize(&records, chrono_tz::UTC);
        assert_eq!(before, format!("{records:?}"));
    }
}
