use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::Serialize;

use super::bucket::DayBucket;
use crate::activity::{
  ActivityId,
  Source
};
use crate::datetime::format_clock;
use crate::range::VisibleRange;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthEntry {
  pub id:         ActivityId,
  pub label:      String,
  pub source:     Source,
  pub status_tag: Option<String>,
  pub completed:  bool,
  pub start:      DateTime<Utc>,
  pub end:        DateTime<Utc>,
  pub start_time: String,
  pub end_time:   String
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCell {
  pub day_index:         usize,
  pub date:              NaiveDate,
  pub in_current_period: bool,
  pub is_today:          bool,
  /// Badge value; always
  /// `entries.len()`.
  pub count:             usize,
  pub entries:           Vec<MonthEntry>
}

/// One cell per grid day, entries in
/// start order. Nothing is truncated;
/// overflow is the renderer's concern.
pub fn reduce(
  buckets: &[DayBucket<'_>],
  range: &VisibleRange,
  tz: Tz
) -> Vec<MonthCell> {
  buckets
    .iter()
    .zip(&range.days)
    .map(|(bucket, day)| {
      let entries = bucket
        .entries
        .iter()
        .map(|entry| {
          let interval = entry.interval;
          MonthEntry {
            id:         interval
              .id
              .clone(),
            label:      interval
              .label
              .clone(),
            source:     interval.source,
            status_tag: interval
              .status_tag
              .clone(),
            completed:  interval
              .is_completed(),
            start:      interval.start,
            end:        interval.end,
            start_time: format_clock(
              tz,
              interval.start
            ),
            end_time:   format_clock(
              tz,
              interval.end
            )
          }
        })
        .collect::<Vec<_>>();

      MonthCell {
        day_index: bucket.day_index,
        date: day.date,
        in_current_period: day
          .in_current_period,
        is_today: day.is_today,
        count: entries.len(),
        entries
      }
    })
    .collect()
}
