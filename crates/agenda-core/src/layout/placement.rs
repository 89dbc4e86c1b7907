use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use serde::Serialize;

use super::bucket::DayBucket;
use super::hours::{
  HOURS_PER_DAY,
  RowGrid
};
use crate::activity::{
  ActivityId,
  Source
};
use crate::config::LayoutConfig;
use crate::datetime::{
  local_hour,
  minutes_since_midnight
};

/// Where one interval is drawn within
/// one visible day column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
  pub day_index:     usize,
  pub id:            ActivityId,
  pub label:         String,
  pub source:        Source,
  pub completed:     bool,
  /// Clipped start hour the block is
  /// anchored to.
  pub hour:          usize,
  pub stack_index:   usize,
  pub top_px:        f64,
  pub left_px:       f64,
  pub width_px:      f64,
  pub height_px:     f64,
  pub clipped_start: DateTime<Utc>,
  pub clipped_end:   DateTime<Utc>
}

/// Assigns stack indices per starting
/// hour in bucket order and maps each
/// entry to pixel coordinates. Each
/// interval is drawn once, at its
/// clipped start hour.
pub fn place_day(
  bucket: &DayBucket<'_>,
  grid: &RowGrid,
  config: &LayoutConfig,
  tz: Tz
) -> Vec<Placement> {
  let base = config.base_hour_height_px;
  let left = config.time_gutter_px;
  let width = (config.column_width_px
    - config.time_gutter_px
    - config.right_margin_px)
    .max(0.0);

  let mut next_stack =
    [0_usize; HOURS_PER_DAY];

  bucket
    .entries
    .iter()
    .map(|entry| {
      let hour =
        local_hour(tz, entry.clipped_start);
      let stack_index = next_stack[hour];
      next_stack[hour] += 1;

      let minutes_into_hour =
        (minutes_since_midnight(
          tz,
          entry.clipped_start
        ) - (hour * 60) as f64)
          .max(0.0);
      let duration_minutes = (entry
        .clipped_end
        - entry.clipped_start)
        .num_milliseconds()
        as f64
        / 60_000.0;

      let top = grid.offsets[hour]
        + minutes_into_hour / 60.0 * base
        + stack_index as f64
          * config.stack_offset_px;
      let height = (duration_minutes
        / 60.0
        * base)
        .max(config.min_event_height_px);

      Placement {
        day_index: bucket.day_index,
        id: entry.interval.id.clone(),
        label: entry.interval.label.clone(),
        source: entry.interval.source,
        completed: entry
          .interval
          .is_completed(),
        hour,
        stack_index,
        top_px: top,
        left_px: left,
        width_px: width,
        height_px: height,
        clipped_start: entry.clipped_start,
        clipped_end: entry.clipped_end
      }
    })
    .collect()
}
