pub mod bucket;
pub mod hours;
pub mod month;
pub mod placement;

use serde::Serialize;
use tracing::{
  debug,
  warn
};

pub use self::hours::{
  HOURS_PER_DAY,
  HourCounts,
  RowGrid
};
pub use self::month::{
  MonthCell,
  MonthEntry
};
pub use self::placement::Placement;
use crate::activity::ActivityInterval;
use crate::config::LayoutConfig;
use crate::range::{
  ViewMode,
  VisibleRange
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthLayout {
  pub range: VisibleRange,
  pub cells: Vec<MonthCell>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineLayout {
  pub range:         VisibleRange,
  /// `stack_heights[day_index][hour]`.
  pub stack_heights: Vec<HourCounts>,
  pub rows:          RowGrid,
  /// Ordered by day, then by bucket
  /// order within the day.
  pub placements:    Vec<Placement>,
  pub scroll_top_px: f64,
  /// `(top, bottom)` of the configured
  /// day start through day end hours.
  pub day_window_px: (f64, f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum Layout {
  Month(MonthLayout),
  Timeline(TimelineLayout)
}

impl Layout {
  pub fn placements(&self) -> &[Placement] {
    match self {
      | Self::Month(_) => &[],
      | Self::Timeline(timeline) => {
        &timeline.placements
      }
    }
  }

  pub fn month_cells(
    &self
  ) -> &[MonthCell] {
    match self {
      | Self::Month(month) => {
        &month.cells
      }
      | Self::Timeline(_) => &[]
    }
  }

  pub fn range(&self) -> &VisibleRange {
    match self {
      | Self::Month(month) => {
        &month.range
      }
      | Self::Timeline(timeline) => {
        &timeline.range
      }
    }
  }
}

/// Computes the full placement for one
/// render pass. Pure: the output depends
/// only on the arguments, which are left
/// untouched.
#[tracing::instrument(
  skip_all,
  fields(
    view = view.as_key(),
    intervals = intervals.len(),
    days = range.len()
  )
)]
pub fn layout(
  intervals: &[ActivityInterval],
  range: &VisibleRange,
  view: ViewMode,
  config: &LayoutConfig
) -> Layout {
  if range.view != view {
    warn!(
      range_view = range.view.as_key(),
      "visible range was built for a \
       different view"
    );
  }
  let tz = config.timezone;

  if !view.is_timeline() {
    let buckets =
      bucket::bucket_by_start_day(
        intervals, range, tz
      );
    let cells =
      month::reduce(&buckets, range, tz);
    debug!(
      entries = cells
        .iter()
        .map(|c| c.count)
        .sum::<usize>(),
      "month layout computed"
    );
    return Layout::Month(MonthLayout {
      range: range.clone(),
      cells
    });
  }

  let buckets = bucket::bucket_by_day(
    intervals, range, tz
  );
  let stack_heights = buckets
    .iter()
    .map(|b| hours::stack_heights(b, tz))
    .collect::<Vec<_>>();
  let rows = RowGrid::from_stack_heights(
    &hours::peak_by_hour(&stack_heights),
    config
  );
  let placements = buckets
    .iter()
    .flat_map(|b| {
      placement::place_day(
        b, &rows, config, tz
      )
    })
    .collect::<Vec<_>>();

  debug!(
    placements = placements.len(),
    grid_height = rows.total_height(),
    "timeline layout computed"
  );

  Layout::Timeline(TimelineLayout {
    range: range.clone(),
    scroll_top_px: rows
      .scroll_offset(config.day_start_hour),
    day_window_px: rows.hour_window(
      config.day_start_hour,
      config.day_end_hour
    ),
    stack_heights,
    rows,
    placements
  })
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    NaiveDate,
    TimeZone,
    Utc,
    Weekday
  };

  use super::*;
  use crate::activity::ActivityId;
  use crate::config::Preset;

  fn cfg() -> LayoutConfig {
    LayoutConfig::preset(
      Preset::Calendar
    )
    .with_timezone(chrono_tz::UTC)
  }

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d)
      .expect("valid date")
  }

  fn at(
    d: u32,
    h: u32,
    m: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(2026, 2, d, h, m, 0)
      .single()
      .expect("valid instant")
  }

  fn iv(
    id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>
  ) -> ActivityInterval {
    ActivityInterval::new(
      ActivityId::Text(id.to_string()),
      start,
      Some(end),
      id
    )
  }

  fn timeline(
    layout: &Layout
  ) -> &TimelineLayout {
    match layout {
      | Layout::Timeline(t) => t,
      | Layout::Month(_) => {
        panic!("expected timeline")
      }
    }
  }

  fn overlapping_trio() -> Vec<ActivityInterval>
  {
    vec![
      iv("A", at(18, 9, 0), at(18, 10, 30)),
      iv("B", at(18, 9, 15), at(18, 9, 45)),
      iv("C", at(18, 9, 30), at(18, 11, 0)),
    ]
  }

  #[test]
  fn overlapping_trio_in_week_view() {
    let intervals = overlapping_trio();
    let range = VisibleRange::build(
      ViewMode::Week,
      day(18),
      Weekday::Sun,
      day(18)
    );
    let out = layout(
      &intervals,
      &range,
      ViewMode::Week,
      &cfg()
    );
    let t = timeline(&out);

    let wednesday = range
      .index_of(day(18))
      .expect("visible");
    assert_eq!(
      t.stack_heights[wednesday][9],
      3
    );
    assert_eq!(
      t.stack_heights[wednesday][10],
      2
    );
    assert_eq!(
      t.stack_heights[wednesday][11],
      1
    );
    assert_eq!(t.rows.heights[9], 80.0);
    assert_eq!(t.rows.heights[10], 60.0);

    assert_eq!(t.placements.len(), 3);
    let a = &t.placements[0];
    assert_eq!(a.id.to_string(), "A");
    assert_eq!(a.hour, 9);
    assert_eq!(a.stack_index, 0);
    assert_eq!(a.top_px, t.rows.offsets[9]);
    assert_eq!(a.height_px, 60.0);
    assert_eq!(a.day_index, wednesday);

    let b = &t.placements[1];
    assert_eq!(b.stack_index, 1);
    assert_eq!(
      b.top_px,
      t.rows.offsets[9] + 10.0 + 20.0
    );
    let c = &t.placements[2];
    assert_eq!(c.stack_index, 2);
    assert_eq!(
      c.top_px,
      t.rows.offsets[9] + 20.0 + 40.0
    );

    assert_eq!(
      t.placements
        .iter()
        .filter(|p| p.id.to_string() == "A")
        .count(),
      1
    );
  }

  #[test]
  fn stack_order_follows_bucket_not_duration(
  ) {
    let intervals = vec![
      iv("long", at(18, 9, 0), at(18, 12, 0)),
      iv("short", at(18, 9, 0), at(18, 9, 5)),
    ];
    let range = VisibleRange::build(
      ViewMode::Day,
      day(18),
      Weekday::Sun,
      day(18)
    );
    let out = layout(
      &intervals,
      &range,
      ViewMode::Day,
      &cfg()
    );
    let ids = out
      .placements()
      .iter()
      .map(|p| {
        (p.id.to_string(), p.stack_index)
      })
      .collect::<Vec<_>>();
    assert_eq!(
      ids,
      vec![
        ("long".to_string(), 0),
        ("short".to_string(), 1)
      ]
    );
  }

  #[test]
  fn interval_crossing_midnight_is_clipped_in_day_view(
  ) {
    let mut config = cfg();
    config.min_event_height_px = 1.0;
    let intervals = vec![iv(
      "late",
      at(17, 23, 30),
      at(18, 1, 30)
    )];
    let range = VisibleRange::build(
      ViewMode::Day,
      day(17),
      Weekday::Sun,
      day(17)
    );
    let out = layout(
      &intervals,
      &range,
      ViewMode::Day,
      &config
    );
    let placement = &out.placements()[0];

    assert_eq!(
      placement.clipped_end,
      at(18, 0, 0)
        - Duration::milliseconds(1)
    );
    assert_eq!(
      placement.clipped_start,
      at(17, 23, 30)
    );
    let expected = 30.0 / 60.0 * 40.0;
    assert!(
      placement.height_px < expected
    );
    assert!(
      (placement.height_px - expected)
        .abs()
        < 0.01
    );
    assert_eq!(
      timeline(&out).stack_heights[0][23],
      1
    );
  }

  #[test]
  fn clipping_stays_inside_each_day() {
    let intervals = vec![
      iv("span", at(15, 20, 0), at(19, 6, 0)),
      iv("edge", at(16, 0, 0), at(16, 0, 0)),
    ];
    let range = VisibleRange::build(
      ViewMode::Week,
      day(18),
      Weekday::Mon,
      day(18)
    );
    let out = layout(
      &intervals,
      &range,
      ViewMode::Week,
      &cfg()
    );
    let tz = cfg().timezone;
    for p in out.placements() {
      let (start, end) =
        crate::datetime::day_bounds(
          tz,
          range.days[p.day_index].date
        );
      assert!(p.clipped_start >= start);
      assert!(p.clipped_end <= end);
      assert!(
        p.clipped_end >= p.clipped_start
      );
    }
    // Mon-Thu for the span, Mon for the edge.
    assert_eq!(out.placements().len(), 5);
  }

  #[test]
  fn layout_is_idempotent_and_leaves_input_alone(
  ) {
    let intervals = overlapping_trio();
    let snapshot = intervals.clone();
    let range = VisibleRange::build(
      ViewMode::Week,
      day(18),
      Weekday::Sun,
      day(18)
    );
    let first = layout(
      &intervals,
      &range,
      ViewMode::Week,
      &cfg()
    );
    let second = layout(
      &intervals,
      &range,
      ViewMode::Week,
      &cfg()
    );
    assert_eq!(first, second);
    assert_eq!(intervals, snapshot);
  }

  #[test]
  fn month_view_pins_to_start_day_with_badges(
  ) {
    let intervals = vec![
      iv("trip", at(10, 22, 0), at(12, 8, 0)),
      iv("b", at(10, 9, 0), at(10, 9, 30)),
      iv("a", at(10, 8, 0), at(10, 8, 30)),
      iv("c", at(27, 12, 0), at(27, 13, 0)),
    ];
    let range = VisibleRange::build(
      ViewMode::Month,
      day(10),
      Weekday::Sun,
      day(17)
    );
    let out = layout(
      &intervals,
      &range,
      ViewMode::Month,
      &cfg()
    );

    let cells = out.month_cells();
    assert_eq!(cells.len(), 42);
    assert!(out.placements().is_empty());
    for cell in cells {
      assert_eq!(
        cell.count,
        cell.entries.len()
      );
    }

    let tenth = &cells[range
      .index_of(day(10))
      .expect("visible")];
    let labels = tenth
      .entries
      .iter()
      .map(|e| e.label.as_str())
      .collect::<Vec<_>>();
    assert_eq!(
      labels,
      vec!["a", "b", "trip"]
    );
    assert_eq!(tenth.count, 3);
    assert_eq!(
      tenth.entries[2].end_time,
      "08:00"
    );
    assert_eq!(
      tenth.entries[0].start_time,
      "08:00"
    );

    let eleventh = &cells[range
      .index_of(day(11))
      .expect("visible")];
    assert_eq!(eleventh.count, 0);
    assert!(
      cells[range
        .index_of(day(17))
        .expect("visible")]
      .is_today
    );
  }

  #[test]
  fn empty_input_gives_base_grid() {
    let range = VisibleRange::build(
      ViewMode::Week,
      day(18),
      Weekday::Sun,
      day(18)
    );
    let out = layout(
      &[],
      &range,
      ViewMode::Week,
      &cfg()
    );
    let t = timeline(&out);
    assert!(t.placements.is_empty());
    assert_eq!(
      t.rows.total_height(),
      24.0 * 40.0
    );
    assert_eq!(t.scroll_top_px, 7.0 * 40.0);
    assert_eq!(
      t.day_window_px,
      (7.0 * 40.0, 24.0 * 40.0)
    );

    let mut short_day = cfg();
    short_day.day_start_hour = 9;
    short_day.day_end_hour = 17;
    let out = layout(
      &[],
      &range,
      ViewMode::Week,
      &short_day
    );
    assert_eq!(
      timeline(&out).day_window_px,
      (9.0 * 40.0, 18.0 * 40.0)
    );
  }
}
