use chrono_tz::Tz;
use serde::Serialize;

use super::bucket::DayBucket;
use crate::config::LayoutConfig;
use crate::datetime::local_hour;

pub const HOURS_PER_DAY: usize = 24;

/// Per-hour count of intervals whose
/// clipped span includes that hour.
pub type HourCounts = [u32; HOURS_PER_DAY];

/// Counts each clipped interval in every
/// hour from its start hour through its
/// end hour, inclusive.
pub fn stack_heights(
  bucket: &DayBucket<'_>,
  tz: Tz
) -> HourCounts {
  let mut counts = [0_u32; HOURS_PER_DAY];
  for entry in &bucket.entries {
    let first =
      local_hour(tz, entry.clipped_start);
    // A fall-back transition can put the
    // clipped end on an earlier clock hour.
    let last = local_hour(
      tz,
      entry.clipped_end
    )
    .max(first);
    for count in
      &mut counts[first..=last]
    {
      *count += 1;
    }
  }
  counts
}

/// Column-wise maximum: every visible day
/// shares one row grid, so the busiest
/// day sizes each hour.
pub fn peak_by_hour(
  per_day: &[HourCounts]
) -> HourCounts {
  let mut peak = [0_u32; HOURS_PER_DAY];
  for counts in per_day {
    for (slot, count) in
      peak.iter_mut().zip(counts)
    {
      *slot = (*slot).max(*count);
    }
  }
  peak
}

pub fn row_height(
  stack: u32,
  config: &LayoutConfig
) -> f64 {
  let base = config.base_hour_height_px;
  if stack <= 1 {
    return base;
  }
  let grown = base
    + f64::from(stack - 1)
      * config.stack_offset_px;
  grown
    .min(
      base
        + config.max_row_height_cap_px
    )
    .max(base)
}

/// Hour row heights and their cumulative
/// offsets. `offsets[24]` is the total
/// grid height.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowGrid {
  pub heights: [f64; HOURS_PER_DAY],
  pub offsets: [f64; HOURS_PER_DAY + 1]
}

impl RowGrid {
  pub fn from_stack_heights(
    peaks: &HourCounts,
    config: &LayoutConfig
  ) -> Self {
    let mut heights =
      [0.0_f64; HOURS_PER_DAY];
    for (height, stack) in
      heights.iter_mut().zip(peaks)
    {
      *height =
        row_height(*stack, config);
    }

    let mut offsets =
      [0.0_f64; HOURS_PER_DAY + 1];
    for hour in 0..HOURS_PER_DAY {
      offsets[hour + 1] =
        offsets[hour] + heights[hour];
    }

    Self {
      heights,
      offsets
    }
  }

  pub fn total_height(&self) -> f64 {
    self.offsets[HOURS_PER_DAY]
  }

  /// Hour row containing vertical offset
  /// `y`; clamps outside the grid.
  pub fn hour_at(&self, y: f64) -> usize {
    let mut hour = 0;
    for (idx, offset) in self
      .offsets
      .iter()
      .take(HOURS_PER_DAY)
      .enumerate()
    {
      if y >= *offset {
        hour = idx;
      } else {
        break;
      }
    }
    hour
  }

  /// Maps a point inside the scroll
  /// container to `(day_index, hour)`.
  /// `x` includes the time gutter.
  pub fn slot_at(
    &self,
    x: f64,
    y: f64,
    grid_width: f64,
    day_count: usize,
    gutter: f64
  ) -> Option<(usize, usize)> {
    if day_count == 0
      || y < 0.0
      || y >= self.total_height()
    {
      return None;
    }
    let day_area_x = x - gutter;
    if day_area_x < 0.0 {
      return None;
    }
    let day_width = ((grid_width
      - gutter)
      / day_count as f64)
      .max(1.0);
    let day =
      (day_area_x / day_width).floor()
        as usize;
    (day < day_count)
      .then(|| (day, self.hour_at(y)))
  }

  /// Offset to scroll to so `hour` is the
  /// first visible row.
  pub fn scroll_offset(
    &self,
    hour: u32
  ) -> f64 {
    let hour = (hour as usize)
      .min(HOURS_PER_DAY - 1);
    self.offsets[hour]
  }

  /// `(top, bottom)` of the rows for
  /// hours `start..=end`; the span the
  /// view keeps on screen for the working
  /// day.
  pub fn hour_window(
    &self,
    start: u32,
    end: u32
  ) -> (f64, f64) {
    let start = (start as usize)
      .min(HOURS_PER_DAY - 1);
    let end = (end as usize)
      .clamp(start, HOURS_PER_DAY - 1);
    (
      self.offsets[start],
      self.offsets[end + 1]
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Preset;

  fn calendar() -> LayoutConfig {
    LayoutConfig::preset(
      Preset::Calendar
    )
  }

  #[test]
  fn row_height_grows_then_caps() {
    let mut cfg = calendar();
    cfg.max_row_height_cap_px = 64.0;

    assert_eq!(row_height(0, &cfg), 40.0);
    assert_eq!(row_height(1, &cfg), 40.0);
    assert_eq!(row_height(2, &cfg), 60.0);
    assert_eq!(row_height(3, &cfg), 80.0);
    assert_eq!(row_height(4, &cfg), 100.0);
    assert_eq!(row_height(5, &cfg), 104.0);
    assert_eq!(
      row_height(50, &cfg),
      104.0
    );
  }

  #[test]
  fn row_height_is_monotonic_and_floored(
  ) {
    for cfg in [
      calendar(),
      LayoutConfig::preset(
        Preset::ActivityPlan
      )
    ] {
      let mut previous = 0.0;
      for stack in 0..20 {
        let height =
          row_height(stack, &cfg);
        assert!(
          height
            >= cfg.base_hour_height_px
        );
        assert!(height >= previous);
        previous = height;
      }
    }
  }

  #[test]
  fn offsets_accumulate_heights() {
    let mut peaks = [0_u32; 24];
    peaks[9] = 3;
    peaks[10] = 2;
    let grid = RowGrid::from_stack_heights(
      &peaks,
      &calendar()
    );

    assert_eq!(grid.heights[9], 80.0);
    assert_eq!(grid.heights[10], 60.0);
    assert_eq!(grid.offsets[9], 360.0);
    assert_eq!(grid.offsets[10], 440.0);
    assert_eq!(grid.offsets[11], 500.0);
    assert_eq!(
      grid.total_height(),
      22.0 * 40.0 + 80.0 + 60.0
    );
  }

  #[test]
  fn hit_testing_follows_variable_rows() {
    let mut peaks = [0_u32; 24];
    peaks[9] = 3;
    let grid = RowGrid::from_stack_heights(
      &peaks,
      &calendar()
    );

    assert_eq!(grid.hour_at(-5.0), 0);
    assert_eq!(grid.hour_at(359.0), 8);
    assert_eq!(grid.hour_at(360.0), 9);
    assert_eq!(grid.hour_at(439.0), 9);
    assert_eq!(grid.hour_at(440.0), 10);
    assert_eq!(grid.scroll_offset(7), 280.0);
    assert_eq!(grid.scroll_offset(99), grid.offsets[23]);
    assert_eq!(
      grid.hour_window(7, 10),
      (280.0, 480.0)
    );
    assert_eq!(
      grid.hour_window(12, 3),
      (grid.offsets[12], grid.offsets[13])
    );
    assert_eq!(
      grid.hour_window(0, 99),
      (0.0, grid.total_height())
    );

    assert_eq!(
      grid.slot_at(
        60.0 + 250.0,
        445.0,
        60.0 + 7.0 * 100.0,
        7,
        60.0
      ),
      Some((2, 10))
    );
    assert_eq!(
      grid.slot_at(
        30.0, 445.0, 760.0, 7, 60.0
      ),
      None
    );
    assert_eq!(
      grid.slot_at(
        300.0,
        grid.total_height(),
        760.0,
        7,
        60.0
      ),
      None
    );
  }

  #[test]
  fn peak_takes_busiest_day_per_hour() {
    let mut monday = [0_u32; 24];
    let mut tuesday = [0_u32; 24];
    monday[9] = 2;
    tuesday[9] = 1;
    tuesday[14] = 4;
    let peak =
      peak_by_hour(&[monday, tuesday]);
    assert_eq!(peak[9], 2);
    assert_eq!(peak[14], 4);
    assert_eq!(peak[0], 0);
  }
}
