use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use tracing::debug;

use crate::activity::ActivityInterval;
use crate::datetime::{
  day_bounds,
  to_local_date
};
use crate::range::VisibleRange;

/// One interval as seen from one day:
/// the interval itself plus its span
/// clipped to that day's window.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketEntry<'a> {
  pub interval:      &'a ActivityInterval,
  /// Position in the caller's input.
  pub order:         usize,
  pub clipped_start: DateTime<Utc>,
  pub clipped_end:   DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket<'a> {
  pub day_index: usize,
  pub date:      NaiveDate,
  pub day_start: DateTime<Utc>,
  pub day_end:   DateTime<Utc>,
  pub entries:   Vec<BucketEntry<'a>>
}

impl<'a> DayBucket<'a> {
  fn empty(
    day_index: usize,
    date: NaiveDate,
    tz: Tz
  ) -> Self {
    let (day_start, day_end) =
      day_bounds(tz, date);
    Self {
      day_index,
      date,
      day_start,
      day_end,
      entries: Vec::new()
    }
  }

  fn push_clipped(
    &mut self,
    interval: &'a ActivityInterval,
    order: usize
  ) {
    self.entries.push(BucketEntry {
      interval,
      order,
      clipped_start: interval
        .start
        .max(self.day_start),
      clipped_end: interval
        .end
        .min(self.day_end)
    });
  }

  fn sort_entries(&mut self) {
    // Stable: equal starts keep input
    // order.
    self.entries.sort_by_key(|entry| {
      entry.interval.start
    });
  }
}

/// Attaches every interval to each
/// visible day it touches, clipping it to
/// that day. Instant intervals count.
pub fn bucket_by_day<'a>(
  intervals: &'a [ActivityInterval],
  range: &VisibleRange,
  tz: Tz
) -> Vec<DayBucket<'a>> {
  let mut placed =
    vec![false; intervals.len()];
  let mut buckets = range
    .days
    .iter()
    .enumerate()
    .map(|(day_index, day)| {
      let mut bucket = DayBucket::empty(
        day_index, day.date, tz
      );
      for (order, interval) in
        intervals.iter().enumerate()
      {
        if interval.end
          < bucket.day_start
          || interval.start
            > bucket.day_end
        {
          continue;
        }
        bucket
          .push_clipped(interval, order);
        placed[order] = true;
      }
      bucket
    })
    .collect::<Vec<_>>();

  for bucket in &mut buckets {
    bucket.sort_entries();
  }

  log_out_of_range(&placed);
  buckets
}

/// Month-view bucketing: each interval
/// lands on its start day only, and only
/// when that day is visible.
pub fn bucket_by_start_day<'a>(
  intervals: &'a [ActivityInterval],
  range: &VisibleRange,
  tz: Tz
) -> Vec<DayBucket<'a>> {
  let mut placed =
    vec![false; intervals.len()];
  let mut buckets = range
    .days
    .iter()
    .enumerate()
    .map(|(day_index, day)| {
      DayBucket::empty(
        day_index, day.date, tz
      )
    })
    .collect::<Vec<_>>();

  for (order, interval) in
    intervals.iter().enumerate()
  {
    let start_day =
      to_local_date(tz, interval.start);
    let Some(day_index) =
      range.index_of(start_day)
    else {
      continue;
    };
    buckets[day_index]
      .push_clipped(interval, order);
    placed[order] = true;
  }

  for bucket in &mut buckets {
    bucket.sort_entries();
  }

  log_out_of_range(&placed);
  buckets
}

fn log_out_of_range(placed: &[bool]) {
  let excluded = placed
    .iter()
    .filter(|hit| !**hit)
    .count();
  if excluded > 0 {
    debug!(
      excluded,
      "intervals outside the visible \
       range"
    );
  }
}
