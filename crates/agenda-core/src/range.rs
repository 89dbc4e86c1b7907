use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  checked_add_days,
  day_bounds,
  first_day_of_month,
  local_to_utc,
  shift_months,
  start_of_week
};

pub const MONTH_GRID_DAYS: usize = 42;
pub const WEEK_DAYS: usize = 7;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Month,
  Week,
  Day
}

impl ViewMode {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day"
    }
  }

  pub fn is_timeline(self) -> bool {
    !matches!(self, Self::Month)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct CalendarDay {
  pub date:              NaiveDate,
  pub in_current_period: bool,
  pub is_today:          bool
}

/// The contiguous, ascending run of days
/// a view renders.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct VisibleRange {
  pub view:   ViewMode,
  pub anchor: NaiveDate,
  pub days:   Vec<CalendarDay>
}

impl VisibleRange {
  /// Month: 42 days from the week start
  /// on or before the 1st. Week: the 7
  /// days of the anchor's week. Day: the
  /// anchor itself.
  pub fn build(
    view: ViewMode,
    anchor: NaiveDate,
    week_start: Weekday,
    today: NaiveDate
  ) -> Self {
    let (start, count) = match view {
      | ViewMode::Month => {
        let first = first_day_of_month(
          anchor.year(),
          anchor.month()
        );
        (
          start_of_week(
            first, week_start
          ),
          MONTH_GRID_DAYS
        )
      }
      | ViewMode::Week => {
        (
          start_of_week(
            anchor, week_start
          ),
          WEEK_DAYS
        )
      }
      | ViewMode::Day => (anchor, 1)
    };

    let days = (0..count as i64)
      .map(|offset| {
        let date =
          add_days(start, offset);
        let in_current_period =
          match view {
            | ViewMode::Month => {
              date.month()
                == anchor.month()
                && date.year()
                  == anchor.year()
            }
            | _ => true
          };
        CalendarDay {
          date,
          in_current_period,
          is_today: date == today
        }
      })
      .collect();

    Self {
      view,
      anchor,
      days
    }
  }

  pub fn len(&self) -> usize {
    self.days.len()
  }

  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }

  pub fn index_of(
    &self,
    date: NaiveDate
  ) -> Option<usize> {
    let first = self.days.first()?.date;
    let offset =
      (date - first).num_days();
    usize::try_from(offset)
      .ok()
      .filter(|idx| *idx < self.len())
  }

  /// UTC window a fetch collaborator
  /// should query for this range.
  pub fn window(
    &self,
    tz: Tz
  ) -> Option<(
    DateTime<Utc>,
    DateTime<Utc>
  )> {
    let first = self.days.first()?;
    let last = self.days.last()?;
    Some((
      day_bounds(tz, first.date).0,
      day_bounds(tz, last.date).1
    ))
  }

  /// Instant at the top of `hour` on the
  /// given visible day; used to prefill
  /// a new activity from a clicked slot.
  pub fn slot_instant(
    &self,
    day_index: usize,
    hour: u32,
    tz: Tz
  ) -> Option<DateTime<Utc>> {
    let day = self.days.get(day_index)?;
    let naive =
      day.date.and_hms_opt(hour, 0, 0)?;
    Some(local_to_utc(tz, naive))
  }

  pub fn label(
    &self,
    week_start: Weekday
  ) -> String {
    period_label(
      self.view,
      self.anchor,
      week_start
    )
  }
}

/// Moves the anchor by `step` whole
/// periods of `view`.
pub fn shift_anchor(
  current: NaiveDate,
  view: ViewMode,
  step: i64
) -> anyhow::Result<NaiveDate> {
  let shifted = match view {
    | ViewMode::Month => {
      shift_months(current, step)
    }
    | ViewMode::Week => {
      step.checked_mul(7).and_then(
        |days| {
          checked_add_days(current, days)
        }
      )
    }
    | ViewMode::Day => {
      checked_add_days(current, step)
    }
  };
  shifted.ok_or_else(|| {
    anyhow!(
      "{} offset out of range: {step}",
      view.as_key()
    )
  })
}

pub fn period_label(
  view: ViewMode,
  anchor: NaiveDate,
  week_start: Weekday
) -> String {
  match view {
    | ViewMode::Month => {
      anchor.format("%Y.%m").to_string()
    }
    | ViewMode::Week => {
      let start = start_of_week(
        anchor, week_start
      );
      let end = add_days(start, 6);
      format!(
        "{} ~ {}",
        start.format("%Y.%m.%d"),
        end.format("%Y.%m.%d")
      )
    }
    | ViewMode::Day => {
      anchor
        .format("%Y.%m.%d")
        .to_string()
    }
  }
}

/// ISO-8601 `(year, week)`; week 1 holds
/// the year's first Thursday.
pub fn iso_week(
  date: NaiveDate
) -> (i32, u32) {
  let week = date.iso_week();
  (week.year(), week.week())
}
