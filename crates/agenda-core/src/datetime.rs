use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeDelta,
  TimeZone,
  Timelike,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "AGENDA_TIMEZONE";
pub const DEFAULT_TIMEZONE: &str =
  "Asia/Seoul";

/// Picks the display timezone: the
/// configured id first, then
/// `AGENDA_TIMEZONE`, then the built-in
/// default.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Converts a wall-clock time to UTC
/// without failing. Ambiguous times take
/// the earliest mapping; times inside a
/// DST gap move forward to the first
/// instant that exists.
pub fn local_to_utc(
  tz: Tz,
  local_naive: NaiveDateTime
) -> DateTime<Utc> {
  let mut candidate = local_naive;
  for _ in 0..8 {
    match tz
      .from_local_datetime(&candidate)
    {
      | LocalResult::Single(local_dt) => {
        return local_dt
          .with_timezone(&Utc);
      }
      | LocalResult::Ambiguous(
        first,
        second
      ) => {
        let chosen = if first <= second
        {
          first
        } else {
          second
        };
        return chosen
          .with_timezone(&Utc);
      }
      | LocalResult::None => {
        candidate +=
          Duration::minutes(30);
      }
    }
  }

  tracing::warn!(
    local = %local_naive,
    timezone = %tz,
    "local time never resolved; \
     treating it as UTC"
  );
  DateTime::<Utc>::from_naive_utc_and_offset(
    local_naive,
    Utc
  )
}

/// `[00:00:00.000, 23:59:59.999]` of a
/// local calendar day, as UTC instants.
pub fn day_bounds(
  tz: Tz,
  date: NaiveDate
) -> (DateTime<Utc>, DateTime<Utc>) {
  let start = local_to_utc(
    tz,
    date.and_time(
      chrono::NaiveTime::MIN
    )
  );
  let next = date
    .succ_opt()
    .map(|next| {
      local_to_utc(
        tz,
        next.and_time(
          chrono::NaiveTime::MIN
        )
      )
    })
    .unwrap_or(start);
  (
    start,
    next - Duration::milliseconds(1)
  )
}

#[must_use]
pub fn to_local_date(
  tz: Tz,
  instant: DateTime<Utc>
) -> NaiveDate {
  instant.with_timezone(&tz).date_naive()
}

/// Wall-clock minutes since local
/// midnight, with sub-minute precision.
#[must_use]
pub fn minutes_since_midnight(
  tz: Tz,
  instant: DateTime<Utc>
) -> f64 {
  let time =
    instant.with_timezone(&tz).time();
  f64::from(
    time.num_seconds_from_midnight()
  ) / 60.0
    + f64::from(time.nanosecond())
      / 60_000_000_000.0
}

#[must_use]
pub fn local_hour(
  tz: Tz,
  instant: DateTime<Utc>
) -> usize {
  instant.with_timezone(&tz).hour()
    as usize
}

#[must_use]
pub fn format_clock(
  tz: Tz,
  instant: DateTime<Utc>
) -> String {
  instant
    .with_timezone(&tz)
    .format("%H:%M")
    .to_string()
}

/// Parses an ISO-8601 timestamp as sent
/// by the activity API. Naive forms are
/// read as wall-clock time in `tz`.
pub fn parse_instant(
  raw: &str,
  tz: Tz
) -> Option<DateTime<Utc>> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(dt.with_timezone(&Utc));
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    return Some(
      DateTime::<Utc>::from_naive_utc_and_offset(
        ndt, Utc
      )
    );
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(local_to_utc(tz, ndt));
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Some(local_to_utc(
      tz,
      date.and_time(
        chrono::NaiveTime::MIN
      )
    ));
  }

  None
}

/// Resolves a calendar anchor expression
/// relative to `today`.
#[tracing::instrument(skip(today, tz), fields(input = input))]
pub fn parse_anchor_expr(
  input: &str,
  today: NaiveDate,
  tz: Tz
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" | "now" => {
      return Ok(today);
    }
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if token.len() == 4
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    let year: i32 =
      token.parse().context(
        "invalid 4-digit year"
      )?;
    return NaiveDate::from_ymd_opt(
      year, 1, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid year value: {year}"
      )
    });
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let this_year =
      NaiveDate::from_ymd_opt(
        today.year(),
        target_month,
        1
      )
      .ok_or_else(|| {
        anyhow!(
          "invalid month value: \
           {target_month}"
        )
      })?;
    if this_year > today {
      return Ok(this_year);
    }
    return NaiveDate::from_ymd_opt(
      today.year().saturating_add(1),
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year candidate"
      )
    });
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let negative = caps
      .name("sign")
      .map(|m| m.as_str() == "-")
      .unwrap_or(false);
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let num =
      if negative { -num } else { num };
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let shifted = match unit {
      | "d" => checked_add_days(today, num),
      | "w" => {
        num.checked_mul(7).and_then(
          |days| {
            checked_add_days(today, days)
          }
        )
      }
      | "m" => shift_months(today, num),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative offset out of range: \
         {token}"
      )
    });
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Some(instant) =
    parse_instant(token, tz)
  {
    return Ok(to_local_date(
      tz, instant
    ));
  }

  Err(anyhow!(
    "unrecognized anchor expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, 4-digit \
     year, weekday names (e.g. monday), \
     month names (e.g. march), \
     +Nd/-Nd/+Nw/+Nm, YYYY-MM-DD, \
     RFC3339"
  })
}

/// Day arithmetic for offsets known to
/// be small; falls back to `date` when
/// the result is unrepresentable.
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  checked_add_days(date, days)
    .unwrap_or(date)
}

pub fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  TimeDelta::try_days(days).and_then(
    |delta| date.checked_add_signed(delta)
  )
}

/// Moves by whole months, clamping the
/// day to the target month's length.
/// `None` when the result leaves the
/// representable calendar.
pub fn shift_months(
  date: NaiveDate,
  months: i64
) -> Option<NaiveDate> {
  let index = i64::from(date.year())
    .checked_mul(12)?
    .checked_add(i64::from(
      date.month0()
    ))?
    .checked_add(months)?;
  let year =
    i32::try_from(index.div_euclid(12))
      .ok()?;
  let month =
    u32::try_from(index.rem_euclid(12))
      .ok()?
      + 1;

  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
  .day()
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}
