use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  parse_timezone,
  parse_weekday_name,
  resolve_timezone
};

const CONFIG_FILE_NAME: &str =
  "agenda.toml";
const CONFIG_ENV_VAR: &str =
  "AGENDA_CONFIG";

/// Named constant sets. `Calendar`
/// matches the month/week/day calendar
/// screen, `ActivityPlan` the weekly
/// planning grid.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
  #[default]
  Calendar,
  ActivityPlan
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
  pub preset:                Preset,
  pub timezone:              Tz,
  pub week_start:            Weekday,
  /// Height of one hour row before any
  /// stacking growth.
  pub base_hour_height_px:   f64,
  /// Vertical step between items stacked
  /// in the same hour.
  pub stack_offset_px:       f64,
  pub min_event_height_px:   f64,
  /// Extra height above the base an hour
  /// row may grow by.
  pub max_row_height_cap_px: f64,
  pub time_gutter_px:        f64,
  pub right_margin_px:       f64,
  pub column_width_px:       f64,
  /// First hour shown on open. Scroll
  /// only; never affects layout.
  pub day_start_hour:        u32,
  pub day_end_hour:          u32,
  pub loaded_files:          Vec<PathBuf>
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self::preset(Preset::Calendar)
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
  preset:                Option<Preset>,
  timezone:              Option<String>,
  week_start:            Option<String>,
  base_hour_height_px:   Option<f64>,
  stack_offset_px:       Option<f64>,
  min_event_height_px:   Option<f64>,
  max_row_height_cap_px: Option<f64>,
  time_gutter_px:        Option<f64>,
  right_margin_px:       Option<f64>,
  column_width_px:       Option<f64>,
  day_start_hour:        Option<u32>,
  day_end_hour:          Option<u32>
}

impl LayoutConfig {
  pub fn preset(preset: Preset) -> Self {
    match preset {
      | Preset::Calendar => {
        Self {
          preset,
          timezone: chrono_tz::Asia::Seoul,
          week_start: Weekday::Sun,
          base_hour_height_px: 40.0,
          stack_offset_px: 20.0,
          min_event_height_px: 20.0,
          max_row_height_cap_px: 144.0,
          time_gutter_px: 60.0,
          right_margin_px: 4.0,
          column_width_px: 180.0,
          day_start_hour: 7,
          day_end_hour: 23,
          loaded_files: vec![]
        }
      }
      | Preset::ActivityPlan => {
        Self {
          preset,
          timezone: chrono_tz::Asia::Seoul,
          week_start: Weekday::Mon,
          base_hour_height_px: 60.0,
          stack_offset_px: 18.0,
          min_event_height_px: 18.0,
          max_row_height_cap_px: 64.0,
          time_gutter_px: 60.0,
          right_margin_px: 4.0,
          column_width_px: 160.0,
          day_start_hour: 7,
          day_end_hour: 23,
          loaded_files: vec![]
        }
      }
    }
  }

  #[must_use]
  pub fn with_timezone(
    mut self,
    tz: Tz
  ) -> Self {
    self.timezone = tz;
    self
  }

  /// Preset defaults, then the config
  /// file (if any), then sanitising. An
  /// explicit `preset` wins over the
  /// file's `preset` key.
  #[tracing::instrument(skip(
    path_override
  ))]
  pub fn load(
    preset: Option<Preset>,
    path_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(path_override)
    else {
      warn!(
        "no config file found; using \
         preset defaults"
      );
      let mut cfg = Self::preset(
        preset.unwrap_or_default()
      );
      cfg.timezone =
        resolve_timezone(None);
      return Ok(cfg);
    };

    info!(config = %path.display(), "loading layout config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg =
      Self::from_toml_str(&text, preset)
        .with_context(|| {
          format!(
            "invalid config file {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str,
    preset: Option<Preset>
  ) -> anyhow::Result<Self> {
    let file: ConfigFile =
      toml::from_str(text)
        .context("failed to parse TOML")?;

    let mut cfg = Self::preset(
      preset
        .or(file.preset)
        .unwrap_or_default()
    );
    cfg.timezone = resolve_timezone(
      file.timezone.as_deref()
    );

    if let Some(raw) =
      file.week_start.as_deref()
    {
      cfg.week_start =
        parse_week_start(raw)?;
    }

    let overrides = [
      (
        &mut cfg.base_hour_height_px,
        file.base_hour_height_px
      ),
      (
        &mut cfg.stack_offset_px,
        file.stack_offset_px
      ),
      (
        &mut cfg.min_event_height_px,
        file.min_event_height_px
      ),
      (
        &mut cfg.max_row_height_cap_px,
        file.max_row_height_cap_px
      ),
      (
        &mut cfg.time_gutter_px,
        file.time_gutter_px
      ),
      (
        &mut cfg.right_margin_px,
        file.right_margin_px
      ),
      (
        &mut cfg.column_width_px,
        file.column_width_px
      )
    ];
    for (slot, value) in overrides {
      if let Some(value) = value {
        *slot = value;
      }
    }
    if let Some(hour) =
      file.day_start_hour
    {
      cfg.day_start_hour = hour;
    }
    if let Some(hour) = file.day_end_hour
    {
      cfg.day_end_hour = hour;
    }

    cfg.sanitize();
    Ok(cfg)
  }

  /// Applies `key=value` overrides from
  /// the command line.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      let value = value.trim();
      match key.trim() {
        | "timezone" => {
          self.timezone = parse_timezone(
            value, "override"
          )
          .ok_or_else(|| {
            anyhow!(
              "invalid timezone: \
               {value}"
            )
          })?;
        }
        | "week_start" => {
          self.week_start =
            parse_week_start(value)?;
        }
        | "base_hour_height_px" => {
          self.base_hour_height_px =
            parse_px(&key, value)?;
        }
        | "stack_offset_px" => {
          self.stack_offset_px =
            parse_px(&key, value)?;
        }
        | "min_event_height_px" => {
          self.min_event_height_px =
            parse_px(&key, value)?;
        }
        | "max_row_height_cap_px" => {
          self.max_row_height_cap_px =
            parse_px(&key, value)?;
        }
        | "time_gutter_px" => {
          self.time_gutter_px =
            parse_px(&key, value)?;
        }
        | "right_margin_px" => {
          self.right_margin_px =
            parse_px(&key, value)?;
        }
        | "column_width_px" => {
          self.column_width_px =
            parse_px(&key, value)?;
        }
        | "day_start_hour" => {
          self.day_start_hour =
            parse_hour(&key, value)?;
        }
        | "day_end_hour" => {
          self.day_end_hour =
            parse_hour(&key, value)?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: \
             {other}"
          ));
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  fn sanitize(&mut self) {
    let defaults =
      Self::preset(self.preset);

    let positive = [
      (
        &mut self.base_hour_height_px,
        defaults.base_hour_height_px,
        "base_hour_height_px"
      ),
      (
        &mut self.min_event_height_px,
        defaults.min_event_height_px,
        "min_event_height_px"
      ),
      (
        &mut self.column_width_px,
        defaults.column_width_px,
        "column_width_px"
      )
    ];
    for (slot, fallback, key) in positive
    {
      if !slot.is_finite() || *slot <= 0.0
      {
        warn!(
          key,
          value = *slot,
          fallback,
          "non-positive size; using \
           preset default"
        );
        *slot = fallback;
      }
    }

    let non_negative = [
      (
        &mut self.stack_offset_px,
        "stack_offset_px"
      ),
      (
        &mut self.max_row_height_cap_px,
        "max_row_height_cap_px"
      ),
      (
        &mut self.time_gutter_px,
        "time_gutter_px"
      ),
      (
        &mut self.right_margin_px,
        "right_margin_px"
      )
    ];
    for (slot, key) in non_negative {
      if !slot.is_finite() || *slot < 0.0
      {
        warn!(
          key,
          value = *slot,
          "negative size; clamping to 0"
        );
        *slot = 0.0;
      }
    }

    if self.day_start_hour > 23 {
      self.day_start_hour = 23;
    }
    if self.day_end_hour > 23 {
      self.day_end_hour = 23;
    }
    if self.day_end_hour
      < self.day_start_hour
    {
      self.day_end_hour =
        self.day_start_hour;
    }
  }
}

fn parse_week_start(
  raw: &str
) -> anyhow::Result<Weekday> {
  parse_weekday_name(
    &raw.trim().to_ascii_lowercase()
  )
  .ok_or_else(|| {
    anyhow!(
      "invalid week_start: {raw}"
    )
  })
}

fn parse_px(
  key: &str,
  value: &str
) -> anyhow::Result<f64> {
  value.parse::<f64>().with_context(
    || {
      format!(
        "{key} expects a number, got \
         {value}"
      )
    }
  )
}

fn parse_hour(
  key: &str,
  value: &str
) -> anyhow::Result<u32> {
  value.parse::<u32>().with_context(
    || {
      format!(
        "{key} expects an hour 0-23, \
         got {value}"
      )
    }
  )
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  let local = std::env::current_dir()
    .ok()
    .map(|dir| {
      dir.join(CONFIG_FILE_NAME)
    });
  if let Some(path) = local
    && path.exists()
  {
    return Some(path);
  }

  dirs::config_dir()
    .map(|dir| {
      dir
        .join("agenda")
        .join(CONFIG_FILE_NAME)
    })
    .filter(|path| path.exists())
}
