pub mod activity;
pub mod cli;
pub mod config;
pub mod datetime;
pub mod layout;
pub mod range;
pub mod render;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    view = cli.view.as_key(),
    "starting agenda layout"
  );

  let mut cfg =
    config::LayoutConfig::load(
      cli.preset,
      cli.config.as_deref()
    )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  let tz = cfg.timezone;

  let system_today =
    datetime::to_local_date(
      tz,
      Utc::now()
    );
  let today = match cli.today.as_deref()
  {
    | Some(raw) => {
      datetime::parse_anchor_expr(
        raw,
        system_today,
        tz
      )
      .context("invalid --today")?
    }
    | None => system_today
  };
  let anchor = range::shift_anchor(
    datetime::parse_anchor_expr(
      &cli.anchor,
      today,
      tz
    )
    .context("invalid --anchor")?,
    cli.view,
    cli.step
  )
  .context("invalid --step")?;
  debug!(%today, %anchor, "resolved calendar anchor");

  let text = cli::read_input(
    cli.input.as_deref()
  )?;
  let records =
    activity::parse_records(&text)?;
  let normalized =
    activity::normalize(&records, tz);

  let mut renderer =
    render::Renderer::new(cli.format);
  renderer.print_diagnostics(
    &normalized.diagnostics
  )?;

  let visible = range::VisibleRange::build(
    cli.view,
    anchor,
    cfg.week_start,
    today
  );
  let computed = layout::layout(
    &normalized.intervals,
    &visible,
    cli.view,
    &cfg
  );

  renderer
    .print_layout(&computed, &cfg)?;

  info!(
    intervals = normalized
      .intervals
      .len(),
    dropped = normalized.dropped(),
    "done"
  );
  Ok(())
}
