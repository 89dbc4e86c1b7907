use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Preset;
use crate::range::ViewMode;
use crate::render::OutputFormat;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "agenda",
    version,
    about = "Lay out scheduled activities on month, week and day calendar grids"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Layout config file (TOML).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Dimension preset; overrides the config file's `preset` key.
    #[arg(long = "preset", value_enum)]
    pub preset: Option<Preset>,

    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "view", value_enum, default_value_t = ViewMode::Week)]
    pub view: ViewMode,

    /// today, tomorrow, monday, march, +2w, -1m, 2026-03-15 ...
    #[arg(long = "anchor", default_value = "today", allow_hyphen_values = true)]
    pub anchor: String,

    /// Shift the anchor by this many periods of the current view.
    #[arg(long = "step", default_value_t = 0, allow_hyphen_values = true)]
    pub step: i64,

    /// Pin "today" instead of reading the system clock.
    #[arg(long = "today")]
    pub today: Option<String>,

    /// JSON array of activity records; stdin when omitted or `-`.
    #[arg(long = "input", short = 'i')]
    pub input: Option<PathBuf>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => {
            debug!(input = %path.display(), "reading activity records from file");
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))
        }
        _ => {
            debug!("reading activity records from stdin");
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}
