use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::activity::{DegenerateReason, Diagnostic, Issue, MalformedReason};
use crate::config::LayoutConfig;
use crate::datetime::format_clock;
use crate::layout::{Layout, MonthLayout, TimelineLayout};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    format: OutputFormat,
    color: bool,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        let color = std::env::var_os("NO_COLOR").is_none();
        Self { format, color }
    }

    #[tracing::instrument(skip_all)]
    pub fn print_layout(&mut self, layout: &Layout, cfg: &LayoutConfig) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        match (self.format, layout) {
            (OutputFormat::Json, _) => {
                serde_json::to_writer_pretty(&mut out, layout)?;
                writeln!(out)?;
            }
            (OutputFormat::Table, Layout::Month(month)) => self.write_month(&mut out, month, cfg)?,
            (OutputFormat::Table, Layout::Timeline(timeline)) => {
                self.write_timeline(&mut out, timeline, cfg)?
            }
        }
        Ok(())
    }

    pub fn print_diagnostics(&mut self, diagnostics: &[Diagnostic]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        for diag in diagnostics {
            let id = diag
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                err,
                "warning: record #{} (id {}): {}",
                diag.index,
                id,
                describe_issue(diag.issue)
            )?;
        }
        Ok(())
    }

    fn write_month<W: Write>(&self, mut out: W, month: &MonthLayout, cfg: &LayoutConfig) -> anyhow::Result<()> {
        writeln!(out, "{}", month.range.label(cfg.week_start))?;

        let headers = vec!["Date".to_string(), "Count".to_string(), "Activities".to_string()];
        let mut rows = Vec::with_capacity(month.cells.len());

        for cell in &month.cells {
            let mut date = cell.date.format("%m-%d %a").to_string();
            if cell.is_today {
                date = self.paint(&date, "1;33");
            } else if !cell.in_current_period {
                date = self.paint(&date, "2");
            }
            let activities = cell
                .entries
                .iter()
                .map(|entry| {
                    format!(
                        "{} {}{}",
                        entry.start_time,
                        display_label(&entry.label),
                        done_marker(entry.completed)
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            rows.push(vec![date, cell.count.to_string(), activities]);
        }

        write_table(&mut out, headers, rows)
    }

    fn write_timeline<W: Write>(
        &self,
        mut out: W,
        timeline: &TimelineLayout,
        cfg: &LayoutConfig,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{}  (grid {:.0}px, day {:.0}-{:.0}px)",
            timeline.range.label(cfg.week_start),
            timeline.rows.total_height(),
            timeline.day_window_px.0,
            timeline.day_window_px.1
        )?;

        let headers = vec![
            "Day".to_string(),
            "Time".to_string(),
            "Stack".to_string(),
            "Top".to_string(),
            "Height".to_string(),
            "Id".to_string(),
            "Label".to_string(),
        ];
        let mut rows = Vec::with_capacity(timeline.placements.len());

        for p in &timeline.placements {
            let date = timeline
                .range
                .days
                .get(p.day_index)
                .map(|day| day.date.format("%m-%d %a").to_string())
                .unwrap_or_default();
            let time = format!(
                "{}-{}",
                format_clock(cfg.timezone, p.clipped_start),
                format_clock(cfg.timezone, p.clipped_end)
            );
            let label = format!("{}{}", display_label(&p.label), done_marker(p.completed));
            let label = if p.source.is_interactive() {
                label
            } else {
                self.paint(&label, "32")
            };
            rows.push(vec![
                date,
                time,
                p.stack_index.to_string(),
                format!("{:.1}", p.top_px),
                format!("{:.1}", p.height_px),
                self.paint(&p.id.to_string(), "33"),
                label,
            ]);
        }

        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn display_label(label: &str) -> &str {
    if label.trim().is_empty() { "(untitled)" } else { label }
}

fn done_marker(completed: bool) -> &'static str {
    if completed { " (done)" } else { "" }
}

fn describe_issue(issue: Issue) -> &'static str {
    match issue {
        Issue::Malformed(MalformedReason::MissingStart) => "dropped, no start time",
        Issue::Malformed(MalformedReason::UnparsableStart) => "dropped, unreadable start time",
        Issue::Degenerate(DegenerateReason::MissingId) => "no id, listed by its position",
        Issue::Degenerate(DegenerateReason::UnparsableEnd) => "unreadable end time, shown as an instant",
        Issue::Degenerate(DegenerateReason::EndBeforeStart) => "ends before it starts, shown as an instant",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
