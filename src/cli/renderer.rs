use colored::{control, ColoredString, Colorize};
use serde::Serialize;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::formatter::{format_percent, format_usage_bar, menu_lines, panel_text, MenuLines};
use crate::core::state::{Freshness, PollerView};

const BAR_WIDTH: usize = 12;

/// Render the panel line and menu as a colored (or plain) block.
///
/// Layout:
/// ```text
///  🤖 2h15m (73.5%)
///   Account: user@example.com (Max)
///   Session remaining: 73.5%   [█████████░░░]
///   Depletes in ~2h15m (82% conf)
///   Resets at 5:00pm
///   Weekly remaining: 40%      [█████░░░░░░░]
///   Resets Oct 23, 9:00am
///   Last updated: 14:30:00
///   Status: OK (fetch #1) @ 14:30:00
///   Last error: None
/// ```
pub fn render_view(view: &PollerView, use_color: bool) -> String {
    control::set_override(use_color);

    let menu = menu_lines(view);
    let mut lines: Vec<String> = Vec::new();

    let panel = format!(" {}", panel_text(view));
    lines.push(match view.freshness {
        Freshness::Fresh => panel.bold().to_string(),
        Freshness::StaleWithCache => panel.bold().yellow().to_string(),
        Freshness::StaleNoData => panel.bold().dimmed().to_string(),
    });

    lines.push(format!("  {}", menu.account.cyan()));

    let session_remaining = view.snapshot.as_ref().and_then(|s| s.session_remaining_pct);
    lines.push(figure_line(&menu.session, session_remaining, view.freshness));
    lines.push(format!("  {}", menu.depletes));
    lines.push(format!("  {}", menu.session_resets.dimmed()));

    let weekly_remaining = view.snapshot.as_ref().and_then(|s| s.weekly_remaining_pct);
    lines.push(figure_line(&menu.weekly, weekly_remaining, view.freshness));
    lines.push(format!("  {}", menu.weekly_resets.dimmed()));

    if let Some(sonnet) = view.snapshot.as_ref().and_then(|s| s.sonnet_used_pct) {
        lines.push(format!("  Sonnet used: {}%", format_percent(sonnet)));
    }

    lines.push(format!("  {}", menu.last_updated.dimmed()));
    lines.push(format!("  {}", menu.status.dimmed()));
    let error_line: ColoredString = if view.last_error.is_some() {
        menu.error.red()
    } else {
        menu.error.dimmed()
    };
    lines.push(format!("  {}", error_line));

    lines.join("\n")
}

fn figure_line(text: &str, remaining: Option<f64>, freshness: Freshness) -> String {
    let Some(remaining) = remaining else {
        return format!("  {}", text.dimmed());
    };
    let padded = format!("{:<30}", text);
    let colored_text = match freshness {
        Freshness::Fresh => color_by_remaining(remaining, &padded),
        _ => padded.yellow(),
    };
    format!(
        "  {} {}",
        colored_text,
        format_usage_bar(remaining, BAR_WIDTH).magenta()
    )
}

/// Color the text green/yellow/red based on remaining percentage.
fn color_by_remaining(remaining: f64, text: &str) -> ColoredString {
    if remaining >= 25.0 {
        text.green()
    } else if remaining >= 10.0 {
        text.yellow()
    } else {
        text.red()
    }
}

/// Custom-module payload understood by waybar and similar bars.
#[derive(Debug, Serialize)]
pub struct WaybarPayload {
    pub text: String,
    pub tooltip: String,
    pub class: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

pub fn waybar_payload(view: &PollerView) -> WaybarPayload {
    let menu = menu_lines(view);
    WaybarPayload {
        text: panel_text(view),
        tooltip: menu.to_vec().join("\n"),
        class: view.freshness.as_str(),
        percentage: view
            .snapshot
            .as_ref()
            .and_then(|s| s.session_remaining_pct)
            .map(|p| p.clamp(0.0, 100.0).round() as u8),
    }
}

/// Everything a host needs in one JSON document.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    #[serde(flatten)]
    pub view: &'a PollerView,
    pub panel_text: String,
    pub menu: MenuLines,
}

pub fn json_report(view: &PollerView) -> JsonReport<'_> {
    JsonReport {
        view,
        panel_text: panel_text(view),
        menu: menu_lines(view),
    }
}

/// Write one view to stdout in the selected format.
pub fn print_view(view: &PollerView, opts: &OutputOptions) -> anyhow::Result<()> {
    match opts.format {
        OutputFormat::Text => println!("{}", render_view(view, opts.use_color)),
        OutputFormat::Json => {
            let report = json_report(view);
            let json = if opts.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", json);
        }
        OutputFormat::Waybar => {
            println!("{}", serde_json::to_string(&waybar_payload(view))?);
        }
    }
    Ok(())
}
