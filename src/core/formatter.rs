use serde::Serialize;

use crate::core::models::usage::UsageSnapshot;
use crate::core::state::{clock, Freshness, PollerView};

pub const GLYPH_FRESH: &str = "🤖";
pub const GLYPH_STALE: &str = "😴";
pub const GLYPH_LOADING: &str = "⟳";
pub const GLYPH_WARNING: &str = "⚠️";

/// Percentage without a trailing ".0": 40.0 -> "40", 73.5 -> "73.5".
pub fn format_percent(value: f64) -> String {
    format!("{}", value)
}

/// Confidence fraction as a rounded percentage: 0.82 -> "82%".
pub fn format_confidence(confidence: f64) -> String {
    format!("{}%", (confidence * 100.0).round() as i64)
}

/// Returns "[████████░░░░]" where █ = remaining portion, ░ = used portion.
pub fn format_usage_bar(remaining_percent: f64, width: usize) -> String {
    let remaining = remaining_percent.clamp(0.0, 100.0);
    let filled_blocks = ((remaining / 100.0) * width as f64).round() as usize;
    let empty_blocks = width.saturating_sub(filled_blocks);

    format!("[{}{}]", "█".repeat(filled_blocks), "░".repeat(empty_blocks))
}

fn pct(value: Option<f64>) -> String {
    value.map(format_percent).unwrap_or_else(|| "??".to_string())
}

/// One-line text for the panel or tray title.
pub fn panel_text(view: &PollerView) -> String {
    let Some(snapshot) = &view.snapshot else {
        return if view.is_loading {
            format!("{} {}", GLYPH_FRESH, GLYPH_LOADING)
        } else {
            format!("{} --", GLYPH_STALE)
        };
    };

    let glyph = if view.is_stale { GLYPH_STALE } else { GLYPH_FRESH };
    let warning = if snapshot.exhausts_before_reset {
        format!("{} ", GLYPH_WARNING)
    } else {
        String::new()
    };

    match &snapshot.time_remaining_text {
        Some(time) => format!(
            "{}{} {} ({}%)",
            warning,
            glyph,
            time,
            pct(snapshot.session_remaining_pct)
        ),
        None => format!(
            "{} W:{}% S:{}%",
            glyph,
            pct(snapshot.weekly_remaining_pct),
            pct(snapshot.session_remaining_pct)
        ),
    }
}

/// Detail lines shown in the drop-down menu or tooltip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuLines {
    pub account: String,
    pub session: String,
    pub depletes: String,
    pub session_resets: String,
    pub weekly: String,
    pub weekly_resets: String,
    pub last_updated: String,
    pub status: String,
    pub error: String,
}

impl MenuLines {
    /// Lines in menu order.
    pub fn to_vec(&self) -> Vec<&str> {
        vec![
            self.account.as_str(),
            self.session.as_str(),
            self.depletes.as_str(),
            self.session_resets.as_str(),
            self.weekly.as_str(),
            self.weekly_resets.as_str(),
            self.last_updated.as_str(),
            self.status.as_str(),
            self.error.as_str(),
        ]
    }
}

pub fn menu_lines(view: &PollerView) -> MenuLines {
    let last_updated = match &view.last_success {
        Some(at) => format!(
            "Last updated: {}{}",
            clock(at),
            if view.is_stale { " (stale)" } else { "" }
        ),
        None => "Last updated: Never".to_string(),
    };
    let status = format!("Status: {}", view.status);
    let error = format!(
        "Last error: {}",
        view.last_error.as_deref().unwrap_or("None")
    );

    match &view.snapshot {
        Some(snapshot) => {
            let data = data_lines(snapshot, view.freshness == Freshness::StaleWithCache);
            MenuLines {
                last_updated,
                status,
                error,
                ..data
            }
        }
        None => {
            let placeholder = if view.is_loading {
                "Loading..."
            } else {
                "Waiting for data..."
            };
            MenuLines {
                account: "Account: --".to_string(),
                session: format!("Session: {}", placeholder),
                depletes: "Depletes: --".to_string(),
                session_resets: "Resets: --".to_string(),
                weekly: format!("Weekly: {}", placeholder),
                weekly_resets: "Resets: --".to_string(),
                last_updated,
                status,
                error,
            }
        }
    }
}

fn data_lines(snapshot: &UsageSnapshot, stale: bool) -> MenuLines {
    let stale_suffix = if stale { " (stale)" } else { "" };

    let account = match (&snapshot.account_email, &snapshot.plan_type) {
        (Some(email), Some(plan)) => format!("Account: {} ({})", email, plan),
        (Some(email), None) => format!("Account: {}", email),
        _ => "Account: --".to_string(),
    };

    let depletes = match &snapshot.time_remaining_text {
        Some(time) => {
            let mut text = format!("Depletes in ~{}", time);
            if let Some(confidence) = snapshot.confidence {
                text.push_str(&format!(" ({} conf)", format_confidence(confidence)));
            }
            if snapshot.exhausts_before_reset {
                text.push_str(&format!(" {} before reset!", GLYPH_WARNING));
            }
            text
        }
        None => "Depletes: --".to_string(),
    };

    let mut weekly = format!(
        "Weekly remaining: {}%",
        pct(snapshot.weekly_remaining_pct)
    );
    if let Some(extra) = snapshot.extra_used_pct {
        weekly.push_str(&format!(" (Extra: {}% used)", format_percent(extra)));
    }
    weekly.push_str(stale_suffix);

    MenuLines {
        account,
        session: format!(
            "Session remaining: {}%{}",
            pct(snapshot.session_remaining_pct),
            stale_suffix
        ),
        depletes,
        session_resets: snapshot
            .session_resets_at
            .as_ref()
            .map(|r| format!("Resets at {}", r))
            .unwrap_or_else(|| "Resets: --".to_string()),
        weekly,
        weekly_resets: snapshot
            .weekly_resets_at
            .as_ref()
            .map(|r| format!("Resets {}", r))
            .unwrap_or_else(|| "Resets: --".to_string()),
        last_updated: String::new(),
        status: String::new(),
        error: String::new(),
    }
}
