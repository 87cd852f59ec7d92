use thiserror::Error;

use crate::core::models::usage::UsageKey;

/// Maximum characters of stderr kept in a process failure message.
pub const STDERR_PREVIEW_CHARS: usize = 100;

/// Why a fetch attempt produced no usable snapshot.
///
/// Every variant collapses into the same stale transition; the `Display`
/// text is what ends up in the "Last error" line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },
    #[error("Script exit {}: {stderr}", exit_label(.code))]
    Process { code: Option<i32>, stderr: String },
    #[error("Timeout after {0}s")]
    Timeout(u64),
    #[error("Got ?? values for {} (parsed {recognized} keys)", join_keys(.unresolved))]
    Parse {
        unresolved: Vec<UsageKey>,
        recognized: usize,
    },
}

/// Errors from driving the poller itself, as opposed to a fetch attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollerError {
    #[error("Polling interval must be greater than zero")]
    ZeroInterval,
    #[error("Poller has shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Launch,
    Process,
    Timeout,
    Parse,
}

impl FetchError {
    /// Build a process failure, keeping only a short single-line stderr preview.
    pub fn process(code: Option<i32>, stderr: &str) -> Self {
        Self::Process {
            code,
            stderr: stderr_preview(stderr),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Launch { .. } => FailureKind::Launch,
            Self::Process { .. } => FailureKind::Process,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Parse { .. } => FailureKind::Parse,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

fn join_keys(keys: &[UsageKey]) -> String {
    keys.iter()
        .map(UsageKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// First `STDERR_PREVIEW_CHARS` characters of stderr with newlines flattened.
pub fn stderr_preview(stderr: &str) -> String {
    if stderr.is_empty() {
        return "no stderr".to_string();
    }
    stderr
        .chars()
        .take(STDERR_PREVIEW_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_error_keeps_stderr_verbatim_when_short() {
        let err = FetchError::process(Some(2), "claude: command not found");
        assert_eq!(err.to_string(), "Script exit 2: claude: command not found");
        assert_eq!(err.kind(), FailureKind::Process);
    }

    #[test]
    fn process_error_truncates_long_stderr() {
        let long = "x".repeat(500);
        let FetchError::Process { stderr, .. } = FetchError::process(Some(1), &long) else {
            panic!("expected process error");
        };
        assert_eq!(stderr.chars().count(), STDERR_PREVIEW_CHARS);
    }

    #[test]
    fn stderr_preview_flattens_newlines() {
        assert_eq!(stderr_preview("line one\nline two\n"), "line one line two ");
    }

    #[test]
    fn stderr_preview_handles_multibyte_boundary() {
        let s = "é".repeat(150);
        assert_eq!(stderr_preview(&s).chars().count(), STDERR_PREVIEW_CHARS);
    }

    #[test]
    fn empty_stderr_is_labelled() {
        let err = FetchError::process(Some(1), "");
        assert_eq!(err.to_string(), "Script exit 1: no stderr");
    }

    #[test]
    fn killed_process_reports_signal() {
        let err = FetchError::process(None, "");
        assert!(err.to_string().starts_with("Script exit signal"));
    }

    #[test]
    fn parse_error_names_unresolved_keys() {
        let err = FetchError::Parse {
            unresolved: vec![UsageKey::SessionRemaining],
            recognized: 2,
        };
        assert_eq!(
            err.to_string(),
            "Got ?? values for SESSION_REMAINING (parsed 2 keys)"
        );
    }

    #[test]
    fn timeout_message() {
        assert_eq!(FetchError::Timeout(90).to_string(), "Timeout after 90s");
    }
}
