use regex::Regex;
use std::sync::OnceLock;

use crate::core::error::FetchError;
use crate::core::models::usage::{UsageKey, UsageSnapshot};

/// Token the fetcher writes when it could not determine a value.
pub const UNKNOWN_SENTINEL: &str = "??";

static LINE_RE: OnceLock<Regex> = OnceLock::new();

fn line_re() -> &'static Regex {
    LINE_RE.get_or_init(|| Regex::new(r"^([A-Z_]+)=(.+)$").expect("valid key=value regex"))
}

/// Result of parsing one fetcher run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub snapshot: UsageSnapshot,
    /// Number of distinct recognised keys seen, sentinel values included.
    pub recognized_keys: usize,
    /// Keys whose value was present but could not be parsed.
    pub field_errors: Vec<UsageKey>,
}

impl ParsedOutput {
    pub fn is_valid(&self) -> bool {
        self.snapshot.is_valid()
    }

    /// The snapshot if usable, otherwise a parse failure naming what was missing.
    pub fn into_result(self) -> Result<UsageSnapshot, FetchError> {
        if self.snapshot.is_valid() {
            Ok(self.snapshot)
        } else {
            Err(FetchError::Parse {
                unresolved: self.snapshot.unresolved_required(),
                recognized: self.recognized_keys,
            })
        }
    }
}

/// Parse the `KEY=VALUE` lines printed by the fetcher script.
///
/// Unknown keys, comments and free-form lines are skipped. A value of `??`
/// counts as absent, and so does a numeric field that fails to parse; only a
/// missing `SESSION_REMAINING` or `WEEKLY_REMAINING` makes the result invalid.
pub fn parse_output(output: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();
    let mut seen: Vec<UsageKey> = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some(caps) = line_re().captures(line) else {
            continue;
        };
        let Some(key) = UsageKey::from_key(&caps[1]) else {
            continue;
        };
        if !seen.contains(&key) {
            seen.push(key);
        }

        let raw = caps[2].trim();
        let value = if raw == UNKNOWN_SENTINEL {
            None
        } else {
            Some(raw)
        };

        if apply_field(&mut parsed.snapshot, key, value).is_err() {
            if !parsed.field_errors.contains(&key) {
                parsed.field_errors.push(key);
            }
        } else {
            parsed.field_errors.retain(|k| *k != key);
        }
    }

    parsed.recognized_keys = seen.len();
    parsed
}

struct FieldError;

fn parse_number(value: Option<&str>) -> Result<Option<f64>, FieldError> {
    match value {
        None => Ok(None),
        Some(v) => match v.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(FieldError),
        },
    }
}

fn apply_field(
    snapshot: &mut UsageSnapshot,
    key: UsageKey,
    value: Option<&str>,
) -> Result<(), FieldError> {
    if key.is_numeric() {
        // A bad number still overwrites an earlier good one: the field is absent.
        let number = parse_number(value);
        let slot = match key {
            UsageKey::SessionRemaining => &mut snapshot.session_remaining_pct,
            UsageKey::WeeklyRemaining => &mut snapshot.weekly_remaining_pct,
            UsageKey::SessionUsed => &mut snapshot.session_used_pct,
            UsageKey::WeeklyUsed => &mut snapshot.weekly_used_pct,
            UsageKey::SonnetUsed => &mut snapshot.sonnet_used_pct,
            UsageKey::ExtraUsed => &mut snapshot.extra_used_pct,
            _ => &mut snapshot.confidence,
        };
        return match number {
            Ok(n) => {
                *slot = n;
                Ok(())
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        };
    }

    let text = value.map(str::to_string);
    match key {
        UsageKey::AccountEmail => snapshot.account_email = text,
        UsageKey::PlanType => snapshot.plan_type = text,
        UsageKey::TimeRemainingStr => snapshot.time_remaining_text = text,
        UsageKey::SessionResets => snapshot.session_resets_at = text,
        UsageKey::WeeklyResets => snapshot.weekly_resets_at = text,
        UsageKey::ExhaustsBeforeReset => snapshot.exhausts_before_reset = value == Some("true"),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_with_time_remaining() {
        let parsed = parse_output("SESSION_REMAINING=73.5\nWEEKLY_REMAINING=40\nTIME_REMAINING_STR=2h15m\n");
        assert!(parsed.is_valid());
        assert_eq!(parsed.snapshot.session_remaining_pct, Some(73.5));
        assert_eq!(parsed.snapshot.weekly_remaining_pct, Some(40.0));
        assert_eq!(parsed.snapshot.time_remaining_text.as_deref(), Some("2h15m"));
        assert_eq!(parsed.recognized_keys, 3);
    }

    #[test]
    fn sentinel_required_field_is_invalid() {
        let parsed = parse_output("SESSION_REMAINING=??\nWEEKLY_REMAINING=50\n");
        assert!(!parsed.is_valid());
        assert_eq!(parsed.snapshot.session_remaining_pct, None);
        assert_eq!(parsed.snapshot.weekly_remaining_pct, Some(50.0));

        let err = parsed.into_result().unwrap_err();
        assert!(err.to_string().contains("SESSION_REMAINING"));
        assert!(err.to_string().contains("parsed 2 keys"));
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let parsed = parse_output("SESSION_REMAINING=10\nACCOUNT_EMAIL=a@b.c\n");
        assert!(!parsed.is_valid());
        assert_eq!(
            parsed.snapshot.unresolved_required(),
            vec![UsageKey::WeeklyRemaining]
        );
    }

    #[test]
    fn non_numeric_required_field_is_invalid() {
        let parsed = parse_output("SESSION_REMAINING=lots\nWEEKLY_REMAINING=50\n");
        assert!(!parsed.is_valid());
        assert_eq!(parsed.field_errors, vec![UsageKey::SessionRemaining]);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let parsed = parse_output("SESSION_REMAINING=NaN\nWEEKLY_REMAINING=inf\n");
        assert!(!parsed.is_valid());
        assert_eq!(parsed.field_errors.len(), 2);
    }

    #[test]
    fn bad_optional_field_does_not_invalidate_snapshot() {
        let parsed = parse_output(
            "SESSION_REMAINING=12\nWEEKLY_REMAINING=34\nCONFIDENCE=high\nSONNET_USED=??\n",
        );
        assert!(parsed.is_valid());
        assert_eq!(parsed.snapshot.confidence, None);
        assert_eq!(parsed.snapshot.sonnet_used_pct, None);
        assert_eq!(parsed.field_errors, vec![UsageKey::Confidence]);
    }

    #[test]
    fn sentinel_text_fields_are_absent() {
        let parsed = parse_output("ACCOUNT_EMAIL=??\nPLAN_TYPE=Max\n");
        assert_eq!(parsed.snapshot.account_email, None);
        assert_eq!(parsed.snapshot.plan_type.as_deref(), Some("Max"));
    }

    #[test]
    fn ignores_free_form_and_unknown_lines() {
        let output = "\
Claude usage summary
Session: 73% left
# SESSION_REMAINING=1
FIVE_HOUR=99
session_remaining=5
SESSION_REMAINING=73
WEEKLY_REMAINING=41.25
";
        let parsed = parse_output(output);
        assert!(parsed.is_valid());
        assert_eq!(parsed.snapshot.session_remaining_pct, Some(73.0));
        assert_eq!(parsed.snapshot.weekly_remaining_pct, Some(41.25));
        assert_eq!(parsed.recognized_keys, 2);
    }

    #[test]
    fn no_recognised_keys_yields_invalid_snapshot() {
        let parsed = parse_output("Error: tmux not installed\n");
        assert!(!parsed.is_valid());
        assert_eq!(parsed.recognized_keys, 0);
        assert_eq!(parsed.snapshot, UsageSnapshot::default());
    }

    #[test]
    fn empty_input_yields_invalid_snapshot() {
        let parsed = parse_output("");
        assert!(!parsed.is_valid());
        assert!(parsed.into_result().is_err());
    }

    #[test]
    fn exhausts_flag_is_case_sensitive() {
        let yes = parse_output("EXHAUSTS_BEFORE_RESET=true\n");
        assert!(yes.snapshot.exhausts_before_reset);
        let upper = parse_output("EXHAUSTS_BEFORE_RESET=True\n");
        assert!(!upper.snapshot.exhausts_before_reset);
        let other = parse_output("EXHAUSTS_BEFORE_RESET=yes\n");
        assert!(!other.snapshot.exhausts_before_reset);
    }

    #[test]
    fn value_keeps_embedded_equals_and_trims_whitespace() {
        let parsed = parse_output("  WEEKLY_RESETS=Mon 9am (tz=UTC)  \r\n");
        assert_eq!(
            parsed.snapshot.weekly_resets_at.as_deref(),
            Some("Mon 9am (tz=UTC)")
        );
    }

    #[test]
    fn later_duplicate_key_wins() {
        let parsed = parse_output("SESSION_REMAINING=10\nWEEKLY_REMAINING=20\nSESSION_REMAINING=30\n");
        assert_eq!(parsed.snapshot.session_remaining_pct, Some(30.0));
        assert_eq!(parsed.recognized_keys, 2);
    }

    #[test]
    fn later_bad_duplicate_clears_field() {
        let parsed = parse_output("SESSION_REMAINING=10\nWEEKLY_REMAINING=20\nSESSION_REMAINING=??\n");
        assert!(!parsed.is_valid());
    }

    #[test]
    fn parses_full_fetcher_output() {
        let output = "\
SESSION_REMAINING=62
WEEKLY_REMAINING=81
SESSION_USED=38
WEEKLY_USED=19
SONNET_USED=7
EXTRA_USED=12.5
ACCOUNT_EMAIL=user@example.com
PLAN_TYPE=Claude Max
TIME_REMAINING_STR=1h40m
CONFIDENCE=0.82
SESSION_RESETS=5:00pm (Europe/Berlin)
WEEKLY_RESETS=Oct 23, 9:00am
EXHAUSTS_BEFORE_RESET=true
";
        let snapshot = parse_output(output).into_result().unwrap();
        assert_eq!(snapshot.session_used_pct, Some(38.0));
        assert_eq!(snapshot.weekly_used_pct, Some(19.0));
        assert_eq!(snapshot.sonnet_used_pct, Some(7.0));
        assert_eq!(snapshot.extra_used_pct, Some(12.5));
        assert_eq!(snapshot.account_email.as_deref(), Some("user@example.com"));
        assert_eq!(snapshot.plan_type.as_deref(), Some("Claude Max"));
        assert_eq!(snapshot.confidence, Some(0.82));
        assert_eq!(
            snapshot.session_resets_at.as_deref(),
            Some("5:00pm (Europe/Berlin)")
        );
        assert_eq!(snapshot.weekly_resets_at.as_deref(), Some("Oct 23, 9:00am"));
        assert!(snapshot.exhausts_before_reset);
    }
}
