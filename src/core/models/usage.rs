use serde::{Deserialize, Serialize};

/// Keys the fetcher script may emit as `KEY=VALUE` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageKey {
    SessionRemaining,
    WeeklyRemaining,
    SessionUsed,
    WeeklyUsed,
    SonnetUsed,
    ExtraUsed,
    AccountEmail,
    PlanType,
    TimeRemainingStr,
    Confidence,
    SessionResets,
    WeeklyResets,
    ExhaustsBeforeReset,
}

impl UsageKey {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "SESSION_REMAINING" => Some(Self::SessionRemaining),
            "WEEKLY_REMAINING" => Some(Self::WeeklyRemaining),
            "SESSION_USED" => Some(Self::SessionUsed),
            "WEEKLY_USED" => Some(Self::WeeklyUsed),
            "SONNET_USED" => Some(Self::SonnetUsed),
            "EXTRA_USED" => Some(Self::ExtraUsed),
            "ACCOUNT_EMAIL" => Some(Self::AccountEmail),
            "PLAN_TYPE" => Some(Self::PlanType),
            "TIME_REMAINING_STR" => Some(Self::TimeRemainingStr),
            "CONFIDENCE" => Some(Self::Confidence),
            "SESSION_RESETS" => Some(Self::SessionResets),
            "WEEKLY_RESETS" => Some(Self::WeeklyResets),
            "EXHAUSTS_BEFORE_RESET" => Some(Self::ExhaustsBeforeReset),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionRemaining => "SESSION_REMAINING",
            Self::WeeklyRemaining => "WEEKLY_REMAINING",
            Self::SessionUsed => "SESSION_USED",
            Self::WeeklyUsed => "WEEKLY_USED",
            Self::SonnetUsed => "SONNET_USED",
            Self::ExtraUsed => "EXTRA_USED",
            Self::AccountEmail => "ACCOUNT_EMAIL",
            Self::PlanType => "PLAN_TYPE",
            Self::TimeRemainingStr => "TIME_REMAINING_STR",
            Self::Confidence => "CONFIDENCE",
            Self::SessionResets => "SESSION_RESETS",
            Self::WeeklyResets => "WEEKLY_RESETS",
            Self::ExhaustsBeforeReset => "EXHAUSTS_BEFORE_RESET",
        }
    }

    /// Whether the value is parsed as a float rather than kept as text.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::SessionRemaining
                | Self::WeeklyRemaining
                | Self::SessionUsed
                | Self::WeeklyUsed
                | Self::SonnetUsed
                | Self::ExtraUsed
                | Self::Confidence
        )
    }
}

impl std::fmt::Display for UsageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Percentage of the current session window still available (0.0 - 100.0)
    pub session_remaining_pct: Option<f64>,
    /// Percentage of the weekly window still available (0.0 - 100.0)
    pub weekly_remaining_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_used_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_used_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonnet_used_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_used_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    /// Free-form time-to-depletion, e.g. "2h15m"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_text: Option<String>,
    /// Confidence of the depletion estimate (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_resets_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_resets_at: Option<String>,
    #[serde(default)]
    pub exhausts_before_reset: bool,
}

impl UsageSnapshot {
    pub fn is_valid(&self) -> bool {
        self.session_remaining_pct.is_some() && self.weekly_remaining_pct.is_some()
    }

    /// Required keys that did not resolve to a value.
    pub fn unresolved_required(&self) -> Vec<UsageKey> {
        let mut missing = Vec::new();
        if self.session_remaining_pct.is_none() {
            missing.push(UsageKey::SessionRemaining);
        }
        if self.weekly_remaining_pct.is_none() {
            missing.push(UsageKey::WeeklyRemaining);
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_round_trip() {
        for key in [
            UsageKey::SessionRemaining,
            UsageKey::TimeRemainingStr,
            UsageKey::ExhaustsBeforeReset,
        ] {
            assert_eq!(UsageKey::from_key(key.as_str()), Some(key));
        }
    }

    #[test]
    fn key_lookup_is_case_sensitive() {
        assert!(UsageKey::from_key("session_remaining").is_none());
        assert!(UsageKey::from_key("FIVE_HOUR").is_none());
    }

    #[test]
    fn empty_snapshot_is_invalid() {
        let snapshot = UsageSnapshot::default();
        assert!(!snapshot.is_valid());
        assert_eq!(
            snapshot.unresolved_required(),
            vec![UsageKey::SessionRemaining, UsageKey::WeeklyRemaining]
        );
    }

    #[test]
    fn snapshot_with_both_required_fields_is_valid() {
        let snapshot = UsageSnapshot {
            session_remaining_pct: Some(0.0),
            weekly_remaining_pct: Some(100.0),
            ..Default::default()
        };
        assert!(snapshot.is_valid());
        assert!(snapshot.unresolved_required().is_empty());
    }

    #[test]
    fn serializes_without_absent_optionals() {
        let snapshot = UsageSnapshot {
            session_remaining_pct: Some(73.5),
            weekly_remaining_pct: Some(40.0),
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"session_remaining_pct\":73.5"));
        assert!(!json.contains("account_email"));
        assert!(json.contains("\"exhausts_before_reset\":false"));
    }
}
