use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::error::{FailureKind, FetchError};
use crate::core::models::usage::UsageSnapshot;
use crate::core::parser::ParsedOutput;

/// How much the current figures can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Freshness {
    /// Last attempt succeeded with a valid snapshot.
    Fresh,
    /// Last attempt failed, an older good snapshot is still shown.
    StaleWithCache,
    /// Nothing good has been fetched yet.
    StaleNoData,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::StaleWithCache => "stale-with-cache",
            Self::StaleNoData => "stale-no-data",
        }
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest thing that happened, rendered as the status line.
#[derive(Debug, Clone, PartialEq)]
enum StatusEvent {
    Starting,
    Fetching { seq: u64, started: DateTime<Local> },
    Succeeded { seq: u64, at: DateTime<Local> },
    Failed { kind: FailureKind, at: DateTime<Local> },
}

impl StatusEvent {
    fn describe(&self) -> String {
        match self {
            Self::Starting => "Starting...".to_string(),
            Self::Fetching { seq, started } => {
                format!("Fetching #{} (started {})...", seq, clock(started))
            }
            Self::Succeeded { seq, at } => format!("OK (fetch #{}) @ {}", seq, clock(at)),
            Self::Failed { kind, at } => {
                let label = match kind {
                    FailureKind::Parse => "Invalid data",
                    FailureKind::Timeout => "Timeout",
                    FailureKind::Launch | FailureKind::Process => "Error",
                };
                format!("{} @ {}", label, clock(at))
            }
        }
    }
}

pub fn clock(at: &DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// What happened to a completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(Freshness),
    /// A newer attempt already landed; this result was dropped.
    Discarded,
}

/// Cache and staleness bookkeeping for the poller.
///
/// Owned by the poller's event loop, which is the only writer.
#[derive(Debug, Clone)]
pub struct PollerState {
    last_good: Option<UsageSnapshot>,
    last_success: Option<DateTime<Local>>,
    is_stale: bool,
    last_error: Option<String>,
    fetch_seq: u64,
    last_applied_seq: u64,
    in_flight: usize,
    status: StatusEvent,
}

impl Default for PollerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerState {
    pub fn new() -> Self {
        Self {
            last_good: None,
            last_success: None,
            is_stale: false,
            last_error: None,
            fetch_seq: 0,
            last_applied_seq: 0,
            in_flight: 0,
            status: StatusEvent::Starting,
        }
    }

    /// Register a new attempt and return its sequence number.
    pub fn begin_attempt(&mut self, now: DateTime<Local>) -> u64 {
        self.fetch_seq += 1;
        self.in_flight += 1;
        self.status = StatusEvent::Fetching {
            seq: self.fetch_seq,
            started: now,
        };
        self.fetch_seq
    }

    /// Fold the result of attempt `seq` into the state.
    ///
    /// Results older than the last applied one are discarded so a slow
    /// attempt never overwrites a newer answer. Parsed output missing a
    /// required field counts as a failed attempt.
    pub fn complete_attempt(
        &mut self,
        seq: u64,
        outcome: Result<ParsedOutput, FetchError>,
        now: DateTime<Local>,
    ) -> Completion {
        self.in_flight = self.in_flight.saturating_sub(1);
        if seq < self.last_applied_seq {
            return Completion::Discarded;
        }
        self.last_applied_seq = seq;

        match outcome.and_then(ParsedOutput::into_result) {
            Ok(snapshot) => {
                self.last_good = Some(snapshot);
                self.last_success = Some(now);
                self.is_stale = false;
                self.last_error = None;
                self.status = StatusEvent::Succeeded { seq, at: now };
            }
            Err(err) => self.mark_stale(&err, now),
        }
        Completion::Applied(self.freshness())
    }

    fn mark_stale(&mut self, err: &FetchError, now: DateTime<Local>) {
        self.is_stale = true;
        self.last_error = Some(err.to_string());
        self.status = StatusEvent::Failed {
            kind: err.kind(),
            at: now,
        };
    }

    pub fn freshness(&self) -> Freshness {
        match (&self.last_good, self.is_stale) {
            (None, _) => Freshness::StaleNoData,
            (Some(_), true) => Freshness::StaleWithCache,
            (Some(_), false) => Freshness::Fresh,
        }
    }

    pub fn last_good(&self) -> Option<&UsageSnapshot> {
        self.last_good.as_ref()
    }

    pub fn last_success(&self) -> Option<DateTime<Local>> {
        self.last_success
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn fetch_seq(&self) -> u64 {
        self.fetch_seq
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn status(&self) -> String {
        self.status.describe()
    }

    pub fn view(&self) -> PollerView {
        PollerView {
            freshness: self.freshness(),
            snapshot: self.last_good().cloned(),
            is_stale: self.is_stale(),
            is_loading: self.is_loading(),
            last_error: self.last_error().map(str::to_string),
            last_success: self.last_success(),
            fetch_seq: self.fetch_seq(),
            status: self.status(),
        }
    }
}

/// Read-only copy of the state handed to presenters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollerView {
    pub freshness: Freshness,
    pub snapshot: Option<UsageSnapshot>,
    pub is_stale: bool,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Local>>,
    pub fetch_seq: u64,
    pub status: String,
}

impl Default for PollerView {
    fn default() -> Self {
        PollerState::new().view()
    }
}
