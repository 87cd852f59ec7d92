use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::core::error::{FetchError, PollerError};
use crate::core::fetcher::UsageSource;
use crate::core::parser::{parse_output, ParsedOutput};
use crate::core::state::{Completion, PollerState, PollerView};

enum Event {
    StartPolling(Duration),
    StopPolling,
    RefreshNow,
    Completed {
        seq: u64,
        outcome: Result<ParsedOutput, FetchError>,
    },
    Shutdown,
}

/// Handle to a running poller.
///
/// Cloning is cheap; every clone talks to the same event loop.
#[derive(Clone)]
pub struct PollerHandle {
    tx: mpsc::UnboundedSender<Event>,
    view_rx: watch::Receiver<PollerView>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl PollerHandle {
    /// Fetch now and then every `interval`, measured from trigger to trigger.
    /// Calling it again replaces the previous cadence.
    pub fn start_polling(&self, interval: Duration) -> Result<(), PollerError> {
        if interval.is_zero() {
            return Err(PollerError::ZeroInterval);
        }
        self.send(Event::StartPolling(interval))
    }

    /// Stop the periodic trigger. Attempts already running still land.
    pub fn stop_polling(&self) -> Result<(), PollerError> {
        self.send(Event::StopPolling)
    }

    pub fn refresh_now(&self) -> Result<(), PollerError> {
        self.send(Event::RefreshNow)
    }

    /// Current state, including derived freshness and status line.
    pub fn view(&self) -> PollerView {
        self.view_rx.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollerView> {
        self.view_rx.clone()
    }

    /// Stop the event loop and wait for it to exit. Results of attempts that
    /// are still running are dropped.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Event::Shutdown);
        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("poller task ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, event: Event) -> Result<(), PollerError> {
        self.tx.send(event).map_err(|_| PollerError::Closed)
    }
}

/// Owns the poller state and is its only writer.
pub struct Poller {
    source: Arc<dyn UsageSource>,
    state: PollerState,
    rx: mpsc::UnboundedReceiver<Event>,
    completions: mpsc::WeakUnboundedSender<Event>,
    view_tx: watch::Sender<PollerView>,
    ticker: Option<Interval>,
}

impl Poller {
    /// Start the event loop on the current tokio runtime.
    pub fn spawn(source: Arc<dyn UsageSource>) -> PollerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = PollerState::new();
        let (view_tx, view_rx) = watch::channel(state.view());

        let poller = Poller {
            source,
            state,
            rx,
            completions: tx.downgrade(),
            view_tx,
            ticker: None,
        };
        let task = tokio::spawn(poller.run());

        PollerHandle {
            tx,
            view_rx,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }

    async fn run(mut self) {
        loop {
            let event = match self.ticker.as_mut() {
                Some(ticker) => tokio::select! {
                    event = self.rx.recv() => event,
                    _ = ticker.tick() => Some(Event::RefreshNow),
                },
                None => self.rx.recv().await,
            };

            match event {
                Some(Event::StartPolling(period)) => {
                    tracing::info!(interval_secs = period.as_secs(), "polling started");
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    self.ticker = Some(ticker);
                }
                Some(Event::StopPolling) => {
                    if self.ticker.take().is_some() {
                        tracing::info!("polling stopped");
                    }
                }
                Some(Event::RefreshNow) => self.begin_fetch(),
                Some(Event::Completed { seq, outcome }) => self.complete_fetch(seq, outcome),
                Some(Event::Shutdown) | None => break,
            }
        }
        tracing::debug!("poller loop exited");
    }

    fn begin_fetch(&mut self) {
        let Some(tx) = self.completions.upgrade() else {
            return;
        };
        let seq = self.state.begin_attempt(Local::now());
        self.publish();
        tracing::debug!(seq, "fetch started");

        let fetch = self.source.fetch();
        tokio::spawn(async move {
            let outcome = fetch.await.map(|stdout| parse_output(&stdout));
            let _ = tx.send(Event::Completed { seq, outcome });
        });
    }

    fn complete_fetch(&mut self, seq: u64, outcome: Result<ParsedOutput, FetchError>) {
        match &outcome {
            Err(e) => tracing::warn!(seq, "fetch failed: {}", e),
            Ok(parsed) if !parsed.is_valid() => tracing::warn!(
                seq,
                missing = ?parsed.snapshot.unresolved_required(),
                "fetcher output is missing required values"
            ),
            Ok(_) => {}
        }
        match self.state.complete_attempt(seq, outcome, Local::now()) {
            Completion::Applied(freshness) => {
                tracing::info!(seq, state = %freshness, "fetch applied");
            }
            Completion::Discarded => {
                tracing::debug!(seq, "discarded result older than the last applied fetch");
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view());
    }
}
