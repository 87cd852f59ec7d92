use std::io::{BufRead, BufReader, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer::print_view;
use crate::core::config::AppConfig;
use crate::core::fetcher::ScriptSource;
use crate::core::poller::Poller;

/// Poll until Ctrl-C, printing every state change.
///
/// `SIGUSR1` triggers an immediate refresh, so a bar can bind a click to
/// `pkill -USR1 usagebar`. In text mode on a terminal, Enter refreshes and
/// `q` quits.
pub async fn run(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let interval = Duration::from_secs(config.settings.refresh_interval_seconds);
    let source = Arc::new(ScriptSource::from_config(&config.fetcher));
    tracing::info!(
        fetcher = %source.program().display(),
        interval_secs = interval.as_secs(),
        "starting watch"
    );

    let handle = Poller::spawn(source);
    let mut updates = handle.subscribe();
    handle.start_polling(interval)?;

    let mut refresh_signal = RefreshSignal::new()?;
    let mut stdin_lines = if opts.format == OutputFormat::Text && std::io::stdin().is_terminal() {
        Some(spawn_line_reader(BufReader::new(std::io::stdin()))?)
    } else {
        None
    };

    print_view(&handle.view(), opts)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                if opts.format == OutputFormat::Text {
                    println!();
                }
                print_view(&view, opts)?;
            }
            _ = refresh_signal.recv() => {
                tracing::info!("refresh requested by signal");
                handle.refresh_now()?;
            }
            line = next_line(&mut stdin_lines) => match line.as_deref().map(TerminalCommand::from_line) {
                Some(TerminalCommand::Quit) => break,
                Some(TerminalCommand::Refresh) => handle.refresh_now()?,
                None => stdin_lines = None,
            },
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    handle.stop_polling()?;
    handle.shutdown().await;
    Ok(())
}

#[derive(Debug, PartialEq)]
enum TerminalCommand {
    Refresh,
    Quit,
}

impl TerminalCommand {
    fn from_line(line: &str) -> Self {
        if line.trim() == "q" {
            Self::Quit
        } else {
            Self::Refresh
        }
    }
}

/// Read lines on a dedicated thread and forward them over a channel.
///
/// The thread is never joined, so a read still waiting on the terminal does
/// not keep the process alive once the watch loop returns.
fn spawn_line_reader<R>(reader: R) -> Result<mpsc::UnboundedReceiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("usagebar-stdin".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start terminal reader")?;
    Ok(rx)
}

async fn next_line(lines: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match lines {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
struct RefreshSignal(tokio::signal::unix::Signal);

#[cfg(unix)]
impl RefreshSignal {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        let sig = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
        Ok(Self(sig))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct RefreshSignal;

#[cfg(not(unix))]
impl RefreshSignal {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
