use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::output::OutputOptions;
use crate::cli::renderer::print_view;
use crate::core::config::AppConfig;
use crate::core::fetcher::{ScriptSource, UsageSource};
use crate::core::poller::Poller;
use crate::core::state::{Freshness, PollerView};

/// Run the fetcher once and print the result. Returns whether the data is fresh.
pub async fn run(config: &AppConfig, opts: &OutputOptions) -> Result<bool> {
    let source = Arc::new(ScriptSource::from_config(&config.fetcher));
    let view = fetch_once(source).await?;
    print_view(&view, opts)?;
    Ok(view.freshness == Freshness::Fresh)
}

pub async fn fetch_once(source: Arc<dyn UsageSource>) -> Result<PollerView> {
    let handle = Poller::spawn(source);
    let mut updates = handle.subscribe();
    handle.refresh_now()?;

    let view = updates
        .wait_for(|v| v.fetch_seq >= 1 && !v.is_loading)
        .await
        .context("Poller stopped before the fetch completed")?
        .clone();

    handle.shutdown().await;
    Ok(view)
}
