use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer::print_view;
use crate::core::models::usage::{UsageKey, UsageSnapshot};
use crate::core::parser::parse_output;
use crate::core::state::PollerState;

#[derive(Serialize)]
struct ParseReport<'a> {
    valid: bool,
    recognized_keys: usize,
    field_errors: &'a [UsageKey],
    unresolved: Vec<UsageKey>,
    snapshot: &'a UsageSnapshot,
}

/// Parse saved fetcher output and show what the indicator would display.
/// Returns whether the output is valid.
pub fn run(file: Option<&Path>, opts: &OutputOptions) -> Result<bool> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let parsed = parse_output(&input);
    let valid = parsed.is_valid();

    if opts.format == OutputFormat::Json {
        let report = ParseReport {
            valid,
            recognized_keys: parsed.recognized_keys,
            field_errors: &parsed.field_errors,
            unresolved: parsed.snapshot.unresolved_required(),
            snapshot: &parsed.snapshot,
        };
        let json = if opts.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{}", json);
        return Ok(valid);
    }

    for key in &parsed.field_errors {
        tracing::warn!("unparseable value for {}", key);
    }

    let mut state = PollerState::new();
    let seq = state.begin_attempt(Local::now());
    state.complete_attempt(seq, Ok(parsed), Local::now());
    let view = state.view();

    print_view(&view, opts)?;
    Ok(valid)
}
