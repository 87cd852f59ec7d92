mod cli;
mod core;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "usagebar",
    about = "Poll a usage fetcher script and show the figures in a panel",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text|json|waybar)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll on a timer and print every update
    Watch {
        /// Seconds between fetches (overrides REFRESH_INTERVAL_SECONDS)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Fetcher executable (overrides USAGEBAR_FETCHER)
        #[arg(long)]
        fetcher: Option<PathBuf>,
    },
    /// Fetch once, print the result, exit non-zero unless fresh
    Once {
        /// Fetcher executable (overrides USAGEBAR_FETCHER)
        #[arg(long)]
        fetcher: Option<PathBuf>,
    },
    /// Parse saved fetcher output from FILE or stdin
    Parse {
        file: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file and fetcher
    Check,
    /// Print the config file path
    Path,
}

fn init_tracing(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        None | Some(Commands::Watch { .. }) => "info",
        _ => "warn",
    };
    init_tracing(cli.verbose, default_level);

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.apply_env()?;

    let format = if cli.json {
        OutputFormat::Json
    } else {
        let name = cli
            .format
            .as_deref()
            .unwrap_or(config.settings.default_format.as_str());
        match OutputFormat::from_name(name) {
            Some(format) => format,
            None => anyhow::bail!("Unknown format '{}' (expected text, json or waybar)", name),
        }
    };
    let output_opts = OutputOptions {
        format,
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &config.settings.color),
    };

    match cli.command {
        None => cli::watch_cmd::run(&config, &output_opts).await?,
        Some(Commands::Watch { interval, fetcher }) => {
            if let Some(secs) = interval {
                config.settings.refresh_interval_seconds = secs;
            }
            if let Some(path) = fetcher {
                config.fetcher.path = path;
            }
            if config.settings.refresh_interval_seconds == 0 {
                anyhow::bail!("--interval must be greater than 0");
            }
            cli::watch_cmd::run(&config, &output_opts).await?;
        }
        Some(Commands::Once { fetcher }) => {
            if let Some(path) = fetcher {
                config.fetcher.path = path;
            }
            if !cli::once_cmd::run(&config, &output_opts).await? {
                std::process::exit(1);
            }
        }
        Some(Commands::Parse { file }) => {
            if !cli::parse_cmd::run(file.as_deref(), &output_opts)? {
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&config_path)?,
            ConfigAction::Check => {
                if !cli::config_cmd::check(&config_path, &config)? {
                    std::process::exit(1);
                }
            }
            ConfigAction::Path => cli::config_cmd::path(&config_path)?,
        },
    }

    Ok(())
}
