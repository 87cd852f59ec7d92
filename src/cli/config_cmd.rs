use std::path::Path;

use anyhow::Result;

use crate::core::config::AppConfig;
use crate::core::fetcher::which;

pub fn init(path: &Path) -> Result<()> {
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    AppConfig::default().save_to(path)?;
    println!("Generated config at {}", path.display());
    println!("  Set [fetcher] path to your fetch_usage.sh before running `usagebar watch`.");
    Ok(())
}

pub fn path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}

/// Validate the effective config. Returns false when issues were found.
pub fn check(path: &Path, config: &AppConfig) -> Result<bool> {
    if !path.exists() {
        println!("No config file at {} (using defaults)", path.display());
    }

    let mut issues = config.validate();
    let fetcher = &config.fetcher.path;
    let resolved = match &config.fetcher.working_dir {
        Some(dir) if fetcher.is_relative() && fetcher.components().count() > 1 => {
            which(&dir.join(fetcher))
        }
        _ => which(fetcher),
    };
    match &resolved {
        Some(found) => println!("  Fetcher: {}", found.display()),
        None => issues.push(format!("Fetcher not found: {}", fetcher.display())),
    }

    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        println!(
            "  Refresh interval: {}s",
            config.settings.refresh_interval_seconds
        );
        match config.fetcher.timeout_seconds {
            Some(secs) => println!("  Fetch timeout: {}s", secs),
            None => println!("  Fetch timeout: none"),
        }
        Ok(true)
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usagebar").join("config.toml");

        init(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("refresh_interval_seconds = 300"));

        std::fs::write(&path, "# edited\n").unwrap();
        init(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
    }

    #[test]
    fn check_flags_missing_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.fetcher.path = dir.path().join("missing.sh");
        assert!(!check(&dir.path().join("config.toml"), &config).unwrap());
    }

    #[test]
    fn check_accepts_existing_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fetch_usage.sh");
        std::fs::write(&script, "#!/bin/sh\necho SESSION_REMAINING=1\n").unwrap();
        let mut config = AppConfig::default();
        config.fetcher.path = script;
        assert!(check(&dir.path().join("config.toml"), &config).unwrap());
    }
}
