use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides `settings.refresh_interval_seconds`.
pub const ENV_REFRESH_INTERVAL: &str = "REFRESH_INTERVAL_SECONDS";
/// Overrides `fetcher.path`.
pub const ENV_FETCHER: &str = "USAGEBAR_FETCHER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid {name}: '{value}' (expected a positive integer)")]
    EnvError { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}
fn default_refresh_interval() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
            refresh_interval_seconds: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Executable printing `KEY=VALUE` usage lines
    #[serde(default = "default_fetcher_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Kill the fetcher after this many seconds. Unset means wait for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

fn default_fetcher_path() -> PathBuf {
    PathBuf::from("fetch_usage.sh")
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            path: default_fetcher_path(),
            args: Vec::new(),
            working_dir: None,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("usagebar").join("config.toml")
    }

    /// Load config from `path`, falling back to defaults if not found
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `REFRESH_INTERVAL_SECONDS` and `USAGEBAR_FETCHER` from the environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_REFRESH_INTERVAL).ok(),
            std::env::var(ENV_FETCHER).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        interval: Option<String>,
        fetcher: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = interval {
            let seconds = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::EnvError {
                    name: ENV_REFRESH_INTERVAL,
                    value: raw.clone(),
                })?;
            self.settings.refresh_interval_seconds = seconds;
        }
        if let Some(path) = fetcher.filter(|p| !p.trim().is_empty()) {
            self.fetcher.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Serialize and write this config to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json", "waybar"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text', 'json' or 'waybar')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if self.settings.refresh_interval_seconds == 0 {
            issues.push("refresh_interval_seconds must be greater than 0".to_string());
        }
        if self.fetcher.path.as_os_str().is_empty() {
            issues.push("fetcher.path must not be empty".to_string());
        }
        if self.fetcher.timeout_seconds == Some(0) {
            issues.push("fetcher.timeout_seconds must be greater than 0 when set".to_string());
        }
        if let Some(dir) = &self.fetcher.working_dir {
            if !dir.is_dir() {
                issues.push(format!(
                    "fetcher.working_dir does not exist: {}",
                    dir.display()
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let config = AppConfig::default();
        let issues = config.validate();
        assert!(issues.is_empty(), "Default config should be valid, got: {:?}", issues);
    }

    #[test]
    fn default_refresh_interval_is_five_minutes() {
        assert_eq!(Settings::default().refresh_interval_seconds, 300);
    }

    #[test]
    fn default_fetcher_has_no_timeout() {
        let fetcher = FetcherConfig::default();
        assert_eq!(fetcher.path, PathBuf::from("fetch_usage.sh"));
        assert!(fetcher.timeout_seconds.is_none());
    }

    #[test]
    fn validate_catches_invalid_format() {
        let mut config = AppConfig::default();
        config.settings.default_format = "xml".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("default_format")));
    }

    #[test]
    fn validate_catches_invalid_color() {
        let mut config = AppConfig::default();
        config.settings.color = "blue".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("color")));
    }

    #[test]
    fn validate_catches_zero_interval() {
        let mut config = AppConfig::default();
        config.settings.refresh_interval_seconds = 0;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("refresh_interval_seconds")));
    }

    #[test]
    fn validate_catches_zero_timeout_and_empty_path() {
        let mut config = AppConfig::default();
        config.fetcher.timeout_seconds = Some(0);
        config.fetcher.path = PathBuf::new();
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[settings]
default_format = "waybar"
refresh_interval_seconds = 60
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.default_format, "waybar");
        assert_eq!(config.settings.refresh_interval_seconds, 60);
        assert_eq!(config.settings.color, "auto");
    }

    #[test]
    fn parse_fetcher_toml() {
        let toml = r#"
[fetcher]
path = "/opt/usage/fetch_usage.sh"
args = ["--quiet"]
timeout_seconds = 90
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.fetcher.path, PathBuf::from("/opt/usage/fetch_usage.sh"));
        assert_eq!(config.fetcher.args, vec!["--quiet".to_string()]);
        assert_eq!(config.fetcher.timeout_seconds, Some(90));
    }

    #[test]
    fn parse_empty_toml_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.default_format, "text");
        assert_eq!(config.settings.refresh_interval_seconds, 300);
    }

    #[test]
    fn overrides_replace_interval_and_fetcher() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(Some("120".into()), Some("/usr/local/bin/fetch".into()))
            .unwrap();
        assert_eq!(config.settings.refresh_interval_seconds, 120);
        assert_eq!(config.fetcher.path, PathBuf::from("/usr/local/bin/fetch"));
    }

    #[test]
    fn overrides_reject_bad_interval() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(Some("0".into()), None).is_err());
        assert!(config.apply_overrides(Some("soon".into()), None).is_err());
        assert_eq!(config.settings.refresh_interval_seconds, 300);
    }

    #[test]
    fn empty_fetcher_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(None, Some("  ".into())).unwrap();
        assert_eq!(config.fetcher.path, PathBuf::from("fetch_usage.sh"));
    }

    #[test]
    fn save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usagebar").join("config.toml");
        let mut config = AppConfig::default();
        config.settings.refresh_interval_seconds = 42;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.settings.refresh_interval_seconds, 42);
    }

    #[test]
    fn load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.settings.refresh_interval_seconds, 300);
    }

    #[test]
    fn config_path_uses_xdg_when_set() {
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test_xdg_config");
        let path = AppConfig::config_path();
        std::env::remove_var("XDG_CONFIG_HOME");
        assert_eq!(path, PathBuf::from("/tmp/test_xdg_config/usagebar/config.toml"));
    }
}
