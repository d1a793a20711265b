//! Message view configuration.
//!
//! Read from a JSON file in the platform config directory, then overridden
//! by environment variables. Every setting has a default so a missing file is
//! not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use parlor_shared::constants::{
    BACKLOG_INTERVAL_MS, BACKLOG_LIMIT, COLLAPSE_WINDOW_SECS, HIGHLIGHT_MS, HTTP_TIMEOUT_SECS,
    MENTION_SCHEME, TYPING_TICK_MS,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "view.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewConfig {
    /// Rows kept before the newest one while the view is at the bottom.
    /// Env: `PARLOR_BACKLOG_LIMIT`
    /// Default: `50`
    pub backlog_limit: usize,

    /// Same-author messages closer than this are shown collapsed.
    /// Env: `PARLOR_COLLAPSE_WINDOW_SECS`
    /// Default: `180`
    pub collapse_window_secs: i64,

    /// Minimum time between two backlog requests.
    /// Default: `3000`
    pub backlog_interval_ms: u64,

    /// How long a referenced message stays highlighted.
    /// Default: `2000`
    pub highlight_ms: u64,

    /// Period of the typing indicator refresh.
    /// Default: `500`
    pub typing_tick_ms: u64,

    /// Scheme of the synthetic mention links in rendered markup.
    /// Env: `PARLOR_MENTION_SCHEME`
    /// Default: `"parlor"`
    pub mention_scheme: String,

    /// Ask before opening non-image links in the browser.
    /// Env: `PARLOR_CONFIRM_LINKS` (true/false)
    /// Default: `true`
    pub confirm_external_links: bool,

    /// Timeout for image fetches.
    /// Default: `15`
    pub http_timeout_secs: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            backlog_limit: BACKLOG_LIMIT,
            collapse_window_secs: COLLAPSE_WINDOW_SECS,
            backlog_interval_ms: BACKLOG_INTERVAL_MS,
            highlight_ms: HIGHLIGHT_MS,
            typing_tick_ms: TYPING_TICK_MS,
            mention_scheme: MENTION_SCHEME.to_string(),
            confirm_external_links: true,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }
}

impl ViewConfig {
    /// `<config dir>/view.json` for the current platform.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("org", "parlor", "parlor").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load and validate the file at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// [`load`](Self::load), then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("PARLOR_BACKLOG_LIMIT") {
            match val.parse() {
                Ok(n) => self.backlog_limit = n,
                Err(_) => warn!(value = %val, "Invalid PARLOR_BACKLOG_LIMIT, ignoring"),
            }
        }

        if let Ok(val) = std::env::var("PARLOR_COLLAPSE_WINDOW_SECS") {
            match val.parse() {
                Ok(n) => self.collapse_window_secs = n,
                Err(_) => warn!(value = %val, "Invalid PARLOR_COLLAPSE_WINDOW_SECS, ignoring"),
            }
        }

        if let Ok(scheme) = std::env::var("PARLOR_MENTION_SCHEME") {
            self.mention_scheme = scheme;
        }

        if let Ok(val) = std::env::var("PARLOR_CONFIRM_LINKS") {
            self.confirm_external_links = val != "false" && val != "0";
        }
    }

    /// Check every field, reporting the first one that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog_limit == 0 {
            return Err(field("backlogLimit", "must be at least 1"));
        }
        if self.collapse_window_secs < 0 {
            return Err(field("collapseWindowSecs", "must not be negative"));
        }
        if self.highlight_ms == 0 {
            return Err(field("highlightMs", "must be positive"));
        }
        if self.typing_tick_ms == 0 {
            return Err(field("typingTickMs", "must be positive"));
        }
        if self.http_timeout_secs == 0 {
            return Err(field("httpTimeoutSecs", "must be positive"));
        }
        validate_scheme(&self.mention_scheme)?;
        Ok(())
    }

    pub fn collapse_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.collapse_window_secs)
    }

    pub fn backlog_interval(&self) -> Duration {
        Duration::from_millis(self.backlog_interval_ms)
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn typing_tick(&self) -> Duration {
        Duration::from_millis(self.typing_tick_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn field(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Field {
        field,
        reason: reason.to_string(),
    }
}

/// RFC 3986 scheme: a letter followed by letters, digits, `+`, `-` or `.`.
fn validate_scheme(scheme: &str) -> Result<(), ConfigError> {
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(field("mentionScheme", "not a valid URI scheme"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ViewConfig::default();
        assert_eq!(config.backlog_limit, 50);
        assert_eq!(config.collapse_window(), chrono::Duration::minutes(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, ViewConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("view.json");

        let config = ViewConfig {
            backlog_limit: 10,
            mention_scheme: "chat".into(),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ViewConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        std::fs::write(&path, r#"{ "highlightMs": 500 }"#).unwrap();

        let config = ViewConfig::load(&path).unwrap();
        assert_eq!(config.highlight_ms, 500);
        assert_eq!(config.backlog_limit, BACKLOG_LIMIT);
    }

    #[test]
    fn test_validation_names_the_field() {
        let config = ViewConfig {
            backlog_limit: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Field { field, .. }) => assert_eq!(field, "backlogLimit"),
            other => panic!("unexpected: {other:?}"),
        }

        let config = ViewConfig {
            mention_scheme: "9bad".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Field { field: "mentionScheme", .. })
        ));
    }

    #[test]
    fn test_garbage_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(ViewConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
