//! Configuration management for podrelay.
//!
//! Configuration is read from `~/.config/podrelay/config.toml` (or the path
//! given with `--config`). If the file doesn't exist, a default configuration
//! with comments is created. A few environment variables override file values
//! once at startup; nothing below `main` reads the environment.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ENV_DB_FILE: &str = "PODRELAY_DB_FILE";
pub const ENV_BOT_TOKEN: &str = "PODRELAY_TG_BOT_TOKEN";
pub const ENV_BOT_URL: &str = "PODRELAY_TG_BOT_URL";

/// Main configuration struct.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub sync: SyncConfig,
    pub publish: PublishConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `<data dir>/podrelay/podrelay.db`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub bot_token: Option<SecretString>,
    /// Bot API endpoint override, e.g. a local Bot API server.
    pub api_url: Option<String>,
    /// Request timeout for uploads.
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_url: None,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Items taken from each feed by the periodic check.
    pub check_limit: usize,
    /// Items taken by a one-shot full sync.
    pub full_sync_limit: usize,
    /// Feed fetch timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            check_limit: 9,
            full_sync_limit: 200,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Pause after each delivery attempt, in seconds.
    pub delay_secs: u64,
    /// Where enclosures are downloaded. Defaults to the OS temp dir.
    pub download_dir: Option<PathBuf>,
    /// Feeds whose captions never carry the episode subtitle.
    pub caption_suppressed_feeds: Vec<i64>,
    /// Subtitle length, in characters, before it is cut with "...".
    pub subtitle_limit: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5,
            download_dir: None,
            caption_suppressed_feeds: vec![34],
            subtitle_limit: 800,
        }
    }
}

impl PublishConfig {
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Pause between passes, e.g. "10m", "1h", "90s".
    pub interval: String,
    /// Run a bounded check of all feeds before each publish pass.
    pub sync_before_publish: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            interval: "10m".to_string(),
            sync_before_publish: true,
        }
    }
}

impl ServiceConfig {
    pub fn interval_secs(&self) -> Result<u64, ConfigError> {
        parse_interval(&self.interval).map_err(ConfigError::Invalid)
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

/// Parse interval string like "1h", "30m", "6h", "1d"
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map(|h| h * 3600)
            .map_err(|_| format!("Invalid hours: {}", hours))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid minutes: {}", minutes))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map(|d| d * 86400)
            .map_err(|_| format!("Invalid days: {}", days))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in the binary.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_FILE).filter(|v| !v.is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(SecretString::from(token));
        }
        if let Some(url) = lookup(ENV_BOT_URL).filter(|v| !v.is_empty()) {
            self.telegram.api_url = Some(url);
        }
    }

    /// Get the default config file path: `~/.config/podrelay/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("podrelay").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# podrelay configuration
#
# Environment overrides (applied at startup):
#   PODRELAY_DB_FILE       -> database.path
#   PODRELAY_TG_BOT_TOKEN  -> telegram.bot_token
#   PODRELAY_TG_BOT_URL    -> telegram.api_url

[database]
# path = "/var/lib/podrelay/podrelay.db"

[telegram]
# bot_token = "123456:ABC..."
# api_url = "https://api.telegram.org"
timeout_secs = 300

[sync]
# Items ingested per feed by check-feeds
check_limit = 9
# Items ingested by full-feed
full_sync_limit = 200
timeout_secs = 30

[publish]
# Pause between deliveries (seconds)
delay_secs = 5
# download_dir = "/tmp"
# Feeds whose captions omit the episode subtitle
caption_suppressed_feeds = [34]
subtitle_limit = 800

[service]
interval = "10m"
sync_before_publish = true
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_deserializes() {
        let config: Config = toml::from_str(Config::default_config_content())
            .expect("Default config should be valid TOML");

        assert_eq!(config.sync.check_limit, 9);
        assert_eq!(config.sync.full_sync_limit, 200);
        assert_eq!(config.publish.delay_secs, 5);
        assert_eq!(config.publish.caption_suppressed_feeds, vec![34]);
        assert_eq!(config.publish.subtitle_limit, 800);
        assert_eq!(config.service.interval_secs().unwrap(), 600);
        assert!(config.telegram.bot_token.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[telegram]
bot_token = "42:secret"

[publish]
caption_suppressed_feeds = [7, 34]
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(
            config.telegram.bot_token.as_ref().unwrap().expose_secret(),
            "42:secret"
        );
        assert_eq!(config.publish.caption_suppressed_feeds, vec![7, 34]);
        // Untouched sections keep defaults
        assert_eq!(config.sync.check_limit, 9);
        assert_eq!(config.telegram.timeout_secs, 300);
    }

    #[test]
    fn test_empty_token_is_none() {
        let config: Config = toml::from_str("[telegram]\nbot_token = \"\"\n").unwrap();
        assert!(config.telegram.bot_token.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DB_FILE, "/tmp/relay.db"),
            (ENV_BOT_TOKEN, "99:env"),
            (ENV_BOT_URL, "http://localhost:8081"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/relay.db")));
        assert_eq!(
            config.telegram.bot_token.as_ref().unwrap().expose_secret(),
            "99:env"
        );
        assert_eq!(
            config.telegram.api_url.as_deref(),
            Some("http://localhost:8081")
        );
    }

    #[test]
    fn test_debug_output_hides_token() {
        let mut config = Config::default();
        config.apply_env(|key| (key == ENV_BOT_TOKEN).then(|| "99:hidden".to_string()));
        assert!(!format!("{:?}", config).contains("99:hidden"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.sync.check_limit, 9);

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.publish.subtitle_limit, 800);
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("30m").unwrap(), 1800);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval("60s").unwrap(), 60);
        assert_eq!(parse_interval("3600").unwrap(), 3600);
        assert!(parse_interval("invalid").is_err());
    }
}
