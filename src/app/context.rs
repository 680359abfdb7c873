use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::app::error::{RelayError, Result};
use crate::config::Config;
use crate::fetcher::{FeedSource, HttpFeedSource};
use crate::notifier::{Notifier, TelegramNotifier};
use crate::publish::{Downloader, Publisher};
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub source: Arc<dyn FeedSource + Send + Sync>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.database.path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let source: Arc<dyn FeedSource + Send + Sync> = Arc::new(HttpFeedSource::new(
            Duration::from_secs(config.sync.timeout_secs),
        )?);

        Ok(Self {
            config,
            store,
            source,
        })
    }

    /// Swap the feed source, e.g. for a canned one in tests.
    pub fn with_source(mut self, source: Arc<dyn FeedSource + Send + Sync>) -> Self {
        self.source = source;
        self
    }

    /// Build the Telegram notifier. A missing token is reported as `Ok(None)`
    /// so read-only commands keep working; uploads then fail fatally.
    pub fn notifier(&self) -> Result<Option<Arc<dyn Notifier + Send + Sync>>> {
        match TelegramNotifier::from_config(&self.config.telegram) {
            Ok(notifier) => {
                let notifier: Arc<dyn Notifier + Send + Sync> = Arc::new(notifier);
                Ok(Some(notifier))
            }
            Err(RelayError::MissingCredential) => {
                tracing::warn!("No Telegram bot token configured; uploads will fail");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn publisher(&self) -> Result<Publisher<SqliteStore>> {
        self.publisher_with(self.notifier()?)
    }

    pub fn publisher_with(
        &self,
        notifier: Option<Arc<dyn Notifier + Send + Sync>>,
    ) -> Result<Publisher<SqliteStore>> {
        // No overall timeout: episodes can be large
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(self.config.sync.timeout_secs))
            .user_agent(crate::fetcher::http_fetcher::USER_AGENT)
            .build()?;
        let downloader = Downloader::new(client, self.config.publish.download_dir());

        Ok(Publisher::new(
            self.store.clone(),
            notifier,
            downloader,
            &self.config.publish,
        ))
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| RelayError::Config("Could not find data directory".into()))?;
        Ok(data_dir.join("podrelay").join("podrelay.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_missing_token_gives_no_notifier() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        assert!(ctx.notifier().unwrap().is_none());
    }

    #[test]
    fn test_token_builds_notifier() {
        let mut config = Config::default();
        config.telegram.bot_token = Some(SecretString::from("1:abc".to_string()));
        let ctx = AppContext::in_memory(config).unwrap();
        assert!(ctx.notifier().unwrap().is_some());
    }

    #[test]
    fn test_bad_api_url_is_fatal() {
        let mut config = Config::default();
        config.telegram.bot_token = Some(SecretString::from("1:abc".to_string()));
        config.telegram.api_url = Some("::not a url".into());
        let ctx = AppContext::in_memory(config).unwrap();
        let err = ctx.notifier().err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_new_creates_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = Some(dir.path().join("data").join("relay.db"));

        let _ctx = AppContext::new(config).unwrap();
        assert!(dir.path().join("data").join("relay.db").exists());
    }
}
