use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::Result;
use crate::fetcher::{FeedDocument, FeedSource};
use crate::normalizer::Normalizer;

pub const USER_AGENT: &str = concat!("podrelay/", env!("CARGO_PKG_VERSION"));

pub struct HttpFeedSource {
    client: Client,
    normalizer: Normalizer,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            normalizer: Normalizer::new(),
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        tracing::debug!(url, "Fetching feed");

        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        let body = response.bytes().await?;

        self.normalizer.normalize(&body)
    }
}
