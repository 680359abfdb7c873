pub mod http_fetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::ItunesMeta;

pub use http_fetcher::HttpFeedSource;

/// A fetched and parsed feed, before anything is persisted.
#[derive(Debug, Clone, Default)]
pub struct FeedDocument {
    pub title: String,
    pub description: String,
    pub link: String,
    pub image: Option<DocumentImage>,
    /// Entries in the order the source lists them.
    pub items: Vec<DocumentItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentImage {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentItem {
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
    pub updated: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub published: String,
    pub published_at: Option<DateTime<Utc>>,
    pub itunes: Option<ItunesMeta>,
    pub enclosures: Vec<DocumentEnclosure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentEnclosure {
    pub url: String,
    /// Byte length exactly as the source wrote it; validated at ingestion.
    pub length: String,
    pub media_type: String,
}

#[async_trait]
pub trait FeedSource {
    async fn fetch(&self, url: &str) -> Result<FeedDocument>;
}
