use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub link: String,
    /// Source URL the feed document is fetched from.
    pub url: String,
    pub publish_ready: bool,
    pub tg_channel: Option<i64>,
    pub extra_link_enabled: bool,
    pub extra_link: String,
    pub created_at: DateTime<Utc>,
}

impl Feed {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// Text appended to every caption, if the feed has it switched on.
    pub fn caption_extra_link(&self) -> Option<&str> {
        self.extra_link_enabled.then_some(self.extra_link.as_str())
    }
}

/// Fields for a feed that has not been persisted yet.
#[derive(Debug, Clone, Default)]
pub struct NewFeed {
    pub title: String,
    pub description: String,
    pub link: String,
    pub url: String,
}

/// Operator-controlled publishing settings. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct FeedSettings {
    pub publish_ready: Option<bool>,
    pub tg_channel: Option<i64>,
    pub extra_link_enabled: Option<bool>,
    pub extra_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub feed_id: i64,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewImage {
    pub url: String,
    pub title: String,
}
