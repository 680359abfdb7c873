use crate::config::PublishConfig;
use crate::domain::{Feed, Item};

pub const AUDIO_MIME: &str = "audio/mpeg";

/// Caption rules shared by every delivery.
#[derive(Debug, Clone)]
pub struct CaptionPolicy {
    subtitle_limit: usize,
    suppressed_feeds: Vec<i64>,
}

impl CaptionPolicy {
    pub fn new(subtitle_limit: usize, suppressed_feeds: Vec<i64>) -> Self {
        Self {
            subtitle_limit,
            suppressed_feeds,
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(
            config.subtitle_limit,
            config.caption_suppressed_feeds.clone(),
        )
    }

    /// The item subtitle, cut at the character limit with a trailing `...`.
    /// Empty for feeds whose captions are suppressed.
    pub fn subtitle(&self, item: &Item) -> String {
        if self.suppressed_feeds.contains(&item.feed_id) {
            return String::new();
        }

        let subtitle = item.subtitle();
        if subtitle.chars().count() > self.subtitle_limit {
            let mut cut: String = subtitle.chars().take(self.subtitle_limit).collect();
            cut.push_str("...");
            cut
        } else {
            subtitle.to_string()
        }
    }

    pub fn compose(&self, feed: &Feed, item: &Item) -> String {
        let mut caption = format!("*{}*\n\n{}", item.title, self.subtitle(item));
        if let Some(link) = feed.caption_extra_link() {
            caption.push_str("\n\n");
            caption.push_str(link);
        }
        caption
    }
}

/// File name shown to channel subscribers.
pub fn audio_file_name(item: &Item) -> String {
    format!("*{}*.mp3", item.title)
}
