mod itunes;

use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, MediaObject};
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{RelayError, Result};
use crate::domain::ItunesMeta;
use crate::fetcher::{DocumentEnclosure, DocumentImage, DocumentItem, FeedDocument};

use itunes::ItunesTags;

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &[u8]) -> Result<FeedDocument> {
        let feed = parser::parse(body).map_err(|e| RelayError::FeedParse(e.to_string()))?;
        let tags = itunes::scan_items(body);

        let image = feed
            .logo
            .or(feed.icon)
            .filter(|img| !img.uri.is_empty())
            .map(|img| DocumentImage {
                url: img.uri,
                title: img.title.unwrap_or_default(),
            });

        Ok(FeedDocument {
            title: feed
                .title
                .map(|t| decode_html_entities(&t.content).to_string())
                .unwrap_or_default(),
            description: feed
                .description
                .map(|d| decode_html_entities(&d.content).to_string())
                .unwrap_or_default(),
            link: feed
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            image,
            items: feed
                .entries
                .into_iter()
                .enumerate()
                .map(|(i, entry)| Self::normalize_entry(entry, tags.get(i)))
                .collect(),
        })
    }

    fn normalize_entry(entry: Entry, tags: Option<&ItunesTags>) -> DocumentItem {
        let enclosures = entry
            .media
            .iter()
            .flat_map(|media| media.content.iter())
            .filter_map(|content| {
                let url = content.url.as_ref()?.to_string();
                Some(DocumentEnclosure {
                    url,
                    length: content.size.map(|s| s.to_string()).unwrap_or_default(),
                    media_type: content
                        .content_type
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_default(),
                })
            })
            .collect();

        let summary = entry
            .summary
            .as_ref()
            .map(|s| decode_html_entities(&s.content).to_string())
            .unwrap_or_default();

        let itunes = Self::itunes_meta(&entry, entry.media.first(), tags, &summary);

        DocumentItem {
            title: entry
                .title
                .map(|t| decode_html_entities(&t.content).to_string())
                .unwrap_or_default(),
            content: entry
                .content
                .and_then(|c| c.body)
                .map(|b| decode_html_entities(&b).to_string())
                .unwrap_or_default(),
            link: entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            updated: Self::raw_date(entry.updated),
            updated_at: entry.updated,
            published: Self::raw_date(entry.published),
            published_at: entry.published.or(entry.updated),
            itunes,
            enclosures,
            description: summary,
        }
    }

    /// Podcast metadata, present when the entry carries a media block or any
    /// iTunes tag. The subtitle comes only from `itunes:subtitle`.
    fn itunes_meta(
        entry: &Entry,
        media: Option<&MediaObject>,
        tags: Option<&ItunesTags>,
        summary: &str,
    ) -> Option<ItunesMeta> {
        let tags = tags.filter(|t| !t.is_empty());
        if media.is_none() && tags.is_none() {
            return None;
        }
        let tags = tags.cloned().unwrap_or_default();

        Some(ItunesMeta {
            author: entry
                .authors
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            duration: media
                .and_then(|m| m.duration)
                .map(Self::format_duration)
                .unwrap_or_default(),
            explicit: tags.explicit,
            subtitle: tags.subtitle,
            summary: summary.to_string(),
            image: media
                .and_then(|m| m.thumbnails.first())
                .map(|t| t.image.uri.clone())
                .unwrap_or_default(),
            episode: tags.episode,
            season: tags.season,
            episode_type: tags.episode_type,
        })
    }

    fn raw_date(date: Option<DateTime<Utc>>) -> String {
        date.map(|d| d.to_rfc2822()).unwrap_or_default()
    }

    fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
