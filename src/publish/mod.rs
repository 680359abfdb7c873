//! Delivery of unpublished items to their feed's channel.
//!
//! Each item goes through download, upload and state transition. An item is
//! marked published when it was delivered, when it has nothing to deliver, or
//! when its audio could not be downloaded. Upload failures leave it
//! unpublished for the next pass. Configuration faults abort the whole run.

pub mod caption;
pub mod download;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app::{RelayError, Result};
use crate::config::PublishConfig;
use crate::domain::{Feed, Item};
use crate::notifier::{AudioPayload, Notifier, ParseMode};
use crate::store::Store;

pub use caption::{audio_file_name, CaptionPolicy, AUDIO_MIME};
pub use download::{derive_file_name, Downloader};

/// Upload rejections that retrying cannot fix. Such items are treated as
/// delivered so they stop blocking the queue.
const PERMANENT_REJECTIONS: &[&str] = &[
    "Request Entity Too Large",
    "text must be encoded in UTF-8",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Delivered,
    /// Marked published without a delivery (no audio, or the download failed).
    Skipped,
    /// Upload failed; the item stays unpublished.
    Retry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PublishReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Delivered => self.delivered += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Retry => self.failed += 1,
        }
    }
}

pub struct Publisher<S: ?Sized> {
    store: Arc<S>,
    notifier: Option<Arc<dyn Notifier + Send + Sync>>,
    downloader: Downloader,
    captions: CaptionPolicy,
    delay: Duration,
}

impl<S: Store + ?Sized> Publisher<S> {
    /// `notifier` is `None` when no credential is configured; the first
    /// upload attempt then fails with [`RelayError::MissingCredential`].
    pub fn new(
        store: Arc<S>,
        notifier: Option<Arc<dyn Notifier + Send + Sync>>,
        downloader: Downloader,
        config: &PublishConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            downloader,
            captions: CaptionPolicy::from_config(config),
            delay: Duration::from_secs(config.delay_secs),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn select_next(&self, feed: &Feed) -> Result<Option<Item>> {
        self.store.get_first_unpublished_item(feed.id)
    }

    pub fn select_all(&self, feed: &Feed) -> Result<Vec<Item>> {
        self.store.get_unpublished_items(feed.id)
    }

    /// Download the item's first enclosure. `Ok(None)` means there is none.
    pub async fn download_primary_enclosure(&self, item: &Item) -> Result<Option<PathBuf>> {
        let Some(enclosure) = self.store.get_first_enclosure(item.id)? else {
            return Ok(None);
        };
        self.downloader.download(&enclosure.url).await.map(Some)
    }

    /// Upload `path` to the feed's channel with the composed caption.
    pub async fn publish(&self, feed: &Feed, item: &Item, path: &Path) -> Result<()> {
        let notifier = self
            .notifier
            .as_ref()
            .ok_or(RelayError::MissingCredential)?;
        let channel = feed.tg_channel.ok_or_else(|| {
            RelayError::Delivery(format!(
                "feed '{}' has no channel configured",
                feed.display_title()
            ))
        })?;

        let payload = AudioPayload {
            path: path.to_path_buf(),
            mime: AUDIO_MIME.to_string(),
            file_name: audio_file_name(item),
        };
        let caption = self.captions.compose(feed, item);

        match notifier
            .send(channel, &payload, &caption, ParseMode::Markdown)
            .await
        {
            Ok(()) => {
                tracing::info!(feed = %feed.display_title(), item = %item.display_title(), channel, "Delivered item");
                Ok(())
            }
            Err(e) if !e.is_fatal() && is_permanent_rejection(&e) => {
                tracing::warn!(
                    feed = %feed.display_title(),
                    item = %item.display_title(),
                    error = %e,
                    "Upload rejected permanently; treating as delivered"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run one item through download, upload and state transition.
    ///
    /// Only fatal configuration errors and store failures are returned as
    /// `Err`; everything else is folded into the outcome.
    pub async fn process_item(&self, feed: &Feed, item: &Item) -> Result<ItemOutcome> {
        let path = match self.download_primary_enclosure(item).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                tracing::info!(item = %item.display_title(), "No enclosure; marking published");
                self.mark_published(item)?;
                return Ok(ItemOutcome::Skipped);
            }
            Err(e) => {
                tracing::warn!(
                    item = %item.display_title(),
                    error = %e,
                    "Download failed; marking published without delivery"
                );
                self.mark_published(item)?;
                return Ok(ItemOutcome::Skipped);
            }
        };

        match self.publish(feed, item, &path).await {
            Ok(()) => {
                let marked = self.mark_published(item);
                remove_local_file(&path).await;
                marked?;
                Ok(ItemOutcome::Delivered)
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(
                    item = %item.display_title(),
                    path = %path.display(),
                    error = %e,
                    "Publishing halted by configuration error"
                );
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    feed = %feed.display_title(),
                    item = %item.display_title(),
                    error = %e,
                    "Upload failed; will retry next pass"
                );
                remove_local_file(&path).await;
                Ok(ItemOutcome::Retry)
            }
        }
    }

    /// Deliver every unpublished item of every ready feed, oldest first.
    pub async fn publish_all_ready(&self) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        for feed in self.store.get_ready_feeds()? {
            for item in self.select_all(&feed)? {
                self.run_item(&feed, &item, &mut report).await?;
            }
        }
        tracing::info!(
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Publish pass complete"
        );
        Ok(report)
    }

    /// Deliver at most one item per ready feed.
    pub async fn publish_one_per_feed(&self) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        for feed in self.store.get_ready_feeds()? {
            if let Some(item) = self.select_next(&feed)? {
                self.run_item(&feed, &item, &mut report).await?;
            }
        }
        Ok(report)
    }

    /// Deliver the oldest unpublished item of one feed, ready or not.
    pub async fn publish_next_for_feed(&self, feed_id: i64) -> Result<PublishReport> {
        let feed = self
            .store
            .get_feed(feed_id)?
            .ok_or_else(|| RelayError::FeedNotFound(feed_id.to_string()))?;

        let mut report = PublishReport::default();
        match self.select_next(&feed)? {
            Some(item) => report.record(self.process_item(&feed, &item).await?),
            None => tracing::info!(feed = %feed.display_title(), "Nothing to publish"),
        }
        Ok(report)
    }

    async fn run_item(&self, feed: &Feed, item: &Item, report: &mut PublishReport) -> Result<()> {
        let outcome = self.process_item(feed, item).await?;
        report.record(outcome);

        // Pace only actual uploads
        if outcome != ItemOutcome::Skipped && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    fn mark_published(&self, item: &Item) -> Result<()> {
        if !self.store.mark_published(item.id)? {
            tracing::debug!(item = %item.display_title(), "Item was already published");
        }
        Ok(())
    }
}

fn is_permanent_rejection(err: &RelayError) -> bool {
    let message = err.to_string();
    PERMANENT_REJECTIONS
        .iter()
        .any(|marker| message.contains(marker))
}

async fn remove_local_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove downloaded file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeedSettings, NewEnclosure, NewFeed, NewItem, PublicationState};
    use crate::store::SqliteStore;
    use crate::testing::RecordingNotifier;
    use chrono::{TimeZone, Utc};
    use reqwest::Client;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        store: Arc<SqliteStore>,
        notifier: Arc<RecordingNotifier>,
        dir: tempfile::TempDir,
        server: MockServer,
        feed: Feed,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(SqliteStore::in_memory().unwrap());
            let created = store
                .create_feed(&NewFeed {
                    title: "Show".into(),
                    url: "https://show.example/rss".into(),
                    ..Default::default()
                })
                .unwrap();
            store
                .update_feed_settings(
                    created.id,
                    &FeedSettings {
                        publish_ready: Some(true),
                        tg_channel: Some(-100500),
                        ..Default::default()
                    },
                )
                .unwrap();
            let feed = store.get_feed(created.id).unwrap().unwrap();

            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path_regex(r"^/ok-"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio".to_vec()))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path_regex(r"^/missing-"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            Self {
                store,
                notifier: Arc::new(RecordingNotifier::new()),
                dir: tempfile::tempdir().unwrap(),
                server,
                feed,
            }
        }

        fn publisher(&self) -> Publisher<SqliteStore> {
            let notifier: Arc<dyn Notifier + Send + Sync> = self.notifier.clone();
            self.publisher_with(Some(notifier))
        }

        fn publisher_with(
            &self,
            notifier: Option<Arc<dyn Notifier + Send + Sync>>,
        ) -> Publisher<SqliteStore> {
            Publisher::new(
                self.store.clone(),
                notifier,
                Downloader::new(Client::new(), self.dir.path().to_path_buf()),
                &PublishConfig::default(),
            )
            .with_delay(Duration::ZERO)
        }

        /// `audio` is `"ok"` or `"missing"`. Each item gets its own enclosure
        /// URL, since enclosures are shared by URL across items.
        fn add_item(&self, title: &str, day: u32, audio: Option<&str>) -> Item {
            let (item, _) = self
                .store
                .find_or_create_item(&NewItem {
                    feed_id: self.feed.id,
                    title: title.into(),
                    published_at: Some(Utc.with_ymd_and_hms(2024, 3, day, 6, 0, 0).unwrap()),
                    ..Default::default()
                })
                .unwrap();
            if let Some(kind) = audio {
                let slug = title.to_lowercase().replace(' ', "-");
                let enclosure = self
                    .store
                    .find_or_create_enclosure(
                        item.id,
                        &NewEnclosure {
                            url: format!("{}/{}-{}.mp3", self.server.uri(), kind, slug),
                            length: 5,
                            media_type: AUDIO_MIME.into(),
                        },
                    )
                    .unwrap();
                assert_eq!(enclosure.item_id, item.id);
            }
            item
        }

        fn state(&self, item: &Item) -> PublicationState {
            self.store.get_item(item.id).unwrap().unwrap().state
        }

        fn files_left(&self) -> usize {
            std::fs::read_dir(self.dir.path()).unwrap().count()
        }
    }

    #[tokio::test]
    async fn test_delivered_item_is_published_and_file_removed() {
        let fx = Fixture::new().await;
        let item = fx.add_item("Pilot", 1, Some("ok"));

        let outcome = fx.publisher().process_item(&fx.feed, &item).await.unwrap();

        assert_eq!(outcome, ItemOutcome::Delivered);
        assert_eq!(fx.state(&item), PublicationState::Published);
        assert_eq!(fx.files_left(), 0);

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, -100500);
        assert_eq!(sent[0].file_name, "*Pilot*.mp3");
        assert_eq!(sent[0].caption, "*Pilot*\n\n");
        assert_eq!(sent[0].mode, ParseMode::Markdown);
        assert!(sent[0].file_existed);
    }

    #[tokio::test]
    async fn test_item_without_enclosure_is_skipped() {
        let fx = Fixture::new().await;
        let item = fx.add_item("Text only", 1, None);

        let outcome = fx.publisher().process_item(&fx.feed, &item).await.unwrap();

        assert_eq!(outcome, ItemOutcome::Skipped);
        assert_eq!(fx.state(&item), PublicationState::Published);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_marks_published() {
        let fx = Fixture::new().await;
        let item = fx.add_item("Broken link", 1, Some("missing"));

        let outcome = fx.publisher().process_item(&fx.feed, &item).await.unwrap();

        assert_eq!(outcome, ItemOutcome::Skipped);
        assert_eq!(fx.state(&item), PublicationState::Published);
        assert!(fx.notifier.sent().is_empty());
        assert_eq!(fx.files_left(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_stays_unpublished() {
        let fx = Fixture::new().await;
        let item = fx.add_item("Pilot", 1, Some("ok"));
        fx.notifier.fail_with("Bad Gateway");

        let outcome = fx.publisher().process_item(&fx.feed, &item).await.unwrap();

        assert_eq!(outcome, ItemOutcome::Retry);
        assert_eq!(fx.state(&item), PublicationState::Unpublished);
        assert_eq!(fx.files_left(), 0);
    }

    #[tokio::test]
    async fn test_permanent_rejections_count_as_delivered() {
        for marker in PERMANENT_REJECTIONS {
            let fx = Fixture::new().await;
            let item = fx.add_item("Huge", 1, Some("ok"));
            fx.notifier.fail_with(&format!("Bad Request: {}", marker));

            let outcome = fx.publisher().process_item(&fx.feed, &item).await.unwrap();

            assert_eq!(outcome, ItemOutcome::Delivered);
            assert_eq!(fx.state(&item), PublicationState::Published);
        }
    }

    #[tokio::test]
    async fn test_missing_credential_halts_and_keeps_file() {
        let fx = Fixture::new().await;
        let item = fx.add_item("Pilot", 1, Some("ok"));

        let err = fx
            .publisher_with(None)
            .process_item(&fx.feed, &item)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::MissingCredential));
        assert_eq!(fx.state(&item), PublicationState::Unpublished);
        assert_eq!(fx.files_left(), 1);
    }

    #[tokio::test]
    async fn test_publish_all_ready_goes_oldest_first() {
        let fx = Fixture::new().await;
        fx.add_item("Third", 3, Some("ok"));
        fx.add_item("First", 1, Some("ok"));
        fx.add_item("Second", 2, None);

        let report = fx.publisher().publish_all_ready().await.unwrap();

        assert_eq!(
            report,
            PublishReport {
                delivered: 2,
                skipped: 1,
                failed: 0
            }
        );
        let captions: Vec<String> = fx.notifier.sent().into_iter().map(|s| s.caption).collect();
        assert_eq!(captions, vec!["*First*\n\n", "*Third*\n\n"]);
        assert!(fx.store.get_unpublished_items(fx.feed.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_ready_feed_is_ignored_by_batch_runs() {
        let fx = Fixture::new().await;
        fx.store
            .update_feed_settings(
                fx.feed.id,
                &FeedSettings {
                    publish_ready: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let item = fx.add_item("Pilot", 1, Some("ok"));

        let report = fx.publisher().publish_all_ready().await.unwrap();
        assert_eq!(report, PublishReport::default());
        assert_eq!(fx.state(&item), PublicationState::Unpublished);

        // Explicit per-feed delivery still works
        let report = fx
            .publisher()
            .publish_next_for_feed(fx.feed.id)
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_publish_one_per_feed_takes_oldest() {
        let fx = Fixture::new().await;
        let later = fx.add_item("Later", 5, Some("ok"));
        let earlier = fx.add_item("Earlier", 2, Some("ok"));

        let report = fx.publisher().publish_one_per_feed().await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(fx.state(&earlier), PublicationState::Published);
        assert_eq!(fx.state(&later), PublicationState::Unpublished);
    }

    #[tokio::test]
    async fn test_publish_next_unknown_feed() {
        let fx = Fixture::new().await;
        let err = fx.publisher().publish_next_for_feed(999).await.unwrap_err();
        assert!(matches!(err, RelayError::FeedNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_channel_is_retryable() {
        let fx = Fixture::new().await;
        let mut feed = fx.feed.clone();
        feed.tg_channel = None;
        let item = fx.add_item("Pilot", 1, Some("ok"));

        let outcome = fx.publisher().process_item(&feed, &item).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Retry);
        assert_eq!(fx.state(&item), PublicationState::Unpublished);
    }
}
