//! # podrelay
//!
//! Mirrors podcast feeds into Telegram channels.
//!
//! ## Architecture
//!
//! ```text
//! FeedSource → Normalizer → sync (ingest) → Store → Publisher → Notifier
//! ```
//!
//! Feeds are registered once, then checked periodically. New episodes are
//! stored as unpublished items; the publisher downloads each item's audio,
//! uploads it with a caption and marks the item published.
//!
//! ## Quick Start
//!
//! ```bash
//! # Register a feed and enable it
//! podrelay add-feed https://example.com/podcast.xml
//! podrelay feed-config 1 --ready true --channel -1001234567890
//!
//! # Pull new episodes and deliver them
//! podrelay check-feeds
//! podrelay publish-items
//!
//! # Or keep doing both every ten minutes
//! podrelay service
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together configuration,
/// store, feed source and the publisher.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration file and environment overrides.
pub mod config;

/// Core domain models.
///
/// - [`Feed`](domain::Feed) and [`Image`](domain::Image): registered sources
/// - [`Item`](domain::Item): episodes with a one-way
///   [`PublicationState`](domain::PublicationState)
/// - [`Enclosure`](domain::Enclosure): attached media
pub mod domain;

/// Feed retrieval.
///
/// - [`FeedSource`](fetcher::FeedSource): async trait returning parsed documents
/// - [`HttpFeedSource`](fetcher::HttpFeedSource): reqwest-based implementation
pub mod fetcher;

/// Feed parsing via feed-rs into [`FeedDocument`](fetcher::FeedDocument)s.
pub mod normalizer;

/// Delivery channels.
///
/// - [`Notifier`](notifier::Notifier): async trait for audio uploads
/// - [`TelegramNotifier`](notifier::TelegramNotifier): Bot API `sendAudio`
pub mod notifier;

/// Download, caption and delivery of pending items.
pub mod publish;

/// The periodic sync and publish loop.
pub mod service;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Registration, resync and bounded ingestion of feeds.
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
