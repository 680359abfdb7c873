use crate::app::{RelayError, Result};
use crate::domain::{Feed, NewFeed, NewImage};
use crate::fetcher::{DocumentImage, FeedDocument, FeedSource};
use crate::store::Store;

fn image_of(document: &FeedDocument) -> Option<NewImage> {
    document
        .image
        .as_ref()
        .filter(|image| !image.url.is_empty())
        .map(|DocumentImage { url, title }| NewImage {
            url: url.clone(),
            title: title.clone(),
        })
}

/// Register the feed at `url`, or return the record it already maps to.
///
/// Resolution order is URL, then title, then a new record. A title match
/// keeps the stored URL, so a feed that moved hosts is not duplicated.
pub async fn register_feed<S: Store + ?Sized>(
    store: &S,
    source: &(dyn FeedSource + Send + Sync),
    url: &str,
) -> Result<Feed> {
    let document = source.fetch(url).await?;

    let feed = if let Some(existing) = store.get_feed_by_url(url)? {
        tracing::info!(feed = %existing.display_title(), "Feed already registered");
        existing
    } else if let Some(existing) = lookup_by_title(store, &document.title)? {
        tracing::info!(
            feed = %existing.display_title(),
            stored_url = %existing.url,
            requested_url = url,
            "Feed with the same title exists; keeping stored record"
        );
        existing
    } else {
        let feed = store.create_feed(&NewFeed {
            title: document.title.clone(),
            description: document.description.clone(),
            link: document.link.clone(),
            url: url.to_string(),
        })?;
        tracing::info!(id = feed.id, feed = %feed.display_title(), "Registered feed");
        feed
    };

    if let Some(image) = image_of(&document) {
        if let Err(e) = store.find_or_create_image(feed.id, &image) {
            tracing::warn!(feed = %feed.display_title(), error = %e, "Failed to store feed image");
        }
    }

    Ok(feed)
}

fn lookup_by_title<S: Store + ?Sized>(store: &S, title: &str) -> Result<Option<Feed>> {
    if title.is_empty() {
        return Ok(None);
    }
    store.get_feed_by_title(title)
}

/// Re-fetch every registered feed and bring its stored image in line with
/// the document. Per-feed failures are logged and the pass continues.
pub async fn resync_feeds<S: Store + ?Sized>(
    store: &S,
    source: &(dyn FeedSource + Send + Sync),
) -> Result<()> {
    let feeds = store.get_all_feeds()?;
    let total = feeds.len();
    let mut failed = 0;

    for feed in &feeds {
        let outcome = match source.fetch(&feed.url).await {
            Ok(document) => reconcile_image(store, feed, image_of(&document)),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            failed += 1;
            tracing::warn!(
                feed = %feed.display_title(),
                url = %feed.url,
                error = %e,
                "Resync failed"
            );
        }
    }

    if failed > 0 {
        return Err(RelayError::Batch {
            operation: "resync",
            failed,
            total,
        });
    }

    tracing::info!(feeds = total, "Resync complete");
    Ok(())
}

fn reconcile_image<S: Store + ?Sized>(
    store: &S,
    feed: &Feed,
    wanted: Option<NewImage>,
) -> Result<()> {
    match (wanted, store.get_image(feed.id)?) {
        (Some(image), Some(current)) => {
            if current.url != image.url || current.title != image.title {
                store.update_image(current.id, &image)?;
                tracing::debug!(feed = %feed.display_title(), "Updated feed image");
            }
        }
        (Some(image), None) => {
            store.find_or_create_image(feed.id, &image)?;
            tracing::debug!(feed = %feed.display_title(), "Added feed image");
        }
        (None, Some(current)) => {
            store.delete_image(current.id)?;
            tracing::debug!(feed = %feed.display_title(), "Removed feed image");
        }
        (None, None) => {}
    }
    Ok(())
}
