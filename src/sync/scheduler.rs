use crate::app::{RelayError, Result};
use crate::fetcher::{DocumentItem, FeedSource};
use crate::store::Store;
use crate::sync::ingest::{ingest_items, IngestReport};

/// The first `limit` entries in document order.
fn window(items: &[DocumentItem], limit: usize) -> &[DocumentItem] {
    &items[..items.len().min(limit)]
}

/// Fetch every registered feed and ingest at most `limit` items from each.
///
/// A failing feed does not stop the others; the run reports an aggregate
/// error when any feed failed.
pub async fn check_all<S: Store + ?Sized>(
    store: &S,
    source: &(dyn FeedSource + Send + Sync),
    limit: usize,
) -> Result<IngestReport> {
    let feeds = store.get_all_feeds()?;
    if feeds.is_empty() {
        tracing::info!("No feeds to check");
        return Ok(IngestReport::default());
    }

    let total = feeds.len();
    let mut failed = 0;
    let mut summary = IngestReport::default();

    for feed in &feeds {
        let document = match source.fetch(&feed.url).await {
            Ok(document) => document,
            Err(e) => {
                failed += 1;
                tracing::warn!(feed = %feed.display_title(), url = %feed.url, error = %e, "Failed to fetch feed");
                continue;
            }
        };

        match ingest_items(store, feed, window(&document.items, limit)) {
            Ok(report) => {
                if report.created > 0 {
                    tracing::info!(feed = %feed.display_title(), new_items = report.created, "Checked feed");
                }
                summary.created += report.created;
                summary.existing += report.existing;
                summary.enclosures += report.enclosures;
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(feed = %feed.display_title(), error = %e, "Failed to ingest feed");
            }
        }
    }

    tracing::info!(
        feeds = total,
        failed,
        new_items = summary.created,
        "Feed check complete"
    );

    if failed > 0 {
        return Err(RelayError::Batch {
            operation: "check",
            failed,
            total,
        });
    }
    Ok(summary)
}

/// Ingest up to `limit` items of the single feed titled `title`.
pub async fn full_sync<S: Store + ?Sized>(
    store: &S,
    source: &(dyn FeedSource + Send + Sync),
    title: &str,
    limit: usize,
) -> Result<IngestReport> {
    let feed = store
        .get_feed_by_title(title)?
        .ok_or_else(|| RelayError::FeedNotFound(title.to_string()))?;

    let document = source.fetch(&feed.url).await?;
    let report = ingest_items(store, &feed, window(&document.items, limit))?;

    tracing::info!(
        feed = %feed.display_title(),
        new_items = report.created,
        existing = report.existing,
        "Full sync complete"
    );
    Ok(report)
}
