use crate::app::{RelayError, Result};
use crate::domain::{Feed, NewEnclosure, NewItem};
use crate::fetcher::{DocumentEnclosure, DocumentItem};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub created: usize,
    pub existing: usize,
    pub enclosures: usize,
}

fn candidate(feed_id: i64, doc: &DocumentItem) -> NewItem {
    NewItem {
        feed_id,
        title: doc.title.clone(),
        description: doc.description.clone(),
        content: doc.content.clone(),
        link: doc.link.clone(),
        updated: doc.updated.clone(),
        updated_at: doc.updated_at,
        published: doc.published.clone(),
        published_at: doc.published_at,
        itunes: doc.itunes.clone().unwrap_or_default(),
    }
}

fn parse_enclosure(enc: &DocumentEnclosure) -> Result<NewEnclosure> {
    let invalid = |reason: String| RelayError::InvalidEnclosureLength {
        url: enc.url.clone(),
        value: enc.length.clone(),
        reason,
    };

    let length = enc
        .length
        .parse::<u64>()
        .map_err(|e| invalid(e.to_string()))?;
    // The store keeps lengths as signed 64-bit integers
    if i64::try_from(length).is_err() {
        return Err(invalid("exceeds the storable range".into()));
    }

    Ok(NewEnclosure {
        url: enc.url.clone(),
        length,
        media_type: enc.media_type.clone(),
    })
}

/// Persist a batch of fetched items for `feed`.
///
/// Items are matched by title: an existing item is never overwritten and keeps
/// its publication state, but its enclosures are still reconciled. A malformed
/// enclosure length stops the batch at that point; everything written before
/// it, including the owning item, stays persisted.
pub fn ingest_items<S: Store + ?Sized>(
    store: &S,
    feed: &Feed,
    items: &[DocumentItem],
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for doc in items {
        let (item, created) = store.find_or_create_item(&candidate(feed.id, doc))?;
        if created {
            report.created += 1;
        } else {
            report.existing += 1;
        }

        for enc in &doc.enclosures {
            let enclosure = parse_enclosure(enc).inspect_err(|e| {
                tracing::warn!(
                    feed = %feed.display_title(),
                    item = %item.display_title(),
                    url = %enc.url,
                    error = %e,
                    "Rejecting enclosure"
                );
            })?;
            store.find_or_create_enclosure(item.id, &enclosure)?;
            report.enclosures += 1;
        }
    }

    tracing::debug!(
        feed = %feed.display_title(),
        created = report.created,
        existing = report.existing,
        "Ingested items"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewFeed, PublicationState};
    use crate::store::SqliteStore;

    fn setup() -> (SqliteStore, Feed) {
        let store = SqliteStore::in_memory().unwrap();
        let feed = store
            .create_feed(&NewFeed {
                title: "Show".into(),
                url: "https://show.example/rss".into(),
                ..Default::default()
            })
            .unwrap();
        (store, feed)
    }

    fn doc_item(title: &str, enclosures: &[(&str, &str)]) -> DocumentItem {
        DocumentItem {
            title: title.into(),
            description: format!("About {}", title),
            enclosures: enclosures
                .iter()
                .map(|(url, length)| DocumentEnclosure {
                    url: url.to_string(),
                    length: length.to_string(),
                    media_type: "audio/mpeg".into(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ingest_creates_items_and_enclosures() {
        let (store, feed) = setup();
        let items = vec![
            doc_item("A", &[("https://cdn.example/a.mp3", "100")]),
            doc_item("B", &[]),
        ];

        let report = ingest_items(&store, &feed, &items).unwrap();
        assert_eq!(
            report,
            IngestReport {
                created: 2,
                existing: 0,
                enclosures: 1
            }
        );

        let a = store.get_item_by_title("A").unwrap().unwrap();
        assert_eq!(a.state, PublicationState::Unpublished);
        assert_eq!(store.get_enclosures(a.id).unwrap()[0].length, 100);
    }

    #[test]
    fn test_second_batch_keeps_existing_item_and_state() {
        let (store, feed) = setup();
        ingest_items(&store, &feed, &[doc_item("X", &[])]).unwrap();

        let x = store.get_item_by_title("X").unwrap().unwrap();
        store.mark_published(x.id).unwrap();

        let mut again = doc_item("X", &[]);
        again.description = "changed upstream".into();
        let report = ingest_items(&store, &feed, &[again]).unwrap();
        assert_eq!(report.existing, 1);

        let items = store.get_items_by_feed(feed.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].state, PublicationState::Published);
        assert_eq!(items[0].description, "About X");
    }

    #[test]
    fn test_bad_length_keeps_item_but_drops_enclosure() {
        let (store, feed) = setup();
        let items = vec![
            doc_item("Good", &[("https://cdn.example/good.mp3", "10")]),
            doc_item("Bad", &[("https://cdn.example/bad.mp3", "not-a-number")]),
            doc_item("Never", &[]),
        ];

        let err = ingest_items(&store, &feed, &items).unwrap_err();
        assert!(matches!(err, RelayError::InvalidEnclosureLength { .. }));

        let bad = store.get_item_by_title("Bad").unwrap().unwrap();
        assert!(store.get_enclosures(bad.id).unwrap().is_empty());

        let good = store.get_item_by_title("Good").unwrap().unwrap();
        assert_eq!(store.get_enclosures(good.id).unwrap().len(), 1);

        // Fail-fast: nothing after the failing item is processed
        assert!(store.get_item_by_title("Never").unwrap().is_none());
    }

    #[test]
    fn test_earlier_enclosures_of_failing_item_survive() {
        let (store, feed) = setup();
        let items = vec![doc_item(
            "Mixed",
            &[
                ("https://cdn.example/first.mp3", "5"),
                ("https://cdn.example/second.mp3", ""),
            ],
        )];

        assert!(ingest_items(&store, &feed, &items).is_err());

        let mixed = store.get_item_by_title("Mixed").unwrap().unwrap();
        let enclosures = store.get_enclosures(mixed.id).unwrap();
        assert_eq!(enclosures.len(), 1);
        assert_eq!(enclosures[0].url, "https://cdn.example/first.mp3");
    }

    #[test]
    fn test_enclosure_url_not_duplicated() {
        let (store, feed) = setup();
        let item = doc_item("A", &[("https://cdn.example/a.mp3", "100")]);

        ingest_items(&store, &feed, &[item.clone()]).unwrap();
        ingest_items(&store, &feed, &[item]).unwrap();

        let a = store.get_item_by_title("A").unwrap().unwrap();
        assert_eq!(store.get_enclosures(a.id).unwrap().len(), 1);
    }

    #[test]
    fn test_oversized_length_is_rejected_as_invalid() {
        let (store, feed) = setup();
        let too_big = u64::MAX.to_string();
        let items = vec![
            doc_item("Huge", &[("https://cdn.example/huge.mp3", too_big.as_str())]),
            doc_item("Later", &[]),
        ];

        let err = ingest_items(&store, &feed, &items).unwrap_err();
        match err {
            RelayError::InvalidEnclosureLength { value, .. } => assert_eq!(value, too_big),
            other => panic!("unexpected error: {other:?}"),
        }

        let huge = store.get_item_by_title("Huge").unwrap().unwrap();
        assert!(store.get_enclosures(huge.id).unwrap().is_empty());
        assert!(store.get_item_by_title("Later").unwrap().is_none());
    }

    #[test]
    fn test_largest_storable_length_accepted() {
        let (store, feed) = setup();
        let max = i64::MAX.to_string();
        let items = vec![doc_item("Max", &[("https://cdn.example/max.mp3", max.as_str())])];

        ingest_items(&store, &feed, &items).unwrap();

        let item = store.get_item_by_title("Max").unwrap().unwrap();
        assert_eq!(
            store.get_enclosures(item.id).unwrap()[0].length,
            i64::MAX as u64
        );
    }
}
