//! In-process fakes for the fetch and delivery seams.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::app::{RelayError, Result};
use crate::fetcher::{DocumentEnclosure, DocumentItem, FeedDocument, FeedSource};
use crate::notifier::{AudioPayload, Notifier, ParseMode};

/// Serves canned documents keyed by URL. Unknown URLs fail like a parse error.
#[derive(Default)]
pub struct StaticFeedSource {
    documents: Mutex<HashMap<String, FeedDocument>>,
    fetches: Mutex<Vec<String>>,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, document: FeedDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), document);
    }

    pub fn remove(&self, url: &str) {
        self.documents.lock().unwrap().remove(url);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        self.fetches.lock().unwrap().push(url.to_string());
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RelayError::FeedParse(format!("no document at {}", url)))
    }
}

#[derive(Debug, Clone)]
pub struct SentAudio {
    pub channel_id: i64,
    pub path: PathBuf,
    pub file_name: String,
    pub caption: String,
    pub mode: ParseMode,
    pub file_existed: bool,
}

/// Records every delivery. `fail_with` makes subsequent sends fail with a
/// delivery error carrying that text.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentAudio>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn sent(&self) -> Vec<SentAudio> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        channel_id: i64,
        audio: &AudioPayload,
        caption: &str,
        mode: ParseMode,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(SentAudio {
            channel_id,
            path: audio.path.clone(),
            file_name: audio.file_name.clone(),
            caption: caption.to_string(),
            mode,
            file_existed: audio.path.exists(),
        });

        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(RelayError::Delivery(message)),
            None => Ok(()),
        }
    }
}

pub fn document(title: &str, items: Vec<DocumentItem>) -> FeedDocument {
    FeedDocument {
        title: title.to_string(),
        description: format!("{} description", title),
        link: format!("https://{}.example", title.to_lowercase().replace(' ', "-")),
        image: None,
        items,
    }
}

pub fn episode(title: &str, enclosure_url: Option<&str>) -> DocumentItem {
    DocumentItem {
        title: title.to_string(),
        enclosures: enclosure_url
            .map(|url| {
                vec![DocumentEnclosure {
                    url: url.to_string(),
                    length: "1024".to_string(),
                    media_type: "audio/mpeg".to_string(),
                }]
            })
            .unwrap_or_default(),
        ..Default::default()
    }
}
