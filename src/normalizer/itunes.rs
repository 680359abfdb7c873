//! iTunes item tags that feed-rs does not surface.
//!
//! feed-rs folds `itunes:summary` into the media description and drops
//! `itunes:subtitle`, `itunes:explicit`, `itunes:episode`, `itunes:season` and
//! `itunes:episodeType`. They are read here in a second pass over the raw body.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Raw iTunes tag text of one item. Missing tags stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItunesTags {
    pub subtitle: String,
    pub explicit: String,
    pub episode: String,
    pub season: String,
    pub episode_type: String,
}

impl ItunesTags {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
enum Tag {
    Subtitle,
    Explicit,
    Episode,
    Season,
    EpisodeType,
}

impl Tag {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"itunes:subtitle" => Some(Tag::Subtitle),
            b"itunes:explicit" => Some(Tag::Explicit),
            b"itunes:episode" => Some(Tag::Episode),
            b"itunes:season" => Some(Tag::Season),
            b"itunes:episodeType" => Some(Tag::EpisodeType),
            _ => None,
        }
    }

    fn slot(self, tags: &mut ItunesTags) -> &mut String {
        match self {
            Tag::Subtitle => &mut tags.subtitle,
            Tag::Explicit => &mut tags.explicit,
            Tag::Episode => &mut tags.episode,
            Tag::Season => &mut tags.season,
            Tag::EpisodeType => &mut tags.episode_type,
        }
    }
}

fn is_item(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

/// One entry per `<item>` (or Atom `<entry>`) in document order, so the result
/// lines up index by index with feed-rs entries.
///
/// A malformed document ends the scan early; items seen up to that point are
/// still returned.
pub fn scan_items(body: &[u8]) -> Vec<ItunesTags> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    let mut current: Option<ItunesTags> = None;
    let mut open: Option<Tag> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if is_item(name.as_ref()) {
                    current = Some(ItunesTags::default());
                    open = None;
                } else if current.is_some() {
                    open = Tag::from_name(name.as_ref());
                }
            }
            Ok(Event::Empty(e)) if is_item(e.name().as_ref()) => {
                items.push(ItunesTags::default());
            }
            Ok(Event::Text(t)) => {
                if let (Some(tags), Some(tag)) = (current.as_mut(), open) {
                    match t.unescape() {
                        Ok(text) => tag.slot(tags).push_str(&text),
                        Err(e) => tracing::debug!(error = %e, "Skipping undecodable iTunes text"),
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(tags), Some(tag)) = (current.as_mut(), open) {
                    tag.slot(tags).push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                if is_item(e.name().as_ref()) {
                    if let Some(tags) = current.take() {
                        items.push(tags);
                    }
                }
                open = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, items = items.len(), "Stopped iTunes tag scan");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    items
}
