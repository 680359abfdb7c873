use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of an item. The store only ever moves it from
/// `Unpublished` to `Published`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicationState {
    #[default]
    Unpublished,
    Published,
}

impl PublicationState {
    pub fn as_i64(self) -> i64 {
        match self {
            PublicationState::Unpublished => 0,
            PublicationState::Published => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(PublicationState::Unpublished),
            1 => Some(PublicationState::Published),
            _ => None,
        }
    }

    pub fn is_published(self) -> bool {
        self == PublicationState::Published
    }
}

/// iTunes podcast extension fields carried by an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItunesMeta {
    pub author: String,
    pub duration: String,
    pub explicit: String,
    pub subtitle: String,
    pub summary: String,
    pub image: String,
    pub episode: String,
    pub season: String,
    pub episode_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
    pub updated: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub published: String,
    pub published_at: Option<DateTime<Utc>>,
    pub state: PublicationState,
    pub itunes: ItunesMeta,
}

impl Item {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    pub fn subtitle(&self) -> &str {
        &self.itunes.subtitle
    }
}

/// Candidate item built during ingestion. New records always start
/// unpublished, so there is no state field here.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub feed_id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
    pub updated: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub published: String,
    pub published_at: Option<DateTime<Utc>>,
    pub itunes: ItunesMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrips_through_integer_column() {
        for state in [PublicationState::Unpublished, PublicationState::Published] {
            assert_eq!(PublicationState::from_i64(state.as_i64()), Some(state));
        }
        assert_eq!(PublicationState::from_i64(2), None);
    }

    #[test]
    fn test_default_is_unpublished() {
        assert!(!PublicationState::default().is_published());
    }
}
