pub mod enclosure;
pub mod feed;
pub mod item;

pub use enclosure::{Enclosure, NewEnclosure};
pub use feed::{Feed, FeedSettings, Image, NewFeed, NewImage};
pub use item::{Item, ItunesMeta, NewItem, PublicationState};
