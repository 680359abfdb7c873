pub mod sqlite;

use crate::app::Result;
use crate::domain::{
    Enclosure, Feed, FeedSettings, Image, Item, NewEnclosure, NewFeed, NewImage, NewItem,
};

pub use sqlite::SqliteStore;

pub trait Store {
    // Feed operations
    fn create_feed(&self, feed: &NewFeed) -> Result<Feed>;
    fn get_feed(&self, id: i64) -> Result<Option<Feed>>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn get_feed_by_title(&self, title: &str) -> Result<Option<Feed>>;
    fn get_all_feeds(&self) -> Result<Vec<Feed>>;
    fn get_ready_feeds(&self) -> Result<Vec<Feed>>;
    fn update_feed_settings(&self, id: i64, settings: &FeedSettings) -> Result<()>;

    // Image operations
    fn get_image(&self, feed_id: i64) -> Result<Option<Image>>;
    fn find_or_create_image(&self, feed_id: i64, image: &NewImage) -> Result<Image>;
    fn update_image(&self, id: i64, image: &NewImage) -> Result<()>;
    fn delete_image(&self, id: i64) -> Result<()>;

    // Item operations
    /// Looks an item up by title and creates it only when none exists.
    /// The flag is `true` when a new row was inserted.
    fn find_or_create_item(&self, item: &NewItem) -> Result<(Item, bool)>;
    fn get_item(&self, id: i64) -> Result<Option<Item>>;
    fn get_item_by_title(&self, title: &str) -> Result<Option<Item>>;
    fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<Item>>;
    fn get_unpublished_items(&self, feed_id: i64) -> Result<Vec<Item>>;
    fn get_first_unpublished_item(&self, feed_id: i64) -> Result<Option<Item>>;
    /// Applies the `Unpublished -> Published` transition. Returns `false`
    /// when the item was already published or does not exist.
    fn mark_published(&self, item_id: i64) -> Result<bool>;

    // Enclosure operations
    fn find_or_create_enclosure(&self, item_id: i64, enclosure: &NewEnclosure)
        -> Result<Enclosure>;
    fn get_enclosures(&self, item_id: i64) -> Result<Vec<Enclosure>>;
    fn get_first_enclosure(&self, item_id: i64) -> Result<Option<Enclosure>>;
}
