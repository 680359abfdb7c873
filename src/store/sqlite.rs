use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{RelayError, Result};
use crate::domain::{
    Enclosure, Feed, FeedSettings, Image, Item, ItunesMeta, NewEnclosure, NewFeed, NewImage,
    NewItem, PublicationState,
};
use crate::store::Store;

const FEED_COLUMNS: &str = "id, title, description, link, url, publish_ready, tg_channel,
     extra_link_enabled, extra_link, created_at";

const ITEM_COLUMNS: &str = "id, feed_id, title, description, content, link, updated, updated_at,
     published, published_at, tg_published, itunes_author, itunes_duration, itunes_explicit,
     itunes_subtitle, itunes_summary, itunes_image, itunes_episode, itunes_season,
     itunes_episode_type";

const ENCLOSURE_COLUMNS: &str = "id, item_id, url, length, media_type";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| RelayError::Config(format!("database migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            RelayError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            link: row.get(3)?,
            url: row.get(4)?,
            publish_ready: row.get(5)?,
            tg_channel: row.get::<_, Option<i64>>(6)?.filter(|id| *id != 0),
            extra_link_enabled: row.get(7)?,
            extra_link: row.get(8)?,
            created_at: row
                .get::<_, String>(9)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
        let raw_state: i64 = row.get(10)?;
        let state = PublicationState::from_i64(raw_state)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(10, raw_state))?;

        Ok(Item {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            content: row.get(4)?,
            link: row.get(5)?,
            updated: row.get(6)?,
            updated_at: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| Self::parse_datetime(&s)),
            published: row.get(8)?,
            published_at: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| Self::parse_datetime(&s)),
            state,
            itunes: ItunesMeta {
                author: row.get(11)?,
                duration: row.get(12)?,
                explicit: row.get(13)?,
                subtitle: row.get(14)?,
                summary: row.get(15)?,
                image: row.get(16)?,
                episode: row.get(17)?,
                season: row.get(18)?,
                episode_type: row.get(19)?,
            },
        })
    }

    fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
        Ok(Image {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
        })
    }

    fn enclosure_from_row(row: &Row<'_>) -> rusqlite::Result<Enclosure> {
        let raw_length: i64 = row.get(3)?;
        let length = u64::try_from(raw_length)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(3, raw_length))?;

        Ok(Enclosure {
            id: row.get(0)?,
            item_id: row.get(1)?,
            url: row.get(2)?,
            length,
            media_type: row.get(4)?,
        })
    }

    fn query_feed(&self, filter: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM feeds WHERE {} = ?1 ORDER BY id LIMIT 1",
            FEED_COLUMNS, filter
        );
        let feed = conn
            .query_row(&sql, [value], Self::feed_from_row)
            .optional()?;
        Ok(feed)
    }

    fn query_item(conn: &Connection, filter: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE {} = ?1 ORDER BY id LIMIT 1",
            ITEM_COLUMNS, filter
        );
        let item = conn
            .query_row(&sql, [value], Self::item_from_row)
            .optional()?;
        Ok(item)
    }
}

impl Store for SqliteStore {
    fn create_feed(&self, feed: &NewFeed) -> Result<Feed> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO feeds (title, description, link, url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    feed.title,
                    feed.description,
                    feed.link,
                    feed.url,
                    Self::format_datetime(&Utc::now())
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get_feed(id)?
            .ok_or_else(|| RelayError::FeedNotFound(feed.url.clone()))
    }

    fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        self.query_feed("id", &id)
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        self.query_feed("url", &url)
    }

    fn get_feed_by_title(&self, title: &str) -> Result<Option<Feed>> {
        self.query_feed("title", &title)
    }

    fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM feeds ORDER BY id", FEED_COLUMNS))?;
        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn get_ready_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feeds WHERE publish_ready = 1 ORDER BY id",
            FEED_COLUMNS
        ))?;
        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn update_feed_settings(&self, id: i64, settings: &FeedSettings) -> Result<()> {
        let conn = self.conn()?;

        if let Some(ready) = settings.publish_ready {
            conn.execute(
                "UPDATE feeds SET publish_ready = ?1 WHERE id = ?2",
                params![ready, id],
            )?;
        }
        if let Some(channel) = settings.tg_channel {
            conn.execute(
                "UPDATE feeds SET tg_channel = ?1 WHERE id = ?2",
                params![channel, id],
            )?;
        }
        if let Some(enabled) = settings.extra_link_enabled {
            conn.execute(
                "UPDATE feeds SET extra_link_enabled = ?1 WHERE id = ?2",
                params![enabled, id],
            )?;
        }
        if let Some(ref link) = settings.extra_link {
            conn.execute(
                "UPDATE feeds SET extra_link = ?1 WHERE id = ?2",
                params![link, id],
            )?;
        }

        Ok(())
    }

    fn get_image(&self, feed_id: i64) -> Result<Option<Image>> {
        let conn = self.conn()?;
        let image = conn
            .query_row(
                "SELECT id, feed_id, url, title FROM images WHERE feed_id = ?1",
                params![feed_id],
                Self::image_from_row,
            )
            .optional()?;
        Ok(image)
    }

    fn find_or_create_image(&self, feed_id: i64, image: &NewImage) -> Result<Image> {
        if let Some(existing) = self.get_image(feed_id)? {
            return Ok(existing);
        }

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO images (feed_id, url, title) VALUES (?1, ?2, ?3)",
                params![feed_id, image.url, image.title],
            )?;
            conn.last_insert_rowid()
        };

        Ok(Image {
            id,
            feed_id,
            url: image.url.clone(),
            title: image.title.clone(),
        })
    }

    fn update_image(&self, id: i64, image: &NewImage) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE images SET url = ?1, title = ?2 WHERE id = ?3",
            params![image.url, image.title, id],
        )?;
        Ok(())
    }

    fn delete_image(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM images WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn find_or_create_item(&self, item: &NewItem) -> Result<(Item, bool)> {
        let conn = self.conn()?;

        if let Some(existing) = Self::query_item(&conn, "title", &item.title)? {
            return Ok((existing, false));
        }

        conn.execute(
            "INSERT INTO items (feed_id, title, description, content, link, updated, updated_at,
                 published, published_at, tg_published, itunes_author, itunes_duration,
                 itunes_explicit, itunes_subtitle, itunes_summary, itunes_image, itunes_episode,
                 itunes_season, itunes_episode_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19)",
            params![
                item.feed_id,
                item.title,
                item.description,
                item.content,
                item.link,
                item.updated,
                item.updated_at.as_ref().map(Self::format_datetime),
                item.published,
                item.published_at.as_ref().map(Self::format_datetime),
                PublicationState::Unpublished.as_i64(),
                item.itunes.author,
                item.itunes.duration,
                item.itunes.explicit,
                item.itunes.subtitle,
                item.itunes.summary,
                item.itunes.image,
                item.itunes.episode,
                item.itunes.season,
                item.itunes.episode_type,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let created = Self::query_item(&conn, "id", &id)?
            .ok_or_else(|| RelayError::Database(rusqlite::Error::QueryReturnedNoRows))?;
        Ok((created, true))
    }

    fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.conn()?;
        Self::query_item(&conn, "id", &id)
    }

    fn get_item_by_title(&self, title: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;
        Self::query_item(&conn, "title", &title)
    }

    fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE feed_id = ?1 ORDER BY id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![feed_id], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn get_unpublished_items(&self, feed_id: i64) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE feed_id = ?1 AND tg_published = ?2
             ORDER BY published_at ASC, id ASC",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(
                params![feed_id, PublicationState::Unpublished.as_i64()],
                Self::item_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn get_first_unpublished_item(&self, feed_id: i64) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM items WHERE feed_id = ?1 AND tg_published = ?2
                     ORDER BY published_at ASC, id ASC LIMIT 1",
                    ITEM_COLUMNS
                ),
                params![feed_id, PublicationState::Unpublished.as_i64()],
                Self::item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn mark_published(&self, item_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE items SET tg_published = ?1 WHERE id = ?2 AND tg_published = ?3",
            params![
                PublicationState::Published.as_i64(),
                item_id,
                PublicationState::Unpublished.as_i64()
            ],
        )?;
        Ok(changed > 0)
    }

    fn find_or_create_enclosure(
        &self,
        item_id: i64,
        enclosure: &NewEnclosure,
    ) -> Result<Enclosure> {
        let conn = self.conn()?;

        let existing = conn
            .query_row(
                &format!(
                    "SELECT {} FROM enclosures WHERE url = ?1 ORDER BY id LIMIT 1",
                    ENCLOSURE_COLUMNS
                ),
                params![enclosure.url],
                Self::enclosure_from_row,
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        // SQLite integers are signed
        let length = i64::try_from(enclosure.length)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        conn.execute(
            "INSERT INTO enclosures (item_id, url, length, media_type) VALUES (?1, ?2, ?3, ?4)",
            params![item_id, enclosure.url, length, enclosure.media_type],
        )?;

        Ok(Enclosure {
            id: conn.last_insert_rowid(),
            item_id,
            url: enclosure.url.clone(),
            length: enclosure.length,
            media_type: enclosure.media_type.clone(),
        })
    }

    fn get_enclosures(&self, item_id: i64) -> Result<Vec<Enclosure>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM enclosures WHERE item_id = ?1 ORDER BY id",
            ENCLOSURE_COLUMNS
        ))?;
        let enclosures = stmt
            .query_map(params![item_id], Self::enclosure_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(enclosures)
    }

    fn get_first_enclosure(&self, item_id: i64) -> Result<Option<Enclosure>> {
        let conn = self.conn()?;
        let enclosure = conn
            .query_row(
                &format!(
                    "SELECT {} FROM enclosures WHERE item_id = ?1 ORDER BY id LIMIT 1",
                    ENCLOSURE_COLUMNS
                ),
                params![item_id],
                Self::enclosure_from_row,
            )
            .optional()?;
        Ok(enclosure)
    }
}
