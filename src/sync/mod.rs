pub mod ingest;
pub mod registrar;
pub mod scheduler;

pub use ingest::{ingest_items, IngestReport};
pub use registrar::{register_feed, resync_feeds};
pub use scheduler::{check_all, full_sync};
