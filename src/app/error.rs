use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Invalid enclosure length '{value}' for {url}: {reason}")]
    InvalidEnclosureLength {
        url: String,
        value: String,
        reason: String,
    },

    #[error("Download of {url} failed with status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Telegram bot token is not configured")]
    MissingCredential,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{failed} of {total} feeds failed during {operation}")]
    Batch {
        operation: &'static str,
        failed: usize,
        total: usize,
    },
}

impl RelayError {
    /// Configuration faults halt a whole publish run instead of a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::MissingCredential | RelayError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
