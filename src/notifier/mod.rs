pub mod telegram;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::Result;

pub use telegram::TelegramNotifier;

/// A local audio file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub path: PathBuf,
    pub mime: String,
    pub file_name: String,
}

/// Caption formatting requested from the Bot API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Markdown => "Markdown",
        }
    }
}

#[async_trait]
pub trait Notifier {
    async fn send(
        &self,
        channel_id: i64,
        audio: &AudioPayload,
        caption: &str,
        mode: ParseMode,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_wire_name() {
        assert_eq!(ParseMode::Markdown.as_str(), "Markdown");
    }
}
