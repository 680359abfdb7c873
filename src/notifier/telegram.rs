use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::app::{RelayError, Result};
use crate::config::TelegramConfig;
use crate::notifier::{AudioPayload, Notifier, ParseMode};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot API envelope. Only the failure fields matter here.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: SecretString,
}

impl TelegramNotifier {
    /// Fails with [`RelayError::MissingCredential`] when no bot token is set.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.trim().is_empty())
            .ok_or(RelayError::MissingCredential)?;

        let api_url = config
            .api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_API_URL);
        url::Url::parse(api_url)
            .map_err(|e| RelayError::Config(format!("invalid Telegram API URL {}: {}", api_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build Telegram client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: SecretString::from(token.to_string()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url,
            self.token.expose_secret(),
            method
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(
        &self,
        channel_id: i64,
        audio: &AudioPayload,
        caption: &str,
        mode: ParseMode,
    ) -> Result<()> {
        // Episodes can be large, so the file is streamed instead of read whole
        let file = tokio::fs::File::open(&audio.path).await?;
        let length = file.metadata().await?.len();
        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime)
            .map_err(|e| RelayError::Delivery(e.without_url().to_string()))?;

        let form = Form::new()
            .text("chat_id", channel_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", mode.as_str())
            .part("audio", part);

        // Errors carry the request URL, which embeds the token.
        let response = self
            .client
            .post(self.method_url("sendAudio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Http(e.without_url()))?;

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.ok => Ok(()),
            Ok(api) => Err(RelayError::Delivery(
                api.description
                    .unwrap_or_else(|| format!("Telegram returned {}", status)),
            )),
            Err(_) => Err(RelayError::Delivery(format!("{} {}", status, body.trim()))),
        }
    }
}
