use std::path::{Path, PathBuf};

use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;

use crate::app::{RelayError, Result};

const FALLBACK_NAME: &str = "downloaded_file";
const MAX_STEM_CHARS: usize = 100;

/// Streams enclosures into a local directory.
pub struct Downloader {
    client: Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(client: Client, dir: PathBuf) -> Self {
        Self { client, dir }
    }

    /// Download `url` and return the path of the finished file.
    ///
    /// The body is written to a hidden `.part` file first and renamed once
    /// complete; on any failure the partial file is removed.
    pub async fn download(&self, url: &str) -> Result<PathBuf> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::DownloadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Name after the final URL, so redirects to the real file are honored
        let file_name = derive_file_name(url, response.url().path());
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.dir.join(&file_name);
        let partial = self.dir.join(format!(".{}.part", file_name));

        if let Err(e) = write_body(&mut response, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(url, path = %target.display(), "Downloaded enclosure");
        Ok(target)
    }
}

async fn write_body(response: &mut Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

fn base_name(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !matches!(*name, "" | "." | ".."))
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    }
}

/// Local file name for an enclosure.
///
/// `resolved_path` is the percent-encoded path of the URL the body was
/// actually served from. The stem is capped at 100 characters and the result
/// always carries an extension, `.mp3` unless the served name says otherwise.
pub fn derive_file_name(source_url: &str, resolved_path: &str) -> String {
    let decoded = urlencoding::decode(resolved_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| resolved_path.to_string());
    let name = base_name(&decoded).unwrap_or(FALLBACK_NAME);
    let (stem, extension) = split_extension(name);
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();

    let extension = if source_url.ends_with(".mp3") || name == FALLBACK_NAME || extension.is_empty()
    {
        ".mp3"
    } else {
        extension
    };

    format!("{}{}", stem, extension)
}
