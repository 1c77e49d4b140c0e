//! Plain HTTP retrieval for attachment links that don't need a browser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::types::FetchError;
use crate::utils::{file_name_from_url, unique_destination};

/// Streams direct links into the download directory.
#[derive(Clone)]
pub struct LinkFetcher {
    client: Client,
}

impl LinkFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("tenderscrape/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` into `dir` and return the final filename.
    ///
    /// The name comes from the URL's last path segment and gets a counter
    /// suffix if it already exists. The body is written to a `.part` file
    /// first so a failed transfer never leaves a plausible-looking file behind.
    pub async fn fetch(&self, url: &str, dir: &Path) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let destination = unique_destination(dir, &file_name_from_url(url));
        let partial = partial_path(&destination);

        let written = match stream_to_file(response, &partial).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, &destination).await?;

        let filename = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Fetched {} -> {} ({} bytes)", url, filename, written);
        Ok(filename)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
