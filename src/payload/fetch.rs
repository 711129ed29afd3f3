//! Remote payload retrieval
//!
//! One bounded attempt: the request, status check and streamed body all share
//! a single deadline.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use url::Url;

use super::slot::{Installed, StagedSlot};

const USER_AGENT: &str = concat!("worker-bootstrap/", env!("CARGO_PKG_VERSION"));

/// Reasons the remote source could not supply a payload
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid payload source '{uri}': {reason}")]
    InvalidSource { uri: String, reason: String },

    #[error("Unsupported payload source scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Source returned HTTP {0}")]
    Status(u16),

    #[error("Fetch timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Source returned an empty body")]
    EmptyBody,

    #[error("Failed to stage payload: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse and validate a payload source
pub fn parse_source(uri: &str) -> Result<Url, FetchError> {
    let url = Url::parse(uri).map_err(|e| FetchError::InvalidSource {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

/// Fetch `source_uri` into `local_slot`, abandoning the attempt after `timeout`.
///
/// The slot is only replaced once a complete, non-empty body is on disk.
pub async fn fetch_into_slot(
    source_uri: &str,
    local_slot: &Path,
    timeout: Duration,
) -> Result<Installed, FetchError> {
    let url = parse_source(source_uri)?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))?;

    match tokio::time::timeout(timeout, download(&client, url, local_slot)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::TimedOut(timeout)),
    }
}

async fn download(
    client: &reqwest::Client,
    url: Url,
    local_slot: &Path,
) -> Result<Installed, FetchError> {
    let response = client.get(url).send().await.map_err(map_reqwest)?;

    if !response.status().is_success() {
        tracing::debug!("Payload source returned status: {}", response.status());
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let mut staged = StagedSlot::new(local_slot)?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(map_reqwest)?;
        staged.write_chunk(&chunk)?;
    }

    if staged.written() == 0 {
        return Err(FetchError::EmptyBody);
    }

    Ok(staged.commit()?)
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    FetchError::Request(e.to_string())
}
