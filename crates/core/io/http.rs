use super::{RangeSource, clip_range};
use crate::error::{FgbError, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use std::time::Duration;

/// A remote container read with HTTP `Range` requests.
#[derive(Debug, Clone)]
pub struct HttpRangeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRangeSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FgbError::TransportUnavailable(format!("http client init failed: {e}")))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `Range` header value covering `[offset, offset + length)`.
fn range_header(offset: u64, length: usize) -> String {
    let last = offset + (length.max(1) as u64) - 1;
    format!("bytes={offset}-{last}")
}

/// Turn a response status and body into the bytes of the requested range.
fn map_response(
    url: &str,
    status: StatusCode,
    offset: u64,
    length: usize,
    body: Bytes,
) -> Result<Bytes> {
    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        return Err(FgbError::RangeNotSatisfiable { offset, length });
    }
    if !status.is_success() {
        return Err(FgbError::TransportUnavailable(format!("{url}: HTTP {status}")));
    }
    if status == StatusCode::PARTIAL_CONTENT {
        let keep = body.len().min(length);
        return Ok(body.slice(..keep));
    }
    // server ignored the Range header and sent the whole resource
    log::warn!("{url} does not honour range requests, slicing locally");
    let range = clip_range(offset, length, body.len() as u64)?;
    Ok(body.slice(range))
}

impl RangeSource for HttpRangeSource {
    async fn fetch_range(&self, offset: u64, length: usize) -> Result<Bytes> {
        let range = range_header(offset, length);
        log::debug!("GET {} Range: {}", self.url, range);

        let response = self
            .client
            .get(&self.url)
            .header(RANGE, &range)
            .send()
            .await
            .map_err(|e| FgbError::TransportUnavailable(format!("{}: request error: {e}", self.url)))?;

        let status = response.status();
        let body = if status.is_success() {
            response
                .bytes()
                .await
                .map_err(|e| FgbError::TransportUnavailable(format!("{}: invalid body: {e}", self.url)))?
        } else {
            Bytes::new()
        };
        map_response(&self.url, status, offset, length, body)
    }
}
