use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::{LookupError, Result};

/// Bytes of a non-2xx body kept in the error message.
const ERROR_BODY_CAP: usize = 512;

// ─── HttpClient ───────────────────────────────────────────────────────────────

/// A reqwest client with a fixed timeout and default headers.
///
/// Requests are single-shot: there is no retry or backoff, a failed call is
/// reported to the caller as it happened.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration, headers: HeaderMap) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    /// Sends a GET and fails on non-2xx. At most `error_cap` bytes of an
    /// error body are read into the message.
    async fn send(&self, url: &str, error_cap: usize) -> Result<reqwest::Response> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = read_capped(resp, error_cap).await.unwrap_or_default();
            return Err(LookupError::ApiError(
                url.to_string(),
                format!("HTTP {status}: {}", body.trim()),
            ));
        }
        Ok(resp)
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        Ok(self.send(url, ERROR_BODY_CAP).await?.text().await?)
    }

    /// Reads at most `max_bytes` of the body and decodes it lossily as UTF-8.
    /// The rest of the body is never downloaded, on success or on error.
    pub async fn get_prefix(&self, url: &str, max_bytes: usize) -> Result<String> {
        let resp = self.send(url, max_bytes.min(ERROR_BODY_CAP)).await?;
        read_capped(resp, max_bytes).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| LookupError::Parse(e.to_string()))
    }
}

async fn read_capped(mut resp: reqwest::Response, max_bytes: usize) -> Result<String> {
    let mut buf: Vec<u8> = Vec::with_capacity(max_bytes.min(16 * 1024));
    while buf.len() < max_bytes {
        match resp.chunk().await? {
            Some(chunk) => {
                let take = (max_bytes - buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            None => break,
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
