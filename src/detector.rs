//! Public IP detection.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::net::IpAddr;
use std::time::Duration;

/// Upper bound on how much of the echo endpoint's reply is read.
pub const MAX_BODY_BYTES: usize = 64;

/// Source of the caller's current public IP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the public IP from `url`.
    ///
    /// `Ok(None)` means the endpoint answered with an empty body: there is no
    /// address to work with and the pass should be skipped.
    async fn get(&self, url: &str) -> Result<Option<IpAddr>>;
}

/// IP source backed by a plain-text HTTP echo endpoint.
pub struct HttpIpSource {
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn get(&self, url: &str) -> Result<Option<IpAddr>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DdnsError::IpDetection(format!("request to {} failed: {}", url, e)))?;

        if response.status() != StatusCode::OK {
            return Err(DdnsError::IpDetection(format!(
                "invalid response from server: {}",
                response.status()
            )));
        }

        let mut body = Vec::with_capacity(MAX_BODY_BYTES);
        while body.len() < MAX_BODY_BYTES {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| DdnsError::IpDetection(format!("reading body failed: {}", e)))?;

            match chunk {
                Some(bytes) => {
                    let take = bytes.len().min(MAX_BODY_BYTES - body.len());
                    body.extend_from_slice(&bytes[..take]);
                }
                None => break,
            }
        }

        let ip = parse_body(&body)?;
        if let Some(ip) = ip {
            tracing::debug!(%ip, url, "Detected public IP");
        }
        Ok(ip)
    }
}

fn parse_body(body: &[u8]) -> Result<Option<IpAddr>> {
    let text = std::str::from_utf8(body)
        .map_err(|_| DdnsError::IpDetection("response is not valid UTF-8".to_string()))?;
    let text = text.trim_end_matches(['\n', '\r']);

    if text.is_empty() {
        return Ok(None);
    }

    text.parse()
        .map(Some)
        .map_err(|_| DdnsError::IpDetection(format!("invalid IP from provider: {:?}", text)))
}
