//! Signed HTTP client for the OVH API.

use super::OvhApi;
use crate::config::OvhConfig;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use std::time::Duration;
use tokio::sync::OnceCell;

const ENDPOINTS: &[(&str, &str)] = &[
    ("ovh-eu", "https://eu.api.ovh.com/1.0"),
    ("ovh-ca", "https://ca.api.ovh.com/1.0"),
    ("ovh-us", "https://api.us.ovhcloud.com/1.0"),
    ("kimsufi-eu", "https://eu.api.kimsufi.com/1.0"),
    ("kimsufi-ca", "https://ca.api.kimsufi.com/1.0"),
    ("soyoustart-eu", "https://eu.api.soyoustart.com/1.0"),
    ("soyoustart-ca", "https://ca.api.soyoustart.com/1.0"),
];

/// Map an endpoint alias to its base URL; URLs pass through unchanged.
pub fn endpoint_url(endpoint: &str) -> Result<String> {
    if let Some((_, url)) = ENDPOINTS.iter().find(|(name, _)| *name == endpoint) {
        return Ok(url.to_string());
    }

    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    Err(DdnsError::Config(format!("unknown OVH endpoint: {}", endpoint)))
}

/// Reply to a consumer key request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerKeyRequest {
    /// Page the account owner must visit to grant access.
    pub validation_url: String,
    /// The key to store in the configuration once validated.
    pub consumer_key: String,
    /// Credential state, "pendingValidation" until the URL is visited.
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OVH API client.
pub struct OvhClient {
    client: reqwest::Client,
    base_url: String,
    application_key: String,
    application_secret: String,
    consumer_key: String,
    /// Server clock minus local clock, in seconds.
    time_delta: OnceCell<i64>,
}

impl OvhClient {
    /// Create a client from (already resolved) credentials.
    pub fn new(config: &OvhConfig, timeout: Duration) -> Result<Self> {
        if config.application_key.is_empty() || config.application_secret.is_empty() {
            return Err(DdnsError::Config(
                "ovh.application_key and ovh.application_secret are required".to_string(),
            ));
        }

        Self::with_base_url(
            endpoint_url(&config.endpoint)?,
            config.application_key.clone(),
            config.application_secret.clone(),
            config.consumer_key.clone(),
            timeout,
        )
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        base_url: String,
        application_key: String,
        application_secret: String,
        consumer_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            application_key,
            application_secret,
            consumer_key,
            time_delta: OnceCell::new(),
        })
    }

    /// Ask for a consumer key allowed to manage DNS zones.
    pub async fn request_consumer_key(&self) -> Result<ConsumerKeyRequest> {
        let rules: Vec<Value> = ["GET", "POST", "PUT", "DELETE"]
            .iter()
            .map(|method| json!({ "method": method, "path": "/domain/zone/*" }))
            .collect();

        let response = self
            .client
            .post(format!("{}/auth/credential", self.base_url))
            .header("X-Ovh-Application", &self.application_key)
            .json(&json!({ "accessRules": rules }))
            .send()
            .await?;

        let value = decode(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn time_delta(&self) -> Result<i64> {
        self.time_delta
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(format!("{}/auth/time", self.base_url))
                    .send()
                    .await?;
                let server_time: i64 = serde_json::from_value(decode(response).await?)?;
                let delta = server_time - chrono::Utc::now().timestamp();
                tracing::debug!(delta, "OVH clock delta");
                Ok::<_, DdnsError>(delta)
            })
            .await
            .copied()
    }

    /// `$1$` signature over the request, as the API expects it.
    pub(crate) fn signature(&self, method: &str, url: &str, body: &str, timestamp: i64) -> String {
        let payload = format!(
            "{}+{}+{}+{}+{}+{}",
            self.application_secret, self.consumer_key, method, url, body, timestamp
        );
        format!("$1${}", hex::encode(Sha1::digest(payload.as_bytes())))
    }

    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let body = match body {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };

        let timestamp = chrono::Utc::now().timestamp() + self.time_delta().await?;
        let signature = self.signature(method.as_str(), &url, &body, timestamp);

        let mut request = self
            .client
            .request(method, &url)
            .header("X-Ovh-Application", &self.application_key)
            .header("X-Ovh-Consumer", &self.consumer_key)
            .header("X-Ovh-Timestamp", timestamp.to_string())
            .header("X-Ovh-Signature", signature);

        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        decode(request.send().await?).await
    }
}

async fn decode(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = match serde_json::from_str::<ApiError>(&text) {
            Ok(err) => err.message,
            Err(_) if text.trim().is_empty() => status.to_string(),
            Err(_) => text,
        };
        return Err(DdnsError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl OvhApi for OvhClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.call(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.call(Method::POST, path, body).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.call(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.call(Method::DELETE, path, None).await
    }
}
