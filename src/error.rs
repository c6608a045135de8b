//! Error types for ovh-ddns.

use std::net::IpAddr;
use thiserror::Error;

/// Result type alias for ovh-ddns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// The external IP could not be obtained.
    #[error("IP detection failed: {0}")]
    IpDetection(String),

    /// The authoritative DNS server did not answer in time.
    #[error("dns timeout for {hostname}: {message}")]
    DnsTimeout { hostname: String, message: String },

    /// The DNS answer did not contain exactly one address.
    #[error("expected 1 dns address found: {answers:?}")]
    DnsAmbiguous { hostname: String, answers: Vec<IpAddr> },

    /// Any other resolver failure.
    #[error("dns lookup failed for {hostname}: {message}")]
    Dns { hostname: String, message: String },

    /// More than one remote record matches a domain.
    #[error("multiple ids for {hostname} ({ids:?}), remove the duplicates manually")]
    DuplicateRecord { hostname: String, ids: Vec<u64> },

    /// A create/get/update/delete call against the zone failed.
    #[error("failed to {action} the zone record: {message}")]
    Provider { action: &'static str, message: String },

    /// The zone refresh failed after a record was written.
    #[error("failed to refresh the zone {zone}: {message}")]
    Refresh { zone: String, message: String },

    /// Non-success reply from the provider API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    /// Wrap a failed zone call with the action that was attempted.
    pub(crate) fn provider(action: &'static str, err: DdnsError) -> Self {
        DdnsError::Provider {
            action,
            message: err.to_string(),
        }
    }

    /// Whether this error was a DNS timeout.
    pub fn is_dns_timeout(&self) -> bool {
        matches!(self, DdnsError::DnsTimeout { .. })
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DdnsError {
    fn from(e: toml::ser::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}
