//! Configuration management for ovh-ddns.

use crate::error::{DdnsError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Check interval in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_interval")]
    pub check_interval_secs: u64,

    /// URL that echoes the caller's public IP as plain text.
    #[serde(default = "default_ip_url")]
    pub ip_url: String,

    /// DNS server queried for the current records (`host[:port]`).
    #[serde(default = "default_dns_server")]
    pub dns_server: String,

    /// Listen address for the echo server.
    #[serde(default = "default_server_address")]
    pub server_address: String,

    /// Deadline applied to each HTTP and DNS call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OVH API credentials.
    #[serde(default)]
    pub ovh: OvhConfig,

    /// Managed records.
    #[serde(default)]
    pub domains: Vec<Domain>,
}

fn default_interval() -> u64 {
    300
}

fn default_ip_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_dns_server() -> String {
    "dns200.anycast.me:53".to_string()
}

fn default_server_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// OVH API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvhConfig {
    /// Endpoint alias (e.g. "ovh-eu") or base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Application key (or environment variable name if prefixed with $).
    #[serde(default)]
    pub application_key: String,
    /// Application secret (or environment variable name if prefixed with $).
    #[serde(default)]
    pub application_secret: String,
    /// Consumer key, filled in by `ovh-ddns setup`.
    #[serde(default)]
    pub consumer_key: String,
}

fn default_endpoint() -> String {
    "ovh-eu".to_string()
}

impl Default for OvhConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            application_key: String::new(),
            application_secret: String::new(),
            consumer_key: String::new(),
        }
    }
}

impl OvhConfig {
    /// Credentials with `$VAR` references resolved from the environment.
    pub fn resolved(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            application_key: resolve_env(&self.application_key),
            application_secret: resolve_env(&self.application_secret),
            consumer_key: resolve_env(&self.consumer_key),
        }
    }
}

/// One managed A record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Zone name as known to OVH (e.g. "example.com").
    pub zone: String,
    /// Subdomain inside the zone, empty for the apex.
    #[serde(default)]
    pub subdomain: String,
    /// Record TTL in seconds (default: 300).
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_ttl() -> u32 {
    300
}

impl Domain {
    pub fn new(zone: impl Into<String>, subdomain: impl Into<String>, ttl: u32) -> Self {
        Self {
            zone: zone.into(),
            subdomain: subdomain.into(),
            ttl,
        }
    }

    /// Fully qualified host name, without the trailing dot.
    pub fn hostname(&self) -> String {
        if self.subdomain.is_empty() {
            self.zone.clone()
        } else {
            format!("{}.{}", self.subdomain, self.zone)
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("ovh-ddns").join("config.toml"))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(DdnsError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check everything that must hold before the first pass.
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(DdnsError::Config("no domains configured".to_string()));
        }

        for domain in &self.domains {
            if domain.zone.trim().is_empty() {
                return Err(DdnsError::Config(format!(
                    "domain with subdomain {:?} has an empty zone",
                    domain.subdomain
                )));
            }
        }

        if self.effective_check_interval().is_zero() {
            return Err(DdnsError::Config(
                "check_interval_secs must be greater than zero".to_string(),
            ));
        }

        url::Url::parse(&self.ip_url)
            .map_err(|e| DdnsError::Config(format!("invalid ip_url {}: {}", self.ip_url, e)))?;

        Ok(())
    }

    /// The check interval, raised to the smallest record TTL if it is lower.
    ///
    /// Updating faster than the TTL the provider advertises is pointless, so
    /// the configured interval is only ever raised, never lowered.
    pub fn effective_check_interval(&self) -> Duration {
        Duration::from_secs(
            self.raised_interval_secs()
                .unwrap_or(self.check_interval_secs),
        )
    }

    /// The lowest TTL when it is above the configured interval.
    pub fn raised_interval_secs(&self) -> Option<u64> {
        self.domains
            .iter()
            .map(|d| u64::from(d.ttl))
            .min()
            .filter(|ttl| self.check_interval_secs < *ttl)
    }

    /// Per-call deadline for network requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Resolve `dns_server` to a socket address (port 53 unless given).
    pub async fn dns_server_addr(&self) -> Result<SocketAddr> {
        let server = self.dns_server.trim();

        if let Ok(addr) = server.parse::<SocketAddr>() {
            return Ok(addr);
        }
        if let Ok(ip) = server.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, 53));
        }

        let target = if server.contains(':') {
            server.to_string()
        } else {
            format!("{}:53", server)
        };

        let mut addrs = tokio::net::lookup_host(target).await?;
        addrs
            .next()
            .ok_or_else(|| DdnsError::Config(format!("dns_server {} did not resolve", server)))
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            check_interval_secs: 300,
            ip_url: default_ip_url(),
            dns_server: default_dns_server(),
            server_address: default_server_address(),
            request_timeout_secs: default_request_timeout(),
            ovh: OvhConfig {
                endpoint: default_endpoint(),
                application_key: "$OVH_APPLICATION_KEY".to_string(),
                application_secret: "$OVH_APPLICATION_SECRET".to_string(),
                consumer_key: "$OVH_CONSUMER_KEY".to_string(),
            },
            domains: vec![Domain::new("example.com", "home", 300)],
        }
    }
}

/// Resolve environment variable references (values starting with $).
pub(crate) fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
