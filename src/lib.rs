//! # ovh-ddns
//!
//! Keeps DNS A records hosted by OVH pointed at your current public IP.
//!
//! ## Features
//!
//! - Public IP from any plain-text echo endpoint
//! - Current record read straight from the authoritative DNS server
//! - OVH zone written only when DNS disagrees, then refreshed
//! - Daemon mode with a check interval never shorter than the record TTL
//! - Built-in echo server to act as your own IP endpoint
//!
//! ## Usage
//!
//! ```bash
//! # Request an OVH consumer key
//! ovh-ddns setup
//!
//! # Run one pass
//! ovh-ddns update
//!
//! # Run as daemon
//! ovh-ddns daemon
//!
//! # Delete every managed record
//! ovh-ddns clean
//! ```

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod ovh;
pub mod resolver;
pub mod scheduler;
pub mod server;

pub use config::{Config, Domain, OvhConfig};
pub use detector::{HttpIpSource, IpSource};
pub use engine::{DomainReport, DomainStatus, Engine, PassReport};
pub use error::{DdnsError, Result};
pub use ovh::{OvhApi, OvhClient, ZoneRecordStore};
pub use resolver::{AuthoritativeResolver, DnsLookup};
pub use scheduler::Scheduler;
