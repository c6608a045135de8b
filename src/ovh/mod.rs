//! OVH API access: the narrow call surface, its HTTP client and the zone
//! record store built on top of it.

mod client;
mod zone;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ConsumerKeyRequest, OvhClient};
pub use zone::{RecordChange, ZoneRecord, ZoneRecordStore};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The calls the zone store needs from the provider.
///
/// Paths are relative to the API root (e.g. `/domain/zone/example.com/record`).
/// Replies are raw JSON; an empty reply body is `Value::Null`.
#[async_trait]
pub trait OvhApi: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value>;

    async fn delete(&self, path: &str) -> Result<Value>;
}
