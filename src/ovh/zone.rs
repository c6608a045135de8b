//! Create-or-update of A records in an OVH DNS zone.

use super::OvhApi;
use crate::config::Domain;
use crate::error::{DdnsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

/// An A record as the OVH API represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    /// Assigned by OVH on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub field_type: String,
    #[serde(default)]
    pub sub_domain: String,
    #[serde(default)]
    pub ttl: u32,
    pub target: String,
}

impl ZoneRecord {
    /// A fresh A record for `domain` pointing at `ip`.
    pub fn new(domain: &Domain, ip: IpAddr) -> Self {
        Self {
            id: None,
            field_type: "A".to_string(),
            sub_domain: domain.subdomain.clone(),
            ttl: domain.ttl,
            target: ip.to_string(),
        }
    }
}

/// What `update_if_needed` did to the remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// No record existed; one was created.
    Created(ZoneRecord),
    /// The record pointed elsewhere and was overwritten.
    Updated {
        previous_target: String,
        record: ZoneRecord,
    },
    /// The record already pointed at the address.
    Unchanged(ZoneRecord),
}

impl RecordChange {
    /// Whether a write happened, and so whether the zone needs a refresh.
    pub fn mutated(&self) -> bool {
        !matches!(self, RecordChange::Unchanged(_))
    }

    pub fn record(&self) -> &ZoneRecord {
        match self {
            RecordChange::Created(record)
            | RecordChange::Updated { record, .. }
            | RecordChange::Unchanged(record) => record,
        }
    }
}

/// Record operations for managed domains, on top of any [`OvhApi`].
pub struct ZoneRecordStore {
    api: Box<dyn OvhApi>,
}

impl ZoneRecordStore {
    pub fn new(api: Box<dyn OvhApi>) -> Self {
        Self { api }
    }

    fn records_path(domain: &Domain) -> String {
        format!("/domain/zone/{}/record", domain.zone)
    }

    /// Id of the domain's A record, `None` if it has none.
    ///
    /// Two or more matching records are an error: which one is meant cannot
    /// be decided here, so they are left for the owner to clean up.
    pub async fn fetch_record_id(&self, domain: &Domain) -> Result<Option<u64>> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("fieldType", "A")
            .append_pair("subDomain", &domain.subdomain)
            .finish();
        let path = format!("{}?{}", Self::records_path(domain), query);

        let reply = self
            .api
            .get(&path)
            .await
            .map_err(|e| DdnsError::provider("look up", e))?;
        let ids: Vec<u64> = serde_json::from_value(reply)
            .map_err(|e| DdnsError::provider("look up", e.into()))?;

        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            _ => Err(DdnsError::DuplicateRecord {
                hostname: domain.hostname(),
                ids,
            }),
        }
    }

    /// Point the domain's record at `ip`, creating it if needed.
    ///
    /// Does not refresh the zone; callers do that when
    /// [`RecordChange::mutated`] is true.
    pub async fn update_if_needed(&self, domain: &Domain, ip: IpAddr) -> Result<RecordChange> {
        let hostname = domain.hostname();
        let base = Self::records_path(domain);

        let Some(id) = self.fetch_record_id(domain).await? else {
            tracing::info!(%hostname, "Creating a new zone record");

            let mut record = ZoneRecord::new(domain, ip);
            let body = serde_json::to_value(&record)?;
            let reply = self
                .api
                .post(&base, Some(&body))
                .await
                .map_err(|e| DdnsError::provider("create", e))?;
            record.id = reply.get("id").and_then(Value::as_u64);

            return Ok(RecordChange::Created(record));
        };

        let path = format!("{}/{}", base, id);
        let reply = self
            .api
            .get(&path)
            .await
            .map_err(|e| DdnsError::provider("get", e))?;
        let existing: ZoneRecord =
            serde_json::from_value(reply).map_err(|e| DdnsError::provider("get", e.into()))?;

        if existing.target == ip.to_string() {
            tracing::info!(%hostname, "DNS target is already good");
            return Ok(RecordChange::Unchanged(existing));
        }

        tracing::info!(
            %hostname,
            %ip,
            target = %existing.target,
            "IP does not match the current DNS target, updating"
        );

        let mut record = ZoneRecord::new(domain, ip);
        let body = serde_json::to_value(&record)?;
        self.api
            .put(&path, &body)
            .await
            .map_err(|e| DdnsError::provider("update", e))?;
        record.id = Some(id);

        Ok(RecordChange::Updated {
            previous_target: existing.target,
            record,
        })
    }

    /// Apply pending record changes to the live zone.
    pub async fn refresh_zone(&self, domain: &Domain) -> Result<()> {
        let path = format!("/domain/zone/{}/refresh", domain.zone);

        self.api
            .post(&path, None)
            .await
            .map_err(|e| DdnsError::Refresh {
                zone: domain.zone.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(hostname = %domain.hostname(), "DNS zone refreshed");
        Ok(())
    }

    /// Remove the domain's record, refreshing the zone if one was deleted.
    pub async fn delete_record(&self, domain: &Domain) -> Result<bool> {
        let hostname = domain.hostname();

        let Some(id) = self.fetch_record_id(domain).await? else {
            tracing::info!(%hostname, "No zone record to delete");
            return Ok(false);
        };

        let path = format!("{}/{}", Self::records_path(domain), id);
        self.api
            .delete(&path)
            .await
            .map_err(|e| DdnsError::provider("delete", e))?;
        tracing::info!(%hostname, id, "Zone record deleted");

        self.refresh_zone(domain).await?;
        Ok(true)
    }

    /// Check the credentials can read the domain's zone.
    pub async fn check_access(&self, domain: &Domain) -> Result<()> {
        let path = format!("/domain/zone/{}", domain.zone);
        self.api.get(&path).await?;
        Ok(())
    }
}
