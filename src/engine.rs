//! Reconciliation of managed records against the current public IP.
//!
//! A pass fetches the public IP once, then for each domain in order:
//!
//! 1. resolves the host name on the authoritative server;
//! 2. stops there if the answer already equals the public IP (in sync);
//! 3. otherwise creates or updates the zone record and refreshes the zone.
//!
//! Domains fail independently: an error on one is recorded in its
//! [`DomainReport`] and the pass moves on to the next.

use crate::config::Domain;
use crate::detector::IpSource;
use crate::error::{DdnsError, Result};
use crate::ovh::{RecordChange, ZoneRecord, ZoneRecordStore};
use crate::resolver::DnsLookup;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Outcome for a domain that was processed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainStatus {
    /// DNS already answers with the public IP; nothing was written.
    InSync,
    /// The record did not exist and was created.
    Created(ZoneRecord),
    /// The record pointed at `previous` and was overwritten.
    Updated { previous: String, record: ZoneRecord },
    /// DNS was stale but the record already had the right target.
    TargetAlreadyCurrent,
}

/// Per-domain result of a pass.
#[derive(Debug)]
pub struct DomainReport {
    pub hostname: String,
    /// What the authoritative server answered, when the lookup succeeded.
    pub dns_ip: Option<IpAddr>,
    pub outcome: Result<DomainStatus>,
}

/// Result of one reconciliation pass.
#[derive(Debug)]
pub struct PassReport {
    pub external_ip: IpAddr,
    pub checked_at: DateTime<Utc>,
    /// One entry per domain, in configuration order.
    pub domains: Vec<DomainReport>,
}

impl PassReport {
    /// Number of domains that ended in an error.
    pub fn failures(&self) -> usize {
        self.domains.iter().filter(|d| d.outcome.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// Drives the IP source, the resolver and the zone store for all domains.
pub struct Engine {
    ip_source: Box<dyn IpSource>,
    resolver: Box<dyn DnsLookup>,
    store: ZoneRecordStore,
    domains: Vec<Domain>,
    ip_url: String,
}

impl Engine {
    pub fn new(
        ip_source: Box<dyn IpSource>,
        resolver: Box<dyn DnsLookup>,
        store: ZoneRecordStore,
        domains: Vec<Domain>,
        ip_url: String,
    ) -> Self {
        Self {
            ip_source,
            resolver,
            store,
            domains,
            ip_url,
        }
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn store(&self) -> &ZoneRecordStore {
        &self.store
    }

    /// The current public IP, or an error if none is available.
    pub async fn external_ip(&self) -> Result<IpAddr> {
        self.ip_source.get(&self.ip_url).await?.ok_or_else(|| {
            DdnsError::IpDetection(format!("no IP returned by {}", self.ip_url))
        })
    }

    /// Run one pass over every domain.
    ///
    /// Fails as a whole only when the public IP cannot be obtained, in which
    /// case no domain is looked at.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let external_ip = self.external_ip().await?;
        tracing::debug!(%external_ip, domains = self.domains.len(), "Starting pass");

        let mut domains = Vec::with_capacity(self.domains.len());
        for domain in &self.domains {
            let report = self.reconcile(domain, external_ip).await;
            if let Err(e) = &report.outcome {
                tracing::warn!(hostname = %report.hostname, error = %e, "Failed to update domain");
            }
            domains.push(report);
        }

        Ok(PassReport {
            external_ip,
            checked_at: Utc::now(),
            domains,
        })
    }

    /// Bring one domain in line with `ip`.
    pub async fn reconcile(&self, domain: &Domain, ip: IpAddr) -> DomainReport {
        let hostname = domain.hostname();

        let dns_ip = match self.resolver.lookup(&hostname).await {
            Ok(dns_ip) => dns_ip,
            Err(e) => {
                return DomainReport {
                    hostname,
                    dns_ip: None,
                    outcome: Err(e),
                }
            }
        };

        if dns_ip == Some(ip) {
            tracing::info!(%hostname, %ip, "All good");
            return DomainReport {
                hostname,
                dns_ip,
                outcome: Ok(DomainStatus::InSync),
            };
        }

        tracing::info!(
            %hostname,
            local_ip = %ip,
            dns_ip = %dns_ip.map_or_else(|| "not configured".to_string(), |d| d.to_string()),
            "DNS is out of sync"
        );

        let outcome = self.converge(domain, ip).await;
        DomainReport {
            hostname,
            dns_ip,
            outcome,
        }
    }

    async fn converge(&self, domain: &Domain, ip: IpAddr) -> Result<DomainStatus> {
        let change = self.store.update_if_needed(domain, ip).await?;

        if change.mutated() {
            self.store.refresh_zone(domain).await?;
        }

        Ok(match change {
            RecordChange::Created(record) => DomainStatus::Created(record),
            RecordChange::Updated {
                previous_target,
                record,
            } => DomainStatus::Updated {
                previous: previous_target,
                record,
            },
            RecordChange::Unchanged(_) => DomainStatus::TargetAlreadyCurrent,
        })
    }

    /// DNS answer for every domain, without touching the zone.
    pub async fn lookup_all(&self) -> Vec<(String, Result<Option<IpAddr>>)> {
        let mut answers = Vec::with_capacity(self.domains.len());
        for domain in &self.domains {
            let hostname = domain.hostname();
            let answer = self.resolver.lookup(&hostname).await;
            answers.push((hostname, answer));
        }
        answers
    }
}
