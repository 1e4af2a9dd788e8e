//! Record reconciliation
//!
//! [`DnsReconciler`] makes the provider hold exactly one A record for a
//! hostname, pointing at the desired address:
//!
//! ```text
//! session ──▶ zone id ──▶ list (A, hostname)
//!                               │
//!            ┌──────────────────┼───────────────────┐
//!         1 match            0 matches          N > 1 matches
//!            │                  │                   │
//!         update                │             delete each
//!                               ▼                   │
//!                             create ◀──────────────┘
//! ```
//!
//! Duplicates are treated as corrupted state and collapsed rather than
//! merged. Every provider failure is returned to the caller untouched;
//! nothing is retried here.

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordFilter};
use std::sync::Arc;
use tracing::{debug, info};

/// What a successful reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The single existing record was updated in place
    Updated {
        /// Id of the updated record
        record_id: String,
    },
    /// No record existed; one was created
    Created {
        /// Id assigned by the provider, when it reported one
        record_id: Option<String>,
    },
    /// Duplicates were deleted and a fresh record created
    Replaced {
        /// Number of records deleted
        deleted: usize,
        /// Id assigned by the provider, when it reported one
        record_id: Option<String>,
    },
}

/// Drives a provider through the list / update / delete / create sequence
pub struct DnsReconciler {
    factory: Arc<dyn DnsProviderFactory>,
    provider_config: ProviderConfig,
}

impl DnsReconciler {
    /// Create a reconciler that builds sessions with `factory`
    pub fn new(factory: Arc<dyn DnsProviderFactory>, provider_config: ProviderConfig) -> Self {
        Self {
            factory,
            provider_config,
        }
    }

    /// Ensure exactly one A record `hostname → desired_ip` exists in the
    /// zone named `zone_domain`
    ///
    /// A new provider session is built and the zone re-resolved on every
    /// call. Any failure aborts the sequence at that step; in particular a
    /// failed deletion leaves the remaining duplicates in place.
    pub async fn reconcile(
        &self,
        zone_domain: &str,
        hostname: &str,
        desired_ip: &str,
    ) -> Result<ReconcileOutcome> {
        let provider = self.factory.create(&self.provider_config)?;

        let zone_id = provider.zone_id(zone_domain).await?;
        debug!("Resolved zone {} to {}", zone_domain, zone_id);

        let desired = DnsRecord::a(hostname, desired_ip);
        let existing = provider
            .list_records(&zone_id, &RecordFilter::a(hostname))
            .await?;
        debug!(
            "Found {} existing {} record(s) for {}",
            existing.len(),
            desired.record_type,
            hostname
        );

        let outcome = match existing.as_slice() {
            [current] => {
                let id = record_id(provider.as_ref(), current)?;
                provider.update_record(&zone_id, id, &desired).await?;
                ReconcileOutcome::Updated {
                    record_id: id.to_string(),
                }
            }
            [] => {
                let created = provider.create_record(&zone_id, &desired).await?;
                ReconcileOutcome::Created {
                    record_id: created.id,
                }
            }
            duplicates => {
                for record in duplicates {
                    let id = record_id(provider.as_ref(), record)?;
                    provider.delete_record(&zone_id, id).await?;
                    info!(
                        "Deleted DNS record: {} - {}: {}",
                        record.record_type, record.name, record.content
                    );
                }
                let created = provider.create_record(&zone_id, &desired).await?;
                ReconcileOutcome::Replaced {
                    deleted: duplicates.len(),
                    record_id: created.id,
                }
            }
        };

        info!("Set DNS record: {} {}", desired.name, desired.content);
        Ok(outcome)
    }
}

fn record_id<'a>(provider: &dyn DnsProvider, record: &'a DnsRecord) -> Result<&'a str> {
    record.id.as_deref().ok_or_else(|| {
        Error::provider(
            provider.provider_name(),
            format!("listed record {} has no id", record.name),
        )
    })
}
