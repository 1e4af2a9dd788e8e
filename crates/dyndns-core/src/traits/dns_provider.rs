// # DNS Provider Trait
//
// Defines the record-management capability the reconciler drives:
// zone lookup, record listing by (type, name), create, update and delete.
//
// ## Implementations
//
// - Cloudflare: `dyndns-provider-cloudflare` crate
//
// ## Sessions
//
// A provider value is a session built from credentials by a
// [`DnsProviderFactory`]. The reconciler builds a fresh session for every
// reconciliation, so implementations need not survive long idle periods.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Record type managed by the updater
pub const RECORD_TYPE_A: &str = "A";

/// A DNS record as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned identifier (`None` before creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Record type, e.g. "A"
    #[serde(rename = "type")]
    pub record_type: String,

    /// Fully-qualified record name
    pub name: String,

    /// Record content (the IP address for A records)
    pub content: String,
}

impl DnsRecord {
    /// Build an A record that has not been created yet
    pub fn a(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            record_type: RECORD_TYPE_A.to_string(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Attach a provider id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Filter for listing records; both fields must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    /// Record type to match
    pub record_type: String,
    /// Fully-qualified name to match
    pub name: String,
}

impl RecordFilter {
    /// Filter matching A records with the given name
    pub fn a(name: impl Into<String>) -> Self {
        Self {
            record_type: RECORD_TYPE_A.to_string(),
            name: name.into(),
        }
    }
}

/// Trait for DNS provider sessions
///
/// Each method performs exactly one API call. Implementations must not
/// retry, back off, cache across calls or spawn tasks; the poll loop owns
/// all scheduling and the reconciler owns the call sequence.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve a zone name (e.g. "example.com") to the provider's zone id
    async fn zone_id(&self, zone_name: &str) -> Result<String, crate::Error>;

    /// List every record in the zone matching the filter
    ///
    /// Providers do not enforce uniqueness, so this may return several
    /// records with the same name.
    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record, returning it with its assigned id
    async fn create_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
    ) -> Result<DnsRecord, crate::Error>;

    /// Overwrite an existing record by id
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DnsRecord,
    ) -> Result<(), crate::Error>;

    /// Delete a record by id
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Builds authenticated provider sessions from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a session
    ///
    /// Fails when the credentials are unusable (e.g. empty).
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
