//! Core traits for the dyndns updater
//!
//! - [`IpResolver`]: Discover the current public address
//! - [`DnsProvider`]: Manage records through a provider API

pub mod dns_provider;
pub mod ip_resolver;

pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord, RecordFilter, RECORD_TYPE_A};
pub use ip_resolver::{IpResolver, IpVersion};
