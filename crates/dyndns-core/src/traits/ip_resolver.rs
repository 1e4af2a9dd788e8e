// # IP Resolver Trait
//
// Defines the interface for discovering the host's current public address.
//
// ## Implementations
//
// - HTTP echo service: `dyndns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::{IpResolver, IpVersion};
//
// let ip = resolver.fetch(IpVersion::V4).await;
// if ip.is_empty() {
//     // lookup failed, or the service answered with nothing
// }
// ```

use async_trait::async_trait;
use std::fmt;

/// IP version selector
///
/// Built from the numeric selector with `From<u8>`: 4 and 6 map to their
/// variants, anything else is kept as [`IpVersion::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
    Other(u8),
}

impl From<u8> for IpVersion {
    fn from(selector: u8) -> Self {
        match selector {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => IpVersion::Other(other),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "IPv4"),
            IpVersion::V6 => write!(f, "IPv6"),
            IpVersion::Other(n) => write!(f, "IPv{}", n),
        }
    }
}

/// Trait for public IP lookup implementations
///
/// # Silent Failure
///
/// `fetch` never returns an error. Transport failures, non-success
/// statuses, unreadable bodies and unsupported versions all come back as
/// an empty string. Callers treat `""` as "unknown" and cannot tell these
/// cases apart from a service that answered with an empty body.
///
/// # Thread Safety
///
/// Implementations are shared between concurrently running ticks.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Fetch the current public address as text, whitespace-trimmed
    ///
    /// Only [`IpVersion::V4`] performs a lookup; every other version
    /// returns `""` without touching the network.
    async fn fetch(&self, version: IpVersion) -> String;

    /// Name used in logs
    fn resolver_name(&self) -> &'static str;
}
