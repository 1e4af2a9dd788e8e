// # dyndns-core
//
// Core library for the dyndns updater.
//
// ## Architecture Overview
//
// - **IpResolver**: Trait for discovering the current public address
// - **DnsProvider**: Trait for the provider's record-management API
// - **DnsReconciler**: Collapses the provider's records for a hostname to
//   exactly one A record with the desired address
// - **PollLoop**: Fixed-interval check → compare → reconcile loop that
//   owns the observed IP
// - **ProviderRegistry**: Plugin-based registry for DNS provider factories
//
// ## Failure Model
//
// Lookup failures are silent (empty address). Provider failures stop the
// loop by default; `FailurePolicy::Continue` logs them and retries on the
// next tick instead.

pub mod config;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{Config, EngineConfig, FailurePolicy, IpSourceConfig, OverlapPolicy, ProviderConfig};
pub use engine::{EngineEvent, PollLoop, TickOutcome};
pub use error::{Error, Result};
pub use reconciler::{DnsReconciler, ReconcileOutcome};
pub use registry::ProviderRegistry;
pub use state::ObservedIp;
pub use traits::{DnsProvider, DnsProviderFactory, DnsRecord, IpResolver, IpVersion, RecordFilter};
