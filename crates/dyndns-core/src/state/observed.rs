// # Observed IP
//
// The last address the poll loop saw, shared between the loop and its
// tick tasks.
//
// ## Lifecycle
//
// - Empty at startup: the "never run" sentinel
// - Overwritten by every tick that completes its compare step
// - Never persisted: a restart always begins uninitialized
//
// ## Locking
//
// Ticks take the lock for the whole compare → reconcile → write sequence
// through [`ObservedIp::lock`], so two overlapping ticks can never both act
// on the same stale value.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Contents of the observed-IP slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Last observed address, empty when unknown
    pub ip: String,
    /// When `ip` was last written
    pub updated_at: Option<DateTime<Utc>>,
}

impl Observation {
    /// True until the first non-empty address has been written
    pub fn is_uninitialized(&self) -> bool {
        self.ip.is_empty()
    }

    /// Time since `ip` was last written
    pub fn age(&self) -> Option<TimeDelta> {
        self.updated_at.map(|at| Utc::now() - at)
    }

    /// Overwrite the slot and stamp the time
    pub fn set(&mut self, ip: impl Into<String>) {
        self.ip = ip.into();
        self.updated_at = Some(Utc::now());
    }
}

/// Shared single-slot cache of the last observed address
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::state::ObservedIp;
///
/// #[tokio::main]
/// async fn main() {
///     let observed = ObservedIp::new();
///     assert_eq!(observed.get().await, "");
///
///     observed.set("198.51.100.9").await;
///     assert_eq!(observed.get().await, "198.51.100.9");
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObservedIp {
    inner: Arc<Mutex<Observation>>,
}

impl ObservedIp {
    /// Create an empty (uninitialized) slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot that already tracks an address
    pub fn with_ip(ip: impl Into<String>) -> Self {
        let mut observation = Observation::default();
        observation.set(ip);
        Self {
            inner: Arc::new(Mutex::new(observation)),
        }
    }

    /// Current address, empty when unknown
    pub async fn get(&self) -> String {
        self.inner.lock().await.ip.clone()
    }

    /// Copy of the whole slot
    pub async fn snapshot(&self) -> Observation {
        self.inner.lock().await.clone()
    }

    /// Overwrite the address
    pub async fn set(&self, ip: impl Into<String>) {
        self.inner.lock().await.set(ip);
    }

    /// Hold the slot for a compare-and-write sequence
    pub async fn lock(&self) -> MutexGuard<'_, Observation> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let observed = ObservedIp::new();
        let snapshot = observed.snapshot().await;

        assert!(snapshot.is_uninitialized());
        assert!(snapshot.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_set_stamps_time() {
        let observed = ObservedIp::new();
        observed.set("203.0.113.5").await;

        let snapshot = observed.snapshot().await;
        assert_eq!(snapshot.ip, "203.0.113.5");
        assert!(!snapshot.is_uninitialized());
        assert!(snapshot.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_age_tracks_last_write() {
        let observed = ObservedIp::new();
        assert!(observed.snapshot().await.age().is_none());

        observed.set("203.0.113.5").await;
        let age = observed.snapshot().await.age().unwrap();
        assert!(age >= TimeDelta::zero());
        assert!(age < TimeDelta::seconds(5));
    }

    #[tokio::test]
    async fn test_clones_share_the_slot() {
        let observed = ObservedIp::with_ip("198.51.100.9");
        let handle = observed.clone();

        {
            let mut guard = handle.lock().await;
            guard.set("");
        }

        assert_eq!(observed.get().await, "");
        assert!(observed.snapshot().await.is_uninitialized());
    }
}
