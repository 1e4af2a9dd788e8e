//! Plugin-based provider registry
//!
//! Provider crates register a [`DnsProviderFactory`] under a type name;
//! the daemon looks the factory up from [`ProviderConfig::type_name`] and
//! hands it to the reconciler, which builds a fresh session per run.
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! dyndns_provider_cloudflare::register(&registry);
//!
//! let factory = registry.factory_for(&config.provider)?;
//! let reconciler = DnsReconciler::new(factory, config.provider.clone());
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::DnsProviderFactory;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of DNS provider factories keyed by type name
///
/// Interior mutability lets providers register through a shared reference.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under `name` (e.g. "cloudflare")
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Arc<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.insert(name.into(), factory);
    }

    /// Look up the factory for a provider configuration
    pub fn factory_for(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProviderFactory>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());

        if let Some(factory) = providers.get(provider_type) {
            return Ok(Arc::clone(factory));
        }
        drop(providers);

        let mut registered = self.list_providers();
        registered.sort();
        Err(Error::config(format!(
            "Unknown provider type: {}. Registered providers: [{}]",
            provider_type,
            registered.join(", ")
        )))
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        providers.contains_key(name)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        providers.keys().cloned().collect()
    }
}
