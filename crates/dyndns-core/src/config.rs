//! Configuration types for the dyndns updater
//!
//! Configuration is environment-style key/value. [`Config::from_lookup`]
//! takes any lookup function so it can be exercised without touching the
//! process environment; [`Config::from_env`] is the production entry point.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default IPv4 lookup endpoint
pub const DEFAULT_IPV4_LOOKUP_URL: &str = "http://myexternalip.com/raw";

/// Default Cloudflare API base URL
pub const DEFAULT_CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default poll interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

const MAX_INTERVAL_SECS: u64 = 86_400;

/// Main configuration, loaded once and immutable afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Registered domain, also the zone name (e.g. "example.com")
    pub domain: String,

    /// Label prepended to the domain (e.g. "home")
    pub subdomain: String,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Public IP lookup configuration
    pub ip_source: IpSourceConfig,

    /// Poll loop settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Log level name (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Empty values are treated as missing. The four required variables
    /// are checked in a fixed order (`DOMAIN`, `CF_API_KEY`, `CF_API_EMAIL`,
    /// `SUBDOMAIN`) and the first missing one is named in the error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| crate::Error::config(format!("Need to define {} var", key)))
        };

        let domain = require("DOMAIN")?;
        let api_key = require("CF_API_KEY")?;
        let api_email = require("CF_API_EMAIL")?;
        let subdomain = require("SUBDOMAIN")?;

        let interval_secs = match get("DYNDNS_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                crate::Error::config(format!(
                    "DYNDNS_INTERVAL_SECS must be a whole number of seconds. Got: {}",
                    raw
                ))
            })?,
            None => DEFAULT_INTERVAL_SECS,
        };

        let overlap = match get("DYNDNS_OVERLAP") {
            Some(raw) => raw.parse()?,
            None => OverlapPolicy::default(),
        };

        let on_provider_error = match get("DYNDNS_ON_PROVIDER_ERROR") {
            Some(raw) => raw.parse()?,
            None => FailurePolicy::default(),
        };

        let config = Self {
            domain,
            subdomain,
            provider: ProviderConfig::Cloudflare {
                api_key,
                api_email,
                api_base: get("CF_API_BASE_URL"),
            },
            ip_source: IpSourceConfig {
                ipv4_url: get("DYNDNS_IP_URL")
                    .unwrap_or_else(|| DEFAULT_IPV4_LOOKUP_URL.to_string()),
            },
            engine: EngineConfig {
                interval_secs,
                overlap,
                on_provider_error,
            },
            log_level: get("DYNDNS_LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(default_log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fully-qualified name of the managed record
    pub fn hostname(&self) -> String {
        format!("{}.{}", self.subdomain, self.domain)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("Need to define DOMAIN var"));
        }
        if self.subdomain.is_empty() {
            return Err(crate::Error::config("Need to define SUBDOMAIN var"));
        }

        self.provider.validate()?;
        self.ip_source.validate()?;
        self.engine.validate()?;

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(crate::Error::config(format!(
                "DYNDNS_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Public IP lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceConfig {
    /// Endpoint returning the caller's IPv4 address as plain text
    pub ipv4_url: String,
}

impl IpSourceConfig {
    /// Validate the lookup configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.ipv4_url.starts_with("http://") && !self.ipv4_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "DYNDNS_IP_URL must use HTTP or HTTPS scheme. Got: {}",
                self.ipv4_url
            )));
        }
        Ok(())
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        Self {
            ipv4_url: DEFAULT_IPV4_LOOKUP_URL.to_string(),
        }
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare, authenticated with the global API key and account email
    Cloudflare {
        /// Cloudflare global API key
        api_key: String,
        /// Account email the key belongs to
        api_email: String,
        /// API base URL override
        #[serde(default)]
        api_base: Option<String>,
    },
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Cloudflare {
                api_email,
                api_base,
                ..
            } => f
                .debug_struct("Cloudflare")
                .field("api_key", &"<REDACTED>")
                .field("api_email", api_email)
                .field("api_base", api_base)
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_key,
                api_email,
                api_base,
            } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Need to define CF_API_KEY var"));
                }
                if api_email.is_empty() {
                    return Err(crate::Error::config("Need to define CF_API_EMAIL var"));
                }
                if let Some(base) = api_base
                    && !base.starts_with("http://")
                    && !base.starts_with("https://")
                {
                    return Err(crate::Error::config(format!(
                        "CF_API_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                        base
                    )));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name, as used by the registry
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

/// What to do when a tick comes due while the previous one is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new tick
    #[default]
    Skip,
    /// Run it anyway; ticks serialize on the observed-IP lock
    Allow,
}

impl std::str::FromStr for OverlapPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "allow" => Ok(Self::Allow),
            other => Err(crate::Error::config(format!(
                "DYNDNS_OVERLAP '{}' is not supported. Supported values: skip, allow",
                other
            ))),
        }
    }
}

/// What to do when a reconciliation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the loop and surface the error (process exits non-zero)
    #[default]
    Exit,
    /// Log, keep the observed IP, retry on the next tick
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exit" => Ok(Self::Exit),
            "continue" => Ok(Self::Continue),
            other => Err(crate::Error::config(format!(
                "DYNDNS_ON_PROVIDER_ERROR '{}' is not supported. Supported values: exit, continue",
                other
            ))),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Overlapping tick handling
    #[serde(default)]
    pub overlap: OverlapPolicy,

    /// Reconciliation failure handling
    #[serde(default)]
    pub on_provider_error: FailurePolicy,
}

impl EngineConfig {
    /// Poll interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=MAX_INTERVAL_SECS).contains(&self.interval_secs) {
            return Err(crate::Error::config(format!(
                "DYNDNS_INTERVAL_SECS must be between 1 and {} seconds. Got: {}",
                MAX_INTERVAL_SECS, self.interval_secs
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            overlap: OverlapPolicy::default(),
            on_provider_error: FailurePolicy::default(),
        }
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
