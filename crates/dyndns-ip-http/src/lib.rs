// # HTTP IP Resolver
//
// Discovers the host's public IPv4 address by asking an echo service
// (default `http://myexternalip.com/raw`) and reading back the plain-text
// body.
//
// ## Failure Contract
//
// The resolver never returns an error. A failed request, a non-success
// status or an unreadable body all yield `""`, which the poll loop treats
// as "address unknown". Only IPv4 is supported; other versions yield `""`
// without any network traffic.

use async_trait::async_trait;
use dyndns_core::config::IpSourceConfig;
use dyndns_core::traits::{IpResolver, IpVersion};
use std::time::Duration;

/// Request timeout for lookups
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP resolver
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    /// Endpoint returning the caller's IPv4 address
    ipv4_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver querying `ipv4_url` for IPv4 lookups
    pub fn new(ipv4_url: impl Into<String>) -> Self {
        Self {
            ipv4_url: ipv4_url.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create a resolver from configuration
    pub fn from_config(config: &IpSourceConfig) -> Self {
        Self::new(config.ipv4_url.clone())
    }

    /// Endpoint for a version, if the version is supported
    fn endpoint(&self, version: IpVersion) -> Option<&str> {
        match version {
            IpVersion::V4 => Some(self.ipv4_url.as_str()),
            IpVersion::V6 | IpVersion::Other(_) => None,
        }
    }

    async fn lookup(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {}", e))?;

        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn fetch(&self, version: IpVersion) -> String {
        let Some(url) = self.endpoint(version) else {
            tracing::debug!("No lookup endpoint for {}, returning empty address", version);
            return String::new();
        };

        match self.lookup(url).await {
            Ok(ip) => {
                tracing::debug!("Resolved public {} address: {}", version, ip);
                ip
            }
            Err(e) => {
                tracing::warn!("Public IP lookup via {} failed: {}", url, e);
                String::new()
            }
        }
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}
