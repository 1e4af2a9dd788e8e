// # Cloudflare DNS Provider
//
// Cloudflare implementation of the `DnsProvider` capability, talking to
// API v4 with the account's global API key.
//
// ## Behavior
//
// - One HTTP request per trait method
// - Errors are mapped to typed `dyndns_core::Error` values and returned;
//   no retries, no backoff, no caching between calls
// - HTTP timeout of 30 seconds per request
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or `Debug` output
// - A session cannot be built with an empty key or email
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dyndns_core::config::{DEFAULT_CLOUDFLARE_API_BASE, ProviderConfig};
use dyndns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordFilter};
use dyndns_core::{Error, ProviderRegistry, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

/// Cloudflare DNS provider session
///
/// Authenticates every request with the `X-Auth-Email` / `X-Auth-Key`
/// header pair.
pub struct CloudflareProvider {
    /// Global API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Account email the key belongs to
    api_email: String,

    /// API base URL, without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_key", &"<REDACTED>")
            .field("api_email", &self.api_email)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare session
    ///
    /// Fails with an authentication error when the key or email is empty,
    /// or when the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, api_email: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_email = api_email.into();

        if api_key.is_empty() {
            return Err(Error::auth("Cloudflare API key cannot be empty"));
        }
        if api_email.is_empty() {
            return Err(Error::auth("Cloudflare API email cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            api_email,
            api_base: DEFAULT_CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the session at a different API base URL
    pub fn with_base_url(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .header("X-Auth-Email", &self.api_email)
            .header("X-Auth-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    /// Send a request and unwrap the v4 envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if !status.is_success() {
            return Err(status_error(status, &body, action));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect();
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} failed: {}", action, messages.join(", ")),
            ));
        }

        Ok(envelope.result)
    }
}

/// Map a non-success status to a typed error
fn status_error(status: StatusCode, body: &str, action: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API key/email or insufficient permissions. Status: {}",
            action, status
        )),
        404 => Error::not_found(format!("{}: {}", action, status)),
        429 => Error::rate_limited(format!(
            "{}: rate limit exceeded. Status: {}",
            action, status
        )),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("{}: Cloudflare server error (transient): {} - {}", action, status, body),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{} failed: {} - {}", action, status, body),
        ),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn zone_id(&self, zone_name: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for domain: {}", zone_name);

        let request = self
            .request(Method::GET, "/zones")
            .query(&[("name", zone_name)]);
        let zones: Vec<Zone> = self
            .send(request, "Zone lookup")
            .await?
            .unwrap_or_default();

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone_name)))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone.id)
    }

    async fn list_records(&self, zone_id: &str, filter: &RecordFilter) -> Result<Vec<DnsRecord>> {
        tracing::debug!(
            "Listing DNS records: {} (type: {})",
            filter.name,
            filter.record_type
        );

        let request = self
            .request(Method::GET, &format!("/zones/{}/dns_records", zone_id))
            .query(&[
                ("type", filter.record_type.as_str()),
                ("name", filter.name.as_str()),
            ]);

        Ok(self
            .send::<Vec<DnsRecord>>(request, "Record lookup")
            .await?
            .unwrap_or_default())
    }

    async fn create_record(&self, zone_id: &str, record: &DnsRecord) -> Result<DnsRecord> {
        tracing::debug!(
            "Creating DNS record: {} {} -> {}",
            record.record_type,
            record.name,
            record.content
        );

        let request = self
            .request(Method::POST, &format!("/zones/{}/dns_records", zone_id))
            .json(record);

        self.send::<DnsRecord>(request, "Record create")
            .await?
            .ok_or_else(|| Error::provider(PROVIDER_NAME, "Record create returned no record"))
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, record: &DnsRecord) -> Result<()> {
        tracing::debug!(
            "Updating DNS record {}: {} -> {}",
            record_id,
            record.name,
            record.content
        );

        // Partial update: ttl and proxied stay as the owner set them
        let request = self
            .request(
                Method::PATCH,
                &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            )
            .json(record);

        self.send::<serde_json::Value>(request, "Record update").await?;
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        tracing::debug!("Deleting DNS record {}", record_id);

        let request = self.request(
            Method::DELETE,
            &format!("/zones/{}/dns_records/{}", zone_id, record_id),
        );

        self.send::<serde_json::Value>(request, "Record delete").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare sessions
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_key,
                api_email,
                api_base,
            } => {
                let mut provider = CloudflareProvider::new(api_key.clone(), api_email.clone())?;
                if let Some(base) = api_base {
                    provider = provider.with_base_url(base.clone());
                }
                Ok(Box::new(provider))
            }
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use dyndns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dyndns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Arc::new(CloudflareFactory));
}
