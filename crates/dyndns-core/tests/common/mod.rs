//! Test doubles and common utilities for contract tests
//!
//! `FakeDns` is an in-memory provider that applies every mutation to its
//! own record set and logs every call, so tests can assert both the final
//! state and the exact call sequence.

#![allow(dead_code)]

use dyndns_core::config::{Config, EngineConfig, FailurePolicy, IpSourceConfig, OverlapPolicy, ProviderConfig};
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, IpResolver, IpVersion, RecordFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOMAIN: &str = "example.com";
pub const HOSTNAME: &str = "home.example.com";

/// One call made against the fake provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Session,
    ZoneId { zone_name: String },
    List { record_type: String, name: String },
    Create { name: String, content: String },
    Update { id: String, content: String },
    Delete { id: String },
}

#[derive(Default)]
struct FakeDnsState {
    records: Vec<DnsRecord>,
    calls: Vec<ProviderCall>,
    next_id: usize,
    fail_session: bool,
    fail_zone: bool,
    fail_update: bool,
    fail_create: bool,
    fail_delete_id: Option<String>,
}

/// In-memory provider; clones share state
#[derive(Clone, Default)]
pub struct FakeDns {
    state: Arc<Mutex<FakeDnsState>>,
}

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing A record
    pub fn seed(&self, name: &str, content: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state
            .records
            .push(DnsRecord::a(name, content).with_id(id.clone()));
        id
    }

    pub fn fail_session(&self) {
        self.state.lock().unwrap().fail_session = true;
    }

    pub fn fail_zone(&self) {
        self.state.lock().unwrap().fail_zone = true;
    }

    pub fn fail_update(&self) {
        self.state.lock().unwrap().fail_update = true;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_delete_of(&self, id: &str) {
        self.state.lock().unwrap().fail_delete_id = Some(id.to_string());
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_session = false;
        state.fail_zone = false;
        state.fail_update = false;
        state.fail_create = false;
        state.fail_delete_id = None;
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn records_named(&self, name: &str) -> Vec<DnsRecord> {
        self.records().into_iter().filter(|r| r.name == name).collect()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn creates(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Create { .. }))
            .collect()
    }

    pub fn updates(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Update { .. }))
            .collect()
    }

    pub fn deletes(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Delete { .. }))
            .collect()
    }

    /// Number of reconciliations started (one session each)
    pub fn session_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProviderCall::Session))
            .count()
    }

    fn record(&self, call: ProviderCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl DnsProviderFactory for FakeDns {
    fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        self.record(ProviderCall::Session);
        if self.state.lock().unwrap().fail_session {
            return Err(Error::auth("fake credentials rejected"));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl DnsProvider for FakeDns {
    async fn zone_id(&self, zone_name: &str) -> Result<String> {
        self.record(ProviderCall::ZoneId {
            zone_name: zone_name.to_string(),
        });
        if self.state.lock().unwrap().fail_zone {
            return Err(Error::not_found(format!("Zone not found: {}", zone_name)));
        }
        Ok(format!("zone-{}", zone_name))
    }

    async fn list_records(&self, _zone_id: &str, filter: &RecordFilter) -> Result<Vec<DnsRecord>> {
        self.record(ProviderCall::List {
            record_type: filter.record_type.clone(),
            name: filter.name.clone(),
        });
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| r.record_type == filter.record_type && r.name == filter.name)
            .cloned()
            .collect())
    }

    async fn create_record(&self, _zone_id: &str, record: &DnsRecord) -> Result<DnsRecord> {
        self.record(ProviderCall::Create {
            name: record.name.clone(),
            content: record.content.clone(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(Error::provider("fake", "create rejected"));
        }
        state.next_id += 1;
        let created = record.clone().with_id(format!("rec-{}", state.next_id));
        state.records.push(created.clone());
        Ok(created)
    }

    async fn update_record(&self, _zone_id: &str, record_id: &str, record: &DnsRecord) -> Result<()> {
        self.record(ProviderCall::Update {
            id: record_id.to_string(),
            content: record.content.clone(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_update {
            return Err(Error::rate_limited("fake update throttled"));
        }
        let existing = state
            .records
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(record_id))
            .ok_or_else(|| Error::not_found(record_id.to_string()))?;
        existing.content = record.content.clone();
        Ok(())
    }

    async fn delete_record(&self, _zone_id: &str, record_id: &str) -> Result<()> {
        self.record(ProviderCall::Delete {
            id: record_id.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_delete_id.as_deref() == Some(record_id) {
            return Err(Error::provider("fake", format!("delete of {} rejected", record_id)));
        }
        state.records.retain(|r| r.id.as_deref() != Some(record_id));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Resolver whose answer the test controls; clones share state
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    ip: Arc<Mutex<String>>,
    delay: Arc<Mutex<Option<Duration>>>,
    v4_calls: Arc<AtomicUsize>,
    other_calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn answering(ip: &str) -> Self {
        let resolver = Self::default();
        resolver.set_ip(ip);
        resolver
    }

    pub fn set_ip(&self, ip: &str) {
        *self.ip.lock().unwrap() = ip.to_string();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn v4_calls(&self) -> usize {
        self.v4_calls.load(Ordering::SeqCst)
    }

    pub fn other_calls(&self) -> usize {
        self.other_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpResolver for ScriptedResolver {
    async fn fetch(&self, version: IpVersion) -> String {
        if version != IpVersion::V4 {
            self.other_calls.fetch_add(1, Ordering::SeqCst);
            return String::new();
        }
        self.v4_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.ip.lock().unwrap().clone()
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// Minimal valid configuration managing `home.example.com`
pub fn test_config(overlap: OverlapPolicy, on_provider_error: FailurePolicy) -> Config {
    Config {
        domain: DOMAIN.to_string(),
        subdomain: "home".to_string(),
        provider: ProviderConfig::Cloudflare {
            api_key: "test-key".to_string(),
            api_email: "ops@example.com".to_string(),
            api_base: None,
        },
        ip_source: IpSourceConfig::default(),
        engine: EngineConfig {
            interval_secs: 60,
            overlap,
            on_provider_error,
        },
        log_level: "info".to_string(),
    }
}

/// Configuration with the default policies
pub fn default_config() -> Config {
    test_config(OverlapPolicy::Skip, FailurePolicy::Exit)
}

/// Drain every event currently buffered in the receiver
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<dyndns_core::EngineEvent>,
) -> Vec<dyndns_core::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
