//! Contract Test: Poll Loop State Machine
//!
//! Verifies the Uninitialized → Tracking transitions of a single check.
//!
//! Constraints verified:
//! - First check reconciles unconditionally and starts tracking
//! - An unchanged address makes no provider calls
//! - A changed address reconciles exactly once with the new address
//! - An empty lookup never reconciles and clears the observed address
//! - Provider failures follow the configured failure policy

mod common;

use common::*;
use dyndns_core::config::{FailurePolicy, OverlapPolicy};
use dyndns_core::{DnsReconciler, EngineEvent, ObservedIp, PollLoop, ReconcileOutcome, TickOutcome};
use std::sync::Arc;

fn poll_loop(
    dns: &FakeDns,
    resolver: &ScriptedResolver,
    policy: FailurePolicy,
) -> (PollLoop, tokio::sync::mpsc::Receiver<EngineEvent>) {
    let config = test_config(OverlapPolicy::Skip, policy);
    let reconciler = DnsReconciler::new(Arc::new(dns.clone()), config.provider.clone());
    PollLoop::new(Arc::new(resolver.clone()), reconciler, &config)
        .expect("poll loop construction succeeds")
}

#[tokio::test]
async fn first_check_reconciles_even_without_change() {
    let dns = FakeDns::new();
    let resolver = ScriptedResolver::answering("198.51.100.9");
    let (poll_loop, mut events) = poll_loop(&dns, &resolver, FailurePolicy::Exit);

    assert!(poll_loop.observed().snapshot().await.is_uninitialized());

    let outcome = poll_loop.tick().await.expect("check succeeds");

    assert!(matches!(
        outcome,
        TickOutcome::Reconciled(ReconcileOutcome::Created { .. })
    ));
    assert_eq!(
        dns.creates(),
        vec![ProviderCall::Create {
            name: HOSTNAME.to_string(),
            content: "198.51.100.9".to_string(),
        }]
    );
    assert_eq!(poll_loop.observed().get().await, "198.51.100.9");

    let events = drain_events(&mut events);
    assert!(events.contains(&EngineEvent::IpChanged {
        previous: String::new(),
        current: "198.51.100.9".to_string(),
    }));
}

#[tokio::test]
async fn unchanged_ip_makes_no_provider_calls() {
    let dns = FakeDns::new();
    let resolver = ScriptedResolver::answering("198.51.100.9");
    let (poll_loop, _events) = poll_loop(&dns, &resolver, FailurePolicy::Exit);
    let poll_loop = poll_loop.with_observed(ObservedIp::with_ip("198.51.100.9"));

    let outcome = poll_loop.tick().await.expect("check succeeds");

    assert_eq!(outcome, TickOutcome::Unchanged);
    assert!(dns.calls().is_empty());
    assert_eq!(poll_loop.observed().get().await, "198.51.100.9");
    assert_eq!(resolver.v4_calls(), 1);
}

#[tokio::test]
async fn changed_ip_reconciles_once_with_new_address() {
    let dns = FakeDns::new();
    dns.seed(HOSTNAME, "198.51.100.9");
    let resolver = ScriptedResolver::answering("198.51.100.10");
    let (poll_loop, mut events) = poll_loop(&dns, &resolver, FailurePolicy::Exit);
    let poll_loop = poll_loop.with_observed(ObservedIp::with_ip("198.51.100.9"));

    let outcome = poll_loop.tick().await.expect("check succeeds");

    assert!(matches!(
        outcome,
        TickOutcome::Reconciled(ReconcileOutcome::Updated { .. })
    ));
    assert_eq!(dns.session_count(), 1);
    assert_eq!(
        dns.updates(),
        vec![ProviderCall::Update {
            id: dns.records_named(HOSTNAME)[0].id.clone().unwrap(),
            content: "198.51.100.10".to_string(),
        }]
    );
    assert_eq!(poll_loop.observed().get().await, "198.51.100.10");

    let events = drain_events(&mut events);
    assert!(events.contains(&EngineEvent::IpChanged {
        previous: "198.51.100.9".to_string(),
        current: "198.51.100.10".to_string(),
    }));
}

#[tokio::test]
async fn only_ipv4_is_requested() {
    let dns = FakeDns::new();
    let resolver = ScriptedResolver::answering("198.51.100.9");
    let (poll_loop, _events) = poll_loop(&dns, &resolver, FailurePolicy::Exit);

    poll_loop.tick().await.unwrap();
    poll_loop.tick().await.unwrap();

    assert_eq!(resolver.v4_calls(), 2);
    assert_eq!(resolver.other_calls(), 0);
}

#[tokio::test]
async fn empty_lookup_clears_observed_ip_without_reconciling() {
    let dns = FakeDns::new();
    let resolver = ScriptedResolver::answering("");
    let (poll_loop, _events) = poll_loop(&dns, &resolver, FailurePolicy::Exit);
    let poll_loop = poll_loop.with_observed(ObservedIp::with_ip("198.51.100.9"));

    let outcome = poll_loop.tick().await.expect("check succeeds");

    assert_eq!(outcome, TickOutcome::Unresolved);
    assert!(dns.calls().is_empty());
    assert!(poll_loop.observed().snapshot().await.is_uninitialized());

    // Lookup recovers with the same address: reconciled again as a first run
    resolver.set_ip("198.51.100.9");
    let outcome = poll_loop.tick().await.expect("check succeeds");

    assert!(matches!(outcome, TickOutcome::Reconciled(_)));
    assert_eq!(dns.session_count(), 1);
    assert_eq!(poll_loop.observed().get().await, "198.51.100.9");
}

#[tokio::test]
async fn exit_policy_returns_provider_error() {
    let dns = FakeDns::new();
    dns.fail_zone();
    let resolver = ScriptedResolver::answering("198.51.100.9");
    let (poll_loop, mut events) = poll_loop(&dns, &resolver, FailurePolicy::Exit);

    let result = poll_loop.tick().await;

    assert!(result.is_err());
    let events = drain_events(&mut events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::ReconcileFailed { .. }))
    );
}

#[tokio::test]
async fn continue_policy_keeps_observed_ip_and_retries_next_tick() {
    let dns = FakeDns::new();
    dns.seed(HOSTNAME, "198.51.100.9");
    dns.fail_update();
    let resolver = ScriptedResolver::answering("198.51.100.10");
    let (poll_loop, _events) = poll_loop(&dns, &resolver, FailurePolicy::Continue);
    let poll_loop = poll_loop.with_observed(ObservedIp::with_ip("198.51.100.9"));

    let outcome = poll_loop.tick().await.expect("failure is tolerated");

    assert_eq!(outcome, TickOutcome::ReconcileFailed);
    assert_eq!(poll_loop.observed().get().await, "198.51.100.9");

    // Provider recovers: the same change is retried
    dns.heal();
    let outcome = poll_loop.tick().await.expect("check succeeds");

    assert!(matches!(outcome, TickOutcome::Reconciled(_)));
    assert_eq!(dns.updates().len(), 2);
    assert_eq!(poll_loop.observed().get().await, "198.51.100.10");
    assert_eq!(dns.records_named(HOSTNAME)[0].content, "198.51.100.10");
}
