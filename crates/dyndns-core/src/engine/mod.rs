//! Poll loop
//!
//! The [`PollLoop`] is responsible for:
//! - Running one check immediately at startup
//! - Dispatching a check every interval as its own task
//! - Comparing the resolved address with the [`ObservedIp`]
//! - Reconciling the DNS record on first run or on change
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  tick   ┌──────────────┐  fetch(V4)  ┌─────────────┐
//! │  Interval    │───────▶│  check task  │────────────▶│ IpResolver  │
//! └──────────────┘        └──────────────┘             └─────────────┘
//!                                 │ lock
//!                                 ▼
//!                         ┌──────────────┐  reconcile  ┌──────────────┐
//!                         │  ObservedIp  │────────────▶│DnsReconciler │
//!                         └──────────────┘             └──────────────┘
//! ```
//!
//! ## States
//!
//! - **Uninitialized**: observed IP empty; the next resolved address is
//!   reconciled unconditionally
//! - **Tracking**: observed IP set; only a different address is reconciled

use crate::config::{Config, FailurePolicy, OverlapPolicy};
use crate::error::{Error, Result};
use crate::reconciler::{DnsReconciler, ReconcileOutcome};
use crate::state::ObservedIp;
use crate::traits::{IpResolver, IpVersion};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Capacity of the event channel handed out by [`PollLoop::new`]
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the PollLoop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Loop started
    Started {
        hostname: String,
        interval_secs: u64,
    },

    /// A check began
    CheckStarted,

    /// The resolved address differs from the observed one
    /// (`previous` is empty on first run)
    IpChanged { previous: String, current: String },

    /// Reconciliation started
    ReconcileStarted { hostname: String, ip: String },

    /// Reconciliation succeeded
    ReconcileSucceeded {
        hostname: String,
        ip: String,
        outcome: ReconcileOutcome,
    },

    /// Reconciliation failed
    ReconcileFailed {
        hostname: String,
        ip: String,
        error: String,
    },

    /// A tick came due while the previous check was still running
    TickSkipped,

    /// Loop stopped
    Stopped { reason: String },
}

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Lookup returned nothing; observed IP cleared, nothing reconciled
    Unresolved,
    /// Same address as before
    Unchanged,
    /// Record reconciled to the new address
    Reconciled(ReconcileOutcome),
    /// Reconciliation failed and was tolerated ([`FailurePolicy::Continue`])
    ReconcileFailed,
}

/// State shared by the loop and every check task
struct CheckContext {
    resolver: Arc<dyn IpResolver>,
    reconciler: DnsReconciler,
    observed: ObservedIp,
    domain: String,
    hostname: String,
    on_provider_error: FailurePolicy,
    in_flight: AtomicBool,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl CheckContext {
    /// One check-and-maybe-reconcile pass
    ///
    /// The observed-IP lock is held from lookup to write, so overlapping
    /// checks run one after another against the latest value.
    async fn check(&self) -> Result<TickOutcome> {
        info!("Checking IP...");
        self.emit_event(EngineEvent::CheckStarted);

        let mut observed = self.observed.lock().await;
        let current = self.resolver.fetch(IpVersion::V4).await;

        if current.is_empty() {
            warn!(
                "Could not determine public IP via {}; {} will be reconciled on the next successful lookup",
                self.resolver.resolver_name(),
                self.hostname
            );
            observed.set("");
            return Ok(TickOutcome::Unresolved);
        }

        if !observed.is_uninitialized() && observed.ip == current {
            debug!("IP unchanged: {}", current);
            return Ok(TickOutcome::Unchanged);
        }

        if observed.is_uninitialized() {
            info!("First run: pointing {} at {}", self.hostname, current);
        } else {
            let held_secs = observed.age().map_or(0, |age| age.num_seconds());
            info!(
                "IP address changed: {} -> {} (previous address held for {}s)",
                observed.ip, current, held_secs
            );
        }
        self.emit_event(EngineEvent::IpChanged {
            previous: observed.ip.clone(),
            current: current.clone(),
        });

        self.emit_event(EngineEvent::ReconcileStarted {
            hostname: self.hostname.clone(),
            ip: current.clone(),
        });

        match self
            .reconciler
            .reconcile(&self.domain, &self.hostname, &current)
            .await
        {
            Ok(outcome) => {
                self.emit_event(EngineEvent::ReconcileSucceeded {
                    hostname: self.hostname.clone(),
                    ip: current.clone(),
                    outcome: outcome.clone(),
                });
                observed.set(current);
                Ok(TickOutcome::Reconciled(outcome))
            }
            Err(e) => {
                self.emit_event(EngineEvent::ReconcileFailed {
                    hostname: self.hostname.clone(),
                    ip: current.clone(),
                    error: e.to_string(),
                });
                match self.on_provider_error {
                    FailurePolicy::Exit => Err(e),
                    FailurePolicy::Continue => {
                        error!(
                            "Failed to reconcile {} -> {}: {}; keeping observed IP '{}'",
                            self.hostname, current, e, observed.ip
                        );
                        Ok(TickOutcome::ReconcileFailed)
                    }
                }
            }
        }
    }

    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening; events are optional
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Fixed-interval check-and-reconcile loop
///
/// ## Lifecycle
///
/// 1. Create with [`PollLoop::new()`]
/// 2. Start with [`PollLoop::run_with_shutdown()`]
/// 3. The loop runs until a shutdown signal, or until a reconciliation
///    fails under [`FailurePolicy::Exit`]
pub struct PollLoop {
    ctx: Arc<CheckContext>,
    interval: Duration,
    overlap: OverlapPolicy,
}

impl PollLoop {
    /// Create a new poll loop
    ///
    /// # Returns
    ///
    /// A tuple of (loop, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Arc<dyn IpResolver>,
        reconciler: DnsReconciler,
        config: &Config,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let ctx = CheckContext {
            resolver,
            reconciler,
            observed: ObservedIp::new(),
            domain: config.domain.clone(),
            hostname: config.hostname(),
            on_provider_error: config.engine.on_provider_error,
            in_flight: AtomicBool::new(false),
            event_tx: tx,
        };

        let poll_loop = Self {
            ctx: Arc::new(ctx),
            interval: config.engine.interval(),
            overlap: config.engine.overlap,
        };

        Ok((poll_loop, rx))
    }

    /// Start from an existing observed-IP slot instead of an empty one
    pub fn with_observed(mut self, observed: ObservedIp) -> Self {
        if let Some(ctx) = Arc::get_mut(&mut self.ctx) {
            ctx.observed = observed;
        }
        self
    }

    /// Override the configured interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Handle to the observed-IP slot
    pub fn observed(&self) -> ObservedIp {
        self.ctx.observed.clone()
    }

    /// Run a single check on the current task
    ///
    /// Fails only when reconciliation fails under [`FailurePolicy::Exit`].
    pub async fn tick(&self) -> Result<TickOutcome> {
        self.ctx.check().await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// The daemon routes SIGINT/SIGTERM into this channel; tests drive it
    /// directly.
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.ctx.emit_event(EngineEvent::Started {
            hostname: self.ctx.hostname.clone(),
            interval_secs: self.interval.as_secs(),
        });

        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        tokio::pin!(shutdown);

        // Initial pass runs before the first interval elapses
        tokio::select! {
            _ = &mut shutdown => {
                self.stop("Shutdown signal");
                return Ok(());
            }
            result = self.ctx.check() => {
                if let Err(e) = result {
                    error!("Fatal error during initial check: {}", e);
                    self.stop(&e.to_string());
                    return Err(e);
                }
            }
        }

        info!("Entering control loop (every {:?})", self.interval);

        let mut interval = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);
        let mut checks = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }

                Some(joined) = checks.join_next(), if !checks.is_empty() => {
                    match joined {
                        Ok(Ok(outcome)) => debug!("Check finished: {:?}", outcome),
                        Ok(Err(e)) => {
                            error!("Fatal error during check: {}", e);
                            break Err(e);
                        }
                        Err(e) => {
                            error!("Check task failed: {}", e);
                            break Err(Error::Other(format!("check task failed: {}", e)));
                        }
                    }
                }

                Some(_) = ticks.next() => {
                    self.dispatch(&mut checks);
                }
            }
        };

        // In-flight checks are abandoned, not awaited
        checks.shutdown().await;

        match &result {
            Ok(()) => self.stop("Shutdown signal"),
            Err(e) => self.stop(&e.to_string()),
        }
        result
    }

    /// Spawn one check, honoring the overlap policy
    fn dispatch(&self, checks: &mut JoinSet<Result<TickOutcome>>) {
        let track = self.overlap == OverlapPolicy::Skip;

        if track && self.ctx.in_flight.swap(true, Ordering::SeqCst) {
            warn!("Previous check still running, skipping tick");
            self.ctx.emit_event(EngineEvent::TickSkipped);
            return;
        }

        let ctx = Arc::clone(&self.ctx);
        checks.spawn(async move {
            let result = ctx.check().await;
            if track {
                ctx.in_flight.store(false, Ordering::SeqCst);
            }
            result
        });
    }

    fn stop(&self, reason: &str) {
        info!("Poll loop stopped: {}", reason);
        self.ctx.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
    }
}
