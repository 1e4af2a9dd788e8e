// # dyndnsd - Dynamic DNS Daemon
//
// Thin composition root: everything that decides *what* to do with DNS
// lives in dyndns-core. This binary is responsible for:
// 1. Loading an optional env file and reading configuration
// 2. Initializing logging and the runtime
// 3. Registering the Cloudflare provider and wiring the HTTP IP resolver
// 4. Running the poll loop until a signal or a fatal error
//
// ## Configuration
//
// ### Required
// - `DOMAIN`: Registered domain, also the Cloudflare zone name
// - `SUBDOMAIN`: Label of the managed record
// - `CF_API_KEY`: Cloudflare global API key
// - `CF_API_EMAIL`: Account email for the API key
//
// ### Optional
// - `DYNDNS_IP_URL`: IPv4 lookup endpoint
// - `DYNDNS_INTERVAL_SECS`: Poll interval in seconds (default 60)
// - `DYNDNS_OVERLAP`: `skip` or `allow`
// - `DYNDNS_ON_PROVIDER_ERROR`: `exit` or `continue`
// - `DYNDNS_LOG_LEVEL`: trace, debug, info, warn, error
// - `CF_API_BASE_URL`: Cloudflare API base URL
//
// ## Example
//
// ```bash
// export DOMAIN=example.com
// export SUBDOMAIN=home
// export CF_API_EMAIL=ops@example.com
// export CF_API_KEY=your_key
//
// dyndnsd
// # or, with the same variables in a file:
// dyndnsd --config /etc/dyndns/dyndns.env
// ```

use anyhow::Result;
use clap::Parser;
use dyndns_core::{Config, DnsReconciler, EngineEvent, PollLoop, ProviderRegistry};
use dyndns_ip_http::HttpIpResolver;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// How long the loop gets to wind down after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (fatal reconcile failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DyndnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep a Cloudflare A record pointed at this host's public IPv4 address
#[derive(Debug, Parser)]
#[command(name = "dyndnsd", version, about)]
struct Cli {
    /// Env file to load before reading configuration; variables already
    /// set in the environment win
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), |key| std::env::var(key).ok()) {
        Ok(cfg) => cfg,
        Err(code) => return code.into(),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config.log_level))
        .with_writer(std::io::stdout)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    info!("Starting dyndnsd {}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(serve(&config)).into()
}

/// Read configuration from `env`, with the optional env file underneath it
///
/// Variables present in `env` always win over the file, matching dotenv's
/// no-override rule. Any failure is reported on stderr and mapped to
/// [`DyndnsExitCode::ConfigError`].
fn load_config<F>(config_path: Option<&Path>, env: F) -> std::result::Result<Config, DyndnsExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    let file_vars = match config_path {
        Some(path) => match read_env_file(path) {
            Ok(vars) => vars,
            Err(e) => {
                eprintln!("Error loading .env file {}: {}", path.display(), e);
                return Err(DyndnsExitCode::ConfigError);
            }
        },
        None => HashMap::new(),
    };

    Config::from_lookup(|key| env(key).or_else(|| file_vars.get(key).cloned())).map_err(|e| {
        eprintln!("Configuration error: {}", e);
        DyndnsExitCode::ConfigError
    })
}

fn read_env_file(path: &Path) -> std::result::Result<HashMap<String, String>, dotenvy::Error> {
    dotenvy::from_path_iter(path)?.collect()
}

/// Build the loop, run it and map the outcome to an exit code
async fn serve(config: &Config) -> DyndnsExitCode {
    let (poll_loop, events) = match build_poll_loop(config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {}", e);
            return DyndnsExitCode::ConfigError;
        }
    };

    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("Startup error: {}", e);
            return DyndnsExitCode::ConfigError;
        }
    };

    tokio::spawn(log_events(events));

    match run_daemon(&poll_loop, signals).await {
        Ok(()) => {
            info!("Shutdown complete");
            DyndnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DyndnsExitCode::RuntimeError
        }
    }
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Wire the registry, resolver and reconciler into a poll loop
fn build_poll_loop(config: &Config) -> dyndns_core::Result<(PollLoop, mpsc::Receiver<EngineEvent>)> {
    let registry = ProviderRegistry::new();
    dyndns_provider_cloudflare::register(&registry);

    let factory = registry.factory_for(&config.provider)?;
    let reconciler = DnsReconciler::new(factory, config.provider.clone());
    let resolver = Arc::new(HttpIpResolver::from_config(&config.ip_source));

    info!(
        "Managing A record {} via {} (IP lookup: {}, every {}s)",
        config.hostname(),
        config.provider.type_name(),
        config.ip_source.ipv4_url,
        config.engine.interval_secs
    );

    PollLoop::new(resolver, reconciler, config)
}

/// Run the loop until it fails or a signal arrives
async fn run_daemon(poll_loop: &PollLoop, signals: ShutdownSignals) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let run = poll_loop.run_with_shutdown(shutdown_rx);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => return Ok(result?),
        signal = signals.recv() => {
            info!("Received shutdown signal: {}", signal);
            let _ = shutdown_tx.send(());
        }
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut run).await {
        Ok(result) => Ok(result?),
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }
}

/// Drain engine events so the bounded channel never backs up
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Signal handlers installed up front so a setup failure is a startup error
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for SIGTERM or SIGINT and return its name
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Fallback for non-Unix platforms: Ctrl-C only
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
