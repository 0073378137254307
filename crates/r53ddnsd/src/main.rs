// # r53ddnsd - Route 53 Dynamic DNS Daemon
//
// Thin integration layer: reads configuration, wires the components
// together and handles process lifecycle. All reconciliation logic lives in
// r53ddns-core.
//
// ## Startup
//
// 1. Load and validate configuration from `R53DDNS_*` environment variables
// 2. Initialize logging
// 3. Build the Route 53 client, record set source, health state and reconciler
// 4. Fetch records once; no matching records is fatal
// 5. Start the health endpoint (if a port is configured) and the poller
//
// ## Modes
//
// - `R53DDNS_MODE=run`: normal operation
// - `R53DDNS_MODE=dry-run`: read from Route 53, only log intended UPSERTs
// - `R53DDNS_MODE=policy`: print the IAM policy for the hostnames and exit
//
// ## Example
//
// ```bash
// export R53DDNS_HOSTNAMES=home.example.com,*.home.example.com
// export R53DDNS_AWS_ACCESS_KEY_ID=AKIA...
// export R53DDNS_AWS_SECRET_ACCESS_KEY=...
// export R53DDNS_HEALTH_PORT=9080
//
// r53ddnsd
// ```

use anyhow::{Context, Result};
use r53ddns_core::traits::{DnsRecordClient, PublicIpSubscriber, RecordStateSubscriber};
use r53ddns_core::{
    AgentConfig, Error, FetchPolicy, LogConfig, LogFormat, PublicIpPoller, Reconciler,
    RecordSetSource, RunMode,
};
use r53ddns_health::{HealthServer, HealthState};
use r53ddns_ip_http::HttpIpLookup;
use r53ddns_route53::{Route53Client, create_policy_for_zones};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Extra time granted to an in-flight cycle on shutdown, on top of the
/// convergence wait budget
const DRAIN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum R53ddnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<R53ddnsExitCode> for ExitCode {
    fn from(code: R53ddnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match AgentConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            return R53ddnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return R53ddnsExitCode::ConfigError.into();
    }

    info!("Starting r53ddnsd ({:?} mode)", config.mode);
    info!("Configuration loaded: {} hostname(s)", config.hostnames.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return R53ddnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let outcome = match config.mode {
            RunMode::Policy => print_policy(&config).await,
            RunMode::Run | RunMode::DryRun => run_daemon(config).await,
        };

        match outcome {
            Ok(()) => R53ddnsExitCode::CleanShutdown,
            Err(e) if is_startup_error(&e) => {
                error!("Startup failed: {:#}", e);
                R53ddnsExitCode::ConfigError
            }
            Err(e) => {
                error!("Daemon error: {:#}", e);
                R53ddnsExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(logging: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.to_lowercase()))
        .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("{}", e))
}

fn is_startup_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Error>()
        .or_else(|| err.downcast_ref::<Arc<Error>>().map(|e| &**e))
        .is_some_and(Error::is_fatal)
}

/// Print the IAM policy for the configured hostnames
async fn print_policy(config: &AgentConfig) -> Result<()> {
    let client = Route53Client::from_config(config)?;
    let zones = client.get_zones_for_records(&config.hostnames).await?;
    if zones.is_empty() {
        return Err(Error::no_matching_records(format!(
            "no hosted zone found for {}",
            config.hostnames.join(", ")
        ))
        .into());
    }

    let policy = create_policy_for_zones(&zones);
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

/// Run the agent until a shutdown signal arrives
async fn run_daemon(config: AgentConfig) -> Result<()> {
    let client: Arc<dyn DnsRecordClient> = Arc::new(Route53Client::from_config(&config)?);
    let health = HealthState::new();

    let source = Arc::new(
        RecordSetSource::new(
            Arc::clone(&client),
            FetchPolicy::from_cache_flag(config.cache_records),
            config.hostnames.clone(),
        )
        .with_subscriber(Arc::new(health.clone()) as Arc<dyn RecordStateSubscriber>),
    );
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&client), Arc::clone(&source)));

    // Zero matches on the very first fetch means a misconfiguration; any
    // other failure is retried by the first cycle
    info!(
        "Record set source: {:?} fetches for {}",
        source.policy(),
        source.hostnames().join(", ")
    );
    match source.get_records().await {
        Ok(records) => info!("Managing {} zone(s)", records.len()),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => warn!("Initial record fetch failed, will retry on first cycle: {}", e),
    }

    let health_server = match config.health.port {
        Some(port) => Some(HealthServer::start(health.clone(), &config.health.host, port).await?),
        None => {
            info!("Health endpoint disabled");
            None
        }
    };

    let lookup = Arc::new(HttpIpLookup::new()?);
    let subscribers: Vec<Arc<dyn PublicIpSubscriber>> =
        vec![Arc::clone(&reconciler) as Arc<dyn PublicIpSubscriber>, Arc::new(health)];
    let poller = PublicIpPoller::new(lookup, &config.poller, subscribers);
    info!("Polling public IP every {:?}", poller.interval());
    let poller_handle = poller.spawn();

    // A zero-match on the first successful fetch may still surface from a
    // cycle when the startup fetch failed transiently
    let fatal = tokio::select! {
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
            None
        }
        fatal = reconciler.wait_for_fatal() => Some(fatal),
    };

    poller_handle.abort();

    if let Some(fatal) = fatal {
        if let Some(server) = health_server {
            server.shutdown();
        }
        return Err(anyhow::Error::new(fatal));
    }

    let drain_timeout = config.change_wait.insync_limit() + DRAIN_GRACE;
    if tokio::time::timeout(drain_timeout, reconciler.drain())
        .await
        .is_err()
    {
        warn!("Reconciliation still running after {:?}, exiting anyway", drain_timeout);
    }

    if let Some(server) = health_server {
        server.shutdown();
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
///
/// # Returns
///
/// The name of the signal received
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
