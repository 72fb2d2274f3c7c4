// # ddnsd - DDNS Daemon
//
// This daemon is a thin integration layer. All reconciliation logic lives in
// ddns-core; the daemon only wires the pieces together:
//
// 1. Reading the configuration file and environment overrides
// 2. Initializing logging and the runtime
// 3. Building the record graph with the Cloudflare provider and HTTP lookup
// 4. Starting the run loop and translating signals into wake requests
//
// ## Environment
//
// - `DDNS_CONFIG`: Path to the TOML configuration (default `./config.toml`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
// - `DDNS_RUN_ONCE`: Run a single cycle and exit (overrides `global.run_once`)
// - `DDNS_MODE=dry-run`: Read records but never write them
//
// ## Signals (Unix)
//
// - `SIGHUP`: Start the next cycle now
// - `SIGINT` / `SIGTERM`: Stop after the current cycle
//
// ## Example
//
// ```bash
// export DDNS_CONFIG=/etc/ddns/config.toml
// export DDNS_LOG_LEVEL=debug
//
// ddnsd
// ```

use anyhow::Result;
use ddns_core::{DdnsConfig, DdnsEngine, Scheduler, WakeReason};
use ddns_ip_http::HttpAddressLookup;
use ddns_provider_cloudflare::CloudflareFactory;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Path used when `DDNS_CONFIG` is not set
const DEFAULT_CONFIG_PATH: &str = "./config.toml";

/// How long a stop request may wait for the current cycle
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings read from the environment
struct DaemonEnv {
    config_path: String,
    log_level: Level,
    run_once: Option<bool>,
}

impl DaemonEnv {
    fn from_env() -> Result<Self> {
        let log_level = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                log_level
            ),
        };

        let run_once = match env::var("DDNS_RUN_ONCE") {
            Ok(value) => Some(parse_flag(&value)?),
            Err(_) => None,
        };

        Ok(Self {
            config_path: env::var("DDNS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
            log_level,
            run_once,
        })
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("DDNS_RUN_ONCE '{}' is not a boolean", other),
    }
}

/// Load, override and validate the configuration file
fn load_config(daemon_env: &DaemonEnv) -> Result<DdnsConfig> {
    let mut config = DdnsConfig::load(&daemon_env.config_path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", daemon_env.config_path, e))?;
    if let Some(run_once) = daemon_env.run_once {
        config.global.run_once = run_once;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let daemon_env = match DaemonEnv::from_env() {
        Ok(daemon_env) => daemon_env,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(daemon_env.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config = match load_config(&daemon_env) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let scheduler = match start_daemon(&config) {
            Ok(started) => started,
            Err(e) => {
                error!("Startup error: {}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        match supervise(scheduler).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {}", e);
                DdnsExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Build the engine and start its run loop
fn start_daemon(config: &DdnsConfig) -> Result<(Scheduler<WakeReason>, JoinHandle<()>)> {
    info!("==================================================");
    info!("  {}", config.server_name);
    info!("  ddnsd {}", env!("CARGO_PKG_VERSION"));
    info!("==================================================");

    let lookup = Arc::new(HttpAddressLookup::from_config(&config.lookup)?);
    let factory = CloudflareFactory::from_env();
    let engine = Arc::new(DdnsEngine::from_config(config, &factory, lookup)?);

    match engine.options().update_interval {
        Some(interval) => info!("Update interval: {:?}", interval),
        None => info!("Single-run mode"),
    }
    if engine.options().force_update {
        info!("Force update enabled: records are written every cycle");
    }

    let scheduler: Scheduler<WakeReason> = Scheduler::new("ddns");
    let handle = scheduler.start(move |s| engine.run(s))?;
    Ok((scheduler, handle))
}

/// What the supervisor woke up for
enum Event {
    Finished(std::result::Result<(), JoinError>),
    RunNow,
    Stop(&'static str),
}

/// Forward signals to the run loop until it stops
async fn supervise(
    (scheduler, mut handle): (Scheduler<WakeReason>, JoinHandle<()>),
) -> Result<()> {
    let mut signals = Signals::new()?;

    loop {
        let event = tokio::select! {
            joined = &mut handle => Event::Finished(joined),
            event = signals.next() => event,
        };

        match event {
            Event::Finished(joined) => {
                joined.map_err(|e| anyhow::anyhow!("run loop failed: {}", e))?;
                info!("Run loop finished");
                return Ok(());
            }
            Event::RunNow => {
                info!("Received SIGHUP, starting a cycle now");
                if let Err(e) = scheduler.interrupt(WakeReason::RunNow) {
                    error!("Could not wake the run loop: {}", e);
                }
            }
            Event::Stop(signal) => {
                info!("Received shutdown signal: {}", signal);
                if let Err(e) = scheduler.interrupt(WakeReason::Shutdown) {
                    error!("Could not stop the run loop: {}", e);
                }
                return wait_for_shutdown_with_timeout(handle, SHUTDOWN_TIMEOUT).await;
            }
        }
    }
}

/// Wait for the run loop to finish its current cycle
///
/// This prevents the daemon from hanging indefinitely on a stuck request.
async fn wait_for_shutdown_with_timeout(
    handle: JoinHandle<()>,
    timeout_duration: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout_duration, handle).await {
        Ok(Ok(())) => {
            info!("Shutting down daemon");
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("run loop failed: {}", e)),
        Err(_) => Err(anyhow::anyhow!(
            "Shutdown timeout after {:?}",
            timeout_duration
        )),
    }
}

#[cfg(unix)]
struct Signals {
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> Result<Self> {
        let hangup = signal(SignalKind::hangup())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?;
        let terminate = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let interrupt = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self {
            hangup,
            terminate,
            interrupt,
        })
    }

    async fn next(&mut self) -> Event {
        tokio::select! {
            _ = self.hangup.recv() => Event::RunNow,
            _ = self.terminate.recv() => Event::Stop("SIGTERM"),
            _ = self.interrupt.recv() => Event::Stop("SIGINT"),
        }
    }
}

/// Fallback for non-Unix platforms: CTRL-C only
#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> Event {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Event::Stop("CTRL-C"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag(" yes ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_wait_times_out_on_a_stuck_loop() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let err = wait_for_shutdown_with_timeout(handle, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Shutdown timeout"));
    }
}
