// # dnsmasq-apid - dnsmasq record sync daemon
//
// Thin integration layer over dnsmasq-api-core. All record, file and
// reload logic lives in the core crate; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Opens the sync engine (rebuilding the store from the dnsmasq file)
// 4. Waits for signals
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `DNSMASQ_API_DNSMASQ_CONFIG`: dnsmasq file managed by the daemon (required)
// - `DNSMASQ_API_SKIP_RELOAD`: `true` to write the file without reloading dnsmasq
// - `DNSMASQ_API_STORE_TYPE`: Record store type (file, memory)
// - `DNSMASQ_API_DB_PATH`: Persistence file (for file store)
// - `DNSMASQ_API_DB_BUCKET`: Bucket name inside the persistence file
// - `DNSMASQ_API_RELOAD_COMMAND`: Reload command, split on whitespace
// - `DNSMASQ_API_RELOAD_TIMEOUT_SECS`: Upper bound on the reload command's run time
// - `DNSMASQ_API_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Signals
//
// - `SIGHUP`: rebuild the store from the dnsmasq file
// - `SIGTERM` / `SIGINT`: close the store and exit
//
// ## Example
//
// ```bash
// export DNSMASQ_API_DNSMASQ_CONFIG=/etc/dnsmasq.d/api.conf
// export DNSMASQ_API_DB_PATH=/var/lib/dnsmasq-api/dns.db
//
// dnsmasq-apid
// ```

use anyhow::{Context, Result};
use dnsmasq_api_core::config::{DEFAULT_DB_BUCKET_NAME, DEFAULT_DB_FILE_PATH};
use dnsmasq_api_core::{
    AtomicMetrics, ReloadConfig, StoreConfig, SyncEngine, SyncEvent, SyncSettings,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ApidExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<ApidExitCode> for ExitCode {
    fn from(code: ApidExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    dnsmasq_config: String,
    skip_reload: bool,
    store_type: String,
    db_path: String,
    db_bucket: String,
    reload_command: Vec<String>,
    reload_timeout_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` (variable name → value)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dnsmasq_config = lookup("DNSMASQ_API_DNSMASQ_CONFIG").context(
            "DNSMASQ_API_DNSMASQ_CONFIG is required. \
            Set it via: export DNSMASQ_API_DNSMASQ_CONFIG=/etc/dnsmasq.d/api.conf",
        )?;

        let skip_reload = match lookup("DNSMASQ_API_SKIP_RELOAD") {
            Some(value) => parse_bool("DNSMASQ_API_SKIP_RELOAD", &value)?,
            None => false,
        };

        let reload_command = match lookup("DNSMASQ_API_RELOAD_COMMAND") {
            Some(value) => value.split_whitespace().map(String::from).collect(),
            None => ReloadConfig::default().command,
        };

        let reload_timeout_secs = lookup("DNSMASQ_API_RELOAD_TIMEOUT_SECS")
            .map(|s| {
                s.trim().parse::<u64>().with_context(|| {
                    format!("DNSMASQ_API_RELOAD_TIMEOUT_SECS must be a number of seconds. Got: {}", s)
                })
            })
            .transpose()?;

        Ok(Self {
            dnsmasq_config,
            skip_reload,
            store_type: lookup("DNSMASQ_API_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            db_path: lookup("DNSMASQ_API_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_FILE_PATH.to_string()),
            db_bucket: lookup("DNSMASQ_API_DB_BUCKET")
                .unwrap_or_else(|| DEFAULT_DB_BUCKET_NAME.to_string()),
            reload_command,
            reload_timeout_secs,
            log_level: lookup("DNSMASQ_API_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks the daemon-level values here; the engine settings built from
    /// them are validated again by the core.
    fn validate(&self) -> Result<()> {
        if self.dnsmasq_config.trim().is_empty() {
            anyhow::bail!("DNSMASQ_API_DNSMASQ_CONFIG cannot be empty");
        }

        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "DNSMASQ_API_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            if self.db_path.is_empty() {
                anyhow::bail!("DNSMASQ_API_DB_PATH cannot be empty when DNSMASQ_API_STORE_TYPE=file");
            }
            if self.db_bucket.is_empty() {
                anyhow::bail!("DNSMASQ_API_DB_BUCKET cannot be empty");
            }
        }

        if !self.skip_reload && self.reload_command.is_empty() {
            anyhow::bail!(
                "DNSMASQ_API_RELOAD_COMMAND cannot be empty. \
                Set DNSMASQ_API_SKIP_RELOAD=true to disable reloading instead"
            );
        }

        if let Some(timeout) = self.reload_timeout_secs
            && timeout == 0
        {
            anyhow::bail!("DNSMASQ_API_RELOAD_TIMEOUT_SECS must be > 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSMASQ_API_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Engine settings for this configuration
    fn sync_settings(&self) -> SyncSettings {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: PathBuf::from(&self.db_path),
                bucket: self.db_bucket.clone(),
            },
        };

        SyncSettings::new(&self.dnsmasq_config)
            .with_skip_reload(self.skip_reload)
            .with_store(store)
            .with_reload(ReloadConfig {
                command: self.reload_command.clone(),
                timeout_secs: self.reload_timeout_secs,
            })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", name, value),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ApidExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ApidExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ApidExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ApidExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let settings = config.sync_settings();
        let metrics = Arc::new(AtomicMetrics::new());
        log_banner(&settings);

        let (engine, events) = match SyncEngine::open(&settings, metrics.clone()).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("Startup failed: {}", e);
                return ApidExitCode::ConfigError;
            }
        };

        let loaded = metrics.snapshot();
        info!(
            "Loaded {} host(s), {} IP entr(ies) from {}",
            loaded.hostname_total,
            loaded.ip_total,
            settings.dnsmasq_config.display()
        );

        match run_daemon(engine, events).await {
            Ok(()) => ApidExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                ApidExitCode::RuntimeError
            }
        }
    })
    .into()
}

fn log_banner(settings: &SyncSettings) {
    info!("Starting dnsmasq-apid {}", env!("CARGO_PKG_VERSION"));
    info!("Managed dnsmasq file: {}", settings.dnsmasq_config.display());
    match &settings.store {
        StoreConfig::File { path, bucket } => info!(
            "Record store: {} {} (bucket {})",
            settings.store.type_name(),
            path.display(),
            bucket
        ),
        StoreConfig::Memory => info!("Record store: {}", settings.store.type_name()),
    }
    if settings.skip_reload {
        info!("Reload: disabled");
    } else {
        info!("Reload: {}", settings.reload.command.join(" "));
    }
}

/// Serve signals until shutdown, then close the engine
async fn run_daemon(engine: SyncEngine, events: mpsc::Receiver<SyncEvent>) -> Result<()> {
    let event_task = tokio::spawn(log_events(events));

    info!(
        "Ready: managing {} (reload {})",
        engine.config_path().display(),
        if engine.skip_reload() { "disabled" } else { "enabled" }
    );
    let received = wait_for_shutdown(&engine).await;

    let closed = engine.close().await;
    // Dropping the engine closes the event channel and ends the logger
    drop(engine);
    let _ = event_task.await;

    let received = received?;
    info!("Received {}, shut down", received);
    closed.context("Failed to close record store")
}

async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Rebuild on SIGHUP until SIGTERM or SIGINT arrives
///
/// # Returns
///
/// The name of the shutdown signal received
#[cfg(unix)]
async fn wait_for_shutdown(engine: &SyncEngine) -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => return Ok("SIGTERM"),
            _ = sigint.recv() => return Ok("SIGINT"),
            _ = sighup.recv() => {
                info!(
                    "Received SIGHUP, rebuilding record store from {}",
                    engine.config_path().display()
                );
                if let Err(e) = engine.rebuild_from_config().await {
                    warn!("Rebuild failed, keeping current records: {}", e);
                }
            }
        }
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown(_engine: &SyncEngine) -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
