//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::chains::ChainRegistry;
use crate::cli::ServeArgs;
use crate::config::{ConduitConfig, LogFormat, LoggingConfig};
use crate::executor::Executor;
use crate::health::HealthChecker;
use crate::routing::Selector;
use crate::session::SessionStore;
use crate::store::KvStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<ConduitConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        ConduitConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        ConduitConfig::default()
    };

    // Apply environment variable overrides
    config = config.with_env_overrides();

    // Apply CLI overrides (highest priority)
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref file) = args.chains_file {
        config.chains.file = file.clone();
    }
    if args.no_health_check {
        config.health_check.enabled = false;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM, then cancel the router's background tasks.
///
/// Cancelling the token stops the health probe loop, the chain
/// configuration poller, and the session sweeper; axum drains in-flight
/// forwards on its own once this future resolves.
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };

    tracing::info!(
        signal,
        "Shutdown requested: stopping health probes, chain polling, and session sweep"
    );
    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;

    tracing::info!("Starting Conduit");
    tracing::debug!(?config, "Loaded configuration");

    // 3. Open the durable store and build the component graph
    let store = Arc::new(KvStore::open(&config.store.path)?);
    let checker = Arc::new(HealthChecker::new(store.clone(), config.health_check.clone()));
    let registry = Arc::new(ChainRegistry::new(
        store.clone(),
        checker.clone(),
        config.chains.clone(),
        config.health_check.health_ttl_secs,
    ));

    // Initial load; a warm store keeps serving when the file is missing or
    // broken at boot.
    if let Err(error) = registry.poll_once().await {
        tracing::warn!(%error, "Initial chain configuration load failed, serving from the store");
    }

    let selector = Arc::new(Selector::new(
        store.clone(),
        registry.clone(),
        config.health_check.max_fail_count,
    ));
    let sessions = Arc::new(SessionStore::new(
        store.clone(),
        selector.clone(),
        config.session.clone(),
    ));
    let executor = Executor::new(sessions.clone(), checker.clone());

    // 4. Build the API router
    let state = Arc::new(AppState::new(
        store,
        registry.clone(),
        selector,
        sessions.clone(),
        executor,
        checker.clone(),
        Arc::new(config.clone()),
    ));
    let app = create_router(state);

    // 5. Start background tasks
    let cancel_token = CancellationToken::new();
    let health_handle = if config.health_check.enabled {
        Some(checker.start(cancel_token.clone()))
    } else {
        tracing::info!("Health checking disabled");
        None
    };
    let poll_handle = registry.start(cancel_token.clone());
    let sweep_handle = if config.session.cleanup_interval_secs > 0 {
        Some(sessions.start_sweeper(cancel_token.clone()))
    } else {
        tracing::debug!("Session sweeping disabled");
        None
    };

    // 6. Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "Conduit API server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    // 7. Cleanup
    if let Some(handle) = health_handle {
        tracing::info!("Waiting for health checker to stop");
        handle.await?;
    }
    tracing::info!("Waiting for chain configuration poller to stop");
    poll_handle.await?;
    if let Some(handle) = sweep_handle {
        tracing::info!("Waiting for session sweeper to stop");
        handle.await?;
    }

    tracing::info!("Conduit stopped");
    Ok(())
}
