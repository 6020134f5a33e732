use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediathek_core::{
    load_config, validate_config, CatalogStore, Config, HttpFetcher, Importer, SqliteCatalog,
    StateStore, UpdateScheduler, Updater, UpdaterConfig,
};
use mediathek_server::{create_router, metrics, AppState};

#[tokio::main]
async fn main() {
    init_tracing();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("MEDIATHEK_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<i32> {
    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let config_path = std::env::var("MEDIATHEK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        source = %config.source.url,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );

    let (catalog, updater) = build_pipeline(&config)?;

    if once {
        let outcome = updater.run_cycle().await;
        info!(result = outcome.label(), "Single update cycle finished");
        return Ok(if outcome.is_success() { 0 } else { 1 });
    }

    let registry = metrics::build_registry().context("Failed to register metrics")?;

    let scheduler = if config.updater.enabled {
        let scheduler = UpdateScheduler::new(Arc::clone(&updater));
        let handle = scheduler.start();
        Some((scheduler, handle))
    } else {
        info!("Updater disabled in config");
        None
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        catalog,
        Arc::clone(&updater),
        registry,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some((scheduler, handle)) = scheduler {
        info!("Stopping update scheduler...");
        scheduler.stop();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("Update scheduler stopped");
    }

    info!("Server shut down");
    Ok(0)
}

/// Wire the catalog, state store, fetcher and importer into an updater.
fn build_pipeline(config: &Config) -> Result<(Arc<dyn CatalogStore>, Arc<Updater>)> {
    let catalog_path = config.storage.catalog_path();
    let catalog: Arc<dyn CatalogStore> = Arc::new(
        SqliteCatalog::new(&catalog_path, config.catalog.on_conflict)
            .with_context(|| format!("Failed to open catalog at {:?}", catalog_path))?,
    );
    info!(path = %catalog_path.display(), "Catalog opened");

    let importer = Importer::new(config.import.clone(), Arc::clone(&catalog))
        .context("Failed to create importer")?;
    info!(
        categories = importer.classifier().categories().len(),
        "Category rules loaded"
    );

    let fetcher =
        HttpFetcher::new(&config.source.user_agent).context("Failed to create HTTP client")?;
    let state_store = StateStore::new(config.storage.state_file());

    let updater = Updater::new(
        UpdaterConfig::from_config(config),
        Arc::new(fetcher),
        state_store,
        importer,
    );

    Ok((catalog, Arc::new(updater)))
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
