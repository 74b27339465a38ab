use registry_core::api::{router, AppState};
use registry_core::config::Config;
use registry_core::log::{CommandLog, LogConfig};
use registry_core::metrics::MetricsRegistry;
use registry_core::state_machine::fatal_if_corrupt;
use registry_core::{Coordinator, Registry, StateMachine, Store};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("registry_core=info,tower_http=info")))
        .with(fmt::layer())
        .init();

    let config_path = std::env::var("REGISTRY_CONFIG").ok().map(std::path::PathBuf::from);
    let config = Config::load(config_path)?;

    tracing::info!("starting schema registry core");
    tracing::info!(host = %config.server.host, port = config.server.port, "server configuration loaded");

    let log = Arc::new(CommandLog::open(LogConfig {
        dir: config.log.dir.clone(),
        max_segment_bytes: config.log.max_segment_bytes,
        sync_on_write: config.log.sync_on_write,
    })?);

    let store = Arc::new(Store::new());
    let state_machine = Arc::new(StateMachine::new(store.clone(), log));

    fatal_if_corrupt(state_machine.bootstrap())?;
    tracing::info!("bootstrap replay complete, ready to accept requests");

    let coordinator = Arc::new(Coordinator::new(config.registry.start_as_primary));
    if coordinator.is_primary() && !store.global_config_is_set() {
        // A brand-new log has no global config entry yet; seed it with
        // the configured default so get_config(Global) always resolves.
        Registry::new(store.clone(), state_machine.clone(), coordinator.clone())
            .set_config(None, config.registry.default_compatibility)?;
    }

    let registry = Registry::new(store, state_machine, coordinator);
    let metrics = MetricsRegistry::new();
    let state = Arc::new(AppState { registry, metrics });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(%addr, "binding HTTP listener");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
