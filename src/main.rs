use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tripboard::config::AppConfig;
use tripboard::error::AppError;
use tripboard::routes::create_router;
use tripboard::services::cache::CacheService;
use tripboard::services::sync::{FirebaseStore, RemoteStore, SyncService};
use tripboard::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;

    let cache = CacheService::new(config.data_root.clone());
    cache.ensure_structure().await?;

    let store: Option<Arc<dyn RemoteStore>> = match &config.remote {
        Some(remote) => Some(Arc::new(FirebaseStore::new(remote)?)),
        None => {
            info!("no remote store configured; this session runs cache-only");
            None
        }
    };
    let sync = SyncService::new(store, config.sync_failure_limit);

    let state = AppState::new(config.clone(), cache, sync);
    state.seed().await;
    spawn_subscription(&state);

    let app = create_router(state.clone());

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Wires the remote subscription to the board: one task keeps the watch
/// alive, the other applies whatever it delivers.
fn spawn_subscription(state: &AppState) {
    let (tx, mut rx) = mpsc::channel(8);
    let sync = state.sync.clone();
    tokio::spawn(async move {
        sync.run_watch(tx).await;
    });
    let state = state.clone();
    tokio::spawn(async move {
        while let Some(incoming) = rx.recv().await {
            state.apply_remote(incoming).await;
        }
    });
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tripboard=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
