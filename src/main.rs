//! Picks ledger binary entrypoint wiring the REST API, identity provider and storage supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picks_ledger_back::{
    auth::provider,
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let identity = provider::from_config(config.identity(), env::var("PICKS_IDENTITY_API_KEY").ok())
        .context("configuring identity provider")?;
    let app_state = AppState::new(config, identity);

    spawn_storage(app_state.clone())?;
    let app = build_router(app_state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the backend selected by `STORE_BACKEND`.
fn spawn_storage(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| default_backend().into());
    info!(backend = %backend, "selected storage backend");

    match backend.as_str() {
        "memory" => {
            warn!("memory storage selected; data is lost on restart");
            let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
            Ok(())
        }
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => {
            use picks_ledger_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoGameStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
            }));
            Ok(())
        }
        other => anyhow::bail!("unsupported STORE_BACKEND `{other}`"),
    }
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
