//! Club courts binary entrypoint wiring REST, SSE and the selected document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use club_courts_back::{
    config::AppConfig,
    dao::{
        document_store::{DocumentStore, memory::MemoryDocumentStore},
        storage::StorageError,
    },
    routes,
    state::{AppState, SharedState},
};

/// Storage backends selectable through `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Memory,
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
}

impl Backend {
    fn from_env() -> anyhow::Result<Self> {
        let raw = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(Backend::Memory),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(Backend::Mongo),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Backend::Couch),
            other => bail!("unsupported STORE_BACKEND `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let backend = Backend::from_env()?;
    info!(?backend, "selected storage backend");
    start_storage(app_state.clone(), backend).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the in-memory store right away, or hand remote backends to the
/// supervisor so the server starts in degraded mode until they are reachable.
async fn start_storage(state: SharedState, backend: Backend) {
    match backend {
        Backend::Memory => {
            let store: Arc<dyn DocumentStore> =
                Arc::new(MemoryDocumentStore::new(state.clock().clone()));
            state.install_store(store).await;
            warn!("using the in-memory store; data is lost on restart");
        }
        #[cfg(feature = "mongo-store")]
        Backend::Mongo => {
            use club_courts_back::{
                dao::document_store::mongodb::{MongoConfig, MongoDocumentStore},
                services::storage_supervisor,
            };

            let clock = state.clock().clone();
            tokio::spawn(storage_supervisor::run(state, move || {
                let clock = clock.clone();
                async move {
                    let config = MongoConfig::from_env().await?;
                    let store = MongoDocumentStore::connect_with_clock(config, clock).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        Backend::Couch => {
            use club_courts_back::{
                dao::document_store::couchdb::{CouchConfig, CouchDocumentStore},
                services::storage_supervisor,
            };

            let clock = state.clock().clone();
            tokio::spawn(storage_supervisor::run(state, move || {
                let clock = clock.clone();
                async move {
                    let config = CouchConfig::from_env()?;
                    let store = CouchDocumentStore::connect_with_clock(config, clock).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>)
                }
            }));
        }
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
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
