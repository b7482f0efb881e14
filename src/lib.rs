pub mod config;
pub mod error;
pub mod fanout;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod mutation;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod store;

pub use config::{CliArgs, ServerConfig};
pub use error::{Constraint, DictionaryError};
pub use fanout::FanOutFetcher;
pub use logging::{LoggingConfig, init_logging};
pub use model::{EntityKind, Example, Language, Translation, Word};
pub use mutation::MutationCoordinator;
pub use shutdown::ShutdownCoordinator;
pub use state::{AppState, Dictionary};
pub use store::{MemoryStore, Repository, SharedRepository};

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(AppState::open(config.clone())?);

    let counts = state.counts();
    tracing::info!(
        words = counts.words,
        translations = counts.translations,
        examples = counts.examples,
        fanout_limit = ?config.fanout_limit,
        "starting dictionary service",
    );

    let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_timeout_secs));

    let listener = TcpListener::bind(config.http_bind_address).await?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(bind = %actual_addr, "listening");

    let signal_coordinator = coordinator.clone();
    let server_result = axum::serve(listener, server::router(state.clone()))
        .with_graceful_shutdown(async move {
            signal_coordinator.wait_for_signal().await;
        })
        .await;

    tracing::info!("server stopped, flushing state");
    if let Err(e) = coordinator.shutdown(state).await {
        tracing::error!("error during shutdown: {:#}", e);
    }

    server_result.map_err(anyhow::Error::from)
}
