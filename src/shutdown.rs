//! Graceful shutdown coordination
//!
//! 1. A SIGINT/SIGTERM (or an explicit [`ShutdownCoordinator::trigger`])
//!    cancels the shared token; the HTTP server stops accepting and drains.
//! 2. [`ShutdownCoordinator::shutdown`] flushes the store snapshot, bounded
//!    by the configured timeout.

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct ShutdownCoordinator {
    token: CancellationToken,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Token cancelled once shutdown begins
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for SIGINT, SIGTERM or an explicit trigger, then cancel the token
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!(%error, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    error!(%error, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("received SIGTERM, initiating graceful shutdown");
            },
            _ = self.token.cancelled() => {
                info!("shutdown triggered");
            },
        }
        self.token.cancel();
    }

    /// Flush state within the shutdown timeout
    pub async fn shutdown(&self, state: Arc<AppState>) -> Result<()> {
        self.token.cancel();
        info!(timeout_secs = self.timeout.as_secs(), "flushing dictionary state");

        let flush = tokio::task::spawn_blocking(move || state.flush());
        match timeout(self.timeout, flush).await {
            Ok(joined) => joined.context("snapshot flush task failed")?,
            Err(_) => {
                error!(
                    timeout_secs = self.timeout.as_secs(),
                    "graceful shutdown exceeded timeout"
                );
                Err(anyhow::anyhow!("shutdown timeout exceeded"))
            }
        }
    }
}
