use certa_journal::OrphanSweeper;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::CertaConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::{AppState, AppStateInner};

/// The certa HTTP service.
pub struct CertaServer {
    config: CertaConfig,
}

impl CertaServer {
    pub fn new(config: CertaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CertaConfig {
        &self.config
    }

    /// Build the service state and its router (useful for testing).
    pub async fn router(&self) -> ServerResult<(axum::Router, AppState)> {
        let state = AppStateInner::build(self.config.clone()).await?;
        Ok((build_router(state.clone()), state))
    }

    /// Serve until ctrl-c. The orphan sweeper runs alongside when enabled
    /// and is stopped after the listener drains.
    pub async fn serve(self) -> ServerResult<()> {
        let (app, state) = self.router().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweeper = self.config.sweeper.enabled.then(|| {
            let sweeper = OrphanSweeper::new(
                state.journal.clone(),
                state.objects.clone(),
                self.config.sweeper.clone(),
            )
            .with_records(state.records.clone());
            tokio::spawn(sweeper.run(shutdown_rx))
        });

        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        info!(addr = %self.config.server.bind_addr, "certa server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        let _ = shutdown_tx.send(true);
        if let Some(task) = sweeper {
            if let Err(e) = task.await {
                warn!(error = %e, "orphan sweeper task failed");
            }
        }
        info!("certa server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = CertaServer::new(CertaConfig::default());
        assert_eq!(server.config().server.bind_addr.port(), 8787);
    }

    #[tokio::test]
    async fn router_builds_with_filesystem_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CertaConfig::default();
        config.storage.backend = certa_store::StorageBackend::Filesystem;
        config.storage.root = dir.path().join("objects");
        config.sweeper.journal_path = Some(dir.path().join("intents.wal"));

        let (_router, state) = CertaServer::new(config).router().await.unwrap();
        assert!(state.mints.is_empty());
        assert!(dir.path().join("objects").join("proofs").is_dir());
    }
}
