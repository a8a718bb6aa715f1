use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use notary_engine::AnchorEngine;
use notary_store::{ArtifactSource, FsArtifactSource, InMemoryArtifactSource, InMemoryRecordStore};

use crate::config::ServiceConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Notary HTTP server.
pub struct NotaryServer {
    config: ServiceConfig,
    engine: Arc<AnchorEngine>,
}

impl NotaryServer {
    /// Build a server backed by an in-process record store, the artifact
    /// directory from `[artifacts]` (if any), and the ledger named in
    /// `config`.
    pub fn open(config: ServiceConfig) -> ServerResult<Self> {
        config.validate()?;
        let artifacts: Arc<dyn ArtifactSource> = match &config.artifacts.root {
            Some(root) => {
                info!(root = %root.display(), "reading artifact bytes from directory");
                Arc::new(FsArtifactSource::new(root.clone()))
            }
            None => Arc::new(InMemoryArtifactSource::new()),
        };
        let engine = AnchorEngine::open(
            config.engine.clone(),
            Arc::new(InMemoryRecordStore::new()),
            artifacts,
        )?;
        Ok(Self::with_engine(config, Arc::new(engine)))
    }

    pub fn with_engine(config: ServiceConfig, engine: Arc<AnchorEngine>) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<AnchorEngine> {
        &self.engine
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(
            AppState::new(self.engine.clone()),
            self.config.server.max_upload_bytes,
        )
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve until `signal` resolves, then stop the scheduler and close the
    /// ledger.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            ledger = self.engine.ledger_name(),
            "notary server listening"
        );
        self.engine.start();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;
        info!("shutting down");
        self.engine.shutdown().await?;
        served.map_err(ServerError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.server.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.engine.scheduler.enabled = false;
        config
    }

    #[test]
    fn server_construction() {
        let server = NotaryServer::open(ServiceConfig::default()).unwrap();
        assert_eq!(server.config().server.bind_addr.port(), 8740);
        assert_eq!(server.engine().ledger_name(), "memory");
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = ServiceConfig::default();
        config.engine.scheduler.batch_size = 0;
        assert!(NotaryServer::open(config).is_err());
    }

    #[tokio::test]
    async fn serves_until_shutdown_signal() {
        let server = NotaryServer::open(test_config()).unwrap();
        server.serve_with_shutdown(async {}).await.unwrap();
    }
}
