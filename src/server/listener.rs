//! Relay server listener
//!
//! Binds the HTTP listener and serves the relay router until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::media::StreamProfile;
use crate::registry::StationRegistry;
use crate::server::config::ServerConfig;
use crate::server::routes::{router, AppState};
use crate::upstream::{StationDirectory, Transcoder};

/// Relay server
pub struct RelayServer {
    config: ServerConfig,
    state: AppState,
}

impl RelayServer {
    /// Create a server that runs ffmpeg for every stream
    pub fn new(config: ServerConfig, directory: Arc<dyn StationDirectory>) -> Self {
        let container = StationRegistry::with_ffmpeg(
            StreamProfile::ContainerPassthrough,
            config.registry.clone(),
            Arc::clone(&directory),
        );
        let pcm = StationRegistry::with_ffmpeg(StreamProfile::RawPcm, config.registry.clone(), directory);
        Self::from_registries(config, Arc::new(container), Arc::new(pcm))
    }

    /// Create a server with a custom transcoder
    pub fn with_transcoder(
        config: ServerConfig,
        directory: Arc<dyn StationDirectory>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let container = StationRegistry::new(
            StreamProfile::ContainerPassthrough,
            config.registry.clone(),
            Arc::clone(&directory),
            Arc::clone(&transcoder),
        );
        let pcm = StationRegistry::new(
            StreamProfile::RawPcm,
            config.registry.clone(),
            directory,
            transcoder,
        );
        Self::from_registries(config, Arc::new(container), Arc::new(pcm))
    }

    /// Create a server around existing registries
    pub fn from_registries(
        config: ServerConfig,
        container: Arc<StationRegistry>,
        pcm: Arc<StationRegistry>,
    ) -> Self {
        Self {
            config,
            state: AppState { container, pcm },
        }
    }

    /// Registry behind `/api/play/{station}`
    pub fn container_registry(&self) -> &Arc<StationRegistry> {
        &self.state.container
    }

    /// Registry behind `/api/play/{station}/pcm`
    pub fn pcm_registry(&self) -> &Arc<StationRegistry> {
        &self.state.pcm
    }

    /// The HTTP router, without a listener
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown every live stream is stopped, which ends the open
    /// response bodies so in-flight connections can drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        let state = self.state.clone();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            state.container.shutdown().await;
            state.pcm.shutdown().await;
        })
        .await?;

        tracing::info!("Relay server stopped");
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
