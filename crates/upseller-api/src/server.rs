use crate::{create_router, AppState};
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use upseller_core::UpsellerConfig;

pub struct Server {
    state: AppState,
    host: String,
    port: u16,
}

impl Server {
    pub fn new(config: UpsellerConfig) -> Self {
        let host = config.server.host.clone();
        let port = config.server.port;
        let state = AppState::new(config);
        Self { state, host, port }
    }

    pub async fn run(self) -> Result<()> {
        let mock = self.state.config.use_mock;
        let router = create_router(self.state);

        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", self.host, self.port))?;
        let addr = listener.local_addr().context("Failed to read local address")?;

        info!("Upseller PRO listening on http://{}", addr);
        if mock {
            warn!("Mock mode: answers are scripted, no provider is called");
        }
        info!("Routes available:");
        info!("  GET/POST /              - Optimize a text");
        info!("  GET/POST /questionnaire - Eight questions, then market analysis");
        info!("  GET/POST /analyze       - Market analysis with optional image");
        info!("  GET      /health        - Provider status");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
