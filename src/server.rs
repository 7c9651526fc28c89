use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::config::{Config, Mode};
use crate::repository::{KeyedRepository, ListRepository};
use crate::routes::{AppState, router};
use crate::store::StoreClient;

/// HTTP server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
}

impl Server {
    /// Bind the listener and build the router for the configured mode
    pub async fn bind(config: &Config) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("HTTP server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            app: build_app(config),
        })
    }

    /// Get local listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Server started, listening on {}", self.local_addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server shut down");
        Ok(())
    }
}

/// Build the router with one store client per endpoint, shared for the
/// process lifetime.
pub fn build_app(config: &Config) -> Router {
    let store = &config.store;
    let client = |endpoint| StoreClient::new(endpoint, &store.password, store.options.clone());

    match config.mode {
        Mode::Keyed => {
            let repository = KeyedRepository::new(client(store.primary.clone()));
            router(AppState::new(repository, config.strict), config.max_body_bytes)
        }
        Mode::List => {
            let repository =
                ListRepository::new(client(store.primary.clone()), client(store.replica.clone()));
            router(AppState::new(repository, config.strict), config.max_body_bytes)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
