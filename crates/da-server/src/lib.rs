//! # da-server
//!
//! Axum server for device access approval.
//!
//! The server is the HTTP boundary around the SAML service provider core:
//! - `GET /` sends anonymous users to the identity provider and shows the
//!   signed-in user otherwise
//! - `POST /saml/acs` accepts the identity provider's response
//! - `GET /saml/logout` ends the session
//! - `GET /isAlive` and `GET /isReady` for the orchestrator
//!
//! ## Usage
//!
//! ```ignore
//! use da_core::AppConfig;
//! use da_server::Server;
//!
//! let config = AppConfig::from_env()?;
//! Server::new(config)?.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cookie;
pub mod handlers;
pub mod pages;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use da_core::{AppConfig, Clock, SystemClock};
use da_crypto::TrustCertificate;
use da_protocol_saml::{ResponseValidator, ValidatorSettings};
use da_session::{InMemorySessionStore, LoginPolicy};
use tokio::net::TcpListener;

/// How often expired sessions are dropped from memory.
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// The device access approval server.
pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
    sessions: Arc<InMemorySessionStore>,
}

impl Server {
    /// Creates a server using the system clock.
    ///
    /// Parses the pinned certificate, so a bad `SAML_CERT` fails here rather
    /// than on the first login.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a server with an explicit clock.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let certificate = TrustCertificate::from_pem(&config.saml_cert).map_err(|e| {
            da_core::Error::InvalidConfig {
                key: "SAML_CERT".to_string(),
                reason: e.to_string(),
            }
        })?;
        if certificate.is_expired_at(clock.now()) {
            tracing::warn!(
                subject = certificate.subject(),
                not_after = ?certificate.not_after(),
                "pinned SAML certificate has expired"
            );
        }
        tracing::info!(
            subject = certificate.subject(),
            kind = ?certificate.kind(),
            "loaded SAML certificate"
        );

        let validator = ResponseValidator::new(
            Arc::new(certificate),
            clock.clone(),
            ValidatorSettings::from_config(&config),
        );
        let sessions = Arc::new(InMemorySessionStore::new());
        let config = Arc::new(config);

        let state = AppState {
            config: config.clone(),
            validator,
            sessions: sessions.clone(),
            login_policy: LoginPolicy::from_config(&config),
            clock,
        };

        Ok(Self {
            config,
            state,
            sessions,
        })
    }

    /// Runs the server until a shutdown signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let app = create_router(self.state.clone());
        let purge = tokio::spawn(purge_expired_sessions(
            self.sessions.clone(),
            self.state.clock.clone(),
        ));

        tracing::info!("Server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        purge.abort();
        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

async fn purge_expired_sessions(sessions: Arc<InMemorySessionStore>, clock: Arc<dyn Clock>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        sessions.purge_expired(clock.now());
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
