//! Gateway server lifecycle: starts/stops the axum HTTP server that
//! serves the conversation API.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::router::gateway_api_router;
use crate::api::types::ApiContext;

/// Session metadata for a running gateway server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running gateway server.
pub struct GatewayServer {
    pub session: GatewaySession,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl GatewayServer {
    /// Shut down the server gracefully. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Gateway server shutdown signal sent");
        }
    }
}

/// Start the gateway server on `addr`. Port 0 picks an ephemeral port;
/// the bound address is reported in the returned session.
pub async fn start_gateway_server_on(
    ctx: ApiContext,
    addr: SocketAddr,
) -> Result<GatewayServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind gateway server: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = gateway_api_router(ctx);

    let session = GatewaySession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Gateway server received shutdown signal");
        };

        tracing::info!(%addr, "Gateway server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Gateway server error: {e}");
        }

        tracing::info!("Gateway server stopped");
    });

    Ok(GatewayServer {
        session,
        shutdown_tx: Some(shutdown_tx),
    })
}
