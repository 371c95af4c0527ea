//! Keep-alive web endpoint — lets the hosting platform see the process
//! as healthy. Carries no application state.

use axum::Router;
use axum::routing::get;
use tokio::task::JoinHandle;
use tracing::{error, info};

async fn healthz() -> &'static str {
    "ok"
}

/// Spawn the health server on the given port.
pub fn spawn_health_server(port: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new().route("/healthz", get(healthz));
        match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                info!(port, "Health endpoint listening");
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Health server exited");
                }
            }
            Err(e) => error!(port, error = %e, "Failed to bind health endpoint"),
        }
    })
}
