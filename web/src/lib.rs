use axum::http::{HeaderValue, Method};
use log::*;
pub use service::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
pub mod error;
pub(crate) mod router;
pub(crate) mod sse;

pub use router::define_routes;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let server_url = app_state.config.bind_address();
    let listener = TcpListener::bind(&server_url).await?;

    info!(
        "Server starting... listening for connections on http://{}",
        server_url
    );

    let cors_layer = cors_layer(&app_state.config.allowed_origins);
    let sse_manager = Arc::clone(&app_state.sse_manager);

    axum::serve(listener, define_routes(app_state).layer(cors_layer))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open SSE streams never finish on their own; closing the broker
            // ends them so the graceful shutdown can complete.
            sse_manager.shutdown().await;
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_credentials(true)
        .allow_origin(origins)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
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
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
