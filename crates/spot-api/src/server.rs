//! HTTP server setup and configuration

use std::net::SocketAddr;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// Router with CORS and request tracing around every route
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve the engine on `api_host:api_port` until the listener fails
pub async fn start_server(state: AppState) -> Result<(), std::io::Error> {
    let config = state.config();
    let addr = SocketAddr::new(config.api_host, config.api_port);
    let vault = config.protocol.vault_address;
    let wrapper = config.protocol.wrapper_address;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        vault = %vault,
        wrapper = %wrapper,
        "Spot API listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
