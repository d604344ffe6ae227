//! API route handlers

pub mod exchange;
pub mod health;
pub mod loans;
pub mod pools;
pub mod sim;
pub mod vault;

use axum::{routing::get, Router};

use crate::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/vault", vault::router())
        .nest("/pools", pools::router())
        .nest("/positions", pools::positions_router())
        .nest("/loans", loans::router())
        .nest("/exchange", exchange::router())
        .nest("/sim", sim::router())
        .with_state(state)
}
