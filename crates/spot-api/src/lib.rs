//! Spot-api: HTTP API layer for Spot
//!
//! Exposes one in-memory engine over REST. Callers identify themselves with
//! a `caller` address in the request body; nothing is signed.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{AppState, Engine};
