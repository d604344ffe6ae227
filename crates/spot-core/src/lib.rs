//! Spot-core: Shared types, errors, configuration and clock
//!
//! This crate provides the foundational types used across the Spot workspace.

pub mod clock;
pub mod config;
pub mod errors;
pub mod types;

pub use clock::*;
pub use config::*;
pub use errors::*;
pub use types::*;
