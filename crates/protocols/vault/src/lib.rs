//! Spot Liquidity Vault
//!
//! Lenders reserve capital per tranche over a window of epochs. The capital
//! reserved for an epoch backs loans drawn against the published collateral
//! set, and the interest borrowers pay for that epoch is shared among the
//! reservations covering it by risk weight.
//!
//! # Modules
//!
//! - `membership`: merkle root of the accepted `(collection, id)` pairs
//! - `calculator`: pure epoch, capacity and payout math
//! - `vault`: the reservation book and loan draw accounting

pub mod calculator;
pub mod constants;
pub mod membership;
pub mod state;
pub mod vault;

// Re-exports
pub use membership::CollateralSet;
pub use state::*;
pub use vault::LiquidityVault;
