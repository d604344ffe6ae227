//! SudoNft Wrapper and Spot Engine
//!
//! Takes custody of AMM pools and mints one wrapped position per NFT a pool
//! holds. Positions proven to be in the vault's collateral set can be
//! borrowed against; defaulted ones are seized by the vault; free ones can be
//! exchanged back for an NFT or its cash value.
//!
//! # Pairing
//!
//! `UNPAIRED -> TRANSFER_INITIATED -> PAIRED -> UNPAIRED`. The pool owner
//! initiates, hands pool ownership to the wrapper at the AMM, then accepts.
//!
//! # Modules
//!
//! - `custody`: pool custodian trait and the in-memory AMM
//! - `token`: underlying token trait and the in-memory token
//! - `wrapper`: wrapped positions and pairings
//! - `protocol`: the [`Spot`] engine

pub mod custody;
pub mod protocol;
pub mod state;
pub mod token;
pub mod wrapper;

// Re-exports
pub use custody::{CollateralCustodian, MemoryAmm, MemoryPool};
pub use protocol::Spot;
pub use state::*;
pub use token::{MemoryToken, TokenLedger};
pub use wrapper::SudoNft;
