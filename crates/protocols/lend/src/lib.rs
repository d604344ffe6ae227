//! Spot Loan Ledger
//!
//! Loans drawn against wrapped pool positions. Interest is charged per epoch
//! in basis points of principal and paid for explicitly listed epochs. A loan
//! whose interest falls more than the grace period behind can be liquidated.
//!
//! # Modules
//!
//! - `calculator`: pure interest and default math
//! - `ledger`: the loan book

pub mod calculator;
pub mod ledger;
pub mod state;

// Re-exports
pub use ledger::LoanLedger;
pub use state::*;
