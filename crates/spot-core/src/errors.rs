//! Error types for Spot

use thiserror::Error;

use crate::{Address, Amount, WrappedId};

/// Core errors that can occur in Spot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Protocol state-machine, accounting and authorization errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Merkle proof rejected for {collection} #{token_id}")]
    ProofInvalid { collection: Address, token_id: u64 },

    #[error("Pool {pool} is not paired")]
    NotPaired { pool: Address },

    #[error("Pool {pool} is in state {state}")]
    PairingState { pool: Address, state: &'static str },

    #[error("Pool {pool} ownership has not been handed to the wrapper")]
    HandoffIncomplete { pool: Address },

    #[error("Vault has not started")]
    NotStarted,

    #[error("Vault already started")]
    AlreadyStarted,

    #[error("Position #{token_id} already backs an open loan")]
    AlreadyBorrowed { token_id: WrappedId },

    #[error("Loan on position #{token_id} already liquidated")]
    AlreadyLiquidated { token_id: WrappedId },

    #[error("Reservation {index} already consumed")]
    AlreadyConsumed { index: usize },

    #[error("Loan on position #{token_id} is not in default")]
    NotDefaulted { token_id: WrappedId },

    #[error("Position #{token_id} still backs an open loan")]
    LoanOutstanding { token_id: WrappedId },

    #[error("Epoch out of range: {message}")]
    EpochRange { message: String },

    #[error("Capacity exceeded: {message}")]
    CapacityExceeded { message: String },

    #[error("No loan on position #{token_id}")]
    UnknownLoan { token_id: WrappedId },

    #[error("{account} is not authorized for this action")]
    NotOwner { account: Address },
}

/// Underlying token transfer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Insufficient balance for {account}: need {required}, have {available}")]
    InsufficientBalance {
        account: Address,
        required: Amount,
        available: Amount,
    },
}

/// AMM pool custody errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("Unknown pool {pool}")]
    UnknownPool { pool: Address },

    #[error("{caller} does not own pool {pool}")]
    NotPoolOwner { pool: Address, caller: Address },

    #[error("Pool {pool} does not hold NFT #{nft_id}")]
    NftNotHeld { pool: Address, nft_id: u64 },

    #[error("{account} does not own NFT #{nft_id}")]
    NftNotOwned { account: Address, nft_id: u64 },

    #[error("Pool {pool} reserves too low: need {required}, have {available}")]
    InsufficientReserves {
        pool: Address,
        required: Amount,
        available: Amount,
    },
}

/// Result type alias for Spot operations
pub type Result<T> = std::result::Result<T, Error>;

impl ProtocolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn epoch_range(message: impl Into<String>) -> Self {
        Self::EpochRange {
            message: message.into(),
        }
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        Self::CapacityExceeded {
            message: message.into(),
        }
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::ProofInvalid { .. } => "proof_invalid",
            Self::NotPaired { .. } => "not_paired",
            Self::PairingState { .. } => "pairing_state",
            Self::HandoffIncomplete { .. } => "handoff_incomplete",
            Self::NotStarted => "not_started",
            Self::AlreadyStarted => "already_started",
            Self::AlreadyBorrowed { .. } => "already_borrowed",
            Self::AlreadyLiquidated { .. } => "already_liquidated",
            Self::AlreadyConsumed { .. } => "already_consumed",
            Self::NotDefaulted { .. } => "not_defaulted",
            Self::LoanOutstanding { .. } => "loan_outstanding",
            Self::EpochRange { .. } => "epoch_range",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::UnknownLoan { .. } => "unknown_loan",
            Self::NotOwner { .. } => "not_owner",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::NotOwner { .. } => 403,
            Self::UnknownLoan { .. } => 404,
            Self::NotPaired { .. }
            | Self::PairingState { .. }
            | Self::HandoffIncomplete { .. }
            | Self::NotStarted
            | Self::AlreadyStarted
            | Self::AlreadyBorrowed { .. }
            | Self::AlreadyLiquidated { .. }
            | Self::AlreadyConsumed { .. }
            | Self::LoanOutstanding { .. } => 409,
            Self::ProofInvalid { .. }
            | Self::NotDefaulted { .. }
            | Self::EpochRange { .. }
            | Self::CapacityExceeded { .. } => 422,
        }
    }
}

impl Error {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(e) => e.error_code(),
            Self::Token(TokenError::InsufficientBalance { .. }) => "insufficient_balance",
            Self::Custody(e) => match e {
                CustodyError::UnknownPool { .. } => "unknown_pool",
                CustodyError::NotPoolOwner { .. } => "not_pool_owner",
                CustodyError::NftNotHeld { .. } => "nft_not_held",
                CustodyError::NftNotOwned { .. } => "nft_not_owned",
                CustodyError::InsufficientReserves { .. } => "insufficient_reserves",
            },
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Protocol(e) => e.status_code(),
            Self::Token(_) => 422,
            Self::Custody(CustodyError::UnknownPool { .. }) => 404,
            Self::Custody(CustodyError::NotPoolOwner { .. })
            | Self::Custody(CustodyError::NftNotOwned { .. }) => 403,
            Self::Custody(_) => 422,
            Self::Config(_) | Self::Serialization(_) => 500,
        }
    }
}
