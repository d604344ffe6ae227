//! Vault limits

/// Maximum number of tranches (entries in `amounts[]`) per reservation
pub const MAX_TRANCHES: usize = 16;

/// Longest reservation window, in epochs
pub const MAX_RESERVATION_EPOCHS: u64 = 520;
