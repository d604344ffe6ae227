//! Vault Calculator
//!
//! Pure math for epochs, capacity, the payout curve and pro-rata shares.
//! No state - just calculations.

use spot_core::constants::BPS;
use spot_core::{Amount, Epoch, Timestamp};

use crate::state::VaultParams;

/// Epoch containing `timestamp`. Timestamps before start map to epoch 0.
pub fn epoch_at(start_time: Timestamp, epoch_length: u64, timestamp: Timestamp) -> Epoch {
    if epoch_length == 0 {
        return 0;
    }
    timestamp.saturating_sub(start_time) / epoch_length
}

/// Risk points of a tranche: `risk_base + risk_step * tranche`
pub fn risk_points(params: &VaultParams, tranche: usize) -> u128 {
    params.risk_base as u128 + params.risk_step as u128 * tranche as u128
}

/// Sum of tranche amounts, `None` on overflow
pub fn checked_total(amounts: &[Amount]) -> Option<Amount> {
    amounts.iter().try_fold(0u128, |acc, a| acc.checked_add(*a))
}

/// Risk-weighted sum of tranche amounts, `None` on overflow
pub fn checked_risk_weight(params: &VaultParams, amounts: &[Amount]) -> Option<u128> {
    amounts.iter().enumerate().try_fold(0u128, |acc, (tranche, amount)| {
        amount
            .checked_mul(risk_points(params, tranche))
            .and_then(|w| acc.checked_add(w))
    })
}

/// Capital one tranche may hold in one epoch
pub fn tranche_capacity(ticket_size: Amount, collection_size: u64) -> Amount {
    ticket_size.saturating_mul(collection_size as u128)
}

/// Maximum principal one collateral item may draw in an epoch.
///
/// payout = floor(liquidity / collection_size) * BPS / (BPS + rate * beta)
///
/// The denominator withholds `beta` epochs of interest so that principal plus
/// that buffer stays inside the capital backing one item.
pub fn payout_per_reservation(
    liquidity: Amount,
    collection_size: u64,
    rate_bps: u64,
    beta: u64,
) -> Amount {
    if collection_size == 0 {
        return 0;
    }
    let per_item = liquidity / collection_size as u128;
    let buffer = (rate_bps as u128).saturating_mul(beta as u128);
    per_item.saturating_mul(BPS) / BPS.saturating_add(buffer)
}

/// Part of `amount` owed to `weight` out of `total_weight`, rounded down.
///
/// Splits both epoch interest and defaulted principal between reservations.
pub fn pro_rata(amount: Amount, weight: u128, total_weight: u128) -> Amount {
    if total_weight == 0 || weight == 0 {
        return 0;
    }
    match amount.checked_mul(weight) {
        Some(scaled) => scaled / total_weight,
        None => (amount / total_weight).saturating_mul(weight),
    }
}
