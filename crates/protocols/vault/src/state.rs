//! Vault State Types

use serde::{Deserialize, Serialize};
use spot_core::{Address, Amount, Epoch, MerkleRoot, Timestamp};

use crate::calculator;

/// Parameters fixed by `begin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    /// Maximum open loans per borrower
    pub slots: u32,
    /// Per-tranche capacity for each collateral item in the published set
    pub ticket_size: Amount,
    /// Interest charged per epoch, in basis points of principal
    pub rate: u64,
    /// Epoch length in seconds
    pub epoch_length: u64,
    /// Underlying token
    pub token: Address,
    /// Risk points of tranche 0
    pub risk_base: u64,
    /// Extra risk points per tranche index
    pub risk_step: u64,
    /// Interest buffer, in epochs, withheld from the per-reservation payout
    pub beta: u64,
}

/// Lifecycle of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Consumed,
}

/// Capital committed over `[epoch_start, epoch_end)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub owner: Address,
    /// Amount per tranche; index is the tranche
    pub amounts: Vec<Amount>,
    pub epoch_start: Epoch,
    pub epoch_end: Epoch,
    pub status: ReservationStatus,
    /// Share of defaulted principal charged to this reservation
    #[serde(default)]
    pub written_off: Amount,
}

impl Reservation {
    /// Capital locked by this reservation.
    ///
    /// `purchase` rejects amounts whose sum overflows, so the saturation here
    /// never triggers for a stored reservation.
    pub fn total(&self) -> Amount {
        self.amounts.iter().fold(0, |acc, a| acc.saturating_add(*a))
    }

    /// Risk-weighted capital, the basis of its interest and loss share
    pub fn risk_weight(&self, params: &VaultParams) -> u128 {
        calculator::checked_risk_weight(params, &self.amounts).unwrap_or(u128::MAX)
    }

    /// Capital still owed back to the owner
    pub fn at_risk(&self) -> Amount {
        self.total().saturating_sub(self.written_off)
    }

    pub fn covers(&self, epoch: Epoch) -> bool {
        (self.epoch_start..self.epoch_end).contains(&epoch)
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}

/// Per-epoch accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochBook {
    /// Reserved capital per tranche
    pub tranches: Vec<Amount>,
    /// Sum of all tranches
    pub liquidity: Amount,
    /// Sum of risk-weighted capital
    pub risk_weight: u128,
    /// Principal still out on loans funded in this epoch
    pub lent: Amount,
    /// Principal lost to liquidated loans funded in this epoch
    #[serde(default)]
    pub written_off: Amount,
    /// Interest paid for this epoch
    pub interest: Amount,
}

impl EpochBook {
    pub fn tranche(&self, index: usize) -> Amount {
        self.tranches.get(index).copied().unwrap_or(0)
    }

    pub(crate) fn add(&mut self, amounts: &[Amount], weight: u128) {
        if self.tranches.len() < amounts.len() {
            self.tranches.resize(amounts.len(), 0);
        }
        for (slot, amount) in self.tranches.iter_mut().zip(amounts) {
            *slot = slot.saturating_add(*amount);
        }
        let total = amounts.iter().fold(0, |acc: Amount, a| acc.saturating_add(*a));
        self.liquidity = self.liquidity.saturating_add(total);
        self.risk_weight = self.risk_weight.saturating_add(weight);
    }

    pub(crate) fn remove(&mut self, amounts: &[Amount], weight: u128) {
        for (slot, amount) in self.tranches.iter_mut().zip(amounts) {
            *slot = slot.saturating_sub(*amount);
        }
        let total = amounts.iter().fold(0, |acc: Amount, a| acc.saturating_add(*a));
        self.liquidity = self.liquidity.saturating_sub(total);
        self.risk_weight = self.risk_weight.saturating_sub(weight);
    }
}

/// Result of claiming an elapsed reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Reserved capital net of `written_off`
    pub capital: Amount,
    pub interest: Amount,
    /// Defaulted principal charged against the reservation
    pub written_off: Amount,
}

impl Claim {
    pub fn total(&self) -> Amount {
        self.capital.saturating_add(self.interest)
    }
}

/// Read-only snapshot of the vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSummary {
    pub address: Address,
    pub owner: Address,
    pub started: bool,
    pub start_time: Option<Timestamp>,
    pub current_epoch: Option<Epoch>,
    pub params: Option<VaultParams>,
    pub root: Option<MerkleRoot>,
    pub root_version: u64,
    pub collection_size: u64,
    pub reservations: usize,
    pub outstanding_principal: Amount,
    pub written_off: Amount,
}
