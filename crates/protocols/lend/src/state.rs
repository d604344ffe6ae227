//! Loan State Types

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use spot_core::{Address, Amount, Epoch, WrappedId};

/// Identifies the collateral a loan is drawn against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanKey {
    /// Contract of the collateral token (the wrapper)
    pub collateral: Address,
    pub token_id: WrappedId,
}

impl LoanKey {
    pub fn new(collateral: Address, token_id: WrappedId) -> Self {
        Self {
            collateral,
            token_id,
        }
    }
}

impl fmt::Display for LoanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.collateral, self.token_id)
    }
}

/// Loan lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    /// Kept so a second liquidation is rejected
    Liquidated,
}

/// A loan drawn against one wrapped position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub borrower: Address,
    /// Vault the principal came from
    pub lender: Address,
    pub key: LoanKey,
    pub principal: Amount,
    pub origination_epoch: Epoch,
    /// End of the contiguous run of paid epochs from origination; `None`
    /// while the origination epoch itself is unpaid
    pub last_paid_epoch: Option<Epoch>,
    /// Unpaid interest up to the epoch it was last evaluated at
    pub outstanding_interest: Amount,
    pub paid_epochs: BTreeSet<Epoch>,
    /// Interest locked in for epochs that had elapsed when principal changed
    pub fixed_charges: BTreeMap<Epoch, Amount>,
    pub status: LoanStatus,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Open
    }

    /// Earliest epoch the default grace period counts from
    pub fn first_unpaid_epoch(&self) -> Epoch {
        self.last_paid_epoch
            .map_or(self.origination_epoch, |epoch| epoch.saturating_add(1))
    }
}

/// Interest rate in basis points per epoch, piecewise constant over epochs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSchedule {
    changes: BTreeMap<Epoch, u64>,
}

impl RateSchedule {
    pub fn new(initial_bps: u64) -> Self {
        let mut changes = BTreeMap::new();
        changes.insert(0, initial_bps);
        Self { changes }
    }

    /// Rate in effect during `epoch`
    pub fn rate_at(&self, epoch: Epoch) -> u64 {
        self.changes
            .range(..=epoch)
            .next_back()
            .map(|(_, bps)| *bps)
            .unwrap_or(0)
    }

    pub(crate) fn set_from(&mut self, epoch: Epoch, bps: u64) {
        self.changes.insert(epoch, bps);
    }
}

/// Interest settled by one payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub key: LoanKey,
    /// Amount settled per newly paid epoch
    pub breakdown: Vec<(Epoch, Amount)>,
    pub total: Amount,
    pub closed: bool,
}

/// State of a loan after a principal repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepayOutcome {
    pub key: LoanKey,
    pub repaid: Amount,
    pub remaining_principal: Amount,
    pub outstanding_interest: Amount,
    pub closed: bool,
}

/// A loan taken over by its lender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidatedLoan {
    pub loan: Loan,
    /// Unpaid interest on the epochs named by the liquidator
    pub forfeited_interest: Amount,
}
