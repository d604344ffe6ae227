//! Loan Calculator
//!
//! Pure interest and default math. No I/O - just calculations.

use std::collections::BTreeSet;

use spot_core::constants::BPS;
use spot_core::{Amount, Epoch};

use crate::state::{Loan, RateSchedule};

/// Interest on `principal` for one epoch at `rate_bps`
pub fn epoch_interest(principal: Amount, rate_bps: u64) -> Amount {
    principal.saturating_mul(rate_bps as u128) / BPS
}

/// Interest a loan owes for `epoch`; zero if paid or before origination
pub fn interest_for(loan: &Loan, rates: &RateSchedule, epoch: Epoch) -> Amount {
    if epoch < loan.origination_epoch || loan.paid_epochs.contains(&epoch) {
        return 0;
    }
    match loan.fixed_charges.get(&epoch) {
        Some(charge) => *charge,
        None => epoch_interest(loan.principal, rates.rate_at(epoch)),
    }
}

/// Unpaid interest over `[origination, now]`
pub fn accrued_interest(loan: &Loan, rates: &RateSchedule, now: Epoch) -> Amount {
    (loan.origination_epoch..=now)
        .map(|epoch| interest_for(loan, rates, epoch))
        .sum()
}

/// Last epoch of the unbroken run of paid epochs starting at origination,
/// or `None` if the origination epoch is unpaid
pub fn paid_frontier(origination: Epoch, paid: &BTreeSet<Epoch>) -> Option<Epoch> {
    let mut last = None;
    let mut next = origination;
    while paid.contains(&next) {
        last = Some(next);
        next += 1;
    }
    last
}

/// Default once more than `grace` epochs separate `now` from the first
/// unpaid one
pub fn is_defaulted(now: Epoch, first_unpaid: Epoch, grace: u64) -> bool {
    now.saturating_sub(first_unpaid) > grace
}
