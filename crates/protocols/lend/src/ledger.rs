//! Loan ledger
//!
//! One loan per collateral key. Interest accrues per epoch at the rate in
//! effect for that epoch and is settled epoch by epoch.

use std::collections::{BTreeMap, BTreeSet};

use spot_core::{Address, Amount, Epoch, ProtocolError, Result};

use crate::calculator;
use crate::state::{
    LiquidatedLoan, Loan, LoanKey, LoanStatus, PaymentReceipt, RateSchedule, RepayOutcome,
};

#[derive(Debug, Clone)]
pub struct LoanLedger {
    loans: BTreeMap<LoanKey, Loan>,
    rates: RateSchedule,
    grace_epochs: u64,
    total_principal: Amount,
}

fn ensure_unique(epochs: &[Epoch]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for epoch in epochs {
        if !seen.insert(*epoch) {
            return Err(ProtocolError::invalid_input(format!("epoch {} listed twice", epoch)).into());
        }
    }
    Ok(())
}

impl LoanLedger {
    pub fn new(grace_epochs: u64) -> Self {
        Self {
            loans: BTreeMap::new(),
            rates: RateSchedule::default(),
            grace_epochs,
            total_principal: 0,
        }
    }

    /// Seed the rate schedule (called when the vault begins)
    pub fn configure(&mut self, rate_bps: u64) {
        self.rates = RateSchedule::new(rate_bps);
    }

    /// Re-price interest from `from_epoch` on. Only future epochs may change.
    pub fn set_rate(&mut self, from_epoch: Epoch, bps: u64, now: Epoch) -> Result<()> {
        if from_epoch <= now {
            return Err(ProtocolError::epoch_range(format!(
                "rate change at epoch {} is not after current epoch {}",
                from_epoch, now
            ))
            .into());
        }
        self.rates.set_from(from_epoch, bps);
        tracing::info!(from_epoch, bps, "Interest rate updated");
        Ok(())
    }

    pub fn rate_at(&self, epoch: Epoch) -> u64 {
        self.rates.rate_at(epoch)
    }

    pub fn grace_epochs(&self) -> u64 {
        self.grace_epochs
    }

    pub fn loan(&self, key: &LoanKey) -> Option<&Loan> {
        self.loans.get(key)
    }

    fn open_loan_mut(&mut self, key: &LoanKey) -> Result<&mut Loan> {
        let loan = self
            .loans
            .get_mut(key)
            .ok_or(ProtocolError::UnknownLoan {
                token_id: key.token_id,
            })?;
        if !loan.is_open() {
            return Err(ProtocolError::AlreadyLiquidated {
                token_id: key.token_id,
            }
            .into());
        }
        Ok(loan)
    }

    fn open_loan(&self, key: &LoanKey) -> Result<&Loan> {
        let loan = self.loans.get(key).ok_or(ProtocolError::UnknownLoan {
            token_id: key.token_id,
        })?;
        if !loan.is_open() {
            return Err(ProtocolError::AlreadyLiquidated {
                token_id: key.token_id,
            }
            .into());
        }
        Ok(loan)
    }

    pub fn has_open_loan(&self, key: &LoanKey) -> bool {
        self.loans.get(key).map(Loan::is_open).unwrap_or(false)
    }

    /// Interest due for exactly the listed epochs
    pub fn get_interest_payment(&self, epochs: &[Epoch], key: &LoanKey) -> Result<Amount> {
        ensure_unique(epochs)?;
        let loan = self.open_loan(key)?;
        Ok(epochs
            .iter()
            .map(|epoch| calculator::interest_for(loan, &self.rates, *epoch))
            .sum())
    }

    /// Unpaid interest over `[origination, now]`
    pub fn outstanding_interest(&self, key: &LoanKey, now: Epoch) -> Result<Amount> {
        let loan = self.open_loan(key)?;
        Ok(calculator::accrued_interest(loan, &self.rates, now))
    }

    /// Epochs in `[origination, now]` that still owe interest
    pub fn unpaid_epochs(&self, key: &LoanKey, now: Epoch) -> Result<Vec<Epoch>> {
        let loan = self.open_loan(key)?;
        Ok((loan.origination_epoch..=now)
            .filter(|epoch| !loan.paid_epochs.contains(epoch))
            .collect())
    }

    pub fn record_borrow(
        &mut self,
        borrower: Address,
        lender: Address,
        key: LoanKey,
        principal: Amount,
        now: Epoch,
    ) -> Result<()> {
        if principal == 0 {
            return Err(ProtocolError::invalid_input("loan principal is zero").into());
        }
        if self.has_open_loan(&key) {
            return Err(ProtocolError::AlreadyBorrowed {
                token_id: key.token_id,
            }
            .into());
        }

        self.loans.insert(
            key,
            Loan {
                borrower,
                lender,
                key,
                principal,
                origination_epoch: now,
                last_paid_epoch: None,
                outstanding_interest: 0,
                paid_epochs: BTreeSet::new(),
                fixed_charges: BTreeMap::new(),
                status: LoanStatus::Open,
            },
        );
        self.total_principal += principal;

        tracing::info!(
            loan = %key,
            borrower = %borrower,
            principal = %principal,
            epoch = now,
            "Loan opened"
        );
        Ok(())
    }

    /// Settle interest for the listed epochs; each must lie in
    /// `[origination, now]`. Already-paid epochs settle nothing.
    pub fn record_payment(
        &mut self,
        key: &LoanKey,
        epochs: &[Epoch],
        now: Epoch,
    ) -> Result<PaymentReceipt> {
        if epochs.is_empty() {
            return Err(ProtocolError::invalid_input("no epochs to pay").into());
        }
        ensure_unique(epochs)?;

        let rates = self.rates.clone();
        let loan = self.open_loan_mut(key)?;
        for epoch in epochs {
            if *epoch < loan.origination_epoch || *epoch > now {
                return Err(ProtocolError::epoch_range(format!(
                    "epoch {} outside [{}, {}]",
                    epoch, loan.origination_epoch, now
                ))
                .into());
            }
        }

        let mut breakdown = Vec::new();
        for epoch in epochs {
            if loan.paid_epochs.contains(epoch) {
                continue;
            }
            let due = calculator::interest_for(loan, &rates, *epoch);
            loan.paid_epochs.insert(*epoch);
            loan.fixed_charges.remove(epoch);
            breakdown.push((*epoch, due));
        }
        loan.last_paid_epoch = calculator::paid_frontier(loan.origination_epoch, &loan.paid_epochs);
        loan.outstanding_interest = calculator::accrued_interest(loan, &rates, now);

        let total = breakdown.iter().map(|(_, amount)| amount).sum();
        let closed = loan.principal == 0 && loan.outstanding_interest == 0;
        tracing::info!(
            loan = %key,
            total = %total,
            epochs = breakdown.len(),
            last_paid_epoch = ?loan.last_paid_epoch,
            "Interest paid"
        );
        if closed {
            self.close(key);
        }

        Ok(PaymentReceipt {
            key: *key,
            breakdown,
            total,
            closed,
        })
    }

    /// Reduce principal. Interest for elapsed unpaid epochs is locked in at the
    /// pre-repayment principal first, so repaying cannot erase it.
    pub fn record_repay(&mut self, key: &LoanKey, amount: Amount, now: Epoch) -> Result<RepayOutcome> {
        let rates = self.rates.clone();
        let loan = self.open_loan_mut(key)?;
        if amount == 0 || amount > loan.principal {
            return Err(ProtocolError::invalid_input(format!(
                "repay amount {} must be in 1..={}",
                amount, loan.principal
            ))
            .into());
        }

        for epoch in loan.origination_epoch..=now {
            if loan.paid_epochs.contains(&epoch) || loan.fixed_charges.contains_key(&epoch) {
                continue;
            }
            let charge = calculator::epoch_interest(loan.principal, rates.rate_at(epoch));
            loan.fixed_charges.insert(epoch, charge);
        }

        loan.principal -= amount;
        loan.outstanding_interest = calculator::accrued_interest(loan, &rates, now);
        let outcome = RepayOutcome {
            key: *key,
            repaid: amount,
            remaining_principal: loan.principal,
            outstanding_interest: loan.outstanding_interest,
            closed: loan.principal == 0 && loan.outstanding_interest == 0,
        };
        self.total_principal = self.total_principal.saturating_sub(amount);

        tracing::info!(
            loan = %key,
            repaid = %amount,
            remaining = %outcome.remaining_principal,
            outstanding_interest = %outcome.outstanding_interest,
            "Principal repaid"
        );
        if outcome.closed {
            self.close(key);
        }
        Ok(outcome)
    }

    fn close(&mut self, key: &LoanKey) {
        self.loans.remove(key);
        tracing::info!(loan = %key, "Loan closed");
    }

    /// Whether the loan may be liquidated at `now`
    pub fn is_defaulted(&self, key: &LoanKey, now: Epoch) -> Result<bool> {
        let loan = self.open_loan(key)?;
        Ok(calculator::is_defaulted(
            now,
            loan.first_unpaid_epoch(),
            self.grace_epochs,
        ))
    }

    /// Hand a defaulted loan to its lender.
    ///
    /// `epochs` names the delinquent epochs; each must be unpaid and inside
    /// `[origination, now]`. Their interest is reported as forfeited.
    pub fn record_liquidation(
        &mut self,
        key: &LoanKey,
        epochs: &[Epoch],
        now: Epoch,
    ) -> Result<LiquidatedLoan> {
        ensure_unique(epochs)?;
        if !self.is_defaulted(key, now)? {
            return Err(ProtocolError::NotDefaulted {
                token_id: key.token_id,
            }
            .into());
        }

        let rates = self.rates.clone();
        let loan = self.open_loan_mut(key)?;
        for epoch in epochs {
            if *epoch < loan.origination_epoch || *epoch > now || loan.paid_epochs.contains(epoch)
            {
                return Err(ProtocolError::epoch_range(format!(
                    "epoch {} is not an unpaid epoch of loan {}",
                    epoch, key
                ))
                .into());
            }
        }
        let forfeited_interest = epochs
            .iter()
            .map(|epoch| calculator::interest_for(loan, &rates, *epoch))
            .sum();

        loan.outstanding_interest = calculator::accrued_interest(loan, &rates, now);
        loan.status = LoanStatus::Liquidated;
        let snapshot = loan.clone();
        self.total_principal = self.total_principal.saturating_sub(snapshot.principal);

        tracing::warn!(
            loan = %key,
            principal = %snapshot.principal,
            forfeited_interest = %forfeited_interest,
            last_paid_epoch = ?snapshot.last_paid_epoch,
            "Loan liquidated"
        );
        Ok(LiquidatedLoan {
            loan: snapshot,
            forfeited_interest,
        })
    }

    /// Principal currently lent out across open loans
    pub fn total_principal(&self) -> Amount {
        self.total_principal
    }

    pub fn open_loans_of(&self, borrower: &Address) -> usize {
        self.loans
            .values()
            .filter(|loan| loan.is_open() && loan.borrower == *borrower)
            .count()
    }

    pub fn loans_of(&self, borrower: &Address) -> Vec<&Loan> {
        self.loans
            .values()
            .filter(|loan| loan.borrower == *borrower)
            .collect()
    }
}
