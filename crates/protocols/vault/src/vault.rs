//! Liquidity vault
//!
//! Epoch-indexed pool of reservations. Token movement is the caller's job:
//! every method here only updates books and reports the amount that has to
//! move.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spot_core::constants::BPS;
use spot_core::{
    Address, Amount, Context, Epoch, Hash32, MerkleRoot, ProtocolError, Result, Timestamp,
};

use crate::calculator;
use crate::constants::{MAX_RESERVATION_EPOCHS, MAX_TRANCHES};
use crate::membership::CollateralSet;
use crate::state::{
    Claim, EpochBook, Reservation, ReservationStatus, VaultParams, VaultSummary,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityVault {
    address: Address,
    owner: Address,
    params: Option<VaultParams>,
    start_time: Option<Timestamp>,
    membership: CollateralSet,
    reservations: Vec<Reservation>,
    books: BTreeMap<Epoch, EpochBook>,
    outstanding: Amount,
    written_off: Amount,
}

impl LiquidityVault {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            params: None,
            start_time: None,
            membership: CollateralSet::new(),
            reservations: Vec::new(),
            books: BTreeMap::new(),
            outstanding: 0,
            written_off: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, ctx: &Context) -> Result<()> {
        if ctx.caller != self.owner {
            return Err(ProtocolError::NotOwner {
                account: ctx.caller,
            }
            .into());
        }
        Ok(())
    }

    /// One-time initializer; starts the epoch clock at `ctx.now`
    pub fn begin(&mut self, ctx: &Context, params: VaultParams) -> Result<()> {
        self.ensure_owner(ctx)?;
        if self.start_time.is_some() {
            return Err(ProtocolError::AlreadyStarted.into());
        }
        if params.epoch_length == 0 {
            return Err(ProtocolError::invalid_input("epoch length must be positive").into());
        }
        if params.ticket_size == 0 {
            return Err(ProtocolError::invalid_input("ticket size must be positive").into());
        }
        if params.slots == 0 {
            return Err(ProtocolError::invalid_input("slots must be positive").into());
        }
        if params.rate as u128 > BPS {
            return Err(ProtocolError::invalid_input(format!(
                "rate {} bps exceeds 100%",
                params.rate
            ))
            .into());
        }

        tracing::info!(
            vault = %self.address,
            start_time = ctx.now,
            epoch_length = params.epoch_length,
            ticket_size = %params.ticket_size,
            rate = params.rate,
            beta = params.beta,
            "Vault started"
        );
        self.start_time = Some(ctx.now);
        self.params = Some(params);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn params(&self) -> Result<&VaultParams> {
        self.params
            .as_ref()
            .ok_or_else(|| ProtocolError::NotStarted.into())
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    pub fn epoch_at(&self, timestamp: Timestamp) -> Result<Epoch> {
        let params = self.params()?;
        let start = self.start_time.ok_or(ProtocolError::NotStarted)?;
        Ok(calculator::epoch_at(start, params.epoch_length, timestamp))
    }

    pub fn current_epoch(&self, ctx: &Context) -> Result<Epoch> {
        self.epoch_at(ctx.now)
    }

    /// Publish a new collateral root (vault owner only)
    pub fn include_nft(
        &mut self,
        ctx: &Context,
        root: MerkleRoot,
        collections: &[Address],
        token_ids: &[u64],
    ) -> Result<()> {
        self.ensure_owner(ctx)?;
        self.membership.publish_root(root, collections, token_ids)?;
        tracing::info!(
            vault = %self.address,
            root = %root,
            size = token_ids.len(),
            version = self.membership.version(),
            "Collateral root published"
        );
        Ok(())
    }

    /// Whether `(collection, token_id)` is in the current collateral set
    pub fn contains(&self, proof: &[Hash32], collection: &Address, token_id: u64) -> bool {
        let ok = self.membership.verify(proof, collection, token_id);
        if !ok {
            tracing::debug!(
                collection = %collection,
                token_id,
                root_version = self.membership.version(),
                "Membership proof rejected"
            );
        }
        ok
    }

    pub fn membership(&self) -> &CollateralSet {
        &self.membership
    }

    /// Reserve capital per tranche over `[epoch_start, epoch_end)`.
    ///
    /// Returns the reservation index and the amount the caller must deposit.
    pub fn purchase(
        &mut self,
        ctx: &Context,
        owner: Address,
        amounts: &[Amount],
        epoch_start: Epoch,
        epoch_end: Epoch,
    ) -> Result<(usize, Amount)> {
        let current = self.current_epoch(ctx)?;
        let params = self.params()?.clone();

        if amounts.is_empty() || amounts.len() > MAX_TRANCHES {
            return Err(ProtocolError::invalid_input(format!(
                "expected 1..={} tranche amounts, got {}",
                MAX_TRANCHES,
                amounts.len()
            ))
            .into());
        }
        let total = calculator::checked_total(amounts)
            .ok_or_else(|| ProtocolError::invalid_input("reservation amounts overflow"))?;
        if total == 0 {
            return Err(ProtocolError::invalid_input("reservation amount is zero").into());
        }
        if epoch_end <= epoch_start {
            return Err(ProtocolError::epoch_range(format!(
                "end {} <= start {}",
                epoch_end, epoch_start
            ))
            .into());
        }
        if epoch_start < current {
            return Err(ProtocolError::epoch_range(format!(
                "start {} is before current epoch {}",
                epoch_start, current
            ))
            .into());
        }
        if epoch_end - epoch_start > MAX_RESERVATION_EPOCHS {
            return Err(ProtocolError::epoch_range(format!(
                "window of {} epochs exceeds {}",
                epoch_end - epoch_start,
                MAX_RESERVATION_EPOCHS
            ))
            .into());
        }

        let capacity =
            calculator::tranche_capacity(params.ticket_size, self.membership.size());
        if capacity == 0 {
            return Err(ProtocolError::capacity("no collateral published").into());
        }
        for epoch in epoch_start..epoch_end {
            let book = self.books.get(&epoch);
            for (tranche, amount) in amounts.iter().enumerate() {
                let reserved = book.map(|b| b.tranche(tranche)).unwrap_or(0);
                if reserved.checked_add(*amount).map_or(true, |sum| sum > capacity) {
                    return Err(ProtocolError::capacity(format!(
                        "tranche {} in epoch {}: {} + {} > {}",
                        tranche, epoch, reserved, amount, capacity
                    ))
                    .into());
                }
            }
        }

        let reservation = Reservation {
            owner,
            amounts: amounts.to_vec(),
            epoch_start,
            epoch_end,
            status: ReservationStatus::Active,
            written_off: 0,
        };
        let weight = calculator::checked_risk_weight(&params, amounts)
            .ok_or_else(|| ProtocolError::invalid_input("reservation risk weight overflows"))?;
        for epoch in epoch_start..epoch_end {
            self.books.entry(epoch).or_default().add(amounts, weight);
        }
        self.reservations.push(reservation);
        let index = self.reservations.len() - 1;

        tracing::info!(
            vault = %self.address,
            owner = %owner,
            index,
            total = %total,
            epoch_start,
            epoch_end,
            "Reservation purchased"
        );
        Ok((index, total))
    }

    fn owned_active(&self, ctx: &Context, index: usize) -> Result<&Reservation> {
        let reservation = self.reservations.get(index).ok_or_else(|| {
            ProtocolError::invalid_input(format!("unknown reservation {}", index))
        })?;
        if reservation.owner != ctx.caller {
            return Err(ProtocolError::NotOwner {
                account: ctx.caller,
            }
            .into());
        }
        if !reservation.is_active() {
            return Err(ProtocolError::AlreadyConsumed { index }.into());
        }
        Ok(reservation)
    }

    /// Give back the part of a reservation beyond the current epoch.
    ///
    /// A reservation whose window has not started is removed and fully
    /// refunded. A running one is truncated to end after the current epoch and
    /// refunds nothing until `claim`.
    pub fn sell(&mut self, ctx: &Context, index: usize) -> Result<Amount> {
        let current = self.current_epoch(ctx)?;
        let params = self.params()?.clone();
        let reservation = self.owned_active(ctx, index)?.clone();
        let weight = reservation.risk_weight(&params);

        let (release_from, refund) = if reservation.epoch_start > current {
            (reservation.epoch_start, reservation.total())
        } else if reservation.epoch_end > current + 1 {
            (current + 1, 0)
        } else {
            return Err(ProtocolError::AlreadyConsumed { index }.into());
        };

        for epoch in release_from..reservation.epoch_end {
            if let Some(book) = self.books.get_mut(&epoch) {
                book.remove(&reservation.amounts, weight);
            }
        }

        let stored = &mut self.reservations[index];
        if refund > 0 {
            stored.status = ReservationStatus::Consumed;
        } else {
            stored.epoch_end = release_from;
        }

        tracing::info!(
            vault = %self.address,
            index,
            refund = %refund,
            released_from = release_from,
            "Reservation sold"
        );
        Ok(refund)
    }

    /// Close an elapsed reservation: capital net of its default losses plus
    /// its interest share.
    ///
    /// Blocked while any loan funded inside the window is still open; such a
    /// loan ends either repaid or liquidated, and only then is the capital
    /// behind it known.
    pub fn claim(&mut self, ctx: &Context, index: usize) -> Result<Claim> {
        let current = self.current_epoch(ctx)?;
        let params = self.params()?.clone();
        let reservation = self.owned_active(ctx, index)?.clone();

        if reservation.epoch_end > current {
            return Err(ProtocolError::epoch_range(format!(
                "reservation {} runs until epoch {} (current {})",
                index, reservation.epoch_end, current
            ))
            .into());
        }

        let window = reservation.epoch_start..reservation.epoch_end;
        if let Some((epoch, book)) = self.books.range(window.clone()).find(|(_, b)| b.lent > 0) {
            return Err(ProtocolError::epoch_range(format!(
                "reservation {} funds {} still lent out from epoch {}",
                index, book.lent, epoch
            ))
            .into());
        }

        let weight = reservation.risk_weight(&params);
        let interest = self
            .books
            .range(window)
            .map(|(_, book)| calculator::pro_rata(book.interest, weight, book.risk_weight))
            .fold(0, |acc: Amount, share| acc.saturating_add(share));
        let claim = Claim {
            capital: reservation.at_risk(),
            interest,
            written_off: reservation.written_off,
        };

        self.reservations[index].status = ReservationStatus::Consumed;
        tracing::info!(
            vault = %self.address,
            index,
            capital = %claim.capital,
            interest = %claim.interest,
            written_off = %claim.written_off,
            "Reservation claimed"
        );
        Ok(claim)
    }

    /// Reserved capital in `epoch`
    pub fn liquidity(&self, epoch: Epoch) -> Amount {
        self.books.get(&epoch).map(|b| b.liquidity).unwrap_or(0)
    }

    /// Maximum principal one collateral item may draw in `epoch`.
    ///
    /// Depends only on the vault's parameters and books; 0 before `begin`.
    pub fn payout_per_reservation(&self, epoch: Epoch) -> Amount {
        match &self.params {
            Some(params) => calculator::payout_per_reservation(
                self.liquidity(epoch),
                self.membership.size(),
                params.rate,
                params.beta,
            ),
            None => 0,
        }
    }

    /// Principal still out on loans funded in epochs up to and including
    /// `epoch`
    pub fn lent_through(&self, epoch: Epoch) -> Amount {
        self.books
            .range(..=epoch)
            .fold(0, |acc: Amount, (_, book)| acc.saturating_add(book.lent))
    }

    /// Capital that can still be lent in `epoch`.
    ///
    /// Loans funded in earlier epochs stay open across epoch boundaries, so
    /// their principal counts against every later epoch until it is repaid
    /// or written off.
    pub fn available_liquidity(&self, epoch: Epoch) -> Amount {
        self.liquidity(epoch)
            .saturating_sub(self.lent_through(epoch))
    }

    /// Book a loan drawing `amount`, funded by `epoch`
    pub fn draw(&mut self, epoch: Epoch, amount: Amount) -> Result<()> {
        let payout = self.payout_per_reservation(epoch);
        if amount > payout {
            return Err(ProtocolError::capacity(format!(
                "borrow of {} exceeds payout per reservation {} in epoch {}",
                amount, payout, epoch
            ))
            .into());
        }
        let available = self.available_liquidity(epoch);
        if amount > available {
            return Err(ProtocolError::capacity(format!(
                "borrow of {} exceeds unlent liquidity {} in epoch {}",
                amount, available, epoch
            ))
            .into());
        }
        let book = self.books.entry(epoch).or_default();
        book.lent = book.lent.saturating_add(amount);
        self.outstanding = self.outstanding.saturating_add(amount);
        Ok(())
    }

    /// Credit interest paid for `epoch`
    pub fn record_interest(&mut self, epoch: Epoch, amount: Amount) {
        let book = self.books.entry(epoch).or_default();
        book.interest = book.interest.saturating_add(amount);
    }

    /// Principal of a loan funded by `funding_epoch` came back from a borrower
    pub fn record_principal_return(&mut self, funding_epoch: Epoch, amount: Amount) {
        if let Some(book) = self.books.get_mut(&funding_epoch) {
            book.lent = book.lent.saturating_sub(amount);
        }
        self.outstanding = self.outstanding.saturating_sub(amount);
    }

    /// Principal of a loan funded by `funding_epoch` was lost to liquidation.
    ///
    /// The loss is charged to the reservations that funded that epoch, split
    /// by risk weight.
    pub fn record_default(&mut self, funding_epoch: Epoch, amount: Amount) {
        let book = self.books.entry(funding_epoch).or_default();
        book.lent = book.lent.saturating_sub(amount);
        book.written_off = book.written_off.saturating_add(amount);
        self.outstanding = self.outstanding.saturating_sub(amount);
        self.written_off = self.written_off.saturating_add(amount);

        let unallocated = self.charge_loss(funding_epoch, amount);
        tracing::info!(
            vault = %self.address,
            funding_epoch,
            amount = %amount,
            unallocated = %unallocated,
            "Default written off"
        );
    }

    /// Spread `loss` over the reservations covering `epoch`; returns the part
    /// no reservation had capital left to absorb
    fn charge_loss(&mut self, epoch: Epoch, loss: Amount) -> Amount {
        let Some(params) = self.params.clone() else {
            return loss;
        };
        let funders: Vec<(usize, u128)> = self
            .reservations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_active() && r.covers(epoch))
            .map(|(i, r)| (i, r.risk_weight(&params)))
            .collect();
        let total_weight = funders
            .iter()
            .fold(0u128, |acc, (_, w)| acc.saturating_add(*w));

        let mut left = loss;
        for (index, weight) in &funders {
            let reservation = &mut self.reservations[*index];
            let share = calculator::pro_rata(loss, *weight, total_weight)
                .min(reservation.at_risk())
                .min(left);
            reservation.written_off += share;
            left -= share;
        }
        // rounding dust and capped shares
        for (index, _) in &funders {
            if left == 0 {
                break;
            }
            let reservation = &mut self.reservations[*index];
            let share = reservation.at_risk().min(left);
            reservation.written_off += share;
            left -= share;
        }
        left
    }

    pub fn reservation(&self, index: usize) -> Option<&Reservation> {
        self.reservations.get(index)
    }

    /// Reservations owned by `owner`, with their indices
    pub fn reservations_of(&self, owner: &Address) -> Vec<(usize, &Reservation)> {
        self.reservations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.owner == *owner)
            .collect()
    }

    pub fn book(&self, epoch: Epoch) -> Option<&EpochBook> {
        self.books.get(&epoch)
    }

    pub fn outstanding_principal(&self) -> Amount {
        self.outstanding
    }

    pub fn summary(&self, now: Timestamp) -> VaultSummary {
        VaultSummary {
            address: self.address,
            owner: self.owner,
            started: self.is_started(),
            start_time: self.start_time,
            current_epoch: self.epoch_at(now).ok(),
            params: self.params.clone(),
            root: self.membership.root(),
            root_version: self.membership.version(),
            collection_size: self.membership.size(),
            reservations: self.reservations.len(),
            outstanding_principal: self.outstanding,
            written_off: self.written_off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merkle_proof::MerkleTree;

    const T: Timestamp = 1_700_000_000;

    fn owner() -> Address {
        Address::from_u64(0x0a)
    }

    fn lp() -> Address {
        Address::from_u64(0x1b)
    }

    fn params() -> VaultParams {
        VaultParams {
            slots: 3,
            ticket_size: 100,
            rate: 100,
            epoch_length: 100,
            token: Address::from_u64(0x70),
            risk_base: 100,
            risk_step: 10,
            beta: 3,
        }
    }

    fn at(caller: Address, offset: u64) -> Context {
        Context::new(caller, T + offset)
    }

    /// Started vault with a 12-item collateral set
    fn started_vault() -> (LiquidityVault, MerkleTree) {
        let collection = Address::from_u64(0xc0);
        let collections = vec![collection; 12];
        let ids: Vec<u64> = (1..=12).collect();
        let tree = MerkleTree::from_collateral(&collections, &ids).unwrap();

        let mut vault = LiquidityVault::new(Address::from_u64(0x5a), owner());
        vault
            .include_nft(&at(owner(), 0), tree.root(), &collections, &ids)
            .unwrap();
        vault.begin(&at(owner(), 0), params()).unwrap();
        (vault, tree)
    }

    #[test]
    fn test_begin_twice() {
        let (mut vault, _) = started_vault();
        let err = vault.begin(&at(owner(), 10), params()).unwrap_err();
        assert_eq!(err, ProtocolError::AlreadyStarted.into());
    }

    #[test]
    fn test_begin_requires_owner() {
        let mut vault = LiquidityVault::new(Address::from_u64(0x5a), owner());
        let err = vault.begin(&at(lp(), 0), params()).unwrap_err();
        assert_eq!(err.error_code(), "not_owner");
        assert!(!vault.is_started());
    }

    #[test]
    fn test_begin_rejects_zero_epoch_length() {
        let mut vault = LiquidityVault::new(Address::from_u64(0x5a), owner());
        let mut p = params();
        p.epoch_length = 0;
        assert_eq!(
            vault.begin(&at(owner(), 0), p).unwrap_err().error_code(),
            "invalid_input"
        );
    }

    #[test]
    fn test_purchase_before_begin() {
        let mut vault = LiquidityVault::new(Address::from_u64(0x5a), owner());
        let err = vault
            .purchase(&at(lp(), 0), lp(), &[300], 0, 9)
            .unwrap_err();
        assert_eq!(err, ProtocolError::NotStarted.into());
    }

    #[test]
    fn test_purchase_scenario_and_payout() {
        let (mut vault, _) = started_vault();
        let (index, total) = vault
            .purchase(&at(lp(), 50), lp(), &[300; 8], 0, 9)
            .unwrap();
        assert_eq!(index, 0);
        assert_eq!(total, 2_400);
        assert_eq!(vault.liquidity(0), 2_400);
        assert_eq!(vault.liquidity(8), 2_400);
        assert_eq!(vault.liquidity(9), 0);

        let p0 = vault.payout_per_reservation(0);
        let p1 = vault.payout_per_reservation(1);
        assert_eq!(p0, 194);
        assert_eq!(p1, 194);
        assert_eq!(vault.payout_per_reservation(0), p0);
        assert_eq!(vault.payout_per_reservation(500), 0);
    }

    #[test]
    fn test_purchase_epoch_range() {
        let (mut vault, _) = started_vault();
        let err = vault
            .purchase(&at(lp(), 50), lp(), &[300], 4, 4)
            .unwrap_err();
        assert_eq!(err.error_code(), "epoch_range");

        // epoch 2 now; starting at 1 is retroactive
        let err = vault
            .purchase(&at(lp(), 250), lp(), &[300], 1, 5)
            .unwrap_err();
        assert_eq!(err.error_code(), "epoch_range");
    }

    #[test]
    fn test_purchase_capacity() {
        let (mut vault, _) = started_vault();
        // capacity per tranche = 100 * 12 = 1_200
        vault
            .purchase(&at(lp(), 0), lp(), &[1_000], 0, 2)
            .unwrap();
        let err = vault
            .purchase(&at(lp(), 0), lp(), &[201], 1, 3)
            .unwrap_err();
        assert_eq!(err.error_code(), "capacity_exceeded");
        // other tranches are independent
        vault
            .purchase(&at(lp(), 0), lp(), &[200, 1_200], 1, 3)
            .unwrap();
        assert_eq!(vault.liquidity(1), 2_400);
    }

    #[test]
    fn test_purchase_without_collateral() {
        let mut vault = LiquidityVault::new(Address::from_u64(0x5a), owner());
        vault.begin(&at(owner(), 0), params()).unwrap();
        let err = vault
            .purchase(&at(lp(), 0), lp(), &[100], 0, 1)
            .unwrap_err();
        assert_eq!(err.error_code(), "capacity_exceeded");
    }

    #[test]
    fn test_purchase_rejects_empty_amounts() {
        let (mut vault, _) = started_vault();
        assert_eq!(
            vault
                .purchase(&at(lp(), 0), lp(), &[], 0, 1)
                .unwrap_err()
                .error_code(),
            "invalid_input"
        );
        assert_eq!(
            vault
                .purchase(&at(lp(), 0), lp(), &[0, 0], 0, 1)
                .unwrap_err()
                .error_code(),
            "invalid_input"
        );
    }

    #[test]
    fn test_sell_before_start_refunds_everything() {
        let (mut vault, _) = started_vault();
        let (index, _) = vault
            .purchase(&at(lp(), 0), lp(), &[300, 300], 2, 5)
            .unwrap();
        let refund = vault.sell(&at(lp(), 150), index).unwrap();
        assert_eq!(refund, 600);
        assert_eq!(vault.liquidity(2), 0);
        assert_eq!(
            vault.sell(&at(lp(), 150), index).unwrap_err(),
            ProtocolError::AlreadyConsumed { index }.into()
        );
    }

    #[test]
    fn test_sell_running_reservation_truncates() {
        let (mut vault, _) = started_vault();
        let (index, _) = vault
            .purchase(&at(lp(), 0), lp(), &[300], 0, 5)
            .unwrap();
        // epoch 1
        let refund = vault.sell(&at(lp(), 120), index).unwrap();
        assert_eq!(refund, 0);
        assert_eq!(vault.liquidity(1), 300);
        assert_eq!(vault.liquidity(2), 0);
        assert_eq!(vault.reservation(index).unwrap().epoch_end, 2);

        // nothing left beyond the current epoch
        let err = vault.sell(&at(lp(), 150), index).unwrap_err();
        assert_eq!(err.error_code(), "already_consumed");
    }

    #[test]
    fn test_sell_not_owner() {
        let (mut vault, _) = started_vault();
        let (index, _) = vault
            .purchase(&at(lp(), 0), lp(), &[300], 1, 5)
            .unwrap();
        let err = vault.sell(&at(owner(), 0), index).unwrap_err();
        assert_eq!(err.error_code(), "not_owner");
    }

    #[test]
    fn test_claim_after_window_with_interest() {
        let (mut vault, _) = started_vault();
        let other = Address::from_u64(0x2c);
        let (a, _) = vault
            .purchase(&at(lp(), 0), lp(), &[300], 0, 2)
            .unwrap();
        // tranche 1 carries 110 risk points vs 100
        let (b, _) = vault
            .purchase(&at(other, 0), other, &[0, 300], 0, 2)
            .unwrap();

        vault.record_interest(0, 2_100);
        vault.record_interest(1, 0);

        let err = vault.claim(&at(lp(), 150), a).unwrap_err();
        assert_eq!(err.error_code(), "epoch_range");

        let claim_a = vault.claim(&at(lp(), 200), a).unwrap();
        assert_eq!(claim_a.capital, 300);
        // 2_100 * 30_000 / 63_000
        assert_eq!(claim_a.interest, 1_000);

        let claim_b = vault.claim(&at(other, 200), b).unwrap();
        assert_eq!(claim_b.interest, 1_100);
        assert_eq!(claim_b.total(), 1_400);
    }

    #[test]
    fn test_draw_respects_payout() {
        let (mut vault, _) = started_vault();
        vault
            .purchase(&at(lp(), 0), lp(), &[300; 8], 0, 9)
            .unwrap();
        let err = vault.draw(0, 195).unwrap_err();
        assert_eq!(err.error_code(), "capacity_exceeded");
        vault.draw(0, 194).unwrap();
        assert_eq!(vault.outstanding_principal(), 194);
        vault.record_principal_return(0, 94);
        assert_eq!(vault.outstanding_principal(), 100);
        assert_eq!(vault.book(0).unwrap().lent, 100);
        vault.record_default(0, 100);
        assert_eq!(vault.summary(T).written_off, 100);
        assert_eq!(vault.book(0).unwrap().lent, 0);
        assert_eq!(vault.book(0).unwrap().written_off, 100);
    }

    #[test]
    fn test_open_loans_reduce_later_epochs() {
        let (mut vault, _) = started_vault();
        vault
            .purchase(&at(lp(), 0), lp(), &[1_200, 1_200], 0, 4)
            .unwrap();
        assert_eq!(vault.payout_per_reservation(0), 194);
        for _ in 0..12 {
            vault.draw(0, 194).unwrap();
        }
        assert_eq!(vault.lent_through(0), 2_328);

        // epoch 1 has the same reservation behind it and 72 left unlent
        assert_eq!(vault.available_liquidity(1), 72);
        let err = vault.draw(1, 194).unwrap_err();
        assert_eq!(err.error_code(), "capacity_exceeded");
        vault.draw(1, 72).unwrap();
        assert_eq!(vault.available_liquidity(2), 0);

        // repaid principal frees capacity again
        vault.record_principal_return(0, 194);
        vault.draw(1, 194).unwrap();
        assert_eq!(vault.lent_through(1), 2_400);
    }

    #[test]
    fn test_default_charges_funding_reservations() {
        let (mut vault, _) = started_vault();
        let carol = Address::from_u64(0x3d);
        let (bob_index, _) = vault
            .purchase(&at(lp(), 0), lp(), &[1_200, 1_200], 0, 4)
            .unwrap();
        let (carol_index, _) = vault
            .purchase(&at(carol, 0), carol, &[1_200, 1_200], 4, 6)
            .unwrap();
        for _ in 0..3 {
            vault.draw(0, 194).unwrap();
        }

        // loans funded in epoch 0 are still open
        let err = vault.claim(&at(lp(), 450), bob_index).unwrap_err();
        assert_eq!(err.error_code(), "epoch_range");

        vault.record_default(0, 582);
        let bob_claim = vault.claim(&at(lp(), 450), bob_index).unwrap();
        assert_eq!(bob_claim.capital, 2_400 - 582);
        assert_eq!(bob_claim.written_off, 582);

        let carol_claim = vault.claim(&at(carol, 600), carol_index).unwrap();
        assert_eq!(carol_claim.capital, 2_400);
        assert_eq!(carol_claim.written_off, 0);
    }

    #[test]
    fn test_default_split_by_risk_weight() {
        let (mut vault, _) = started_vault();
        let other = Address::from_u64(0x2c);
        let (a, _) = vault
            .purchase(&at(lp(), 0), lp(), &[300], 0, 2)
            .unwrap();
        // a later-starting reservation did not fund epoch 0
        vault
            .purchase(&at(other, 0), other, &[100], 1, 2)
            .unwrap();
        let (b, _) = vault
            .purchase(&at(other, 0), other, &[0, 300], 0, 2)
            .unwrap();
        vault.draw(0, 43).unwrap();
        vault.draw(0, 20).unwrap();

        // weights 30_000 and 33_000
        vault.record_default(0, 63);
        assert_eq!(vault.reservation(a).unwrap().written_off, 30);
        assert_eq!(vault.reservation(b).unwrap().written_off, 33);
        assert_eq!(vault.reservation(1).unwrap().written_off, 0);

        let claim_a = vault.claim(&at(lp(), 200), a).unwrap();
        assert_eq!(claim_a.capital, 270);
        let claim_b = vault.claim(&at(other, 200), b).unwrap();
        assert_eq!(claim_b.capital, 267);
    }

    #[test]
    fn test_purchase_rejects_overflowing_amounts() {
        let (mut vault, _) = started_vault();
        let err = vault
            .purchase(&at(lp(), 0), lp(), &[u128::MAX, 1], 0, 1)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
        assert_eq!(vault.liquidity(0), 0);
    }

    #[test]
    fn test_reservations_of_filters_by_owner() {
        let (mut vault, _) = started_vault();
        let other = Address::from_u64(0x2c);
        vault.purchase(&at(lp(), 0), lp(), &[100], 0, 2).unwrap();
        vault.purchase(&at(other, 0), other, &[100], 0, 2).unwrap();
        vault.purchase(&at(lp(), 0), lp(), &[50], 1, 3).unwrap();

        let owned: Vec<usize> = vault.reservations_of(&lp()).iter().map(|(i, _)| *i).collect();
        assert_eq!(owned, vec![0, 2]);
        assert!(vault.reservations_of(&owner()).is_empty());
    }

    #[test]
    fn test_include_nft_requires_owner() {
        let (mut vault, tree) = started_vault();
        let err = vault
            .include_nft(&at(lp(), 0), tree.root(), &[Address::from_u64(1)], &[1])
            .unwrap_err();
        assert_eq!(err.error_code(), "not_owner");
    }

    #[test]
    fn test_contains_tracks_current_root() {
        let (vault, tree) = started_vault();
        let collection = Address::from_u64(0xc0);
        let proof = tree.collateral_proof(&collection, 5).unwrap();
        assert!(vault.contains(&proof, &collection, 5));
        assert!(!vault.contains(&proof, &collection, 6));
    }
}
