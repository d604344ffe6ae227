//! Spot engine
//!
//! Ties the vault, the loan ledger and the wrapper to a token and a pool
//! custodian. Every public operation runs through [`Spot::transact`]: it works
//! on a copy of the whole engine and only commits when the operation returns
//! `Ok`, so a failing batch leaves nothing behind. Inside an operation, books
//! are updated before any token or NFT moves.

use std::collections::BTreeSet;

use lend::{LiquidatedLoan, Loan, LoanKey, LoanLedger, PaymentReceipt, RepayOutcome};
use spot_core::{
    Address, Amount, Context, Epoch, Hash32, MerkleRoot, NftId, ProtocolConfig, ProtocolError,
    Result, WrappedId,
};
use vault::{Claim, LiquidityVault, VaultParams};

use crate::custody::CollateralCustodian;
use crate::state::{BorrowReceipt, ExchangeReceipt, Pairing};
use crate::token::TokenLedger;
use crate::wrapper::SudoNft;

fn ensure_distinct(ids: &[u64], what: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(*id) {
            return Err(ProtocolError::invalid_input(format!("{} {} listed twice", what, id)).into());
        }
    }
    Ok(())
}

fn checked_sum(amounts: impl IntoIterator<Item = Amount>, what: &str) -> Result<Amount> {
    amounts
        .into_iter()
        .try_fold(0u128, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| ProtocolError::invalid_input(format!("{} total overflows", what)).into())
}

fn ensure_batch(len: usize, other: usize, what: &str) -> Result<()> {
    if len == 0 {
        return Err(ProtocolError::invalid_input(format!("no {} given", what)).into());
    }
    if len != other {
        return Err(ProtocolError::invalid_input(format!(
            "{} {} for {} entries",
            len, what, other
        ))
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Spot<T, C> {
    config: ProtocolConfig,
    vault: LiquidityVault,
    ledger: LoanLedger,
    wrapper: SudoNft,
    token: T,
    custodian: C,
}

impl<T, C> Spot<T, C>
where
    T: TokenLedger + Clone,
    C: CollateralCustodian + Clone,
{
    pub fn new(config: ProtocolConfig, token: T, custodian: C) -> Self {
        Self {
            vault: LiquidityVault::new(config.vault_address, config.vault_owner),
            ledger: LoanLedger::new(config.grace_epochs),
            wrapper: SudoNft::new(
                config.wrapper_address,
                config.collection,
                config.wrapped_supply_cap,
            ),
            config,
            token,
            custodian,
        }
    }

    /// Run `op` against a draft of the engine; commit only on success.
    ///
    /// The draft is a full clone of the vault, ledger, wrapper, token and
    /// custodian, so every state-changing call costs O(total state) in time
    /// and memory. That is acceptable for the in-memory simulator this engine
    /// backs. A persistent deployment should swap this for a write journal or
    /// a storage-level transaction.
    fn transact<R>(&mut self, op: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let mut draft = self.clone();
        let out = op(&mut draft)?;
        *self = draft;
        Ok(out)
    }

    fn ensure_lender(&self, lender: &Address) -> Result<()> {
        if *lender != self.vault.address() {
            return Err(ProtocolError::invalid_input(format!(
                "unknown lender {}, vault is {}",
                lender,
                self.vault.address()
            ))
            .into());
        }
        Ok(())
    }

    fn key(&self, id: WrappedId) -> LoanKey {
        LoanKey::new(self.wrapper.address(), id)
    }

    // =========================================================================
    // Vault
    // =========================================================================

    pub fn begin(&mut self, ctx: &Context, params: VaultParams) -> Result<()> {
        self.transact(|spot| {
            if params.token != spot.token.address() {
                return Err(ProtocolError::invalid_input(format!(
                    "vault token {} is not the lent token {}",
                    params.token,
                    spot.token.address()
                ))
                .into());
            }
            let rate = params.rate;
            spot.vault.begin(ctx, params)?;
            spot.ledger.configure(rate);
            Ok(())
        })
    }

    /// Reserve capital for the caller; returns the reservation index
    pub fn purchase(
        &mut self,
        ctx: &Context,
        amounts: &[Amount],
        epoch_start: Epoch,
        epoch_end: Epoch,
    ) -> Result<usize> {
        self.transact(|spot| {
            let (index, total) =
                spot.vault
                    .purchase(ctx, ctx.caller, amounts, epoch_start, epoch_end)?;
            spot.token
                .transfer(&ctx.caller, &spot.vault.address(), total)?;
            Ok(index)
        })
    }

    pub fn sell(&mut self, ctx: &Context, index: usize) -> Result<Amount> {
        self.transact(|spot| {
            let refund = spot.vault.sell(ctx, index)?;
            spot.token
                .transfer(&spot.vault.address(), &ctx.caller, refund)?;
            Ok(refund)
        })
    }

    pub fn claim(&mut self, ctx: &Context, index: usize) -> Result<Claim> {
        self.transact(|spot| {
            let claim = spot.vault.claim(ctx, index)?;
            spot.token
                .transfer(&spot.vault.address(), &ctx.caller, claim.total())?;
            Ok(claim)
        })
    }

    pub fn include_nft(
        &mut self,
        ctx: &Context,
        root: MerkleRoot,
        collections: &[Address],
        token_ids: &[u64],
    ) -> Result<()> {
        self.transact(|spot| spot.vault.include_nft(ctx, root, collections, token_ids))
    }

    pub fn payout_per_reservation(&self, epoch: Epoch) -> Amount {
        self.vault.payout_per_reservation(epoch)
    }

    pub fn contains(&self, proof: &[Hash32], collection: &Address, token_id: u64) -> bool {
        self.vault.contains(proof, collection, token_id)
    }

    /// Re-price interest from the next epoch on (vault owner only).
    /// Returns the first epoch charged at the new rate.
    pub fn update_rate(&mut self, ctx: &Context, bps: u64) -> Result<Epoch> {
        self.transact(|spot| {
            if ctx.caller != spot.vault.owner() {
                return Err(ProtocolError::NotOwner {
                    account: ctx.caller,
                }
                .into());
            }
            let current = spot.vault.current_epoch(ctx)?;
            spot.ledger.set_rate(current + 1, bps, current)?;
            Ok(current + 1)
        })
    }

    // =========================================================================
    // Pool pairing
    // =========================================================================

    /// Announce that the caller is handing `pool` to the wrapper
    pub fn initiate_pool(&mut self, ctx: &Context, pool: Address) -> Result<Pairing> {
        self.transact(|spot| {
            let owner = spot.custodian.owner(&pool)?;
            if owner != ctx.caller {
                return Err(ProtocolError::NotOwner {
                    account: ctx.caller,
                }
                .into());
            }
            let collection = spot.custodian.collection(&pool)?;
            if collection != spot.wrapper.collection() {
                return Err(ProtocolError::invalid_input(format!(
                    "pool {} trades {}, wrapper accepts {}",
                    pool,
                    collection,
                    spot.wrapper.collection()
                ))
                .into());
            }
            spot.wrapper.begin_pairing(pool, ctx.caller)?;

            tracing::info!(pool = %pool, initiator = %ctx.caller, "Pool transfer initiated");
            Ok(spot.wrapper.pairing(&pool))
        })
    }

    /// Accept a pool whose ownership now sits with the wrapper and mint one
    /// position per NFT it holds to the initiator
    pub fn call_transfer_ownership(
        &mut self,
        ctx: &Context,
        pool: Address,
    ) -> Result<Vec<WrappedId>> {
        self.transact(|spot| {
            spot.wrapper.check_acceptance(&pool, &ctx.caller)?;
            let owner = spot.custodian.owner(&pool)?;
            if owner != spot.wrapper.address() {
                tracing::warn!(
                    pool = %pool,
                    owner = %owner,
                    "Pool handoff accepted before ownership transfer"
                );
                return Err(ProtocolError::HandoffIncomplete { pool }.into());
            }

            spot.wrapper.complete_pairing(&pool, &ctx.caller)?;
            let held = spot.custodian.nft_ids(&pool)?;
            let ids = spot.wrapper.mint(pool, ctx.caller, held.len())?;

            tracing::info!(
                pool = %pool,
                initiator = %ctx.caller,
                minted = ids.len(),
                "Pool paired"
            );
            Ok(ids)
        })
    }

    /// Deposit caller-owned NFTs into a paired pool for matching positions
    pub fn wrap(&mut self, ctx: &Context, pool: Address, nft_ids: &[NftId]) -> Result<Vec<WrappedId>> {
        self.transact(|spot| {
            ensure_batch(nft_ids.len(), nft_ids.len(), "NFT ids")?;
            ensure_distinct(nft_ids, "NFT")?;
            spot.wrapper.ensure_paired(&pool)?;

            let ids = spot.wrapper.mint(pool, ctx.caller, nft_ids.len())?;
            for nft_id in nft_ids {
                spot.custodian.deposit_nft(&pool, &ctx.caller, *nft_id)?;
            }

            tracing::info!(pool = %pool, owner = %ctx.caller, minted = ids.len(), "NFTs wrapped");
            Ok(ids)
        })
    }

    /// Hand a pool with no live positions back to its initiator
    pub fn release_pool(&mut self, ctx: &Context, pool: Address) -> Result<Pairing> {
        self.transact(|spot| {
            spot.wrapper.end_pairing(&pool, &ctx.caller)?;
            spot.custodian
                .transfer_ownership(&pool, &spot.wrapper.address(), &ctx.caller)?;

            tracing::info!(pool = %pool, owner = %ctx.caller, "Pool released");
            Ok(spot.wrapper.pairing(&pool))
        })
    }

    /// Move a position the caller holds; refused while it backs a loan
    pub fn transfer(&mut self, ctx: &Context, id: WrappedId, to: Address) -> Result<()> {
        self.transact(|spot| {
            spot.wrapper.owned_position(id, &ctx.caller)?;
            if spot.ledger.has_open_loan(&spot.key(id)) {
                return Err(ProtocolError::LoanOutstanding { token_id: id }.into());
            }
            spot.wrapper.set_owner(id, to)?;
            tracing::debug!(id, from = %ctx.caller, to = %to, "Position transferred");
            Ok(())
        })
    }

    // =========================================================================
    // Loans
    // =========================================================================

    /// Open one loan per wrapped id. All or nothing.
    pub fn borrow(
        &mut self,
        ctx: &Context,
        lender: Address,
        pool: Address,
        proofs: &[Vec<Hash32>],
        ids: &[WrappedId],
        amounts: &[Amount],
    ) -> Result<BorrowReceipt> {
        self.transact(|spot| {
            spot.ensure_lender(&lender)?;
            ensure_batch(ids.len(), proofs.len(), "ids")?;
            ensure_batch(amounts.len(), ids.len(), "amounts")?;
            ensure_distinct(ids, "position")?;

            let epoch = spot.vault.current_epoch(ctx)?;
            let slots = spot.vault.params()?.slots as usize;
            spot.wrapper.ensure_paired(&pool)?;

            let held = spot.custodian.nft_ids(&pool)?.len();
            let live = spot.wrapper.live_positions(&pool);
            if held < live {
                return Err(ProtocolError::capacity(format!(
                    "pool {} holds {} NFTs for {} positions",
                    pool, held, live
                ))
                .into());
            }

            let collateral = spot.wrapper.address();
            let mut loans = Vec::with_capacity(ids.len());
            for ((id, proof), amount) in ids.iter().zip(proofs).zip(amounts) {
                let position = spot.wrapper.owned_position(*id, &ctx.caller)?;
                if position.pool != pool {
                    return Err(ProtocolError::invalid_input(format!(
                        "position #{} belongs to pool {}",
                        id, position.pool
                    ))
                    .into());
                }
                if !spot.vault.contains(proof, &collateral, *id) {
                    return Err(ProtocolError::ProofInvalid {
                        collection: collateral,
                        token_id: *id,
                    }
                    .into());
                }
                let key = spot.key(*id);
                spot.ledger
                    .record_borrow(ctx.caller, lender, key, *amount, epoch)?;
                spot.vault.draw(epoch, *amount)?;
                loans.push((*id, *amount));
            }

            let open = spot.ledger.open_loans_of(&ctx.caller);
            if open > slots {
                return Err(ProtocolError::capacity(format!(
                    "{} open loans exceed {} slots",
                    open, slots
                ))
                .into());
            }

            let total = checked_sum(amounts.iter().copied(), "borrow")?;
            spot.token.transfer(&lender, &ctx.caller, total)?;

            tracing::info!(
                borrower = %ctx.caller,
                pool = %pool,
                loans = loans.len(),
                total = %total,
                epoch,
                "Borrowed"
            );
            Ok(BorrowReceipt {
                epoch,
                loans,
                total,
            })
        })
    }

    /// Interest due for exactly `epochs` across `ids`
    pub fn get_interest_payment(&self, epochs: &[Epoch], ids: &[WrappedId]) -> Result<Amount> {
        ensure_distinct(ids, "position")?;
        let mut total: Amount = 0;
        for id in ids {
            let due = self.ledger.get_interest_payment(epochs, &self.key(*id))?;
            total = checked_sum([total, due], "interest")?;
        }
        Ok(total)
    }

    /// Pay interest for `epochs` on each of `ids`; the caller is debited
    pub fn pay_interest(
        &mut self,
        ctx: &Context,
        lender: Address,
        epochs: &[Epoch],
        ids: &[WrappedId],
    ) -> Result<Vec<PaymentReceipt>> {
        self.transact(|spot| {
            spot.ensure_lender(&lender)?;
            ensure_batch(ids.len(), ids.len(), "ids")?;
            ensure_distinct(ids, "position")?;
            let now = spot.vault.current_epoch(ctx)?;

            let mut receipts = Vec::with_capacity(ids.len());
            for id in ids {
                let key = spot.key(*id);
                let receipt = spot.ledger.record_payment(&key, epochs, now)?;
                for (epoch, amount) in &receipt.breakdown {
                    spot.vault.record_interest(*epoch, *amount);
                }
                receipts.push(receipt);
            }

            let total = checked_sum(receipts.iter().map(|r| r.total), "interest")?;
            spot.token.transfer(&ctx.caller, &lender, total)?;

            tracing::info!(payer = %ctx.caller, total = %total, loans = ids.len(), "Interest paid");
            Ok(receipts)
        })
    }

    /// Return principal on the caller's loans
    pub fn repay(
        &mut self,
        ctx: &Context,
        lender: Address,
        pool: Address,
        ids: &[WrappedId],
        amounts: &[Amount],
    ) -> Result<Vec<RepayOutcome>> {
        self.transact(|spot| {
            spot.ensure_lender(&lender)?;
            ensure_batch(amounts.len(), ids.len(), "amounts")?;
            ensure_distinct(ids, "position")?;
            let now = spot.vault.current_epoch(ctx)?;

            let mut outcomes = Vec::with_capacity(ids.len());
            for (id, amount) in ids.iter().zip(amounts) {
                let position = spot.wrapper.position(*id)?;
                if position.pool != pool {
                    return Err(ProtocolError::invalid_input(format!(
                        "position #{} belongs to pool {}",
                        id, position.pool
                    ))
                    .into());
                }
                let key = spot.key(*id);
                let (borrower, funding_epoch) = spot
                    .ledger
                    .loan(&key)
                    .map(|loan| (loan.borrower, loan.origination_epoch))
                    .ok_or(ProtocolError::UnknownLoan { token_id: *id })?;
                if borrower != ctx.caller {
                    return Err(ProtocolError::NotOwner {
                        account: ctx.caller,
                    }
                    .into());
                }

                let outcome = spot.ledger.record_repay(&key, *amount, now)?;
                spot.vault.record_principal_return(funding_epoch, *amount);
                outcomes.push(outcome);
            }

            let total = checked_sum(amounts.iter().copied(), "repayment")?;
            spot.token.transfer(&ctx.caller, &lender, total)?;
            Ok(outcomes)
        })
    }

    /// Seize the positions behind defaulted loans for the vault.
    ///
    /// `epochs` are the delinquent epochs whose interest is forfeited.
    pub fn liquidate_lp(
        &mut self,
        ctx: &Context,
        lender: Address,
        ids: &[WrappedId],
        epochs: &[Epoch],
    ) -> Result<Vec<LiquidatedLoan>> {
        self.transact(|spot| {
            spot.ensure_lender(&lender)?;
            ensure_batch(ids.len(), ids.len(), "ids")?;
            ensure_distinct(ids, "position")?;
            let now = spot.vault.current_epoch(ctx)?;

            let mut liquidated = Vec::with_capacity(ids.len());
            for id in ids {
                let key = spot.key(*id);
                let record = spot.ledger.record_liquidation(&key, epochs, now)?;
                spot.vault
                    .record_default(record.loan.origination_epoch, record.loan.principal);
                spot.wrapper.set_owner(*id, lender)?;

                tracing::warn!(
                    id,
                    liquidator = %ctx.caller,
                    borrower = %record.loan.borrower,
                    principal = %record.loan.principal,
                    "Position seized by vault"
                );
                liquidated.push(record);
            }
            Ok(liquidated)
        })
    }

    // =========================================================================
    // Exchange
    // =========================================================================

    fn burn_for_exchange(&mut self, ctx: &Context, pool: &Address, ids: &[WrappedId]) -> Result<()> {
        ensure_distinct(ids, "position")?;
        self.wrapper.ensure_paired(pool)?;
        for id in ids {
            let position = self.wrapper.owned_position(*id, &ctx.caller)?;
            if position.pool != *pool {
                return Err(ProtocolError::invalid_input(format!(
                    "position #{} belongs to pool {}",
                    id, position.pool
                ))
                .into());
            }
            if self.ledger.has_open_loan(&self.key(*id)) {
                return Err(ProtocolError::LoanOutstanding { token_id: *id }.into());
            }
            self.wrapper.burn(*id);
        }
        Ok(())
    }

    /// Burn positions for the named NFTs
    pub fn exchange_lp_for_nft(
        &mut self,
        ctx: &Context,
        pool: Address,
        nft_ids: &[NftId],
        wrapped_ids: &[WrappedId],
    ) -> Result<ExchangeReceipt> {
        self.transact(|spot| {
            ensure_batch(nft_ids.len(), wrapped_ids.len(), "NFT ids")?;
            ensure_distinct(nft_ids, "NFT")?;
            spot.burn_for_exchange(ctx, &pool, wrapped_ids)?;

            let wrapper = spot.wrapper.address();
            for nft_id in nft_ids {
                spot.custodian
                    .withdraw_nft(&pool, &wrapper, *nft_id, &ctx.caller)?;
            }

            tracing::info!(pool = %pool, owner = %ctx.caller, nfts = nft_ids.len(), "Exchanged for NFTs");
            Ok(ExchangeReceipt {
                burned: wrapped_ids.to_vec(),
                nfts: nft_ids.to_vec(),
                proceeds: 0,
            })
        })
    }

    /// Burn positions and sell as many NFTs, paying `recipient`
    pub fn exchange_lp_for_eth(
        &mut self,
        ctx: &Context,
        pool: Address,
        recipient: Address,
        wrapped_ids: &[WrappedId],
    ) -> Result<ExchangeReceipt> {
        self.transact(|spot| {
            ensure_batch(wrapped_ids.len(), wrapped_ids.len(), "wrapped ids")?;
            spot.burn_for_exchange(ctx, &pool, wrapped_ids)?;

            let wrapper = spot.wrapper.address();
            let proceeds =
                spot.custodian
                    .sell_nfts(&pool, &wrapper, wrapped_ids.len(), &recipient)?;

            tracing::info!(
                pool = %pool,
                recipient = %recipient,
                sold = wrapped_ids.len(),
                proceeds = %proceeds,
                "Exchanged for cash"
            );
            Ok(ExchangeReceipt {
                burned: wrapped_ids.to_vec(),
                nfts: Vec::new(),
                proceeds,
            })
        })
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn vault(&self) -> &LiquidityVault {
        &self.vault
    }

    pub fn ledger(&self) -> &LoanLedger {
        &self.ledger
    }

    pub fn wrapper(&self) -> &SudoNft {
        &self.wrapper
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn custodian(&self) -> &C {
        &self.custodian
    }

    /// Direct access for seeding balances outside the protocol
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    /// Direct access for seeding pools outside the protocol
    pub fn custodian_mut(&mut self) -> &mut C {
        &mut self.custodian
    }

    pub fn loan(&self, id: WrappedId) -> Option<&Loan> {
        self.ledger.loan(&self.key(id))
    }

    pub fn pairing(&self, pool: &Address) -> Pairing {
        self.wrapper.pairing(pool)
    }

    /// Unpaid interest on `id` through the current epoch
    pub fn outstanding_interest(&self, ctx: &Context, id: WrappedId) -> Result<Amount> {
        let now = self.vault.current_epoch(ctx)?;
        self.ledger.outstanding_interest(&self.key(id), now)
    }
}
