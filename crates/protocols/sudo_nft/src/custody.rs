//! AMM pool custody
//!
//! The wrapper never prices NFTs itself. It only needs a pool to report who
//! owns it and what it holds, to hand ownership over, and to release or sell
//! the NFTs it holds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use spot_core::{Address, Amount, CustodyError, NftId, ProtocolError, Result};

/// An external NFT pool the wrapper can take custody of
pub trait CollateralCustodian: Send {
    fn owner(&self, pool: &Address) -> Result<Address>;

    /// NFT collection the pool trades
    fn collection(&self, pool: &Address) -> Result<Address>;

    /// NFT ids currently held by the pool
    fn nft_ids(&self, pool: &Address) -> Result<Vec<NftId>>;

    fn holds(&self, pool: &Address, nft_id: NftId) -> Result<bool>;

    /// Hand pool ownership from `from` (the current owner) to `to`
    fn transfer_ownership(&mut self, pool: &Address, from: &Address, to: &Address) -> Result<()>;

    /// Move an NFT owned by `from` into the pool
    fn deposit_nft(&mut self, pool: &Address, from: &Address, nft_id: NftId) -> Result<()>;

    /// Release a held NFT to `to`. `caller` must own the pool.
    fn withdraw_nft(
        &mut self,
        pool: &Address,
        caller: &Address,
        nft_id: NftId,
        to: &Address,
    ) -> Result<()>;

    /// Sell `count` held NFTs at the pool's spot price, paying `recipient`.
    /// `caller` must own the pool. Returns the proceeds.
    fn sell_nfts(
        &mut self,
        pool: &Address,
        caller: &Address,
        count: usize,
        recipient: &Address,
    ) -> Result<Amount>;
}

/// One in-memory pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPool {
    pub owner: Address,
    pub collection: Address,
    pub nfts: BTreeSet<NftId>,
    /// Flat price paid per NFT sold out of the pool
    pub spot_price: Amount,
    /// Cash side the pool pays sales from
    pub reserves: Amount,
}

/// In-memory AMM with a flat price, used by tests and the simulator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryAmm {
    pools: BTreeMap<Address, MemoryPool>,
    /// collection -> nft id -> owner
    nft_owners: BTreeMap<Address, BTreeMap<NftId, Address>>,
    /// Sale proceeds credited per recipient
    payouts: BTreeMap<Address, Amount>,
    next_pool: u64,
}

const POOL_ADDRESS_BASE: u64 = 0x9000_0000;

impl MemoryAmm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an NFT of `collection` to `to`
    pub fn mint_nft(&mut self, collection: Address, nft_id: NftId, to: Address) -> Result<()> {
        let owners = self.nft_owners.entry(collection).or_default();
        if owners.contains_key(&nft_id) {
            return Err(ProtocolError::invalid_input(format!(
                "NFT #{} of {} already exists",
                nft_id, collection
            ))
            .into());
        }
        owners.insert(nft_id, to);
        Ok(())
    }

    pub fn nft_owner(&self, collection: &Address, nft_id: NftId) -> Option<Address> {
        self.nft_owners
            .get(collection)
            .and_then(|owners| owners.get(&nft_id))
            .copied()
    }

    /// Open a pool owned by `owner`, funded with `owner`'s NFTs
    pub fn create_pool(
        &mut self,
        owner: Address,
        collection: Address,
        nft_ids: &[NftId],
        spot_price: Amount,
        reserves: Amount,
    ) -> Result<Address> {
        self.next_pool += 1;
        let address = Address::from_u64(POOL_ADDRESS_BASE + self.next_pool);
        self.pools.insert(
            address,
            MemoryPool {
                owner,
                collection,
                nfts: BTreeSet::new(),
                spot_price,
                reserves,
            },
        );
        for nft_id in nft_ids {
            self.deposit_nft(&address, &owner, *nft_id)?;
        }
        tracing::debug!(pool = %address, owner = %owner, nfts = nft_ids.len(), "Pool created");
        Ok(address)
    }

    pub fn pool(&self, pool: &Address) -> Option<&MemoryPool> {
        self.pools.get(pool)
    }

    pub fn payout_of(&self, account: &Address) -> Amount {
        self.payouts.get(account).copied().unwrap_or(0)
    }

    fn get(&self, pool: &Address) -> Result<&MemoryPool> {
        self.pools
            .get(pool)
            .ok_or_else(|| CustodyError::UnknownPool { pool: *pool }.into())
    }

    fn get_owned_mut(&mut self, pool: &Address, caller: &Address) -> Result<&mut MemoryPool> {
        let entry = self
            .pools
            .get_mut(pool)
            .ok_or(CustodyError::UnknownPool { pool: *pool })?;
        if entry.owner != *caller {
            return Err(CustodyError::NotPoolOwner {
                pool: *pool,
                caller: *caller,
            }
            .into());
        }
        Ok(entry)
    }
}

impl CollateralCustodian for MemoryAmm {
    fn owner(&self, pool: &Address) -> Result<Address> {
        Ok(self.get(pool)?.owner)
    }

    fn collection(&self, pool: &Address) -> Result<Address> {
        Ok(self.get(pool)?.collection)
    }

    fn nft_ids(&self, pool: &Address) -> Result<Vec<NftId>> {
        Ok(self.get(pool)?.nfts.iter().copied().collect())
    }

    fn holds(&self, pool: &Address, nft_id: NftId) -> Result<bool> {
        Ok(self.get(pool)?.nfts.contains(&nft_id))
    }

    fn transfer_ownership(&mut self, pool: &Address, from: &Address, to: &Address) -> Result<()> {
        let entry = self.get_owned_mut(pool, from)?;
        entry.owner = *to;
        Ok(())
    }

    fn deposit_nft(&mut self, pool: &Address, from: &Address, nft_id: NftId) -> Result<()> {
        let collection = self.get(pool)?.collection;
        let owner = self.nft_owner(&collection, nft_id);
        if owner != Some(*from) {
            return Err(CustodyError::NftNotOwned {
                account: *from,
                nft_id,
            }
            .into());
        }
        self.nft_owners
            .entry(collection)
            .or_default()
            .insert(nft_id, *pool);
        if let Some(entry) = self.pools.get_mut(pool) {
            entry.nfts.insert(nft_id);
        }
        Ok(())
    }

    fn withdraw_nft(
        &mut self,
        pool: &Address,
        caller: &Address,
        nft_id: NftId,
        to: &Address,
    ) -> Result<()> {
        let entry = self.get_owned_mut(pool, caller)?;
        if !entry.nfts.remove(&nft_id) {
            return Err(CustodyError::NftNotHeld {
                pool: *pool,
                nft_id,
            }
            .into());
        }
        let collection = entry.collection;
        self.nft_owners
            .entry(collection)
            .or_default()
            .insert(nft_id, *to);
        Ok(())
    }

    fn sell_nfts(
        &mut self,
        pool: &Address,
        caller: &Address,
        count: usize,
        recipient: &Address,
    ) -> Result<Amount> {
        let entry = self.get_owned_mut(pool, caller)?;
        if entry.nfts.len() < count {
            return Err(ProtocolError::capacity(format!(
                "pool {} holds {} NFTs, {} requested",
                pool,
                entry.nfts.len(),
                count
            ))
            .into());
        }
        let proceeds = entry
            .spot_price
            .checked_mul(count as Amount)
            .ok_or_else(|| {
                ProtocolError::invalid_input(format!(
                    "selling {} NFTs at {} overflows",
                    count, entry.spot_price
                ))
            })?;
        if entry.reserves < proceeds {
            return Err(CustodyError::InsufficientReserves {
                pool: *pool,
                required: proceeds,
                available: entry.reserves,
            }
            .into());
        }

        let sold: Vec<NftId> = entry.nfts.iter().take(count).copied().collect();
        for nft_id in &sold {
            entry.nfts.remove(nft_id);
        }
        entry.reserves -= proceeds;
        let collection = entry.collection;

        // sold NFTs leave the system
        if let Some(owners) = self.nft_owners.get_mut(&collection) {
            for nft_id in &sold {
                owners.insert(*nft_id, Address::ZERO);
            }
        }
        let payout = self.payouts.entry(*recipient).or_default();
        *payout = payout.saturating_add(proceeds);
        Ok(proceeds)
    }
}
