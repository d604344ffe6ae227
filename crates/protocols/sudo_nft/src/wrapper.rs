//! Wrapped positions and pool pairings
//!
//! Pure bookkeeping. The engine checks custody with the pool before calling
//! into here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spot_core::{Address, ProtocolError, Result, WrappedId};

use crate::state::{Pairing, PairingState, WrappedPosition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SudoNft {
    address: Address,
    collection: Address,
    supply_cap: u64,
    next_id: WrappedId,
    positions: BTreeMap<WrappedId, WrappedPosition>,
    pairings: BTreeMap<Address, Pairing>,
}

impl SudoNft {
    pub fn new(address: Address, collection: Address, supply_cap: u64) -> Self {
        Self {
            address,
            collection,
            supply_cap,
            next_id: 1,
            positions: BTreeMap::new(),
            pairings: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn collection(&self) -> Address {
        self.collection
    }

    pub fn pairing(&self, pool: &Address) -> Pairing {
        self.pairings
            .get(pool)
            .cloned()
            .unwrap_or_else(|| Pairing::unpaired(*pool))
    }

    fn expect_state(&self, pool: &Address, expected: PairingState) -> Result<Pairing> {
        let pairing = self.pairing(pool);
        if pairing.state != expected {
            return Err(ProtocolError::PairingState {
                pool: *pool,
                state: pairing.state.as_str(),
            }
            .into());
        }
        Ok(pairing)
    }

    fn expect_initiator(pairing: &Pairing, caller: &Address) -> Result<()> {
        if pairing.initiator != Some(*caller) {
            return Err(ProtocolError::NotOwner { account: *caller }.into());
        }
        Ok(())
    }

    /// UNPAIRED -> TRANSFER_INITIATED
    pub fn begin_pairing(&mut self, pool: Address, initiator: Address) -> Result<()> {
        self.expect_state(&pool, PairingState::Unpaired)?;
        self.pairings.insert(
            pool,
            Pairing {
                pool,
                initiator: Some(initiator),
                state: PairingState::TransferInitiated,
            },
        );
        Ok(())
    }

    /// Check that `caller` may accept a pending handoff of `pool`
    pub fn check_acceptance(&self, pool: &Address, caller: &Address) -> Result<()> {
        let pairing = self.expect_state(pool, PairingState::TransferInitiated)?;
        Self::expect_initiator(&pairing, caller)
    }

    /// TRANSFER_INITIATED -> PAIRED
    pub fn complete_pairing(&mut self, pool: &Address, caller: &Address) -> Result<()> {
        self.check_acceptance(pool, caller)?;
        if let Some(pairing) = self.pairings.get_mut(pool) {
            pairing.state = PairingState::Paired;
        }
        Ok(())
    }

    /// PAIRED -> UNPAIRED, once every position on the pool is burned
    pub fn end_pairing(&mut self, pool: &Address, caller: &Address) -> Result<()> {
        let pairing = self.expect_state(pool, PairingState::Paired)?;
        Self::expect_initiator(&pairing, caller)?;
        let live = self.live_positions(pool);
        if live > 0 {
            return Err(ProtocolError::PairingState {
                pool: *pool,
                state: PairingState::Paired.as_str(),
            }
            .into());
        }
        self.pairings.remove(pool);
        Ok(())
    }

    pub fn ensure_paired(&self, pool: &Address) -> Result<()> {
        if self.pairing(pool).state != PairingState::Paired {
            return Err(ProtocolError::NotPaired { pool: *pool }.into());
        }
        Ok(())
    }

    /// Mint `count` positions on `pool` to `owner`
    pub fn mint(&mut self, pool: Address, owner: Address, count: usize) -> Result<Vec<WrappedId>> {
        let live = self.positions.len() as u64;
        if live + count as u64 > self.supply_cap {
            return Err(ProtocolError::capacity(format!(
                "minting {} positions on top of {} exceeds supply cap {}",
                count, live, self.supply_cap
            ))
            .into());
        }
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.next_id;
            self.next_id += 1;
            self.positions.insert(id, WrappedPosition { id, pool, owner });
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn burn(&mut self, id: WrappedId) -> Option<WrappedPosition> {
        self.positions.remove(&id)
    }

    pub fn position(&self, id: WrappedId) -> Result<&WrappedPosition> {
        self.positions
            .get(&id)
            .ok_or_else(|| ProtocolError::invalid_input(format!("unknown position #{}", id)).into())
    }

    /// Position `id`, which `owner` must hold
    pub fn owned_position(&self, id: WrappedId, owner: &Address) -> Result<&WrappedPosition> {
        let position = self.position(id)?;
        if position.owner != *owner {
            return Err(ProtocolError::NotOwner { account: *owner }.into());
        }
        Ok(position)
    }

    pub fn set_owner(&mut self, id: WrappedId, owner: Address) -> Result<()> {
        let position = self
            .positions
            .get_mut(&id)
            .ok_or_else(|| ProtocolError::invalid_input(format!("unknown position #{}", id)))?;
        position.owner = owner;
        Ok(())
    }

    /// Positions alive on `pool`
    pub fn live_positions(&self, pool: &Address) -> usize {
        self.positions.values().filter(|p| p.pool == *pool).count()
    }

    pub fn positions_of(&self, owner: &Address) -> Vec<WrappedPosition> {
        self.positions
            .values()
            .filter(|p| p.owner == *owner)
            .copied()
            .collect()
    }

    pub fn total_supply(&self) -> u64 {
        self.positions.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper() -> SudoNft {
        SudoNft::new(Address::from_u64(0x5a02), Address::from_u64(0xc011), 5)
    }

    fn pool() -> Address {
        Address::from_u64(0x9000_0001)
    }

    fn alice() -> Address {
        Address::from_u64(0xa1)
    }

    #[test]
    fn test_pairing_state_machine() {
        let mut w = wrapper();
        assert_eq!(w.pairing(&pool()).state, PairingState::Unpaired);

        w.begin_pairing(pool(), alice()).unwrap();
        assert_eq!(w.pairing(&pool()).state, PairingState::TransferInitiated);

        let err = w.begin_pairing(pool(), alice()).unwrap_err();
        assert_eq!(err.error_code(), "pairing_state");

        let err = w.complete_pairing(&pool(), &Address::from_u64(0xb2)).unwrap_err();
        assert_eq!(err.error_code(), "not_owner");

        w.complete_pairing(&pool(), &alice()).unwrap();
        assert!(w.ensure_paired(&pool()).is_ok());

        w.end_pairing(&pool(), &alice()).unwrap();
        assert_eq!(w.pairing(&pool()), Pairing::unpaired(pool()));
    }

    #[test]
    fn test_complete_without_initiation() {
        let mut w = wrapper();
        let err = w.complete_pairing(&pool(), &alice()).unwrap_err();
        assert_eq!(err.error_code(), "pairing_state");
        assert_eq!(
            w.ensure_paired(&pool()).unwrap_err().error_code(),
            "not_paired"
        );
    }

    #[test]
    fn test_end_pairing_with_live_positions() {
        let mut w = wrapper();
        w.begin_pairing(pool(), alice()).unwrap();
        w.complete_pairing(&pool(), &alice()).unwrap();
        let ids = w.mint(pool(), alice(), 2).unwrap();

        let err = w.end_pairing(&pool(), &alice()).unwrap_err();
        assert_eq!(err.error_code(), "pairing_state");

        for id in ids {
            w.burn(id);
        }
        w.end_pairing(&pool(), &alice()).unwrap();
    }

    #[test]
    fn test_mint_sequential_ids_and_cap() {
        let mut w = wrapper();
        assert_eq!(w.mint(pool(), alice(), 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(w.live_positions(&pool()), 3);

        let err = w.mint(pool(), alice(), 3).unwrap_err();
        assert_eq!(err.error_code(), "capacity_exceeded");
        assert_eq!(w.total_supply(), 3);

        // burned ids are never reused
        w.burn(3);
        assert_eq!(w.mint(pool(), alice(), 1).unwrap(), vec![4]);
    }

    #[test]
    fn test_owned_position() {
        let mut w = wrapper();
        w.mint(pool(), alice(), 1).unwrap();
        assert!(w.owned_position(1, &alice()).is_ok());
        assert_eq!(
            w.owned_position(1, &Address::from_u64(0xb2))
                .unwrap_err()
                .error_code(),
            "not_owner"
        );
        assert_eq!(
            w.owned_position(2, &alice()).unwrap_err().error_code(),
            "invalid_input"
        );

        w.set_owner(1, Address::from_u64(0xb2)).unwrap();
        assert!(w.positions_of(&alice()).is_empty());
    }
}
