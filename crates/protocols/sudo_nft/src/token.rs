//! Underlying fungible token

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spot_core::{Address, Amount, ProtocolError, Result, TokenError};

/// Balances and transfers of the token the vault lends out
pub trait TokenLedger: Send {
    /// Contract address of the token
    fn address(&self) -> Address;

    fn balance_of(&self, account: &Address) -> Amount;

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()>;
}

/// In-memory token used by tests and the simulator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryToken {
    address: Address,
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
}

impl MemoryToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balances: BTreeMap::new(),
            total_supply: 0,
        }
    }

    /// Credit `amount` to `to`; fails if the total supply would overflow
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<()> {
        let total_supply = self.total_supply.checked_add(amount).ok_or_else(|| {
            ProtocolError::invalid_input(format!("minting {} overflows total supply", amount))
        })?;
        // every balance is bounded by the total supply
        let balance = self.balance_of(&to) + amount;
        self.balances.insert(to, balance);
        self.total_supply = total_supply;
        Ok(())
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }
}

impl TokenLedger for MemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                account: *from,
                required: amount,
                available,
            }
            .into());
        }
        self.balances.insert(*from, available - amount);
        *self.balances.entry(*to).or_default() += amount;
        Ok(())
    }
}
