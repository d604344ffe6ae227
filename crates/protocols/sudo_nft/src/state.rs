//! Wrapper State Types

use serde::{Deserialize, Serialize};
use spot_core::{Address, Amount, NftId, WrappedId};

/// Custody handoff between an AMM pool and the wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PairingState {
    #[default]
    Unpaired,
    /// Owner announced the handoff, pool ownership not yet accepted
    TransferInitiated,
    Paired,
}

impl PairingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaired => "UNPAIRED",
            Self::TransferInitiated => "TRANSFER_INITIATED",
            Self::Paired => "PAIRED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub pool: Address,
    /// Former pool owner; receives the minted positions and may release
    pub initiator: Option<Address>,
    pub state: PairingState,
}

impl Pairing {
    pub fn unpaired(pool: Address) -> Self {
        Self {
            pool,
            initiator: None,
            state: PairingState::Unpaired,
        }
    }
}

/// Claim on one NFT held by `pool`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedPosition {
    pub id: WrappedId,
    pub pool: Address,
    pub owner: Address,
}

/// What a borrow batch opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowReceipt {
    pub epoch: u64,
    /// Principal per wrapped id
    pub loans: Vec<(WrappedId, Amount)>,
    pub total: Amount,
}

/// What an exchange burned and released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub burned: Vec<WrappedId>,
    /// NFTs handed out; empty for a cash exchange
    pub nfts: Vec<NftId>,
    /// Cash paid out; zero for an NFT exchange
    pub proceeds: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_state_wire_names_match_as_str() {
        for state in [
            PairingState::Unpaired,
            PairingState::TransferInitiated,
            PairingState::Paired,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn test_unknown_pool_is_unpaired() {
        let pairing = Pairing::unpaired(Address::from_u64(0x9000_0001));
        assert_eq!(pairing.state, PairingState::default());
        assert!(pairing.initiator.is_none());
    }
}
