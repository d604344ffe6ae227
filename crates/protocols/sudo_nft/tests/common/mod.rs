#![allow(dead_code)]

use merkle_proof::MerkleTree;
use spot_core::{Address, Amount, Context, Epoch, Hash32, ProtocolConfig, Timestamp, WrappedId};
use sudo_nft::{CollateralCustodian, MemoryAmm, MemoryToken, Spot, TokenLedger};
use vault::VaultParams;

pub type Engine = Spot<MemoryToken, MemoryAmm>;

pub const T0: Timestamp = 1_700_000_000;
pub const EPOCH_LENGTH: u64 = 100;
pub const POOL_NFTS: u64 = 12;

pub fn alice() -> Address {
    Address::from_u64(0xa1)
}

pub fn bob() -> Address {
    Address::from_u64(0xb0)
}

pub fn carol() -> Address {
    Address::from_u64(0xc4)
}

pub fn token_address() -> Address {
    Address::from_u64(0x70)
}

pub fn params() -> VaultParams {
    VaultParams {
        slots: 3,
        ticket_size: 1_000,
        rate: 100,
        epoch_length: EPOCH_LENGTH,
        token: token_address(),
        risk_base: 100,
        risk_step: 10,
        beta: 3,
    }
}

/// Started vault with all 12 positions of one paired pool in the collateral
/// set, and bob's 12_000 reservation over epochs `[0, 4)`
pub struct Harness {
    pub spot: Engine,
    pub config: ProtocolConfig,
    pub pool: Address,
    pub tree: MerkleTree,
    pub ids: Vec<WrappedId>,
}

impl Harness {
    pub fn new() -> Self {
        let config = ProtocolConfig::default();

        let mut token = MemoryToken::new(token_address());
        token.mint(alice(), 10_000).unwrap();
        token.mint(bob(), 100_000).unwrap();

        let mut amm = MemoryAmm::new();
        let nfts: Vec<u64> = (1..=POOL_NFTS).collect();
        for nft in &nfts {
            amm.mint_nft(config.collection, *nft, alice()).unwrap();
        }
        let pool = amm
            .create_pool(alice(), config.collection, &nfts, 50, 10_000)
            .unwrap();

        let mut spot = Spot::new(config.clone(), token, amm);
        let owner = config.vault_owner;
        spot.begin(&Context::new(owner, T0), params()).unwrap();

        spot.initiate_pool(&Context::new(alice(), T0), pool).unwrap();
        spot.custodian_mut()
            .transfer_ownership(&pool, &alice(), &config.wrapper_address)
            .unwrap();
        let ids = spot
            .call_transfer_ownership(&Context::new(alice(), T0), pool)
            .unwrap();

        let tree = collateral_tree(config.wrapper_address, &ids);
        let collections = vec![config.wrapper_address; ids.len()];
        spot.include_nft(&Context::new(owner, T0), tree.root(), &collections, &ids)
            .unwrap();

        spot.purchase(&Context::new(bob(), T0), &[6_000, 6_000], 0, 4)
            .unwrap();

        Self {
            spot,
            config,
            pool,
            tree,
            ids,
        }
    }

    pub fn ctx(&self, caller: Address, epoch: Epoch) -> Context {
        Context::new(caller, T0 + epoch * EPOCH_LENGTH)
    }

    pub fn vault(&self) -> Address {
        self.config.vault_address
    }

    pub fn wrapper(&self) -> Address {
        self.config.wrapper_address
    }

    pub fn proof(&self, id: WrappedId) -> Vec<Hash32> {
        self.tree.collateral_proof(&self.wrapper(), id).unwrap()
    }

    pub fn balance(&self, account: Address) -> Amount {
        self.spot.token().balance_of(&account)
    }

    pub fn borrow(&mut self, ids: &[WrappedId], amount: Amount, epoch: Epoch) {
        let proofs: Vec<_> = ids.iter().map(|id| self.proof(*id)).collect();
        let amounts = vec![amount; ids.len()];
        let ctx = self.ctx(alice(), epoch);
        let (vault, pool) = (self.vault(), self.pool);
        self.spot
            .borrow(&ctx, vault, pool, &proofs, ids, &amounts)
            .unwrap();
    }
}

pub fn collateral_tree(wrapper: Address, ids: &[WrappedId]) -> MerkleTree {
    MerkleTree::from_collateral(&vec![wrapper; ids.len()], ids).unwrap()
}
