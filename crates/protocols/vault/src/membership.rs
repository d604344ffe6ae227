//! Collateral membership
//!
//! Holds the published merkle root of `(collection, token_id)` pairs the
//! vault accepts as collateral. Verification itself is delegated to
//! `merkle_proof`.

use std::collections::BTreeSet;

use merkle_proof::verify_collateral;
use serde::{Deserialize, Serialize};
use spot_core::{Address, Hash32, MerkleRoot, ProtocolError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralSet {
    root: Option<MerkleRoot>,
    collections: BTreeSet<Address>,
    size: u64,
    version: u64,
}

impl CollateralSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published root.
    ///
    /// `collections[i]` / `token_ids[i]` enumerate the leaves the root was
    /// built from; only their count and the distinct collections are kept.
    pub fn publish_root(
        &mut self,
        root: MerkleRoot,
        collections: &[Address],
        token_ids: &[u64],
    ) -> Result<()> {
        if collections.len() != token_ids.len() {
            return Err(ProtocolError::invalid_input(format!(
                "{} collection addresses for {} token ids",
                collections.len(),
                token_ids.len()
            ))
            .into());
        }
        if collections.is_empty() {
            return Err(ProtocolError::invalid_input("collateral set is empty").into());
        }

        self.root = Some(root);
        self.collections = collections.iter().copied().collect();
        self.size = token_ids.len() as u64;
        self.version += 1;
        Ok(())
    }

    /// Check membership against the current root.
    ///
    /// Collections absent from the published set are rejected without
    /// hashing the proof.
    pub fn verify(&self, proof: &[Hash32], collection: &Address, token_id: u64) -> bool {
        match &self.root {
            Some(root) if self.includes_collection(collection) => {
                verify_collateral(proof, root, collection, token_id)
            }
            _ => false,
        }
    }

    pub fn root(&self) -> Option<MerkleRoot> {
        self.root
    }

    /// Number of entries in the published set
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn includes_collection(&self, collection: &Address) -> bool {
        self.collections.contains(collection)
    }
}
