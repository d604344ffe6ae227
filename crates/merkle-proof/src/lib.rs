//! Collateral membership merkle tree
//!
//! Leaves are `keccak256(collection ++ uint256(token_id))`. Interior nodes hash
//! the two children in ascending byte order, so a proof is just the list of
//! siblings from leaf to root and never carries left/right flags. An odd
//! trailing node is promoted to the next layer unchanged.
//!
//! This matches trees built with `merkletreejs` using `keccak256` and
//! `{ sortPairs: true }`, and the OpenZeppelin `MerkleProof.verify` walk.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use spot_core::{Address, Hash32, MerkleRoot, ProtocolError, Result};

/// Sibling hashes from leaf to root
pub type Proof = Vec<Hash32>;

/// Keccak-256 hash
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Hash32(out)
}

/// Packed encoding of `(address, uint256)`: 20 address bytes followed by the
/// id as a 32-byte big-endian word.
pub fn encode_collateral(collection: &Address, token_id: u64) -> [u8; 52] {
    let mut buf = [0u8; 52];
    buf[..20].copy_from_slice(collection.as_bytes());
    buf[44..].copy_from_slice(&token_id.to_be_bytes());
    buf
}

/// Leaf for a `(collection, token_id)` pair
pub fn collateral_leaf(collection: &Address, token_id: u64) -> Hash32 {
    keccak256(&encode_collateral(collection, token_id))
}

/// Hash two nodes in ascending order
pub fn hash_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_bytes());
    buf[32..].copy_from_slice(hi.as_bytes());
    keccak256(&buf)
}

/// Fold a proof over a leaf and compare with `root`
pub fn verify(proof: &[Hash32], root: &MerkleRoot, leaf: &Hash32) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |node, sibling| hash_pair(&node, sibling));
    computed == *root
}

/// Verify that `(collection, token_id)` is a member of the set under `root`
pub fn verify_collateral(
    proof: &[Hash32],
    root: &MerkleRoot,
    collection: &Address,
    token_id: u64,
) -> bool {
    verify(proof, root, &collateral_leaf(collection, token_id))
}

/// Fully materialized tree, bottom layer first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    layers: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build a tree over already-hashed leaves (order preserved)
    pub fn new(leaves: Vec<Hash32>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(ProtocolError::invalid_input("merkle tree needs at least one leaf").into());
        }

        let mut layers = vec![leaves];
        while layers[layers.len() - 1].len() > 1 {
            let next = layers[layers.len() - 1]
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            layers.push(next);
        }

        Ok(Self { layers })
    }

    /// Build a tree over `(collection, token_id)` pairs
    pub fn from_collateral(collections: &[Address], token_ids: &[u64]) -> Result<Self> {
        if collections.len() != token_ids.len() {
            return Err(ProtocolError::invalid_input(format!(
                "{} collections for {} token ids",
                collections.len(),
                token_ids.len()
            ))
            .into());
        }
        let leaves = collections
            .iter()
            .zip(token_ids)
            .map(|(collection, id)| collateral_leaf(collection, *id))
            .collect();
        Self::new(leaves)
    }

    pub fn root(&self) -> MerkleRoot {
        self.layers[self.layers.len() - 1][0]
    }

    pub fn leaves(&self) -> &[Hash32] {
        &self.layers[0]
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Proof for the leaf at `index`
    pub fn proof(&self, index: usize) -> Option<Proof> {
        if index >= self.len() {
            return None;
        }

        let mut proof = Vec::with_capacity(self.layers.len());
        let mut idx = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            if let Some(node) = layer.get(sibling) {
                proof.push(*node);
            }
            idx /= 2;
        }
        Some(proof)
    }

    /// Proof for the first occurrence of `leaf`
    pub fn proof_for(&self, leaf: &Hash32) -> Option<Proof> {
        let index = self.layers[0].iter().position(|l| l == leaf)?;
        self.proof(index)
    }

    /// Proof for a `(collection, token_id)` pair
    pub fn collateral_proof(&self, collection: &Address, token_id: u64) -> Option<Proof> {
        self.proof_for(&collateral_leaf(collection, token_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree(n: u64) -> (MerkleTree, Vec<Address>, Vec<u64>) {
        let collection = Address::from_u64(0xc011);
        let collections = vec![collection; n as usize];
        let ids: Vec<u64> = (1..=n).collect();
        let tree = MerkleTree::from_collateral(&collections, &ids).unwrap();
        (tree, collections, ids)
    }

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"").0),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_collateral_encoding_layout() {
        let collection: Address = "0x8971718bca2b7fc86649b84601b17b634ecbdf19".parse().unwrap();
        let encoded = encode_collateral(&collection, 6);
        assert_eq!(&encoded[..20], collection.as_bytes());
        assert!(encoded[20..51].iter().all(|b| *b == 0));
        assert_eq!(encoded[51], 6);
    }

    #[test]
    fn test_hash_pair_is_symmetric() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_every_leaf_verifies() {
        for n in [1u64, 2, 3, 5, 8, 12] {
            let (tree, collections, ids) = sample_tree(n);
            let root = tree.root();
            for (collection, id) in collections.iter().zip(&ids) {
                let proof = tree.collateral_proof(collection, *id).unwrap();
                assert!(
                    verify_collateral(&proof, &root, collection, *id),
                    "leaf {} of {} failed",
                    id,
                    n
                );
            }
        }
    }

    #[test]
    fn test_outsider_never_verifies() {
        let (tree, collections, _) = sample_tree(7);
        let root = tree.root();
        let outsider = collateral_leaf(&collections[0], 99);
        for i in 0..tree.len() {
            let proof = tree.proof(i).unwrap();
            assert!(!verify(&proof, &root, &outsider));
        }
        assert!(!verify(&[], &root, &outsider));
    }

    #[test]
    fn test_wrong_collection_rejected() {
        let (tree, collections, _) = sample_tree(4);
        let proof = tree.collateral_proof(&collections[0], 2).unwrap();
        assert!(!verify_collateral(
            &proof,
            &tree.root(),
            &Address::from_u64(0xbad),
            2
        ));
    }

    #[test]
    fn test_single_leaf_tree_has_empty_proof() {
        let leaf = collateral_leaf(&Address::from_u64(1), 1);
        let tree = MerkleTree::new(vec![leaf]).unwrap();
        assert_eq!(tree.root(), leaf);
        assert_eq!(tree.proof(0).unwrap(), Vec::<Hash32>::new());
        assert!(verify(&[], &tree.root(), &leaf));
    }

    #[test]
    fn test_odd_node_is_promoted() {
        let leaves: Vec<Hash32> = (0u8..3).map(|i| keccak256(&[i])).collect();
        let tree = MerkleTree::new(leaves.clone()).unwrap();
        let expected = hash_pair(&hash_pair(&leaves[0], &leaves[1]), &leaves[2]);
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.proof(2).unwrap(), vec![hash_pair(&leaves[0], &leaves[1])]);
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(MerkleTree::new(vec![]).is_err());
    }

    #[test]
    fn test_mismatched_arrays_rejected() {
        let err = MerkleTree::from_collateral(&[Address::from_u64(1)], &[1, 2]).unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[test]
    fn test_proof_out_of_range() {
        let (tree, _, _) = sample_tree(3);
        assert!(tree.proof(3).is_none());
    }
}
