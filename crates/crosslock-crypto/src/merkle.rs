//! Merkle tree over per-fill secret hashes.
//!
//! Leaves are padded with zero hashes up to the next power of two (a single
//! leaf is its own root). Interior nodes are SHA-256(left || right). A proof
//! lists sibling hashes from the leaf level upwards, with one path bit per
//! level that is `true` when the proven node is the right child.

use crosslock_core::error::CrosslockError;
use crosslock_core::types::SecretHash;
use serde::{Deserialize, Serialize};

use crate::hash::hash_pair;

/// A built tree. `levels[0]` holds the padded leaves, the last level the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    pub fn root(&self) -> [u8; 32] {
        // build_merkle_tree never produces an empty top level.
        self.levels[self.levels.len() - 1][0]
    }

    /// Leaves after padding, in tree order.
    pub fn leaves(&self) -> Vec<SecretHash> {
        self.levels[0].iter().copied().map(SecretHash::from_bytes).collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    fn node(&self, level: usize, index: usize) -> [u8; 32] {
        self.levels[level][index]
    }
}

/// Inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes, leaf level first.
    pub siblings: Vec<[u8; 32]>,
    /// `path[i]` is true when the node at level `i` is a right child.
    pub path: Vec<bool>,
}

impl MerkleProof {
    /// Leaf index encoded by the path bits.
    pub fn leaf_index(&self) -> usize {
        self.path
            .iter()
            .enumerate()
            .fold(0usize, |acc, (i, right)| if *right { acc | (1 << i) } else { acc })
    }
}

/// Build a tree over `hashes`, padding with zero leaves to a power of two.
pub fn build_merkle_tree(hashes: &[SecretHash]) -> Result<MerkleTree, CrosslockError> {
    if hashes.is_empty() {
        return Err(CrosslockError::MerkleProof(
            "cannot build a tree without leaves".into(),
        ));
    }

    let mut leaves: Vec<[u8; 32]> = hashes.iter().map(|h| *h.as_bytes()).collect();
    if leaves.len() > 1 {
        leaves.resize(leaves.len().next_power_of_two(), [0u8; 32]);
    }

    let mut levels = vec![leaves];
    while levels[levels.len() - 1].len() > 1 {
        let current = &levels[levels.len() - 1];
        let next: Vec<[u8; 32]> = current
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                // Odd node: paired with itself.
                [last] => hash_pair(last, last),
                _ => unreachable!("chunks(2) yields one or two nodes"),
            })
            .collect();
        levels.push(next);
    }

    Ok(MerkleTree { levels })
}

/// Prove that `leaf` is in `tree`. The first exact byte match wins.
pub fn prove_leaf(tree: &MerkleTree, leaf: &SecretHash) -> Result<MerkleProof, CrosslockError> {
    let index = tree.levels[0]
        .iter()
        .position(|l| l == leaf.as_bytes())
        .ok_or(CrosslockError::LeafNotFound)?;

    let mut top_down = Vec::with_capacity(tree.depth());
    collect_siblings(tree, 0, tree.leaf_count(), index, &mut top_down);
    top_down.reverse();

    let (siblings, path) = top_down.into_iter().unzip();
    Ok(MerkleProof { siblings, path })
}

/// Halve `[lo, hi)` until it is a single leaf, recording at each step the hash
/// of the half that does not contain `index` and whether `index` is in the
/// right half.
fn collect_siblings(
    tree: &MerkleTree,
    lo: usize,
    hi: usize,
    index: usize,
    out: &mut Vec<([u8; 32], bool)>,
) {
    let width = hi - lo;
    if width <= 1 {
        return;
    }
    let half = width / 2;
    let mid = lo + half;
    // A subtree of `half` leaves has its root on level log2(half).
    let level = half.trailing_zeros() as usize;

    if index >= mid {
        out.push((tree.node(level, lo / half), true));
        collect_siblings(tree, mid, hi, index, out);
    } else {
        out.push((tree.node(level, mid / half), false));
        collect_siblings(tree, lo, mid, index, out);
    }
}

/// Recompute the root from `leaf` and `proof`; equality with `root` is the
/// only success criterion.
pub fn verify_proof(leaf: &SecretHash, proof: &MerkleProof, root: &[u8; 32]) -> bool {
    if proof.siblings.len() != proof.path.len() {
        return false;
    }
    let computed = proof
        .siblings
        .iter()
        .zip(&proof.path)
        .fold(*leaf.as_bytes(), |node, (sibling, is_right)| {
            if *is_right {
                hash_pair(sibling, &node)
            } else {
                hash_pair(&node, sibling)
            }
        });
    computed == *root
}
