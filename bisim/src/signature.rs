//! Signature schemes for partition refinement.
//!
//! A scheme turns a node's interned label and the set of its
//! `(edge label, successor signature)` pairs into a new signature. Both schemes are pure functions of their inputs, so the same
//! node gets the same signature on every machine and in the sequential
//! baseline.

use std::fmt;
use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::graph::LabelId;

/// Seed used by [`Estimate::default`].
pub const DEFAULT_ESTIMATE_SEED: u64 = 0x5bd1_e995_9e37_79b9;

/// Which signature scheme a reduction runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Exact,
    Estimate,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Exact => "exact",
            Variant::Estimate => "estimate",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block identity for one refinement round.
pub trait Signature: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Bytes one signature costs on the simulated wire.
    const WIRE_BYTES: usize;
}

/// Computes per-round block signatures.
pub trait SignatureScheme: Clone + Send + Sync + 'static {
    type Signature: Signature;

    /// Variant tag reported in events, metrics and experiment reports.
    const VARIANT: Variant;

    /// Round-0 signature: depends on the label only.
    fn initial(&self, label: LabelId) -> Self::Signature;

    /// Next-round signature from the label and the `(edge label, successor
    /// signature)` pairs. Only the set of pairs counts: neither iteration
    /// order nor repeated pairs change the result.
    fn refine<'a, I>(&self, label: LabelId, successors: I) -> Self::Signature
    where
        I: IntoIterator<Item = (LabelId, &'a Self::Signature)>;
}

fn digest(domain: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Exact structural signatures.
///
/// A signature is the BLAKE3 digest of the node label followed by the sorted,
/// deduplicated digests of its `(edge label, successor signature)` pairs, so
/// two nodes share a signature exactly when their labels and successor sets
/// agree (up to a 256-bit collision).
#[derive(Clone, Copy, Debug, Default)]
pub struct Exact;

/// 256-bit structural digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExactSignature([u8; 32]);

impl Signature for ExactSignature {
    const WIRE_BYTES: usize = 32;
}

impl ExactSignature {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ExactSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExactSignature(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

impl SignatureScheme for Exact {
    type Signature = ExactSignature;

    const VARIANT: Variant = Variant::Exact;

    fn initial(&self, label: LabelId) -> ExactSignature {
        ExactSignature(digest(b"bisim.initial", &[&label.to_le_bytes()]))
    }

    fn refine<'a, I>(&self, label: LabelId, successors: I) -> ExactSignature
    where
        I: IntoIterator<Item = (LabelId, &'a ExactSignature)>,
    {
        let mut edges: Vec<[u8; 32]> = successors
            .into_iter()
            .map(|(edge_label, target)| {
                digest(b"bisim.edge", &[&edge_label.to_le_bytes(), target.as_bytes()])
            })
            .collect();
        edges.sort_unstable();
        edges.dedup();

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"bisim.node");
        hasher.update(&label.to_le_bytes());
        hasher.update(&(edges.len() as u64).to_le_bytes());
        for edge in &edges {
            hasher.update(edge);
        }
        ExactSignature(*hasher.finalize().as_bytes())
    }
}

/// Estimated signatures.
///
/// Each signature is a 64-bit keyed hash of the label combined with the
/// wrapping sum of keyed hashes over the distinct `(edge label, successor)`
/// pairs. The sum is order independent but can collide, in which case blocks
/// that the exact scheme separates are merged.
#[derive(Clone, Debug)]
pub struct Estimate {
    state: ahash::RandomState,
}

impl Estimate {
    /// Build a scheme whose hashes are keyed by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: ahash::RandomState::with_seeds(
                seed,
                seed.rotate_left(17) ^ 0x243f_6a88_85a3_08d3,
                seed.rotate_left(31) ^ 0x1319_8a2e_0370_7344,
                !seed,
            ),
        }
    }
}

impl Default for Estimate {
    fn default() -> Self {
        Self::with_seed(DEFAULT_ESTIMATE_SEED)
    }
}

/// 64-bit signature sketch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EstimateSignature(pub u64);

impl Signature for EstimateSignature {
    const WIRE_BYTES: usize = 8;
}

impl SignatureScheme for Estimate {
    type Signature = EstimateSignature;

    const VARIANT: Variant = Variant::Estimate;

    fn initial(&self, label: LabelId) -> EstimateSignature {
        EstimateSignature(self.state.hash_one(label.to_le_bytes()))
    }

    fn refine<'a, I>(&self, label: LabelId, successors: I) -> EstimateSignature
    where
        I: IntoIterator<Item = (LabelId, &'a EstimateSignature)>,
    {
        let pairs: HashSet<(LabelId, u64)> = successors
            .into_iter()
            .map(|(edge_label, target)| (edge_label, target.0))
            .collect();
        let sum = pairs.iter().fold(0u64, |acc, (edge_label, target)| {
            acc.wrapping_add(self.state.hash_one((edge_label.to_le_bytes(), *target)))
        });
        EstimateSignature(
            self.state
                .hash_one((label.to_le_bytes(), pairs.len() as u64, sum)),
        )
    }
}
