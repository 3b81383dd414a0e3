//! Partition results and helpers for comparing them.
//!
//! A partition maps every node to the signature of its block. Signatures are
//! only meaningful within one computation, so partitions from different runs
//! or schemes are compared by block structure, not by signature value.

use std::collections::HashMap;
use std::hash::Hash;

/// Node to block signature.
pub type Partition<N, S> = HashMap<N, S>;

/// Number of distinct blocks.
pub fn block_count<N, S: Eq + Hash>(partition: &Partition<N, S>) -> usize {
    partition
        .values()
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// Group nodes by block. Neither the block order nor the node order within a
/// block is specified.
pub fn into_blocks<N, S: Eq + Hash>(partition: Partition<N, S>) -> Vec<Vec<N>> {
    let mut blocks: HashMap<S, Vec<N>> = HashMap::new();
    for (node, signature) in partition {
        blocks.entry(signature).or_default().push(node);
    }
    blocks.into_values().collect()
}

/// Whether two partitions cover the same nodes with the same blocks, up to
/// renaming of the signatures.
pub fn same_blocks<N, A, B>(left: &Partition<N, A>, right: &Partition<N, B>) -> bool
where
    N: Eq + Hash,
    A: Eq + Hash,
    B: Eq + Hash,
{
    if left.len() != right.len() {
        return false;
    }

    let mut forward: HashMap<&A, &B> = HashMap::new();
    let mut backward: HashMap<&B, &A> = HashMap::new();
    for (node, a) in left {
        let Some(b) = right.get(node) else {
            return false;
        };
        if *forward.entry(a).or_insert(b) != b || *backward.entry(b).or_insert(a) != a {
            return false;
        }
    }
    true
}

/// Whether every block of `fine` lies inside a single block of `coarse`.
pub fn refines<N, A, B>(fine: &Partition<N, A>, coarse: &Partition<N, B>) -> bool
where
    N: Eq + Hash,
    A: Eq + Hash,
    B: Eq + Hash,
{
    let mut image: HashMap<&A, &B> = HashMap::new();
    fine.iter().all(|(node, a)| match coarse.get(node) {
        Some(b) => *image.entry(a).or_insert(b) == b,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(pairs: &[(u32, char)]) -> Partition<u32, char> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_block_count_and_grouping() {
        let p = partition(&[(1, 'a'), (2, 'a'), (3, 'b')]);
        assert_eq!(block_count(&p), 2);

        let mut blocks = into_blocks(p);
        for block in &mut blocks {
            block.sort_unstable();
        }
        blocks.sort();
        assert_eq!(blocks, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_same_blocks_ignores_signature_names() {
        let left = partition(&[(1, 'a'), (2, 'a'), (3, 'b')]);
        let renamed: Partition<u32, u64> = [(1, 9), (2, 9), (3, 4)].into_iter().collect();
        assert!(same_blocks(&left, &renamed));

        let merged: Partition<u32, u64> = [(1, 9), (2, 9), (3, 9)].into_iter().collect();
        assert!(!same_blocks(&left, &merged));
        assert!(!same_blocks(&merged, &left));

        let missing: Partition<u32, u64> = [(1, 9), (2, 9)].into_iter().collect();
        assert!(!same_blocks(&left, &missing));
    }

    #[test]
    fn test_refines() {
        let fine = partition(&[(1, 'a'), (2, 'b'), (3, 'c')]);
        let coarse = partition(&[(1, 'x'), (2, 'x'), (3, 'y')]);
        assert!(refines(&fine, &coarse));
        assert!(!refines(&coarse, &fine));
        assert!(refines(&coarse, &coarse));
    }
}
