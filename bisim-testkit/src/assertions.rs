use std::collections::BTreeSet;
use std::hash::Hash;

use bisim::{into_blocks, same_blocks, Graph, Label, NodeId, Partition};

/// Blocks as sorted sets, for readable equality assertions.
pub fn canonical_blocks<N, S>(partition: &Partition<N, S>) -> BTreeSet<BTreeSet<N>>
where
    N: Ord + Clone,
    S: Eq + Hash + Clone,
{
    into_blocks(partition.clone())
        .into_iter()
        .map(|block| block.into_iter().collect())
        .collect()
}

/// Every graph node has exactly one signature and nothing else does.
pub fn assert_total<N, L, S>(graph: &Graph<N, L>, partition: &Partition<N, S>)
where
    N: NodeId,
    L: Label,
{
    assert_eq!(
        partition.len(),
        graph.node_count(),
        "partition covers {} nodes, graph has {}",
        partition.len(),
        graph.node_count()
    );
    for node in graph.nodes() {
        assert!(partition.contains_key(node), "node {node:?} missing from partition");
    }
}

/// Both partitions group the nodes identically.
pub fn assert_same_blocks<N, A, B>(left: &Partition<N, A>, right: &Partition<N, B>)
where
    N: Eq + Hash + std::fmt::Debug,
    A: Eq + Hash,
    B: Eq + Hash,
{
    assert!(
        same_blocks(left, right),
        "partitions differ: {} vs {} nodes, {} vs {} blocks",
        left.len(),
        right.len(),
        bisim::block_count(left),
        bisim::block_count(right)
    );
}
