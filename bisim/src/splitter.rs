//! Graph splitters: assign every node to one of `machine_count` segments.

use crate::graph::{Graph, Label, NodeId, Segments};

/// Assigns nodes to segments before a distributed reduction.
///
/// Implemented for every `Fn(&Graph, usize) -> Segments` closure. The output
/// is validated by the partitioner; a splitter that leaves nodes unassigned or
/// uses ids outside `[0, machine_count)` makes the reduction fail.
pub trait Splitter<N, L>: Send + Sync {
    fn split(&self, graph: &Graph<N, L>, machine_count: usize) -> Segments<N>;
}

impl<N, L, F> Splitter<N, L> for F
where
    F: Fn(&Graph<N, L>, usize) -> Segments<N> + Send + Sync,
{
    fn split(&self, graph: &Graph<N, L>, machine_count: usize) -> Segments<N> {
        self(graph, machine_count)
    }
}

/// Contiguous chunks of insertion order, `ceil(n / machine_count)` nodes each.
pub fn chunk_splitter<N: NodeId, L: Label>(graph: &Graph<N, L>, machine_count: usize) -> Segments<N> {
    if machine_count == 0 {
        return Segments::new();
    }
    let chunk = graph.node_count().div_ceil(machine_count).max(1);
    graph
        .nodes()
        .enumerate()
        .map(|(position, node)| (node.clone(), position / chunk))
        .collect()
}

/// Node `i` in insertion order goes to segment `i % machine_count`.
pub fn round_robin_splitter<N: NodeId, L: Label>(
    graph: &Graph<N, L>,
    machine_count: usize,
) -> Segments<N> {
    if machine_count == 0 {
        return Segments::new();
    }
    graph
        .nodes()
        .enumerate()
        .map(|(position, node)| (node.clone(), position % machine_count))
        .collect()
}

/// Segment chosen by a fixed-key hash of the node id.
pub fn hash_splitter<N: NodeId, L: Label>(graph: &Graph<N, L>, machine_count: usize) -> Segments<N> {
    if machine_count == 0 {
        return Segments::new();
    }
    let state = ahash::RandomState::with_seeds(1, 2, 3, 4);
    graph
        .nodes()
        .map(|node| {
            let segment = (state.hash_one(node) % machine_count as u64) as usize;
            (node.clone(), segment)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u32) -> Graph<u32, ()> {
        let mut graph = Graph::new("line");
        for node in 0..n {
            graph.add_node(node, ());
        }
        graph
    }

    fn check_valid<P: Splitter<u32, ()>>(splitter: P) {
        for n in [0, 1, 5, 16] {
            let graph = line(n);
            for machines in 1..=6 {
                let segments = splitter.split(&graph, machines);
                graph
                    .validate_segments(&segments, machines)
                    .unwrap_or_else(|err| panic!("n={n} m={machines}: {err}"));
            }
        }
    }

    #[test]
    fn test_splitters_produce_valid_assignments() {
        check_valid(chunk_splitter::<u32, ()>);
        check_valid(round_robin_splitter::<u32, ()>);
        check_valid(hash_splitter::<u32, ()>);
    }

    #[test]
    fn test_chunk_splitter_keeps_neighbours_together() {
        let segments = chunk_splitter(&line(5), 2);
        let mut by_node: Vec<_> = segments.into_iter().collect();
        by_node.sort_unstable();
        assert_eq!(by_node, vec![(0, 0), (1, 0), (2, 0), (3, 1), (4, 1)]);
    }

    #[test]
    fn test_round_robin_splitter_interleaves() {
        let segments = round_robin_splitter(&line(4), 3);
        assert_eq!(segments[&0], 0);
        assert_eq!(segments[&2], 2);
        assert_eq!(segments[&3], 0);
    }

    #[test]
    fn test_zero_machines_yields_empty_assignment() {
        assert!(chunk_splitter(&line(3), 0).is_empty());
        assert!(hash_splitter(&line(3), 0).is_empty());
    }
}
