//! Single-process reference reduction.
//!
//! Runs the same signature schemes and the same stopping rule as the
//! distributed protocol, without machines or messages. With one machine the
//! distributed reduction returns exactly this partition.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::graph::{Graph, Label, NodeId};
use crate::partition::Partition;
use crate::signature::{
    Estimate, EstimateSignature, Exact, ExactSignature, SignatureScheme, DEFAULT_ESTIMATE_SEED,
};
use crate::telemetry;

#[derive(Debug)]
pub struct GraphPartitioner<'g, N, L> {
    graph: &'g Graph<N, L>,
    estimate_seed: u64,
    elapsed: Duration,
    rounds: usize,
}

impl<'g, N: NodeId, L: Label> GraphPartitioner<'g, N, L> {
    pub fn new(graph: &'g Graph<N, L>) -> Self {
        Self {
            graph,
            estimate_seed: DEFAULT_ESTIMATE_SEED,
            elapsed: Duration::ZERO,
            rounds: 0,
        }
    }

    pub fn with_estimate_seed(mut self, seed: u64) -> Self {
        self.estimate_seed = seed;
        self
    }

    /// Wall time of the latest reduction.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_milliseconds(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn exact_bisimulation_reduction(&mut self) -> Partition<N, ExactSignature> {
        self.reduce(&Exact)
    }

    pub fn estimate_bisimulation_reduction(&mut self) -> Partition<N, EstimateSignature> {
        let scheme = Estimate::with_seed(self.estimate_seed);
        self.reduce(&scheme)
    }

    /// Refine until a round leaves the number of distinct signatures unchanged.
    pub fn reduce<S: SignatureScheme>(&mut self, scheme: &S) -> Partition<N, S::Signature> {
        let _span = telemetry::sequential_span(S::VARIANT, self.graph.node_count()).entered();
        let started = Instant::now();

        let mut signatures: HashMap<N, S::Signature> = self
            .graph
            .nodes()
            .filter_map(|node| {
                let label = self.graph.label_id(node)?;
                Some((node.clone(), scheme.initial(label)))
            })
            .collect();
        let mut previous = 0;
        let mut rounds = 0usize;

        loop {
            let blocks = signatures.values().collect::<HashSet<_>>().len();
            if blocks <= previous {
                rounds = rounds.saturating_sub(1);
                break;
            }
            rounds += 1;
            previous = blocks;
            signatures = self.refine_round(scheme, &signatures);
            tracing::trace!(round = rounds, blocks, "round refined");
        }

        self.elapsed = started.elapsed();
        self.rounds = rounds;
        telemetry::record_sequential_completed(S::VARIANT, rounds, previous, self.elapsed);
        signatures
    }

    fn refine_round<S: SignatureScheme>(
        &self,
        scheme: &S,
        current: &HashMap<N, S::Signature>,
    ) -> HashMap<N, S::Signature> {
        self.graph
            .nodes()
            .filter_map(|node| {
                let label = self.graph.label_id(node)?;
                let successors = self
                    .graph
                    .transitions(node)
                    .filter_map(|(edge_label, target)| Some((edge_label, current.get(target)?)));
                Some((node.clone(), scheme.refine(label, successors)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{block_count, same_blocks};

    #[test]
    fn test_disjoint_chains_take_one_round() {
        let mut graph = Graph::new("chains");
        for node in ['a', 'b', 'c', 'd'] {
            graph.add_node(node, 0u8);
        }
        graph.add_edge('a', 1, 'b').unwrap();
        graph.add_edge('c', 1, 'd').unwrap();

        let mut partitioner = GraphPartitioner::new(&graph);
        let partition = partitioner.exact_bisimulation_reduction();
        assert_eq!(partitioner.rounds(), 1);
        assert_eq!(block_count(&partition), 2);
        assert_eq!(partition[&'a'], partition[&'c']);
    }

    #[test]
    fn test_no_edges_take_zero_rounds() {
        let mut graph = Graph::new("isolated");
        for node in 0..4u32 {
            graph.add_node(node, node % 2);
        }

        let mut partitioner = GraphPartitioner::new(&graph);
        let partition = partitioner.exact_bisimulation_reduction();
        assert_eq!(partitioner.rounds(), 0);
        assert_eq!(block_count(&partition), 2);
    }

    #[test]
    fn test_empty_graph() {
        let graph: Graph<u32, u32> = Graph::new("empty");
        let mut partitioner = GraphPartitioner::new(&graph);
        assert!(partitioner.estimate_bisimulation_reduction().is_empty());
        assert_eq!(partitioner.rounds(), 0);
    }

    #[test]
    fn test_uniform_cycles_collapse_to_one_block() {
        // a 2-cycle and a 3-cycle are bisimilar when labels are uniform
        let mut graph = Graph::new("cycles");
        for node in 0..5u32 {
            graph.add_node(node, ());
        }
        for (from, to) in [(0, 1), (1, 0), (2, 3), (3, 4), (4, 2)] {
            graph.add_edge(from, (), to).unwrap();
        }

        let mut partitioner = GraphPartitioner::new(&graph);
        let exact = partitioner.exact_bisimulation_reduction();
        assert_eq!(block_count(&exact), 1);
        assert_eq!(partitioner.rounds(), 0);

        let estimate = partitioner.estimate_bisimulation_reduction();
        assert!(same_blocks(&exact, &estimate));
    }

    #[test]
    fn test_repeated_successor_blocks_do_not_split() {
        // a reaches two bisimilar sinks, c only one
        let mut graph = Graph::new("fan-out");
        for node in ["a", "b", "b2", "c", "d"] {
            graph.add_node(node, 0u8);
        }
        graph.add_edge("a", 0, "b").unwrap();
        graph.add_edge("a", 0, "b2").unwrap();
        graph.add_edge("c", 0, "d").unwrap();

        let mut partitioner = GraphPartitioner::new(&graph);
        let exact = partitioner.exact_bisimulation_reduction();
        assert_eq!(block_count(&exact), 2);
        assert_eq!(exact[&"a"], exact[&"c"]);
        assert_eq!(exact[&"b"], exact[&"d"]);

        let estimate = partitioner.estimate_bisimulation_reduction();
        assert!(same_blocks(&exact, &estimate));
    }

    /// Label whose `Hash` only covers `key`.
    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Tagged {
        key: u8,
        tag: u8,
    }

    impl std::hash::Hash for Tagged {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.key.hash(state);
        }
    }

    #[test]
    fn test_labels_equal_in_hash_only_stay_apart() {
        let mut graph = Graph::new("tagged");
        graph.add_node(0u32, Tagged { key: 1, tag: 1 });
        graph.add_node(1u32, Tagged { key: 1, tag: 2 });

        let mut partitioner = GraphPartitioner::new(&graph);
        let exact = partitioner.exact_bisimulation_reduction();
        assert_ne!(exact[&0], exact[&1]);
        let estimate = partitioner.estimate_bisimulation_reduction();
        assert_ne!(estimate[&0], estimate[&1]);
    }
}
