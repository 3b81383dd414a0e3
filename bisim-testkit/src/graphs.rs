use bisim::Graph;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Node and edge labels used by the fixtures.
pub type TestGraph = Graph<u32, u8>;

/// `a -> b` and `c -> d`, all nodes and edges sharing one label.
///
/// Two blocks, `{a, c}` and `{b, d}`, found after one round.
pub fn disjoint_chains() -> Graph<char, &'static str> {
    let mut graph = Graph::new("disjoint-chains");
    for node in ['a', 'b', 'c', 'd'] {
        graph.add_node(node, "state");
    }
    graph
        .add_edge('a', "step", 'b')
        .expect("fixture nodes exist");
    graph
        .add_edge('c', "step", 'd')
        .expect("fixture nodes exist");
    graph
}

/// `count` nodes without edges, labeled `node % labels`.
pub fn isolated_nodes(count: u32, labels: u8) -> TestGraph {
    let mut graph = Graph::new("isolated");
    for node in 0..count {
        graph.add_node(node, (node % labels.max(1) as u32) as u8);
    }
    graph
}

/// Directed cycle of `len` nodes where only node 0 carries label 1.
///
/// Every node is distinguished by its distance to node 0, so the
/// partition is discrete.
pub fn marked_cycle(len: u32) -> TestGraph {
    let mut graph = Graph::new(format!("marked-cycle-{len}"));
    for node in 0..len {
        graph.add_node(node, u8::from(node == 0));
    }
    for node in 0..len {
        graph
            .add_edge(node, 0, (node + 1) % len)
            .expect("fixture nodes exist");
    }
    graph
}

/// Complete binary tree of the given depth, edges pointing to the children.
///
/// Nodes on the same level are bisimilar: `depth + 1` blocks.
pub fn binary_tree(depth: u32) -> TestGraph {
    let mut graph = Graph::new(format!("binary-tree-{depth}"));
    let count = (1u32 << (depth + 1)) - 1;
    for node in 0..count {
        graph.add_node(node, 0);
    }
    for node in 0..count {
        for child in [2 * node + 1, 2 * node + 2] {
            if child < count {
                graph.add_edge(node, 0, child).expect("fixture nodes exist");
            }
        }
    }
    graph
}

/// Node 0 reaches node 1 over edges labeled 1 and 2, node 2 reaches node 3
/// over label 1 only. Blocks: `{0}`, `{2}`, `{1, 3}`.
pub fn parallel_edges() -> TestGraph {
    let mut graph = Graph::new("parallel-edges");
    for node in 0..4 {
        graph.add_node(node, 0);
    }
    graph.add_edge(0, 1, 1).expect("fixture nodes exist");
    graph.add_edge(0, 2, 1).expect("fixture nodes exist");
    graph.add_edge(2, 1, 3).expect("fixture nodes exist");
    graph
}

/// Parameters for [`random_graph`].
#[derive(Clone, Copy, Debug)]
pub struct RandomGraphSpec {
    pub nodes: u32,
    pub edges: u32,
    pub node_labels: u8,
    pub edge_labels: u8,
}

impl Default for RandomGraphSpec {
    fn default() -> Self {
        Self {
            nodes: 64,
            edges: 160,
            node_labels: 2,
            edge_labels: 2,
        }
    }
}

/// Reproducible random multigraph.
pub fn random_graph(seed: u64, spec: RandomGraphSpec) -> TestGraph {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut graph = Graph::new(format!("random-{seed}-{}x{}", spec.nodes, spec.edges));

    for node in 0..spec.nodes {
        graph.add_node(node, rng.gen_range(0..spec.node_labels.max(1)));
    }
    if spec.nodes == 0 {
        return graph;
    }
    for _ in 0..spec.edges {
        let source = rng.gen_range(0..spec.nodes);
        let target = rng.gen_range(0..spec.nodes);
        let label = rng.gen_range(0..spec.edge_labels.max(1));
        graph
            .add_edge(source, label, target)
            .expect("random endpoints are graph nodes");
    }
    graph
}
