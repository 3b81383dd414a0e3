use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity of a graph node.
///
/// Blanket-implemented for every type that can be hashed, compared and sent
/// between machine tasks.
pub trait NodeId: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> NodeId for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Label attached to nodes and edges.
pub trait Label: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Label for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Dense id of a distinct label within one graph.
///
/// Node and edge labels share one table. Two labels get the same id exactly
/// when they compare equal, so signature schemes hash ids instead of relying
/// on the label's `Hash` impl to tell labels apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(u32);

impl LabelId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Fixed little-endian encoding hashed by the signature schemes.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

/// Segment assignment produced by a splitter: node to segment id.
pub type Segments<N> = HashMap<N, usize>;

/// A labeled directed edge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge<N, L> {
    pub source: N,
    pub label: L,
    pub target: N,
}

/// Labeled directed multigraph.
///
/// Nodes keep their insertion order, which the order-based splitters rely on.
/// Parallel edges between the same ordered pair are kept as separate entries.
#[derive(Clone, Debug)]
pub struct Graph<N, L> {
    name: String,
    order: Vec<N>,
    labels: HashMap<N, LabelId>,
    interned: Vec<L>,
    label_ids: HashMap<L, LabelId>,
    edges: Vec<Edge<N, L>>,
    edge_labels: Vec<LabelId>,
    outgoing: HashMap<N, Vec<usize>>,
}

impl<N: NodeId, L: Label> Default for Graph<N, L> {
    fn default() -> Self {
        Self::new("graph")
    }
}

impl<N: NodeId, L: Label> Graph<N, L> {
    /// Create an empty graph with a display name used by experiment reports.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Vec::new(),
            labels: HashMap::new(),
            interned: Vec::new(),
            label_ids: HashMap::new(),
            edges: Vec::new(),
            edge_labels: Vec::new(),
            outgoing: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node, or relabel it if it already exists.
    pub fn add_node(&mut self, node: N, label: L) {
        let id = self.intern(label);
        if self.labels.insert(node.clone(), id).is_none() {
            self.order.push(node);
        }
    }

    /// Add a labeled edge between two existing nodes.
    pub fn add_edge(&mut self, source: N, label: L, target: N) -> Result<()> {
        for endpoint in [&source, &target] {
            if !self.labels.contains_key(endpoint) {
                return Err(Error::DanglingEdge {
                    node: format!("{endpoint:?}"),
                });
            }
        }

        let id = self.intern(label.clone());
        self.outgoing
            .entry(source.clone())
            .or_default()
            .push(self.edges.len());
        self.edge_labels.push(id);
        self.edges.push(Edge {
            source,
            label,
            target,
        });
        Ok(())
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &N> + '_ {
        self.order.iter()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, node: &N) -> bool {
        self.labels.contains_key(node)
    }

    pub fn label(&self, node: &N) -> Option<&L> {
        self.labels.get(node).map(|id| &self.interned[id.index()])
    }

    /// Interned id of a node's label.
    pub fn label_id(&self, node: &N) -> Option<LabelId> {
        self.labels.get(node).copied()
    }

    /// The label behind an id handed out by this graph.
    pub fn resolve(&self, id: LabelId) -> Option<&L> {
        self.interned.get(id.index())
    }

    /// Number of distinct node and edge labels.
    pub fn label_count(&self) -> usize {
        self.interned.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge<N, L>> + '_ {
        self.edges.iter()
    }

    /// Outgoing edges of `node`; empty for sinks and unknown nodes.
    pub fn out_edges<'a>(&'a self, node: &N) -> impl Iterator<Item = &'a Edge<N, L>> + 'a {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&index| &self.edges[index])
    }

    /// `(interned edge label, target)` for every outgoing edge of `node`.
    pub fn transitions<'a>(&'a self, node: &N) -> impl Iterator<Item = (LabelId, &'a N)> + 'a {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&index| (self.edge_labels[index], &self.edges[index].target))
    }

    fn intern(&mut self, label: L) -> LabelId {
        if let Some(&id) = self.label_ids.get(&label) {
            return id;
        }
        let id = LabelId(self.interned.len() as u32);
        self.interned.push(label.clone());
        self.label_ids.insert(label, id);
        id
    }

    /// Check a splitter's output against this graph.
    ///
    /// The assignment must cover every node, reference only graph nodes and
    /// use segment ids below `machine_count`. Returns the sorted set of
    /// segment ids actually used.
    pub fn validate_segments(
        &self,
        segments: &Segments<N>,
        machine_count: usize,
    ) -> Result<Vec<usize>> {
        if machine_count == 0 {
            return Err(Error::NoMachines);
        }

        for node in &self.order {
            if !segments.contains_key(node) {
                return Err(Error::UnassignedNode {
                    node: format!("{node:?}"),
                });
            }
        }

        let mut used = HashSet::new();
        for (node, &segment) in segments {
            if !self.contains(node) {
                return Err(Error::UnknownNode {
                    node: format!("{node:?}"),
                });
            }
            if segment >= machine_count {
                return Err(Error::SegmentOutOfRange {
                    node: format!("{node:?}"),
                    segment,
                    machine_count,
                });
            }
            used.insert(segment);
        }

        let mut used: Vec<usize> = used.into_iter().collect();
        used.sort_unstable();
        Ok(used)
    }
}
