use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::events::{ComputationEventPayload, EventSink};
use crate::graph::{Graph, Label, LabelId, NodeId, Segments};
use crate::message::Message;
use crate::runtime::machine::{Context, Envelope, Handler, MachineId, Payload};
use crate::signature::{Estimate, Exact, SignatureScheme};

struct LocalNode<N> {
    id: N,
    label: LabelId,
    /// `(edge label, target)` for every outgoing edge, parallel edges kept.
    edges: Vec<(LabelId, N)>,
}

/// Owns one segment of the graph and refines its signatures on request.
///
/// A worker knows the interned labels and outgoing edges of its own nodes
/// only.
/// Signatures of successors owned by other workers arrive through `Refine`
/// messages and are cached until the next round replaces them.
pub struct Worker<N, S: SignatureScheme> {
    index: usize,
    scheme: S,
    nodes: Vec<LocalNode<N>>,
    /// Other worker index to the local nodes it has edges into.
    exports: Vec<(usize, Vec<N>)>,
    signatures: HashMap<N, S::Signature>,
    foreign: HashMap<N, S::Signature>,
    events: EventSink,
}

/// Worker computing exact signatures.
pub type ExactWorker<N> = Worker<N, Exact>;

/// Worker computing estimated signatures.
pub type EstimateWorker<N> = Worker<N, Estimate>;

impl<N, S: SignatureScheme> fmt::Debug for Worker<N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("variant", &S::VARIANT)
            .field("nodes", &self.nodes.len())
            .field("exports", &self.exports.len())
            .field("foreign", &self.foreign.len())
            .finish()
    }
}

impl<N, S> Worker<N, S>
where
    N: NodeId,
    S: SignatureScheme,
{
    /// Build one worker per segment id that `segments` uses.
    ///
    /// Workers are ordered by segment id and indexed by their position, so
    /// worker `i` owns the `i`-th smallest segment id. `segments` must
    /// already have passed [`Graph::validate_segments`].
    pub fn create_workers<L: Label>(
        graph: &Graph<N, L>,
        segments: &Segments<N>,
        scheme: S,
        events: EventSink,
    ) -> Result<Vec<Self>> {
        let owner = |node: &N| -> Result<usize> {
            segments.get(node).copied().ok_or_else(|| Error::UnassignedNode {
                node: format!("{node:?}"),
            })
        };

        let mut used: Vec<usize> = segments.values().copied().collect();
        used.sort_unstable();
        used.dedup();
        let position: HashMap<usize, usize> =
            used.iter().enumerate().map(|(index, &segment)| (segment, index)).collect();

        let mut workers: Vec<Self> = (0..used.len())
            .map(|index| Self {
                index,
                scheme: scheme.clone(),
                nodes: Vec::new(),
                exports: Vec::new(),
                signatures: HashMap::new(),
                foreign: HashMap::new(),
                events: events.clone(),
            })
            .collect();
        let mut exports: Vec<BTreeMap<usize, HashSet<N>>> = vec![BTreeMap::new(); used.len()];

        for node in graph.nodes() {
            let local = position[&owner(node)?];
            let label = graph.label_id(node).ok_or_else(|| Error::UnknownNode {
                node: format!("{node:?}"),
            })?;

            let mut edges = Vec::new();
            for (edge_label, target) in graph.transitions(node) {
                let remote = position[&owner(target)?];
                if remote != local {
                    exports[remote]
                        .entry(local)
                        .or_default()
                        .insert(target.clone());
                }
                edges.push((edge_label, target.clone()));
            }

            workers[local].nodes.push(LocalNode {
                id: node.clone(),
                label,
                edges,
            });
        }

        for (worker, exports) in workers.iter_mut().zip(exports) {
            worker.exports = exports
                .into_iter()
                .map(|(target, nodes)| (target, nodes.into_iter().collect()))
                .collect();
        }

        Ok(workers)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn machine_id(&self) -> MachineId {
        MachineId::Worker(self.index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> + '_ {
        self.nodes.iter().map(|node| &node.id)
    }

    /// Current signature of a local node.
    pub fn signature(&self, node: &N) -> Option<&S::Signature> {
        self.signatures.get(node)
    }

    /// Worker indexes this worker ships signatures to during `Share`.
    pub fn export_targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.exports.iter().map(|(target, _)| *target)
    }

    fn clear(&mut self) {
        self.foreign.clear();
        self.signatures = self
            .nodes
            .iter()
            .map(|node| (node.id.clone(), self.scheme.initial(node.label)))
            .collect();
    }

    fn refine(&mut self, foreign: Vec<(N, S::Signature)>) -> Result<()> {
        self.foreign.extend(foreign);

        let mut next = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut successors = Vec::with_capacity(node.edges.len());
            for (label, target) in &node.edges {
                let signature = self
                    .signatures
                    .get(target)
                    .or_else(|| self.foreign.get(target))
                    .ok_or_else(|| {
                        Error::protocol(
                            self.machine_id(),
                            format!("no signature for successor {target:?} of {:?}", node.id),
                        )
                    })?;
                successors.push((*label, signature));
            }
            next.insert(node.id.clone(), self.scheme.refine(node.label, successors));
        }

        self.signatures = next;
        Ok(())
    }

    fn share(&self) -> Vec<(usize, Vec<(N, S::Signature)>)> {
        self.exports
            .iter()
            .map(|(target, nodes)| {
                let batch = nodes
                    .iter()
                    .filter_map(|node| {
                        self.signatures
                            .get(node)
                            .map(|signature| (node.clone(), signature.clone()))
                    })
                    .collect();
                (*target, batch)
            })
            .collect()
    }

    fn count(&self) -> HashSet<S::Signature> {
        self.signatures.values().cloned().collect()
    }

    fn collect(&self) -> Vec<(N, S::Signature)> {
        self.signatures
            .iter()
            .map(|(node, signature)| (node.clone(), signature.clone()))
            .collect()
    }
}

#[async_trait]
impl<N, S> Handler for Worker<N, S>
where
    N: NodeId,
    S: SignatureScheme,
{
    type Message = Message<N, S::Signature>;

    async fn handle(
        &mut self,
        ctx: &Context<Self::Message>,
        envelope: Envelope<Self::Message>,
    ) -> Result<()> {
        let Envelope { sender, message } = envelope;
        let request = message.kind();

        let reply = match message {
            Message::Clear => {
                self.clear();
                Message::Refined
            }
            Message::Refine { foreign } => {
                self.refine(foreign)?;
                Message::Refined
            }
            Message::Share => Message::Shared {
                outbox: self.share(),
            },
            Message::Count => Message::Counted {
                blocks: self.count(),
            },
            Message::SegmentRequest => Message::SegmentResponse {
                pairs: self.collect(),
            },
            other => {
                return Err(Error::protocol(
                    ctx.id(),
                    format!("worker does not handle {}", other.kind()),
                ));
            }
        };

        let sender = sender
            .ok_or_else(|| Error::protocol(ctx.id(), format!("{request} arrived without a sender")))?;

        tracing::trace!(request, nodes = self.nodes.len(), "request handled");
        self.events
            .emit(
                Some(ctx.id()),
                ComputationEventPayload::RequestHandled { request },
            )
            .await;
        ctx.send(&sender, reply);
        Ok(())
    }
}
