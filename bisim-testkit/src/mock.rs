use async_trait::async_trait;
use bisim::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// Wraps a splitter and records the machine counts it was called with.
#[derive(Clone)]
pub struct RecordingSplitter<P> {
    inner: P,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl<P> RecordingSplitter<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().clone()
    }

    pub fn assert_call_count_eq(&self, expected: usize) {
        let actual = self.calls.lock().len();
        assert_eq!(actual, expected, "Expected {expected} splitter calls, got {actual}");
    }
}

impl<N, L, P> Splitter<N, L> for RecordingSplitter<P>
where
    P: Splitter<N, L>,
{
    fn split(&self, graph: &Graph<N, L>, machine_count: usize) -> Segments<N> {
        self.calls.lock().push(machine_count);
        self.inner.split(graph, machine_count)
    }
}

/// Splitters that violate the splitter contract in one specific way.
#[derive(Clone, Debug)]
pub enum MalformedSplitter<N> {
    /// Leaves the first node in insertion order unassigned.
    DropFirstNode,
    /// Puts every node on segment `machine_count`.
    OutOfRange,
    /// Adds an extra assignment for a node that is not in the graph.
    UnknownNode(N),
}

impl<N: NodeId, L: Label> Splitter<N, L> for MalformedSplitter<N> {
    fn split(&self, graph: &Graph<N, L>, machine_count: usize) -> Segments<N> {
        let mut segments = round_robin_splitter(graph, machine_count.max(1));
        match self {
            MalformedSplitter::DropFirstNode => {
                if let Some(first) = graph.nodes().next() {
                    segments.remove(first);
                }
            }
            MalformedSplitter::OutOfRange => {
                for segment in segments.values_mut() {
                    *segment = machine_count;
                }
            }
            MalformedSplitter::UnknownNode(node) => {
                segments.insert(node.clone(), 0);
            }
        }
        segments
    }
}

/// Event publisher that keeps every event in memory.
///
/// Unlike a broadcast subscriber it never lags, so tests can inspect the
/// complete event order of a reduction.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<ComputationEvent>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ComputationEvent> {
        self.events.lock().clone()
    }

    pub fn payloads(&self) -> Vec<ComputationEventPayload> {
        self.events
            .lock()
            .iter()
            .map(|event| event.payload.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Requests handled by workers, in publication order.
    pub fn handled_requests(&self) -> Vec<(MachineId, &'static str)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match (&event.payload, event.meta.machine) {
                (ComputationEventPayload::RequestHandled { request }, Some(machine)) => {
                    Some((machine, *request))
                }
                _ => None,
            })
            .collect()
    }

    /// `(round, blocks)` for every completed count phase.
    pub fn block_counts(&self) -> Vec<(usize, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event.payload {
                ComputationEventPayload::BlocksCounted { round, blocks, .. } => {
                    Some((round, blocks))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: ComputationEvent) -> anyhow::Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
