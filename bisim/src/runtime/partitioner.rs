use std::fmt;
use std::iter;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::PartitionerConfig;
use crate::error::{Error, Result};
use crate::events::{ComputationEventPayload, EventPublisher, EventSink};
use crate::graph::{Graph, Label, NodeId};
use crate::message::Message;
use crate::partition::{block_count, Partition};
use crate::runtime::builder::DistributedPartitionerBuilder;
use crate::runtime::coordinator::Coordinator;
use crate::runtime::machine::{mailbox, Address, Machine, MachineId, MachineStats, ShutdownToken};
use crate::runtime::worker::Worker;
use crate::signature::{Estimate, EstimateSignature, Exact, ExactSignature, SignatureScheme};
use crate::splitter::Splitter;
use crate::telemetry;

/// Measurements of the most recent reduction.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Diagnostics {
    /// Wall time from spawning the machines until all of them stopped.
    pub elapsed: Duration,
    /// Workers that received a segment.
    pub workers: usize,
    pub rounds: usize,
    /// Messages dispatched, summed over all machines.
    pub messages_received: u64,
    /// Simulated payload bytes, summed over all machines.
    pub payload_bytes: u64,
    /// Per-machine counters, coordinator first.
    pub machines: Vec<MachineStats>,
}

impl Diagnostics {
    fn from_machines(elapsed: Duration, workers: usize, machines: Vec<MachineStats>) -> Self {
        Self {
            elapsed,
            workers,
            rounds: 0,
            messages_received: machines.iter().map(|m| m.messages_received).sum(),
            payload_bytes: machines.iter().map(|m| m.payload_bytes).sum(),
            machines,
        }
    }
}

/// Runs bisimulation reductions on simulated machines.
///
/// Each reduction splits the graph with the given splitter, spawns one
/// coordinator and one worker per used segment as tokio tasks, and waits
/// until the coordinator's completion callback stops them all. Diagnostics of
/// the latest reduction stay available until the next one starts.
pub struct DistributedPartitioner<N, L> {
    graph: Arc<Graph<N, L>>,
    config: PartitionerConfig,
    events: Option<Arc<dyn EventPublisher>>,
    diagnostics: Diagnostics,
}

impl<N: NodeId, L: Label> fmt::Debug for DistributedPartitioner<N, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedPartitioner")
            .field("config", &self.config)
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("events_set", &self.events.is_some())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl<N: NodeId, L: Label> DistributedPartitioner<N, L> {
    pub fn new(graph: Arc<Graph<N, L>>, config: PartitionerConfig) -> Self {
        Self {
            graph,
            config,
            events: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn builder(config: PartitionerConfig) -> DistributedPartitionerBuilder<N, L> {
        DistributedPartitionerBuilder::new(config)
    }

    /// Publish computation events to `events`.
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn graph(&self) -> &Graph<N, L> {
        &self.graph
    }

    pub fn config(&self) -> &PartitionerConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Wall time of the latest reduction in milliseconds.
    pub fn elapsed_milliseconds(&self) -> u64 {
        self.diagnostics.elapsed.as_millis() as u64
    }

    /// Messages dispatched during the latest reduction.
    pub fn visit_times(&self) -> u64 {
        self.diagnostics.messages_received
    }

    /// Simulated bytes shipped during the latest reduction.
    pub fn data_shipment(&self) -> u64 {
        self.diagnostics.payload_bytes
    }

    /// Refinement rounds of the latest completed reduction.
    pub fn rounds(&self) -> usize {
        self.diagnostics.rounds
    }

    /// Compute the coarsest bisimulation partition with exact signatures.
    pub async fn exact_bisimulation_reduction<P>(
        &mut self,
        splitter: &P,
    ) -> Result<Partition<N, ExactSignature>>
    where
        P: Splitter<N, L> + ?Sized,
    {
        self.reduce(Exact, splitter).await
    }

    /// Compute a bisimulation partition with 64-bit estimated signatures.
    ///
    /// Hash collisions can merge blocks the exact reduction keeps apart.
    pub async fn estimate_bisimulation_reduction<P>(
        &mut self,
        splitter: &P,
    ) -> Result<Partition<N, EstimateSignature>>
    where
        P: Splitter<N, L> + ?Sized,
    {
        let scheme = Estimate::with_seed(self.config.estimate_seed);
        self.reduce(scheme, splitter).await
    }

    /// Run one reduction with an arbitrary signature scheme.
    pub async fn reduce<S, P>(&mut self, scheme: S, splitter: &P) -> Result<Partition<N, S::Signature>>
    where
        S: SignatureScheme,
        P: Splitter<N, L> + ?Sized,
    {
        self.diagnostics = Diagnostics::default();
        let span = telemetry::reduction_span(
            S::VARIANT,
            self.config.machine_count,
            self.graph.node_count(),
        );
        self.run(scheme, splitter).instrument(span).await
    }

    async fn run<S, P>(&mut self, scheme: S, splitter: &P) -> Result<Partition<N, S::Signature>>
    where
        S: SignatureScheme,
        P: Splitter<N, L> + ?Sized,
    {
        let machine_count = self.config.machine_count;
        let segments = splitter.split(&self.graph, machine_count);
        let used = self.graph.validate_segments(&segments, machine_count)?;
        tracing::debug!(segments = ?used, "segments assigned");

        let events = EventSink::new(self.events.clone(), Uuid::now_v7());
        let workers = Worker::create_workers(self.graph.as_ref(), &segments, scheme, events.clone())?;
        let worker_count = workers.len();

        let abort = ShutdownToken::new();
        let machines: Vec<Machine<Worker<N, S>>> = workers
            .into_iter()
            .map(|worker| Machine::new(worker.machine_id(), worker, abort.clone()))
            .collect();
        let roster: Vec<Address<Message<N, S::Signature>>> =
            machines.iter().map(Machine::address).collect();

        let (coordinator_address, coordinator_mailbox) = mailbox(MachineId::Coordinator);
        let everyone: Vec<_> = iter::once(coordinator_address.clone())
            .chain(roster.iter().cloned())
            .collect();
        let (done_tx, done_rx) = oneshot::channel();
        let coordinator = Coordinator::new(S::VARIANT, events.clone(), move |rounds, partition| {
            let _ = done_tx.send((rounds, partition));
            for address in &everyone {
                address.stop();
            }
        });
        let coordinator = Machine::with_mailbox(coordinator_mailbox, coordinator, abort.clone());

        let started = Instant::now();
        let mut handles = Vec::with_capacity(worker_count + 1);
        handles.push(tokio::spawn(coordinator.run().in_current_span()));
        for machine in machines {
            handles.push(tokio::spawn(machine.run().in_current_span()));
        }
        coordinator_address.send_me(None, Message::Coordinator { workers: roster });

        let results = join_all(handles).await;
        let elapsed = started.elapsed();

        let mut failure = None;
        let mut stats = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(Ok(machine)) => stats.push(machine),
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(join) => {
                    failure.get_or_insert(Error::MachineFailed(join.to_string()));
                }
            }
        }
        self.diagnostics = Diagnostics::from_machines(elapsed, worker_count, stats);

        if let Some(err) = failure {
            telemetry::record_reduction_failed(S::VARIANT, &err);
            events
                .emit(None, ComputationEventPayload::Aborted { reason: err.to_string() })
                .await;
            return Err(err);
        }

        let (rounds, partition) = done_rx.await.map_err(|_| Error::Incomplete)?;
        self.diagnostics.rounds = rounds;
        telemetry::record_reduction_completed(S::VARIANT, rounds, block_count(&partition), elapsed);
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::{chunk_splitter, round_robin_splitter};
    use crate::graph::Segments;

    fn two_chains() -> Arc<Graph<char, &'static str>> {
        let mut graph = Graph::new("two-chains");
        for node in ['a', 'b', 'c', 'd'] {
            graph.add_node(node, "s");
        }
        graph.add_edge('a', "x", 'b').unwrap();
        graph.add_edge('c', "x", 'd').unwrap();
        Arc::new(graph)
    }

    #[tokio::test]
    async fn test_exact_reduction_reports_diagnostics() {
        let mut partitioner = DistributedPartitioner::new(two_chains(), PartitionerConfig::new(2));
        let partition = partitioner
            .exact_bisimulation_reduction(&chunk_splitter)
            .await
            .unwrap();

        assert_eq!(partition.len(), 4);
        assert_eq!(partition[&'a'], partition[&'c']);
        assert_eq!(partition[&'b'], partition[&'d']);
        assert_ne!(partition[&'a'], partition[&'b']);

        assert_eq!(partitioner.rounds(), 1);
        let diagnostics = partitioner.diagnostics();
        assert_eq!(diagnostics.workers, 2);
        assert_eq!(diagnostics.machines.len(), 3);
        assert!(partitioner.visit_times() > 0);
        assert!(partitioner.data_shipment() >= partitioner.visit_times() * 8);
    }

    #[tokio::test]
    async fn test_unused_segments_get_no_worker() {
        let mut partitioner = DistributedPartitioner::new(two_chains(), PartitionerConfig::new(8));
        let everything_on_three = |graph: &Graph<char, &'static str>, _: usize| -> Segments<char> {
            graph.nodes().map(|node| (*node, 3)).collect()
        };
        let partition = partitioner
            .estimate_bisimulation_reduction(&everything_on_three)
            .await
            .unwrap();

        assert_eq!(partition.len(), 4);
        assert_eq!(partitioner.diagnostics().workers, 1);
    }

    #[tokio::test]
    async fn test_malformed_split_is_rejected_before_spawning() {
        let mut partitioner = DistributedPartitioner::new(two_chains(), PartitionerConfig::new(2));
        let out_of_range = |graph: &Graph<char, &'static str>, _: usize| -> Segments<char> {
            graph.nodes().map(|node| (*node, 2)).collect()
        };

        let err = partitioner
            .exact_bisimulation_reduction(&out_of_range)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SegmentOutOfRange { segment: 2, .. }));
        assert_eq!(partitioner.visit_times(), 0);
    }

    #[tokio::test]
    async fn test_zero_machines_is_rejected() {
        let mut partitioner = DistributedPartitioner::new(two_chains(), PartitionerConfig::new(0));
        let err = partitioner
            .exact_bisimulation_reduction(&round_robin_splitter)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMachines));
    }

    #[tokio::test]
    async fn test_empty_graph_completes_with_no_rounds() {
        let graph: Arc<Graph<u32, u8>> = Arc::new(Graph::new("empty"));
        let mut partitioner = DistributedPartitioner::new(graph, PartitionerConfig::new(3));
        let partition = partitioner
            .exact_bisimulation_reduction(&chunk_splitter)
            .await
            .unwrap();

        assert!(partition.is_empty());
        assert_eq!(partitioner.rounds(), 0);
        assert_eq!(partitioner.diagnostics().workers, 0);
    }
}
