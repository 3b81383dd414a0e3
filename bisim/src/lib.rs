//! Bisim - simulated distributed bisimulation partitioning.
//!
//! Computes the coarsest bisimulation partition of a labeled directed graph
//! by splitting it across simulated machines that only talk through
//! mailboxes. Every machine is a tokio task; the run reports how many
//! messages and how many payload bytes the protocol needed, next to a
//! sequential baseline.
//!
//! # Core Concepts
//!
//! - **Machine**: a mailbox plus a [`Handler`](runtime::Handler), dispatched
//!   one message at a time until stopped. Counts messages and simulated
//!   payload bytes.
//!
//! - **Worker**: owns one graph segment and computes per-node signatures for
//!   each refinement round.
//!
//! - **Coordinator**: drives the workers through barrier-separated phases
//!   (refine, share, count) and stops when the number of blocks stops
//!   growing, then collects the partition.
//!
//! - **Signature schemes**: [`Exact`] digests and [`Estimate`] 64-bit sketches.
//!
//! - **Partitioners**: [`DistributedPartitioner`] runs the machines,
//!   [`GraphPartitioner`] is the single-loop baseline.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bisim::*;
//!
//! let mut graph = Graph::new("chains");
//! for node in ['a', 'b', 'c', 'd'] {
//!     graph.add_node(node, "state");
//! }
//! graph.add_edge('a', "step", 'b')?;
//! graph.add_edge('c', "step", 'd')?;
//!
//! let mut partitioner = DistributedPartitioner::new(Arc::new(graph), PartitionerConfig::new(2));
//! let partition = partitioner.exact_bisimulation_reduction(&chunk_splitter).await?;
//! assert_eq!(partition[&'a'], partition[&'c']);
//! ```

/// Configuration for partitioners and experiment sweeps.
pub mod config;

/// Error type shared by all reductions.
pub mod error;

/// Computation events and the in-process event bus.
///
/// Provides [`EventPublisher`] and [`EventSubscriber`], the
/// [`ComputationEvent`] payloads and [`InProcEventBus`].
pub mod events;

/// Performance sweep over machine counts.
pub mod experiment;

/// Labeled directed multigraph and segment validation.
pub mod graph;

/// Protocol messages and their simulated wire size.
pub mod message;

/// Partition type and block-structure comparisons.
pub mod partition;

/// Machines, coordinator, workers and the distributed partitioner.
pub mod runtime;

/// Sequential baseline reduction.
pub mod sequential;

/// Exact and estimated signature schemes.
pub mod signature;

/// Reference splitters.
pub mod splitter;

/// Tracing spans and recording helpers.
pub mod telemetry;

#[cfg(feature = "metrics")]
/// Prometheus metrics.
pub mod metrics;

pub use config::*;
pub use error::{Error, Result};
pub use events::*;
pub use experiment::*;
pub use graph::*;
pub use message::Message;
pub use partition::*;
pub use runtime::{
    DistributedPartitioner, DistributedPartitionerBuilder, EstimateCoordinator, EstimateWorker,
    ExactCoordinator, ExactWorker, MachineId, ShutdownToken, WorkerPhase,
};
pub use sequential::GraphPartitioner;
pub use signature::*;
pub use splitter::*;
