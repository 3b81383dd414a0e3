/// Builder for constructing partitioners.
pub mod builder;
/// Coordinator handler driving the refinement phases.
pub mod coordinator;
/// Simulated machines: addresses, mailboxes and the dispatch loop.
pub mod machine;
/// Orchestration of one reduction across spawned machines.
pub mod partitioner;
/// Worker handler owning one graph segment.
pub mod worker;

pub use builder::DistributedPartitionerBuilder;
pub use coordinator::{
    CompletionCallback, Coordinator, EstimateCoordinator, ExactCoordinator, WorkerPhase,
};
pub use machine::{
    mailbox, Address, Context, Envelope, Handler, Machine, MachineId, MachineStats, Mailbox,
    Payload, ShutdownToken,
};
pub use partitioner::{Diagnostics, DistributedPartitioner};
pub use worker::{EstimateWorker, ExactWorker, Worker};
