use crate::runtime::MachineId;

/// Errors that abort a partition computation.
///
/// None of these are transient: the simulation has no network, so every
/// error is either a malformed input or a broken protocol invariant and is
/// propagated to the caller of the reduction.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The machine count passed to the partitioner was zero.
    #[error("machine count must be at least 1")]
    NoMachines,

    /// The splitter left a graph node without a segment.
    #[error("splitter did not assign node {node} to a segment")]
    UnassignedNode {
        /// Debug rendering of the unassigned node.
        node: String,
    },

    /// The splitter assigned a node that does not exist in the graph.
    #[error("splitter assigned unknown node {node}")]
    UnknownNode {
        /// Debug rendering of the unknown node.
        node: String,
    },

    /// The splitter used a segment id outside `[0, machine_count)`.
    #[error("segment id {segment} for node {node} is out of range for {machine_count} machines")]
    SegmentOutOfRange {
        /// Debug rendering of the offending node.
        node: String,
        /// The out-of-range segment id.
        segment: usize,
        /// The requested machine count.
        machine_count: usize,
    },

    /// An edge referenced an endpoint that was never added to the graph.
    #[error("edge endpoint {node} is not a node of the graph")]
    DanglingEdge {
        /// Debug rendering of the missing endpoint.
        node: String,
    },

    /// A machine received a message its handler does not accept in its
    /// current state.
    #[error("protocol violation on {machine}: {reason}")]
    ProtocolViolation {
        /// Machine that detected the violation.
        machine: MachineId,
        /// Human-readable description.
        reason: String,
    },

    /// Two workers reported the same node during collection.
    #[error("node {node} was reported by more than one worker")]
    DuplicateNode {
        /// Debug rendering of the duplicated node.
        node: String,
    },

    /// A machine task panicked or was cancelled by the runtime.
    #[error("machine task failed: {0}")]
    MachineFailed(String),

    /// All machines stopped without the completion callback firing.
    #[error("computation stopped before a partition was produced")]
    Incomplete,
}

impl Error {
    pub(crate) fn protocol(machine: MachineId, reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            machine,
            reason: reason.into(),
        }
    }
}

/// Result alias for partition computations.
pub type Result<T> = std::result::Result<T, Error>;
