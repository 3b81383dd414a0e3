//! Messages exchanged between the coordinator and its workers.

use std::collections::HashSet;
use std::mem::size_of;

use crate::runtime::{Address, Payload};
use crate::signature::Signature;

/// Fixed cost of every message on the simulated wire.
pub const HEADER_BYTES: usize = 8;

/// Cost of one roster entry or one batch header.
pub const ENTRY_BYTES: usize = 8;

/// Protocol messages.
///
/// Requests flow from the coordinator to workers, responses flow back. The
/// set is closed; a machine that receives a variant it does not handle fails
/// with a protocol violation.
#[derive(Debug)]
pub enum Message<N, S> {
    /// Starts a computation with the given worker roster.
    Coordinator { workers: Vec<Address<Message<N, S>>> },
    /// Reset every local node to its round-0 signature.
    Clear,
    /// Run one refinement round. `foreign` carries the latest signatures of
    /// remote successors, relayed from the previous share phase.
    Refine { foreign: Vec<(N, S)> },
    /// Acknowledges `Clear` or `Refine`.
    Refined,
    /// Export signatures of nodes that other workers reference.
    Share,
    /// Signatures to forward, batched per target worker index.
    Shared { outbox: Vec<(usize, Vec<(N, S)>)> },
    /// Report the distinct local signatures.
    Count,
    Counted { blocks: HashSet<S> },
    /// Report the final signature of every local node.
    SegmentRequest,
    SegmentResponse { pairs: Vec<(N, S)> },
}

impl<N, S: Signature> Message<N, S> {
    fn pair_bytes() -> usize {
        size_of::<N>() + S::WIRE_BYTES
    }
}

impl<N, S: Signature> Payload for Message<N, S> {
    fn kind(&self) -> &'static str {
        match self {
            Message::Coordinator { .. } => "coordinator",
            Message::Clear => "clear",
            Message::Refine { .. } => "refine",
            Message::Refined => "refined",
            Message::Share => "share",
            Message::Shared { .. } => "shared",
            Message::Count => "count",
            Message::Counted { .. } => "counted",
            Message::SegmentRequest => "segment_request",
            Message::SegmentResponse { .. } => "segment_response",
        }
    }

    fn payload_size(&self) -> usize {
        let body = match self {
            Message::Coordinator { workers } => workers.len() * ENTRY_BYTES,
            Message::Refine { foreign } => foreign.len() * Self::pair_bytes(),
            Message::Shared { outbox } => outbox
                .iter()
                .map(|(_, batch)| ENTRY_BYTES + batch.len() * Self::pair_bytes())
                .sum(),
            Message::Counted { blocks } => blocks.len() * S::WIRE_BYTES,
            Message::SegmentResponse { pairs } => pairs.len() * Self::pair_bytes(),
            Message::Clear
            | Message::Refined
            | Message::Share
            | Message::Count
            | Message::SegmentRequest => 0,
        };
        HEADER_BYTES + body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{EstimateSignature, ExactSignature};

    type Estimated = Message<u32, EstimateSignature>;

    #[test]
    fn test_control_messages_cost_only_the_header() {
        for message in [
            Estimated::Clear,
            Estimated::Refined,
            Estimated::Share,
            Estimated::Count,
            Estimated::SegmentRequest,
        ] {
            assert_eq!(message.payload_size(), HEADER_BYTES, "{}", message.kind());
        }
    }

    #[test]
    fn test_payload_size_scales_with_content() {
        let pairs = vec![(1u32, EstimateSignature(1)), (2, EstimateSignature(2))];
        assert_eq!(
            Estimated::SegmentResponse { pairs: pairs.clone() }.payload_size(),
            HEADER_BYTES + 2 * (4 + 8)
        );
        assert_eq!(
            Estimated::Shared {
                outbox: vec![(1, pairs), (2, Vec::new())]
            }
            .payload_size(),
            HEADER_BYTES + (ENTRY_BYTES + 24) + ENTRY_BYTES
        );

        let blocks: HashSet<ExactSignature> = HashSet::new();
        assert_eq!(
            Message::<u64, ExactSignature>::Counted { blocks }.payload_size(),
            HEADER_BYTES
        );
        assert_eq!(
            Message::<u64, ExactSignature>::Refine { foreign: Vec::new() }.kind(),
            "refine"
        );
    }
}
