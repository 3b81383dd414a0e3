use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::{ComputationEventPayload, EventSink};
use crate::graph::NodeId;
use crate::message::Message;
use crate::partition::Partition;
use crate::runtime::machine::{Address, Context, Envelope, Handler, MachineId, Payload};
use crate::signature::{EstimateSignature, ExactSignature, Signature, Variant};

/// What the coordinator is waiting for from a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    /// Sent `Clear` or `Refine`, expecting `Refined`.
    Refining,
    /// Sent `Share`, expecting `Shared`.
    Sharing,
    /// Sent `Count`, expecting `Counted`.
    Counting,
    /// Sent `SegmentRequest`, expecting `SegmentResponse`.
    Collecting,
    /// Nothing outstanding.
    Waiting,
}

/// Called once with the round count and the assembled partition.
pub type CompletionCallback<N, S> = Box<dyn FnOnce(usize, Partition<N, S>) + Send>;

/// Drives workers through refinement rounds with phase barriers.
///
/// Every phase is a broadcast followed by a barrier: the next phase starts
/// only after every worker has answered the current one. Rounds continue
/// while the global number of distinct signatures keeps growing.
pub struct Coordinator<N, S> {
    variant: Variant,
    workers: Vec<Address<Message<N, S>>>,
    phases: Vec<WorkerPhase>,
    /// Share batches waiting to be attached to the next `Refine`, per worker.
    relay: Vec<Vec<(N, S)>>,
    rounds: usize,
    previous_blocks: usize,
    blocks: HashSet<S>,
    partition: Partition<N, S>,
    on_complete: Option<CompletionCallback<N, S>>,
    events: EventSink,
}

/// Coordinator for exact reductions.
pub type ExactCoordinator<N> = Coordinator<N, ExactSignature>;

/// Coordinator for estimated reductions.
pub type EstimateCoordinator<N> = Coordinator<N, EstimateSignature>;

impl<N, S> fmt::Debug for Coordinator<N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("variant", &self.variant)
            .field("workers", &self.workers.len())
            .field("phases", &self.phases)
            .field("rounds", &self.rounds)
            .field("previous_blocks", &self.previous_blocks)
            .field("completed", &self.on_complete.is_none())
            .finish()
    }
}

impl<N: NodeId, S: Signature> Coordinator<N, S> {
    pub fn new<F>(variant: Variant, events: EventSink, on_complete: F) -> Self
    where
        F: FnOnce(usize, Partition<N, S>) + Send + 'static,
    {
        Self {
            variant,
            workers: Vec::new(),
            phases: Vec::new(),
            relay: Vec::new(),
            rounds: 0,
            previous_blocks: 0,
            blocks: HashSet::new(),
            partition: Partition::new(),
            on_complete: Some(Box::new(on_complete)),
            events,
        }
    }

    /// Refinement rounds that increased the block count so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn phases(&self) -> &[WorkerPhase] {
        &self.phases
    }

    fn all_waiting(&self) -> bool {
        self.phases.iter().all(|phase| *phase == WorkerPhase::Waiting)
    }

    async fn start(&mut self, ctx: &Context<Message<N, S>>, workers: Vec<Address<Message<N, S>>>) {
        self.rounds = 0;
        self.previous_blocks = 0;
        self.blocks.clear();
        self.partition.clear();
        self.phases = vec![WorkerPhase::Waiting; workers.len()];
        self.relay = workers.iter().map(|_| Vec::new()).collect();
        self.workers = workers;

        tracing::info!(workers = self.workers.len(), variant = %self.variant, "reduction started");
        self.events
            .emit(
                Some(MachineId::Coordinator),
                ComputationEventPayload::Started {
                    variant: self.variant,
                    workers: self.workers.len(),
                },
            )
            .await;

        if self.workers.is_empty() {
            self.complete().await;
            return;
        }
        let clears = self.workers.iter().map(|_| Message::Clear).collect();
        self.broadcast(ctx, WorkerPhase::Refining, clears).await;
    }

    /// Record a response from `sender`, which must be a roster worker in
    /// `expected` phase.
    fn acknowledge(
        &mut self,
        sender: Option<&Address<Message<N, S>>>,
        expected: WorkerPhase,
        response: &'static str,
    ) -> Result<usize> {
        let index = match sender.map(Address::id) {
            Some(MachineId::Worker(index)) if index < self.phases.len() => index,
            other => {
                return Err(Error::protocol(
                    MachineId::Coordinator,
                    format!("{response} from unexpected sender {other:?}"),
                ));
            }
        };
        if self.phases[index] != expected {
            return Err(Error::protocol(
                MachineId::Coordinator,
                format!(
                    "{response} from worker-{index} while it is {:?}, expected {expected:?}",
                    self.phases[index]
                ),
            ));
        }
        self.phases[index] = WorkerPhase::Waiting;
        Ok(index)
    }

    async fn broadcast(
        &mut self,
        ctx: &Context<Message<N, S>>,
        phase: WorkerPhase,
        messages: Vec<Message<N, S>>,
    ) {
        tracing::debug!(round = self.rounds, ?phase, "phase started");
        self.events
            .emit(
                Some(MachineId::Coordinator),
                ComputationEventPayload::PhaseStarted {
                    round: self.rounds,
                    phase,
                },
            )
            .await;

        for ((worker, slot), message) in self.workers.iter().zip(self.phases.iter_mut()).zip(messages) {
            *slot = phase;
            ctx.send(worker, message);
        }
    }

    async fn on_counted(&mut self, ctx: &Context<Message<N, S>>) {
        let blocks = self.blocks.len();
        self.events
            .emit(
                Some(MachineId::Coordinator),
                ComputationEventPayload::BlocksCounted {
                    round: self.rounds,
                    blocks,
                    previous: self.previous_blocks,
                },
            )
            .await;

        if blocks > self.previous_blocks {
            self.rounds += 1;
            tracing::debug!(round = self.rounds, blocks, "block count grew, refining");
            let refines = self
                .relay
                .iter_mut()
                .map(|batch| Message::Refine {
                    foreign: std::mem::take(batch),
                })
                .collect();
            self.broadcast(ctx, WorkerPhase::Refining, refines).await;
        } else {
            // The last round refined without splitting any block.
            self.rounds = self.rounds.saturating_sub(1);
            tracing::debug!(rounds = self.rounds, blocks, "fixpoint reached");
            self.events
                .emit(
                    Some(MachineId::Coordinator),
                    ComputationEventPayload::FixpointReached {
                        rounds: self.rounds,
                        blocks,
                    },
                )
                .await;
            let requests = self.workers.iter().map(|_| Message::SegmentRequest).collect();
            self.broadcast(ctx, WorkerPhase::Collecting, requests).await;
        }
    }

    async fn complete(&mut self) {
        let partition = std::mem::take(&mut self.partition);
        tracing::info!(rounds = self.rounds, nodes = partition.len(), "reduction completed");
        self.events
            .emit(
                Some(MachineId::Coordinator),
                ComputationEventPayload::Completed {
                    rounds: self.rounds,
                    nodes: partition.len(),
                },
            )
            .await;

        match self.on_complete.take() {
            Some(callback) => callback(self.rounds, partition),
            None => tracing::warn!("completion callback already consumed"),
        }
    }
}

#[async_trait]
impl<N: NodeId, S: Signature> Handler for Coordinator<N, S> {
    type Message = Message<N, S>;

    async fn handle(
        &mut self,
        ctx: &Context<Self::Message>,
        envelope: Envelope<Self::Message>,
    ) -> Result<()> {
        let Envelope { sender, message } = envelope;
        let response = message.kind();

        match message {
            Message::Coordinator { workers } => self.start(ctx, workers).await,
            Message::Refined => {
                self.acknowledge(sender.as_ref(), WorkerPhase::Refining, response)?;
                if self.all_waiting() {
                    let shares = self.workers.iter().map(|_| Message::Share).collect();
                    self.broadcast(ctx, WorkerPhase::Sharing, shares).await;
                }
            }
            Message::Shared { outbox } => {
                let from = self.acknowledge(sender.as_ref(), WorkerPhase::Sharing, response)?;
                for (target, batch) in outbox {
                    let slot = self.relay.get_mut(target).ok_or_else(|| {
                        Error::protocol(
                            MachineId::Coordinator,
                            format!("worker-{from} shared with unknown worker-{target}"),
                        )
                    })?;
                    slot.extend(batch);
                }
                if self.all_waiting() {
                    self.previous_blocks = self.blocks.len();
                    self.blocks.clear();
                    let counts = self.workers.iter().map(|_| Message::Count).collect();
                    self.broadcast(ctx, WorkerPhase::Counting, counts).await;
                }
            }
            Message::Counted { blocks } => {
                self.acknowledge(sender.as_ref(), WorkerPhase::Counting, response)?;
                self.blocks.extend(blocks);
                if self.all_waiting() {
                    self.on_counted(ctx).await;
                }
            }
            Message::SegmentResponse { pairs } => {
                self.acknowledge(sender.as_ref(), WorkerPhase::Collecting, response)?;
                for (node, signature) in pairs {
                    if self.partition.contains_key(&node) {
                        return Err(Error::DuplicateNode {
                            node: format!("{node:?}"),
                        });
                    }
                    self.partition.insert(node, signature);
                }
                if self.all_waiting() {
                    self.complete().await;
                }
            }
            other => {
                return Err(Error::protocol(
                    MachineId::Coordinator,
                    format!("coordinator does not handle {}", other.kind()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::machine::{mailbox, Machine, Mailbox, ShutdownToken};
    use std::sync::Arc;
    use std::time::Duration;

    type Msg = Message<u32, EstimateSignature>;
    type Captured = Arc<parking_lot::Mutex<Option<(usize, Partition<u32, EstimateSignature>)>>>;

    fn coordinator(captured: &Captured) -> EstimateCoordinator<u32> {
        let captured = Arc::clone(captured);
        Coordinator::new(Variant::Estimate, EventSink::disabled(), move |rounds, partition| {
            *captured.lock() = Some((rounds, partition));
        })
    }

    async fn next(inbox: &mut Mailbox<Msg>) -> Envelope<Msg> {
        tokio::time::timeout(Duration::from_secs(1), inbox.recv())
            .await
            .expect("message expected")
            .expect("mailbox open")
    }

    #[tokio::test]
    async fn test_empty_roster_completes_immediately() {
        let captured = Captured::default();
        let machine = Machine::new(MachineId::Coordinator, coordinator(&captured), ShutdownToken::new());
        let address = machine.address();
        address.send_me(None, Message::Coordinator { workers: Vec::new() });

        let task = tokio::spawn(machine.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        address.stop();
        task.await.unwrap().unwrap();

        let (rounds, partition) = captured.lock().take().expect("callback should fire");
        assert_eq!(rounds, 0);
        assert!(partition.is_empty());
    }

    #[tokio::test]
    async fn test_drives_single_worker_to_completion() {
        let captured = Captured::default();
        let machine = Machine::new(MachineId::Coordinator, coordinator(&captured), ShutdownToken::new());
        let coordinator_address = machine.address();
        let task = tokio::spawn(machine.run());

        let (worker, mut inbox) = mailbox::<Msg>(MachineId::Worker(0));
        coordinator_address.send_me(None, Message::Coordinator { workers: vec![worker.clone()] });

        // clear, share, count with two blocks
        assert!(matches!(next(&mut inbox).await.message, Message::Clear));
        coordinator_address.send_me(Some(worker.clone()), Message::Refined);
        assert!(matches!(next(&mut inbox).await.message, Message::Share));
        coordinator_address.send_me(Some(worker.clone()), Message::Shared { outbox: Vec::new() });
        assert!(matches!(next(&mut inbox).await.message, Message::Count));
        let blocks = [EstimateSignature(1), EstimateSignature(2)].into_iter().collect();
        coordinator_address.send_me(Some(worker.clone()), Message::Counted { blocks });

        // count grew from 0 to 2: refine round 1
        assert!(matches!(next(&mut inbox).await.message, Message::Refine { .. }));
        coordinator_address.send_me(Some(worker.clone()), Message::Refined);
        assert!(matches!(next(&mut inbox).await.message, Message::Share));
        coordinator_address.send_me(Some(worker.clone()), Message::Shared { outbox: Vec::new() });
        assert!(matches!(next(&mut inbox).await.message, Message::Count));
        let blocks = [EstimateSignature(3), EstimateSignature(4)].into_iter().collect();
        coordinator_address.send_me(Some(worker.clone()), Message::Counted { blocks });

        // no growth: collect
        assert!(matches!(next(&mut inbox).await.message, Message::SegmentRequest));
        let pairs = vec![(7, EstimateSignature(3)), (8, EstimateSignature(4))];
        coordinator_address.send_me(Some(worker), Message::SegmentResponse { pairs });

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator_address.stop();
        task.await.unwrap().unwrap();

        let (rounds, partition) = captured.lock().take().expect("callback should fire");
        assert_eq!(rounds, 0);
        assert_eq!(partition.len(), 2);
    }

    #[tokio::test]
    async fn test_relays_shared_batches_into_next_refine() {
        let captured = Captured::default();
        let machine = Machine::new(MachineId::Coordinator, coordinator(&captured), ShutdownToken::new());
        let address = machine.address();
        let task = tokio::spawn(machine.run());

        let (w0, mut in0) = mailbox::<Msg>(MachineId::Worker(0));
        let (w1, mut in1) = mailbox::<Msg>(MachineId::Worker(1));
        address.send_me(None, Message::Coordinator { workers: vec![w0.clone(), w1.clone()] });

        for (worker, inbox) in [(&w0, &mut in0), (&w1, &mut in1)] {
            assert!(matches!(next(inbox).await.message, Message::Clear));
            address.send_me(Some(worker.clone()), Message::Refined);
        }
        for inbox in [&mut in0, &mut in1] {
            assert!(matches!(next(inbox).await.message, Message::Share));
        }
        address.send_me(
            Some(w0.clone()),
            Message::Shared { outbox: vec![(1, vec![(10, EstimateSignature(5))])] },
        );
        address.send_me(Some(w1.clone()), Message::Shared { outbox: Vec::new() });
        for (worker, inbox) in [(&w0, &mut in0), (&w1, &mut in1)] {
            assert!(matches!(next(inbox).await.message, Message::Count));
            let blocks = [EstimateSignature(5)].into_iter().collect();
            address.send_me(Some(worker.clone()), Message::Counted { blocks });
        }

        match next(&mut in1).await.message {
            Message::Refine { foreign } => assert_eq!(foreign, vec![(10, EstimateSignature(5))]),
            other => panic!("expected refine, got {other:?}"),
        }
        match next(&mut in0).await.message {
            Message::Refine { foreign } => assert!(foreign.is_empty()),
            other => panic!("expected refine, got {other:?}"),
        }

        address.stop();
        task.await.unwrap().unwrap();
        assert!(captured.lock().is_none());
    }

    #[tokio::test]
    async fn test_out_of_phase_response_is_rejected() {
        let captured = Captured::default();
        let machine = Machine::new(MachineId::Coordinator, coordinator(&captured), ShutdownToken::new());
        let address = machine.address();
        let (worker, _inbox) = mailbox::<Msg>(MachineId::Worker(0));
        address.send_me(None, Message::Coordinator { workers: vec![worker.clone()] });
        address.send_me(Some(worker), Message::Counted { blocks: HashSet::new() });

        let err = machine.run().await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { machine: MachineId::Coordinator, .. }));
        assert!(captured.lock().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_node_is_rejected() {
        let captured = Captured::default();
        let machine = Machine::new(MachineId::Coordinator, coordinator(&captured), ShutdownToken::new());
        let address = machine.address();
        let task = tokio::spawn(machine.run());

        let (w0, mut in0) = mailbox::<Msg>(MachineId::Worker(0));
        address.send_me(None, Message::Coordinator { workers: vec![w0.clone()] });
        assert!(matches!(next(&mut in0).await.message, Message::Clear));
        address.send_me(Some(w0.clone()), Message::Refined);
        assert!(matches!(next(&mut in0).await.message, Message::Share));
        address.send_me(Some(w0.clone()), Message::Shared { outbox: Vec::new() });
        assert!(matches!(next(&mut in0).await.message, Message::Count));
        address.send_me(Some(w0.clone()), Message::Counted { blocks: HashSet::new() });
        assert!(matches!(next(&mut in0).await.message, Message::SegmentRequest));
        let pairs = vec![(1, EstimateSignature(1)), (1, EstimateSignature(1))];
        address.send_me(Some(w0), Message::SegmentResponse { pairs });

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::DuplicateNode { .. }));
    }
}
