use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::runtime::{MachineId, WorkerPhase};
use crate::signature::Variant;

/// Metadata attached to every computation event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    /// Identifies one reduction run; all of its events share it.
    pub computation_id: Uuid,
    /// Machine that emitted the event, `None` for the partitioner itself.
    pub machine: Option<MachineId>,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(computation_id: Uuid, machine: Option<MachineId>) -> Self {
        Self {
            version: 1,
            computation_id,
            machine,
            timestamp: Utc::now(),
        }
    }
}

/// Event emitted while a reduction runs.
#[derive(Clone, Debug, Serialize)]
pub struct ComputationEvent {
    pub meta: EventMeta,
    pub payload: ComputationEventPayload,
}

/// Observable protocol transitions.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ComputationEventPayload {
    /// The coordinator received its roster.
    Started { variant: Variant, workers: usize },
    /// The coordinator sent `phase` requests to every worker.
    PhaseStarted { round: usize, phase: WorkerPhase },
    /// All workers reported their local blocks for `round`.
    BlocksCounted {
        round: usize,
        blocks: usize,
        previous: usize,
    },
    /// The block count stopped growing.
    FixpointReached { rounds: usize, blocks: usize },
    /// The completion callback ran.
    Completed { rounds: usize, nodes: usize },
    /// A worker finished a request and is about to reply.
    RequestHandled { request: &'static str },
    /// A machine failed and the computation was torn down.
    Aborted { reason: String },
}

/// Publishes computation events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all subscribers.
    async fn publish(&self, event: ComputationEvent) -> anyhow::Result<()>;
}

/// Subscribes to computation events.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<ComputationEvent>;
}

/// In-process event bus over a tokio broadcast channel.
///
/// Publishing never waits for subscribers. A subscriber that falls more than
/// `capacity` events behind receives `RecvError::Lagged`.
pub struct InProcEventBus {
    sender: broadcast::Sender<ComputationEvent>,
    capacity: usize,
}

impl fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber. A
    /// capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish without awaiting. Events with no subscriber are dropped.
    pub fn publish_event(&self, event: ComputationEvent) -> anyhow::Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ComputationEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for InProcEventBus {
    async fn publish(&self, event: ComputationEvent) -> anyhow::Result<()> {
        self.publish_event(event)
    }
}

impl EventSubscriber for InProcEventBus {
    fn subscribe(&self) -> broadcast::Receiver<ComputationEvent> {
        self.subscribe_events()
    }
}

/// Event publisher bound to one computation.
///
/// Cloned into every machine of a reduction. Without a publisher, emitting
/// is a no-op.
#[derive(Clone)]
pub struct EventSink {
    publisher: Option<Arc<dyn EventPublisher>>,
    computation_id: Uuid,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("computation_id", &self.computation_id)
            .field("enabled", &self.publisher.is_some())
            .finish()
    }
}

impl EventSink {
    pub fn new(publisher: Option<Arc<dyn EventPublisher>>, computation_id: Uuid) -> Self {
        Self {
            publisher,
            computation_id,
        }
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self::new(None, Uuid::nil())
    }

    pub fn computation_id(&self) -> Uuid {
        self.computation_id
    }

    pub async fn emit(&self, machine: Option<MachineId>, payload: ComputationEventPayload) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let event = ComputationEvent {
            meta: EventMeta::new(self.computation_id, machine),
            payload,
        };
        if let Err(err) = publisher.publish(event).await {
            tracing::warn!(error = %err, "failed to publish computation event");
        }
    }
}
