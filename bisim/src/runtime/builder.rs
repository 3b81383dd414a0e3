use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::config::PartitionerConfig;
use crate::events::{EventPublisher, InProcEventBus};
use crate::graph::{Graph, Label, NodeId};

use super::partitioner::DistributedPartitioner;

/// Builder for a [`DistributedPartitioner`] with explicit dependencies.
///
/// ```ignore
/// let partitioner = DistributedPartitioner::builder(PartitionerConfig::new(4))
///     .with_graph(Arc::new(graph))
///     .with_events(bus)
///     .build()?;
/// ```
pub struct DistributedPartitionerBuilder<N, L> {
    config: PartitionerConfig,
    graph: Option<Arc<Graph<N, L>>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl<N, L> fmt::Debug for DistributedPartitionerBuilder<N, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("DistributedPartitionerBuilder");
        debug.field("config", &self.config);
        debug.field("graph_set", &self.graph.is_some());
        debug.field("events_set", &self.events.is_some());
        if self.graph.is_some() {
            debug.field("node_type", &type_name::<N>());
            debug.field("label_type", &type_name::<L>());
        }
        debug.finish()
    }
}

impl<N: NodeId, L: Label> DistributedPartitionerBuilder<N, L> {
    pub fn new(config: PartitionerConfig) -> Self {
        Self {
            config,
            graph: None,
            events: None,
        }
    }

    /// Set the graph to reduce.
    pub fn with_graph(mut self, graph: Arc<Graph<N, L>>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Override the configured machine count.
    pub fn with_machine_count(mut self, machine_count: usize) -> Self {
        self.config.machine_count = machine_count;
        self
    }

    /// Set the event publisher.
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Publish to a new in-process bus sized by the configured event
    /// capacity, and return the bus for subscribing.
    pub fn with_event_bus(self) -> (Self, Arc<InProcEventBus>) {
        let bus = Arc::new(InProcEventBus::new(self.config.event_capacity));
        let builder = self.with_events(bus.clone());
        (builder, bus)
    }

    /// Build the partitioner.
    ///
    /// # Errors
    ///
    /// Returns an error if no graph was set, or if the machine count or the
    /// event capacity is zero.
    pub fn build(self) -> anyhow::Result<DistributedPartitioner<N, L>> {
        let graph = self
            .graph
            .ok_or_else(|| anyhow::anyhow!("graph dependency missing"))?;
        if self.config.machine_count == 0 {
            anyhow::bail!("machine_count must be at least 1");
        }
        if self.config.event_capacity == 0 {
            anyhow::bail!("event_capacity must be at least 1");
        }

        let partitioner = DistributedPartitioner::new(graph, self.config);
        Ok(match self.events {
            Some(events) => partitioner.with_events(events),
            None => partitioner,
        })
    }
}
