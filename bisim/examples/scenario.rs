//! Reduce two small graphs on a handful of machines and print the blocks.
//!
//! Run with `RUST_LOG=bisim=debug` to follow the protocol phases.

use std::sync::Arc;

use bisim::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Bisimulation Scenario ===\n");

    // a -> b and c -> d: two blocks after one refinement round.
    let mut chains = Graph::new("disjoint-chains");
    for node in ['a', 'b', 'c', 'd'] {
        chains.add_node(node, "state");
    }
    chains.add_edge('a', "step", 'b')?;
    chains.add_edge('c', "step", 'd')?;

    let (builder, bus) = DistributedPartitioner::builder(PartitionerConfig::new(2)).with_event_bus();
    let mut events = bus.subscribe_events();
    let mut partitioner = builder.with_graph(Arc::new(chains)).build()?;

    let partition = partitioner.exact_bisimulation_reduction(&chunk_splitter).await?;
    print_blocks(partitioner.graph().name(), partition);
    println!(
        "   rounds={} messages={} bytes={} elapsed={}ms",
        partitioner.rounds(),
        partitioner.visit_times(),
        partitioner.data_shipment(),
        partitioner.elapsed_milliseconds()
    );

    println!("\n   Events:");
    while let Ok(event) = events.try_recv() {
        if !matches!(event.payload, ComputationEventPayload::RequestHandled { .. }) {
            println!("   {}", serde_json::to_string(&event.payload)?);
        }
    }

    // Six nodes without edges: labels alone decide, no round refines anything.
    let mut isolated = Graph::new("isolated");
    for node in 0..6u32 {
        isolated.add_node(node, node % 2);
    }
    let mut partitioner = DistributedPartitioner::new(Arc::new(isolated), PartitionerConfig::new(3));
    let partition = partitioner
        .estimate_bisimulation_reduction(&round_robin_splitter)
        .await?;
    println!();
    print_blocks(partitioner.graph().name(), partition);
    println!("   rounds={}", partitioner.rounds());

    Ok(())
}

fn print_blocks<N: Ord + std::fmt::Debug, S: Eq + std::hash::Hash>(name: &str, partition: Partition<N, S>) {
    let mut blocks = into_blocks(partition);
    for block in &mut blocks {
        block.sort();
    }
    blocks.sort();
    println!("{name}: {} blocks", blocks.len());
    for block in blocks {
        println!("   {block:?}");
    }
}
