//! Sweep machine counts over a random graph and print the measured series.
//!
//! Usage: `cargo run --example performance_sweep -- [max_machines] [repetitions]`

use std::sync::Arc;

use bisim::*;
use bisim_testkit::{random_graph, RandomGraphSpec};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let max_machines = args.next().map(|arg| arg.parse()).transpose()?.unwrap_or(8);
    let repetitions = args.next().map(|arg| arg.parse()).transpose()?.unwrap_or(5);
    let config = ExperimentConfig::new(max_machines, repetitions);

    let graph = Arc::new(random_graph(
        2024,
        RandomGraphSpec {
            nodes: 2_000,
            edges: 6_000,
            node_labels: 3,
            edge_labels: 2,
        },
    ));

    for variant in [Variant::Exact, Variant::Estimate] {
        let report =
            measure_distributed_performance(graph.clone(), variant, &hash_splitter, "hash", &config)
                .await?;
        for series in report.split() {
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
    }

    let report = measure_distributed_performance(
        graph.clone(),
        Variant::Exact,
        &chunk_splitter,
        "chunk",
        &config,
    )
    .await?;
    println!("{}", report.to_json()?);

    Ok(())
}
