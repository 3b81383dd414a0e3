//! Performance sweep comparing distributed and sequential reductions.
//!
//! For each machine count `1..=max_machines` both reductions run
//! `repetitions` times on the same graph; the report holds the averages and
//! can be split into one series per measured quantity.

use std::sync::Arc;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::config::{ExperimentConfig, PartitionerConfig};
use crate::graph::{Graph, Label, NodeId};
use crate::partition::same_blocks;
use crate::runtime::DistributedPartitioner;
use crate::sequential::GraphPartitioner;
use crate::signature::Variant;
use crate::splitter::Splitter;

/// Averages for one machine count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub machines: usize,
    pub sequential_ms: f64,
    pub distributed_ms: f64,
    /// Messages dispatched per distributed run.
    pub visit_times: f64,
    /// Simulated bytes shipped per distributed run.
    pub data_shipment: f64,
}

impl PerformanceRow {
    fn new(machines: usize) -> Self {
        Self {
            machines,
            sequential_ms: 0.0,
            distributed_ms: 0.0,
            visit_times: 0.0,
            data_shipment: 0.0,
        }
    }

    fn scale(&mut self, factor: f64) {
        self.sequential_ms *= factor;
        self.distributed_ms *= factor;
        self.visit_times *= factor;
        self.data_shipment *= factor;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub graph: String,
    pub nodes: usize,
    pub edges: usize,
    pub splitter: String,
    pub variant: Variant,
    pub repetitions: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Makespan,
    VisitTimes,
    DataShipment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub graph: String,
    pub splitter: String,
    pub variant: Variant,
    pub metric: Metric,
}

/// One measured quantity against machine count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub meta: SeriesMeta,
    /// Names of the values in each point, after the machine count.
    pub columns: Vec<String>,
    pub points: Vec<SeriesPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub machines: usize,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub meta: ReportMeta,
    pub rows: Vec<PerformanceRow>,
}

impl PerformanceReport {
    /// Makespan, visit-times and data-shipment series, in that order.
    pub fn split(&self) -> [MetricSeries; 3] {
        let series = |metric: Metric, columns: &[&str], values: &dyn Fn(&PerformanceRow) -> Vec<f64>| {
            MetricSeries {
                meta: SeriesMeta {
                    graph: self.meta.graph.clone(),
                    splitter: self.meta.splitter.clone(),
                    variant: self.meta.variant,
                    metric,
                },
                columns: columns.iter().map(|column| column.to_string()).collect(),
                points: self
                    .rows
                    .iter()
                    .map(|row| SeriesPoint {
                        machines: row.machines,
                        values: values(row),
                    })
                    .collect(),
            }
        };

        [
            series(Metric::Makespan, &["sequential_ms", "distributed_ms"], &|row| {
                vec![row.sequential_ms, row.distributed_ms]
            }),
            series(Metric::VisitTimes, &["visit_times"], &|row| vec![row.visit_times]),
            series(Metric::DataShipment, &["data_shipment"], &|row| vec![row.data_shipment]),
        ]
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Sweep machine counts and measure both reductions.
///
/// Every distributed partition is checked against the sequential one of the
/// same run; a mismatch aborts the sweep.
pub async fn measure_distributed_performance<N, L, P>(
    graph: Arc<Graph<N, L>>,
    variant: Variant,
    splitter: &P,
    splitter_name: &str,
    config: &ExperimentConfig,
) -> anyhow::Result<PerformanceReport>
where
    N: NodeId,
    L: Label,
    P: Splitter<N, L> + ?Sized,
{
    if config.max_machines == 0 {
        bail!("max_machines must be at least 1");
    }
    if config.repetitions == 0 {
        bail!("repetitions must be at least 1");
    }

    let mut rows = Vec::with_capacity(config.max_machines);
    for machines in 1..=config.max_machines {
        let mut row = PerformanceRow::new(machines);

        for _ in 0..config.repetitions {
            let mut sequential =
                GraphPartitioner::new(&graph).with_estimate_seed(config.estimate_seed);
            let mut distributed = DistributedPartitioner::new(
                Arc::clone(&graph),
                PartitionerConfig::new(machines).with_estimate_seed(config.estimate_seed),
            );

            let agrees = match variant {
                Variant::Exact => {
                    let expected = sequential.exact_bisimulation_reduction();
                    let actual = distributed.exact_bisimulation_reduction(splitter).await?;
                    same_blocks(&expected, &actual)
                }
                Variant::Estimate => {
                    let expected = sequential.estimate_bisimulation_reduction();
                    let actual = distributed.estimate_bisimulation_reduction(splitter).await?;
                    same_blocks(&expected, &actual)
                }
            };
            if !agrees {
                bail!(
                    "{variant} partition of {} on {machines} machines differs from the sequential result",
                    graph.name()
                );
            }

            row.sequential_ms += sequential.elapsed().as_secs_f64() * 1000.0;
            row.distributed_ms += distributed.diagnostics().elapsed.as_secs_f64() * 1000.0;
            row.visit_times += distributed.visit_times() as f64;
            row.data_shipment += distributed.data_shipment() as f64;
        }

        row.scale(1.0 / config.repetitions as f64);
        tracing::info!(
            graph = graph.name(),
            splitter = splitter_name,
            %variant,
            machines,
            distributed_ms = row.distributed_ms,
            visit_times = row.visit_times,
            "machine count measured"
        );
        rows.push(row);
    }

    Ok(PerformanceReport {
        meta: ReportMeta {
            graph: graph.name().to_string(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            splitter: splitter_name.to_string(),
            variant,
            repetitions: config.repetitions,
        },
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::chunk_splitter;

    fn ring(n: u32) -> Arc<Graph<u32, bool>> {
        let mut graph = Graph::new("ring");
        for node in 0..n {
            graph.add_node(node, node == 0);
        }
        for node in 0..n {
            graph.add_edge(node, true, (node + 1) % n).unwrap();
        }
        Arc::new(graph)
    }

    #[tokio::test]
    async fn test_sweep_covers_every_machine_count() {
        let config = ExperimentConfig::new(3, 2);
        let report =
            measure_distributed_performance(ring(6), Variant::Exact, &chunk_splitter, "chunk", &config)
                .await
                .unwrap();

        assert_eq!(report.rows.len(), 3);
        assert_eq!(
            report.rows.iter().map(|row| row.machines).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(report.rows.iter().all(|row| row.visit_times > 0.0));
        // more machines never ship fewer cross-segment signatures on a ring
        assert!(report.rows[2].data_shipment >= report.rows[0].data_shipment);
        assert_eq!(report.meta.nodes, 6);
        assert_eq!(report.meta.splitter, "chunk");
    }

    #[tokio::test]
    async fn test_split_tags_each_series() {
        let config = ExperimentConfig::new(2, 1);
        let report = measure_distributed_performance(
            ring(4),
            Variant::Estimate,
            &chunk_splitter,
            "chunk",
            &config,
        )
        .await
        .unwrap();

        let [makespan, visits, shipment] = report.split();
        assert_eq!(makespan.meta.metric, Metric::Makespan);
        assert_eq!(makespan.columns, vec!["sequential_ms", "distributed_ms"]);
        assert_eq!(makespan.points[1].values.len(), 2);
        assert_eq!(visits.meta.metric, Metric::VisitTimes);
        assert_eq!(shipment.meta.variant, Variant::Estimate);
        assert_eq!(shipment.points.len(), 2);

        let json = report.to_json().unwrap();
        let parsed: PerformanceReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.meta, report.meta);
    }

    #[tokio::test]
    async fn test_rejects_empty_sweep() {
        let config = ExperimentConfig::new(0, 1);
        let err = measure_distributed_performance(ring(3), Variant::Exact, &chunk_splitter, "chunk", &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max_machines"));
    }
}
