use serde::{Deserialize, Serialize};

use crate::signature::DEFAULT_ESTIMATE_SEED;

/// Configuration for a distributed reduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionerConfig {
    /// Number of simulated machines the splitter may assign segments to.
    pub machine_count: usize,
    /// Key for the estimate scheme's hashes.
    pub estimate_seed: u64,
    /// Buffer size of an event bus created by the builder.
    pub event_capacity: usize,
}

impl PartitionerConfig {
    pub fn new(machine_count: usize) -> Self {
        Self {
            machine_count,
            ..Self::default()
        }
    }

    pub fn with_estimate_seed(mut self, seed: u64) -> Self {
        self.estimate_seed = seed;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            machine_count: 1,
            estimate_seed: DEFAULT_ESTIMATE_SEED,
            event_capacity: 1024,
        }
    }
}

/// Configuration for a performance sweep over machine counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Largest machine count measured; the sweep covers `1..=max_machines`.
    pub max_machines: usize,
    /// Runs per machine count; reported figures are averages.
    pub repetitions: usize,
    /// Seed passed to estimate reductions.
    pub estimate_seed: u64,
}

impl ExperimentConfig {
    pub fn new(max_machines: usize, repetitions: usize) -> Self {
        Self {
            max_machines,
            repetitions,
            ..Self::default()
        }
    }

    pub fn with_estimate_seed(mut self, seed: u64) -> Self {
        self.estimate_seed = seed;
        self
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            max_machines: 8,
            repetitions: 10,
            estimate_seed: DEFAULT_ESTIMATE_SEED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: PartitionerConfig = serde_json::from_str(r#"{"machine_count": 4}"#).unwrap();
        assert_eq!(config.machine_count, 4);
        assert_eq!(config.estimate_seed, DEFAULT_ESTIMATE_SEED);
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_builders() {
        let config = PartitionerConfig::new(3).with_estimate_seed(7).with_event_capacity(16);
        assert_eq!((config.machine_count, config.estimate_seed, config.event_capacity), (3, 7, 16));

        let experiment = ExperimentConfig::new(4, 2).with_estimate_seed(9);
        assert_eq!(experiment.max_machines, 4);
        assert_eq!(experiment.repetitions, 2);
        assert_eq!(experiment.estimate_seed, 9);
    }
}
