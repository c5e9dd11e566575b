//! Experiment configuration, loadable from YAML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::workload::synthetic::SyntheticWorkload;

/// Everything one run needs: the trace source, the environment shape and the
/// policy selection. Hosts may load it from a file, build it from CLI flags,
/// or both (flags override file values).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub trace_paths: Vec<PathBuf>,
    /// Used instead of `trace_paths` when set.
    #[serde(default)]
    pub synthetic: Option<SyntheticWorkload>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub machine_count: Option<usize>,
    #[serde(default)]
    pub target_utilization: Option<f64>,
    #[serde(default = "default_cpus_per_machine")]
    pub cpus_per_machine: u32,
    /// Reserved; carried through to machines but never enforced.
    #[serde(default)]
    pub memory_per_machine: u64,
    #[serde(default)]
    pub task_order_policy: Option<String>,
    #[serde(default)]
    pub task_placement_policy: Option<String>,
    #[serde(default)]
    pub trace_reader: Option<String>,
    #[serde(default)]
    pub sampling_fraction: Option<f64>,
}

fn default_cpus_per_machine() -> u32 {
    1
}

impl Default for SimulationConfig {
    fn default() -> SimulationConfig {
        SimulationConfig {
            trace_paths: Vec::new(),
            synthetic: None,
            output_dir: None,
            machine_count: None,
            target_utilization: None,
            cpus_per_machine: default_cpus_per_machine(),
            memory_per_machine: 0,
            task_order_policy: None,
            task_placement_policy: None,
            trace_reader: None,
            sampling_fraction: None,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> SimulationConfig {
        serde_yaml::from_str(
            &std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("Can't read file {}: {}", path.display(), e)),
        )
        .unwrap_or_else(|reason| panic!("Can't parse YAML from file {}: {}", path.display(), reason))
    }
}
