//! Machines, clusters and the environment-sizing heuristic.

use crate::trace::Trace;

pub type MachineIndex = usize;
pub type ClusterIndex = usize;

/// A machine with a bounded CPU count. Immutable; the mutable free-CPU view
/// lives in [`crate::machine_state::MachineStates`].
#[derive(Debug, Clone)]
pub struct Machine {
    pub id: MachineIndex,
    pub cluster: ClusterIndex,
    pub cpus: u32,
    /// Reserved for a future revision; never enforced.
    pub memory: u64,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterIndex,
    pub machines: Vec<MachineIndex>,
}

/// Owns all machines and clusters. Machines are indexed contiguously from
/// zero across cluster boundaries.
pub struct Environment {
    machines: Vec<Machine>,
    clusters: Vec<Cluster>,
}

impl Environment {
    pub fn single_cluster(machine_count: usize, cpus: u32, memory: u64) -> Environment {
        Environment::from_cpu_counts(&vec![cpus; machine_count], memory)
    }

    /// One cluster of machines with individual CPU counts.
    pub fn from_cpu_counts(cpus: &[u32], memory: u64) -> Environment {
        let machines = cpus
            .iter()
            .enumerate()
            .map(|(id, &cpus)| {
                assert!(cpus > 0, "machine {} must have a positive cpu count", id);
                Machine {
                    id,
                    cluster: 0,
                    cpus,
                    memory,
                }
            })
            .collect::<Vec<_>>();
        let clusters = vec![Cluster {
            id: 0,
            machines: (0..cpus.len()).collect(),
        }];
        Environment { machines, clusters }
    }

    pub fn machine(&self, machine: MachineIndex) -> &Machine {
        self.machines
            .get(machine)
            .unwrap_or_else(|| panic!("unknown machine index {}", machine))
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }
}

/// Chooses a machine count either explicitly or from a target utilization:
/// the cluster is sized so the trace's aggregate CPU-time demand fills the
/// fraction `rho` of the cluster's capacity over the ideal makespan horizon.
pub struct EnvironmentBuilder {
    machine_count: Option<usize>,
    target_utilization: Option<f64>,
    cpus_per_machine: u32,
    memory_per_machine: u64,
}

impl EnvironmentBuilder {
    pub fn new(cpus_per_machine: u32, memory_per_machine: u64) -> EnvironmentBuilder {
        EnvironmentBuilder {
            machine_count: None,
            target_utilization: None,
            cpus_per_machine,
            memory_per_machine,
        }
    }

    pub fn with_machine_count(mut self, count: usize) -> Self {
        self.machine_count = Some(count);
        self
    }

    pub fn with_target_utilization(mut self, rho: f64) -> Self {
        assert!(
            rho > 0. && rho <= 1.,
            "target utilization must lie in (0, 1], got {}",
            rho
        );
        self.target_utilization = Some(rho);
        self
    }

    pub fn build(&self, trace: &Trace) -> Environment {
        let peak_demand = trace.tasks().iter().map(|t| t.cpus).max().unwrap_or(1);
        let cpus = self.cpus_per_machine.max(peak_demand);
        if cpus > self.cpus_per_machine {
            log::info!(
                "raising cpus per machine from {} to the peak task demand {}",
                self.cpus_per_machine,
                cpus
            );
        }

        let count = match (self.machine_count, self.target_utilization) {
            (Some(count), _) => count,
            (None, Some(rho)) => sized_machine_count(trace, cpus, rho),
            (None, None) => panic!("environment builder needs a machine count or a target utilization"),
        };

        log::info!("environment: {} machines with {} cpus each", count, cpus);
        Environment::single_cluster(count, cpus, self.memory_per_machine)
    }
}

fn sized_machine_count(trace: &Trace, cpus_per_machine: u32, rho: f64) -> usize {
    let total_work: u64 = trace.tasks().iter().map(|t| t.runtime * t.cpus as u64).sum();
    let t_start = trace.tasks().iter().map(|t| t.submit_time).min().unwrap_or(0);
    let t_end = trace.earliest_finish_times().into_iter().max().unwrap_or(0);
    let horizon = t_end.saturating_sub(t_start);

    if total_work == 0 || horizon == 0 {
        return 1;
    }

    let denom = horizon as f64 * cpus_per_machine as f64 * rho;
    (total_work as f64 / denom).ceil().max(1.) as usize
}
