//! Randomized layered workflows for demos and capacity experiments.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::trace::{Trace, TraceBuilder};

/// Seeded random workload: the same options always generate the same trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticWorkload {
    pub seed: u64,
    pub workflow_count: u64,
    pub tasks_per_workflow_min: u64,
    pub tasks_per_workflow_max: u64,
    pub runtime_min: u64,
    pub runtime_max: u64,
    pub cpus_min: u32,
    pub cpus_max: u32,
    /// Workflow submission times are drawn uniformly from `0..=submit_spread`.
    pub submit_spread: u64,
    /// Chance that a non-first task depends on an earlier member.
    pub dep_fraction: f64,
}

impl Default for SyntheticWorkload {
    fn default() -> SyntheticWorkload {
        SyntheticWorkload {
            seed: 42,
            workflow_count: 10,
            tasks_per_workflow_min: 2,
            tasks_per_workflow_max: 8,
            runtime_min: 1,
            runtime_max: 100,
            cpus_min: 1,
            cpus_max: 4,
            submit_spread: 1000,
            dep_fraction: 0.5,
        }
    }
}

impl SyntheticWorkload {
    pub fn generate(&self) -> Trace {
        assert!(
            (0. ..=1.).contains(&self.dep_fraction),
            "dep fraction must lie in [0, 1], got {}",
            self.dep_fraction
        );
        let mut rand = Pcg64::seed_from_u64(self.seed);
        let mut builder = Trace::builder();
        let mut next_task_id = 0u64;

        for workflow_id in 0..self.workflow_count {
            let submit = rand.gen_range(0..=self.submit_spread);
            let members = rand.gen_range(self.tasks_per_workflow_min..=self.tasks_per_workflow_max);
            let first_id = next_task_id;

            for member in 0..members {
                let deps = if member > 0 && rand.gen_bool(self.dep_fraction) {
                    vec![first_id + rand.gen_range(0..member)]
                } else {
                    vec![]
                };
                builder.add_task(
                    next_task_id,
                    workflow_id,
                    submit,
                    rand.gen_range(self.runtime_min..=self.runtime_max),
                    rand.gen_range(self.cpus_min..=self.cpus_max),
                    0,
                    &deps,
                );
                next_task_id += 1;
            }
        }

        log::info!(
            "generated {} synthetic tasks in {} workflows (seed {})",
            next_task_id,
            self.workflow_count,
            self.seed
        );
        builder.build()
    }
}
