//! Per-machine free-CPU counters and running-task sets.

use rustc_hash::FxHashSet;

use crate::environment::{Environment, MachineIndex};
use crate::trace::{TaskIndex, Trace};

/// Mutable view over the machines of an [`Environment`]. Holds, for every
/// machine, `free_cpus = cpus - Σ demand of running tasks`.
pub struct MachineStates {
    capacity: Vec<u32>,
    free: Vec<u32>,
    running: Vec<FxHashSet<TaskIndex>>,
}

impl MachineStates {
    pub fn new(env: &Environment) -> MachineStates {
        let capacity: Vec<u32> = env.machines().iter().map(|m| m.cpus).collect();
        MachineStates {
            free: capacity.clone(),
            running: vec![FxHashSet::default(); capacity.len()],
            capacity,
        }
    }

    pub fn machine_count(&self) -> usize {
        self.capacity.len()
    }

    pub fn capacity(&self, machine: MachineIndex) -> u32 {
        self.capacity[machine]
    }

    pub fn free_cpus(&self, machine: MachineIndex) -> u32 {
        self.free[machine]
    }

    pub fn running(&self, machine: MachineIndex) -> &FxHashSet<TaskIndex> {
        &self.running[machine]
    }

    pub fn reserve(&mut self, machine: MachineIndex, task: TaskIndex, trace: &Trace) {
        let demand = trace.task(task).cpus;
        if self.free[machine] < demand {
            panic!(
                "machine {}: cannot start task {}: demand {} exceeds {} free of {} cpus",
                machine,
                trace.task(task).id,
                demand,
                self.free[machine],
                self.capacity[machine]
            );
        }
        self.free[machine] -= demand;
        if !self.running[machine].insert(task) {
            panic!(
                "machine {}: task {} is already running there",
                machine,
                trace.task(task).id
            );
        }
    }

    pub fn release(&mut self, machine: MachineIndex, task: TaskIndex, trace: &Trace) {
        if !self.running[machine].remove(&task) {
            panic!(
                "machine {}: completion for task {} which is not running there",
                machine,
                trace.task(task).id
            );
        }
        self.free[machine] += trace.task(task).cpus;
        if self.free[machine] > self.capacity[machine] {
            panic!(
                "machine {}: {} free cpus exceed the capacity of {}",
                machine, self.free[machine], self.capacity[machine]
            );
        }
    }

    /// Recomputes every free-CPU counter from the running sets.
    pub fn assert_consistent(&self, trace: &Trace) {
        for machine in 0..self.capacity.len() {
            let reserved: u32 = self.running[machine].iter().map(|&t| trace.task(t).cpus).sum();
            let expected = self.capacity[machine] - reserved;
            if self.free[machine] != expected {
                panic!(
                    "machine {}: free cpu counter {} does not match {} derived from running tasks",
                    machine, self.free[machine], expected
                );
            }
        }
    }

    /// Termination invariant: nothing running, all CPUs returned.
    pub fn assert_all_idle(&self) {
        for machine in 0..self.capacity.len() {
            if self.free[machine] != self.capacity[machine] || !self.running[machine].is_empty() {
                panic!(
                    "machine {}: {} of {} cpus free and {} tasks still running at termination",
                    machine,
                    self.free[machine],
                    self.capacity[machine],
                    self.running[machine].len()
                );
            }
        }
    }
}
