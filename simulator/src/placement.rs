//! Machine-placement policies.

use crate::environment::MachineIndex;
use crate::machine_state::MachineStates;
use crate::trace::Task;

/// Picks a machine for one task, or `None` when nothing currently fits; the
/// task then stays on the ready queue until the next scheduling pass.
pub trait PlacementPolicy {
    fn name(&self) -> &'static str;

    fn select_machine(&mut self, task: &Task, machines: &MachineStates) -> Option<MachineIndex>;
}

/// Chooses the machine with the least slack: the smallest free-CPU count
/// still satisfying the demand, ties broken by machine id ascending.
#[derive(Default)]
pub struct BestFit;

impl BestFit {
    pub fn new() -> BestFit {
        BestFit
    }
}

impl PlacementPolicy for BestFit {
    fn name(&self) -> &'static str {
        "best-fit"
    }

    fn select_machine(&mut self, task: &Task, machines: &MachineStates) -> Option<MachineIndex> {
        let mut best: Option<(u32, MachineIndex)> = None;
        for machine in 0..machines.machine_count() {
            let free = machines.free_cpus(machine);
            if free < task.cpus {
                continue;
            }
            if best.map_or(true, |(best_free, _)| free < best_free) {
                best = Some((free, machine));
            }
        }
        best.map(|(_, machine)| machine)
    }
}
