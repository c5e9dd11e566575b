//! Lifecycle notifications for registered collectors.

use crate::environment::MachineIndex;
use crate::trace::TaskIndex;

/// Callbacks fire synchronously on the simulation thread, after the state
/// mutation they describe. Implementations read core state through their own
/// captured handles and must not mutate it.
pub trait Observer {
    fn on_task_submitted(&mut self, _task: TaskIndex, _now: u64) {}

    fn on_task_ready(&mut self, _task: TaskIndex, _now: u64) {}

    fn on_task_started(&mut self, _task: TaskIndex, _machine: MachineIndex, _t_start: u64) {}

    fn on_task_completed(&mut self, _task: TaskIndex, _t_end: u64) {}

    /// Fires once per scheduling pass.
    fn on_tick(&mut self, _now: u64) {}
}
