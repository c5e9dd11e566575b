//! Per-task lifecycle bookkeeping and dependency counters.

use crate::environment::MachineIndex;
use crate::trace::{TaskIndex, Trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Unsubmitted,
    Submitted,
    Ready,
    Running,
    Completed,
}

#[derive(Debug, Clone)]
pub struct TaskState {
    pub phase: TaskPhase,
    pub remaining_deps: usize,
    pub machine: Option<MachineIndex>,
    pub start_time: Option<u64>,
    pub finish_time: Option<u64>,
}

/// Tracks every task's lifecycle phase. Transitions are monotone; a mutator
/// called from an illegal prior phase is a modeling bug and fails fatally.
pub struct TaskStateMonitor {
    states: Vec<TaskState>,
    ids: Vec<u64>,
    newly_ready: Vec<TaskIndex>,
    completed: usize,
}

impl TaskStateMonitor {
    pub fn new(trace: &Trace) -> TaskStateMonitor {
        let states = trace
            .tasks()
            .iter()
            .map(|t| TaskState {
                phase: TaskPhase::Unsubmitted,
                remaining_deps: t.deps.len(),
                machine: None,
                start_time: None,
                finish_time: None,
            })
            .collect();
        TaskStateMonitor {
            states,
            ids: trace.tasks().iter().map(|t| t.id).collect(),
            newly_ready: Vec::new(),
            completed: 0,
        }
    }

    pub fn phase(&self, task: TaskIndex) -> TaskPhase {
        self.states[task].phase
    }

    pub fn remaining_deps(&self, task: TaskIndex) -> usize {
        self.states[task].remaining_deps
    }

    pub fn state(&self, task: TaskIndex) -> &TaskState {
        &self.states[task]
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn task_count(&self) -> usize {
        self.states.len()
    }

    pub fn mark_submitted(&mut self, task: TaskIndex) {
        self.transition(task, TaskPhase::Unsubmitted, TaskPhase::Submitted);
    }

    pub fn mark_ready(&mut self, task: TaskIndex) {
        self.transition(task, TaskPhase::Submitted, TaskPhase::Ready);
        self.newly_ready.push(task);
    }

    pub fn mark_running(&mut self, task: TaskIndex, machine: MachineIndex, t_start: u64) {
        self.transition(task, TaskPhase::Ready, TaskPhase::Running);
        let state = &mut self.states[task];
        state.machine = Some(machine);
        state.start_time = Some(t_start);
    }

    pub fn mark_completed(&mut self, task: TaskIndex, t_end: u64) {
        self.transition(task, TaskPhase::Running, TaskPhase::Completed);
        self.states[task].finish_time = Some(t_end);
        self.completed += 1;
    }

    /// Records that one dependency of `task` completed; returns the number
    /// still outstanding.
    pub fn dep_completed(&mut self, task: TaskIndex) -> usize {
        let state = &mut self.states[task];
        if state.remaining_deps == 0 {
            panic!(
                "task {}: dependency completion reported but none were outstanding",
                self.ids[task]
            );
        }
        state.remaining_deps -= 1;
        state.remaining_deps
    }

    /// Tasks that became READY since the previous drain, in promotion order.
    /// For ordering policies that prefer pulling over per-event registration.
    pub fn drain_newly_ready(&mut self) -> Vec<TaskIndex> {
        std::mem::take(&mut self.newly_ready)
    }

    fn transition(&mut self, task: TaskIndex, expected: TaskPhase, next: TaskPhase) {
        let state = &mut self.states[task];
        if state.phase != expected {
            panic!(
                "task {}: illegal transition to {:?} from {:?}, expected {:?}",
                self.ids[task], next, state.phase, expected
            );
        }
        state.phase = next;
    }
}
