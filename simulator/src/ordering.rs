//! Task-ordering policies: priority views over the READY tasks.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::monitoring::WorkflowStatsCollector;
use crate::trace::{TaskIndex, Trace, WorkflowIndex};

/// A priority view over READY tasks. `next_candidate` must be deterministic
/// given the registration order; every key ends in the task id so ties are
/// reproducible.
pub trait OrderingPolicy {
    fn name(&self) -> &'static str;

    fn register_ready(&mut self, task: TaskIndex);

    /// Peeks the highest-priority candidate without removing it.
    fn next_candidate(&self) -> Option<TaskIndex>;

    /// Removes `task` after a successful placement. Only the current
    /// candidate may be removed; anything else is a scheduling bug.
    fn remove(&mut self, task: TaskIndex);
}

fn pop_candidate<K: Ord>(
    name: &str,
    queue: &mut BinaryHeap<Reverse<(K, TaskIndex)>>,
    task: TaskIndex,
) {
    match queue.pop() {
        Some(Reverse((_, head))) if head == task => {}
        _ => panic!("{}: removed task is not the current candidate", name),
    }
}

/// First come, first served: submission time, then task id.
pub struct Fcfs {
    trace: Rc<Trace>,
    queue: BinaryHeap<Reverse<((u64, u64), TaskIndex)>>,
}

impl Fcfs {
    pub fn new(trace: Rc<Trace>) -> Fcfs {
        Fcfs {
            trace,
            queue: BinaryHeap::new(),
        }
    }
}

impl OrderingPolicy for Fcfs {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn register_ready(&mut self, task: TaskIndex) {
        let t = self.trace.task(task);
        self.queue.push(Reverse(((t.submit_time, t.id), task)));
    }

    fn next_candidate(&self) -> Option<TaskIndex> {
        self.queue.peek().map(|Reverse((_, task))| *task)
    }

    fn remove(&mut self, task: TaskIndex) {
        pop_candidate("fcfs", &mut self.queue, task);
    }
}

/// Shortest job first: runtime, then submission time, then task id.
pub struct Sjf {
    trace: Rc<Trace>,
    queue: BinaryHeap<Reverse<((u64, u64, u64), TaskIndex)>>,
}

impl Sjf {
    pub fn new(trace: Rc<Trace>) -> Sjf {
        Sjf {
            trace,
            queue: BinaryHeap::new(),
        }
    }
}

impl OrderingPolicy for Sjf {
    fn name(&self) -> &'static str {
        "sjf"
    }

    fn register_ready(&mut self, task: TaskIndex) {
        let t = self.trace.task(task);
        self.queue.push(Reverse(((t.runtime, t.submit_time, t.id), task)));
    }

    fn next_candidate(&self) -> Option<TaskIndex> {
        self.queue.peek().map(|Reverse((_, task))| *task)
    }

    fn remove(&mut self, task: TaskIndex) {
        pop_candidate("sjf", &mut self.queue, task);
    }
}

/// Earliest workflow first: tasks of the workflow with the nearest
/// critical-path-weighted deadline go first. The deadline is the workflow's
/// first submission plus its critical-path length, read from the workflow
/// statistics collector the host registered as an observer, and cached here
/// on first use.
pub struct Ewf {
    trace: Rc<Trace>,
    stats: Rc<RefCell<WorkflowStatsCollector>>,
    deadlines: FxHashMap<WorkflowIndex, u64>,
    queue: BinaryHeap<Reverse<((u64, u64, u64), TaskIndex)>>,
}

impl Ewf {
    pub fn new(trace: Rc<Trace>, stats: Rc<RefCell<WorkflowStatsCollector>>) -> Ewf {
        Ewf {
            trace,
            stats,
            deadlines: FxHashMap::default(),
            queue: BinaryHeap::new(),
        }
    }

    fn deadline(&mut self, workflow: WorkflowIndex) -> u64 {
        if let Some(&deadline) = self.deadlines.get(&workflow) {
            return deadline;
        }
        let first_submit = self.stats.borrow().first_submission(workflow).unwrap_or_else(|| {
            panic!(
                "workflow {}: a task became ready before any submission was observed",
                self.trace.workflow(workflow).id
            )
        });
        let deadline = first_submit + self.trace.workflow(workflow).critical_path;
        self.deadlines.insert(workflow, deadline);
        deadline
    }
}

impl OrderingPolicy for Ewf {
    fn name(&self) -> &'static str {
        "ewf"
    }

    fn register_ready(&mut self, task: TaskIndex) {
        let deadline = self.deadline(self.trace.task(task).workflow);
        let t = self.trace.task(task);
        self.queue.push(Reverse(((deadline, t.submit_time, t.id), task)));
    }

    fn next_candidate(&self) -> Option<TaskIndex> {
        self.queue.peek().map(|Reverse((_, task))| *task)
    }

    fn remove(&mut self, task: TaskIndex) {
        pop_candidate("ewf", &mut self.queue, task);
    }
}
