//! The event loop: submission, dispatch and completion transitions.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};

use crate::environment::{Environment, MachineIndex};
use crate::event_queue::{Event, EventQueue};
use crate::machine_state::MachineStates;
use crate::observer::Observer;
use crate::ordering::OrderingPolicy;
use crate::placement::PlacementPolicy;
use crate::task_state::{TaskPhase, TaskStateMonitor};
use crate::trace::{TaskIndex, Trace};

/// Single-threaded discrete-event simulation of one trace on one
/// environment. Owns all mutable state; policies and observers are consulted
/// from the loop and never concurrently.
pub struct Simulation {
    trace: Rc<Trace>,
    queue: EventQueue,
    clock: u64,
    monitor: TaskStateMonitor,
    machines: MachineStates,
    ordering: Box<dyn OrderingPolicy>,
    placement: Box<dyn PlacementPolicy>,
    observers: Vec<Rc<RefCell<dyn Observer>>>,
    tick_pending_at: Option<u64>,
}

impl Simulation {
    pub fn new(
        trace: Rc<Trace>,
        env: &Environment,
        ordering: Box<dyn OrderingPolicy>,
        placement: Box<dyn PlacementPolicy>,
    ) -> Simulation {
        let monitor = TaskStateMonitor::new(&trace);
        let machines = MachineStates::new(env);
        Simulation {
            trace,
            queue: EventQueue::new(),
            clock: 0,
            monitor,
            machines,
            ordering,
            placement,
            observers: Vec::new(),
            tick_pending_at: None,
        }
    }

    pub fn add_observer(&mut self, observer: Rc<RefCell<dyn Observer>>) {
        self.observers.push(observer);
    }

    pub fn time(&self) -> u64 {
        self.clock
    }

    pub fn event_count(&self) -> u64 {
        self.queue.event_count()
    }

    pub fn monitor(&self) -> &TaskStateMonitor {
        &self.monitor
    }

    pub fn machines(&self) -> &MachineStates {
        &self.machines
    }

    /// Runs the trace to completion and checks the termination invariants.
    pub fn run(&mut self) {
        info!(
            "starting simulation: {} tasks in {} workflows on {} machines, order={}, placement={}",
            self.trace.task_count(),
            self.trace.workflows().len(),
            self.machines.machine_count(),
            self.ordering.name(),
            self.placement.name()
        );

        for task in 0..self.trace.task_count() {
            self.queue
                .push(self.trace.task(task).submit_time, Event::TaskSubmitted { task });
        }

        while let Some((time, event)) = self.queue.pop() {
            if time < self.clock {
                panic!(
                    "time regression: popped an event at {} after the clock reached {}",
                    time, self.clock
                );
            }
            self.clock = time;

            if let Event::ScheduleTick = event {
                self.tick_pending_at = None;
            }

            match event {
                Event::TaskSubmitted { task } => self.handle_submitted(task),
                Event::TaskReady { task } => self.handle_ready(task),
                Event::ScheduleTick => self.handle_schedule_tick(),
                Event::TaskCompleted { task, machine } => self.handle_completed(task, machine),
                Event::TaskStarted { task, machine } => {
                    debug!(
                        "t={}: task {} running on machine {}",
                        self.clock,
                        self.trace.task(task).id,
                        machine
                    );
                }
            }

            self.notify(event);
        }

        self.check_termination();
        info!(
            "simulation finished at t={} after {} events",
            self.clock,
            self.queue.event_count()
        );
    }

    fn handle_submitted(&mut self, task: TaskIndex) {
        self.monitor.mark_submitted(task);
        if self.monitor.remaining_deps(task) == 0 {
            self.queue.push(self.clock, Event::TaskReady { task });
        }
    }

    fn handle_ready(&mut self, task: TaskIndex) {
        self.monitor.mark_ready(task);
        self.request_tick();
    }

    /// One scheduling pass: pull the tasks promoted since the previous pass
    /// into the ordering policy, then place candidates head-first until the
    /// head no longer fits anywhere. The head is never skipped over.
    fn handle_schedule_tick(&mut self) {
        for task in self.monitor.drain_newly_ready() {
            self.ordering.register_ready(task);
        }

        while let Some(task) = self.ordering.next_candidate() {
            let machine = match self.placement.select_machine(self.trace.task(task), &self.machines) {
                Some(machine) => machine,
                None => break,
            };

            self.machines.reserve(machine, task, &self.trace);
            self.ordering.remove(task);
            self.monitor.mark_running(task, machine, self.clock);

            let runtime = self.trace.task(task).runtime;
            self.queue.push(self.clock, Event::TaskStarted { task, machine });
            self.queue
                .push(self.clock + runtime, Event::TaskCompleted { task, machine });
        }
    }

    fn handle_completed(&mut self, task: TaskIndex, machine: MachineIndex) {
        self.machines.release(machine, task, &self.trace);
        self.monitor.mark_completed(task, self.clock);
        debug!(
            "t={}: task {} completed on machine {}",
            self.clock,
            self.trace.task(task).id,
            machine
        );

        for &dependent in self.trace.dependents(task) {
            let outstanding = self.monitor.dep_completed(dependent);
            if outstanding == 0 && self.monitor.phase(dependent) == TaskPhase::Submitted {
                self.queue.push(self.clock, Event::TaskReady { task: dependent });
            }
        }

        self.request_tick();
    }

    /// At most one ScheduleTick may be pending per timestamp.
    fn request_tick(&mut self) {
        if self.tick_pending_at != Some(self.clock) {
            self.tick_pending_at = Some(self.clock);
            self.queue.push(self.clock, Event::ScheduleTick);
        }
    }

    fn notify(&mut self, event: Event) {
        for observer in &self.observers {
            let mut observer = observer.borrow_mut();
            match event {
                Event::TaskSubmitted { task } => observer.on_task_submitted(task, self.clock),
                Event::TaskReady { task } => observer.on_task_ready(task, self.clock),
                Event::TaskStarted { task, machine } => {
                    observer.on_task_started(task, machine, self.clock)
                }
                Event::TaskCompleted { task, .. } => observer.on_task_completed(task, self.clock),
                Event::ScheduleTick => observer.on_tick(self.clock),
            }
        }
    }

    fn check_termination(&self) {
        if self.monitor.completed_count() != self.trace.task_count() {
            let stuck = (0..self.trace.task_count())
                .find(|&t| self.monitor.phase(t) != TaskPhase::Completed)
                .unwrap();
            panic!(
                "simulation drained its queue with task {} left in phase {:?}",
                self.trace.task(stuck).id,
                self.monitor.phase(stuck)
            );
        }
        self.machines.assert_all_idle();
        self.machines.assert_consistent(&self.trace);
    }

    /// Post-run check over the recorded timings: starts respect submission
    /// and dependency completion, and every duration matches the declared
    /// runtime. Any violation is a modeling bug and fails fatally.
    pub fn sanity_check(&self) {
        for t in 0..self.trace.task_count() {
            let task = self.trace.task(t);
            let state = self.monitor.state(t);
            let start = state
                .start_time
                .unwrap_or_else(|| panic!("task {}: no start time recorded", task.id));
            let end = state
                .finish_time
                .unwrap_or_else(|| panic!("task {}: no end time recorded", task.id));

            if start < task.submit_time {
                panic!(
                    "task {}: started at {} before its submission at {}",
                    task.id, start, task.submit_time
                );
            }
            if end - start != task.runtime {
                panic!(
                    "task {}: ran for {} ticks, declared runtime is {}",
                    task.id,
                    end - start,
                    task.runtime
                );
            }
            for &dep in &task.deps {
                let dep_end = self.monitor.state(dep).finish_time.unwrap();
                if dep_end > start {
                    panic!(
                        "task {}: started at {} before dependency {} completed at {}",
                        task.id,
                        start,
                        self.trace.task(dep).id,
                        dep_end
                    );
                }
            }
        }
    }
}
