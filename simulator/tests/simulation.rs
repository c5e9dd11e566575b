use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use tracesim::environment::Environment;
use tracesim::monitoring::{TaskStatsCollector, WorkflowStatsCollector};
use tracesim::observer::Observer;
use tracesim::ordering::{Ewf, Fcfs, OrderingPolicy, Sjf};
use tracesim::placement::BestFit;
use tracesim::simulation::Simulation;
use tracesim::trace::Trace;
use tracesim::workload::synthetic::SyntheticWorkload;

/// Records callback counts and checks clock monotonicity from inside the run.
#[derive(Default)]
struct Probe {
    submitted: usize,
    ready: usize,
    started: usize,
    completed: usize,
    ticks: usize,
    last_seen: u64,
}

impl Probe {
    fn observe(&mut self, now: u64) {
        assert!(now >= self.last_seen, "observer saw time move backwards");
        self.last_seen = now;
    }
}

impl Observer for Probe {
    fn on_task_submitted(&mut self, _task: usize, now: u64) {
        self.submitted += 1;
        self.observe(now);
    }

    fn on_task_ready(&mut self, _task: usize, now: u64) {
        self.ready += 1;
        self.observe(now);
    }

    fn on_task_started(&mut self, _task: usize, _machine: usize, t_start: u64) {
        self.started += 1;
        self.observe(t_start);
    }

    fn on_task_completed(&mut self, _task: usize, t_end: u64) {
        self.completed += 1;
        self.observe(t_end);
    }

    fn on_tick(&mut self, now: u64) {
        self.ticks += 1;
        self.observe(now);
    }
}

fn run_with(
    trace: Rc<Trace>,
    env: &Environment,
    ordering: Box<dyn OrderingPolicy>,
) -> Rc<RefCell<TaskStatsCollector>> {
    let mut sim = Simulation::new(trace.clone(), env, ordering, Box::new(BestFit::new()));
    let stats = rc!(refcell!(TaskStatsCollector::new(trace)));
    sim.add_observer(stats.clone());
    sim.run();
    sim.sanity_check();
    stats
}

fn run_fcfs(trace: Rc<Trace>, machines: usize, cpus: u32) -> Rc<RefCell<TaskStatsCollector>> {
    let env = Environment::single_cluster(machines, cpus, 0);
    let ordering = Box::new(Fcfs::new(trace.clone()));
    run_with(trace, &env, ordering)
}

fn span(stats: &Rc<RefCell<TaskStatsCollector>>, task: usize) -> (u64, u64) {
    let stats = stats.borrow();
    (stats.start_time(task).unwrap(), stats.end_time(task).unwrap())
}

#[test]
fn pipe_of_two_runs_back_to_back() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 10, 1, 0, &[]).add_task(2, 1, 0, 5, 1, 0, &[1]);
    let stats = run_fcfs(Rc::new(builder.build()), 1, 1);

    assert_eq!(span(&stats, 0), (0, 10));
    assert_eq!(span(&stats, 1), (10, 15));
}

#[test]
fn independent_pair_runs_in_parallel() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 7, 1, 0, &[]).add_task(2, 2, 0, 7, 1, 0, &[]);
    let trace = Rc::new(builder.build());

    let env = Environment::single_cluster(2, 1, 0);
    let mut sim = Simulation::new(
        trace.clone(),
        &env,
        Box::new(Fcfs::new(trace.clone())),
        Box::new(BestFit::new()),
    );
    let stats = rc!(refcell!(TaskStatsCollector::new(trace)));
    sim.add_observer(stats.clone());
    sim.run();
    sim.sanity_check();

    assert_eq!(span(&stats, 0), (0, 7));
    assert_eq!(span(&stats, 1), (0, 7));

    let monitor = sim.monitor();
    let machines = [monitor.state(0).machine.unwrap(), monitor.state(1).machine.unwrap()];
    assert_ne!(machines[0], machines[1]);
}

#[test]
fn best_fit_picks_the_smallest_sufficient_machine() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 5, 2, 0, &[]);
    let trace = Rc::new(builder.build());

    let env = Environment::from_cpu_counts(&[2, 4], 0);
    let mut sim = Simulation::new(
        trace.clone(),
        &env,
        Box::new(Fcfs::new(trace.clone())),
        Box::new(BestFit::new()),
    );
    sim.run();
    sim.sanity_check();

    assert_eq!(sim.monitor().state(0).machine, Some(0));
}

#[test]
fn sjf_runs_the_short_task_first() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 10, 1, 0, &[]).add_task(2, 2, 0, 1, 1, 0, &[]);
    let trace = Rc::new(builder.build());

    let env = Environment::single_cluster(1, 1, 0);
    let ordering = Box::new(Sjf::new(trace.clone()));
    let stats = run_with(trace, &env, ordering);

    assert_eq!(span(&stats, 1), (0, 1));
    assert_eq!(span(&stats, 0), (1, 11));
}

#[test]
fn completion_frees_cpus_for_a_same_tick_start() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 5, 1, 0, &[]).add_task(2, 2, 5, 3, 1, 0, &[]);
    let stats = run_fcfs(Rc::new(builder.build()), 1, 1);

    assert_eq!(span(&stats, 0), (0, 5));
    assert_eq!(span(&stats, 1), (5, 8));
}

#[test]
fn backpressure_serializes_on_one_machine() {
    let mut builder = Trace::builder();
    builder
        .add_task(1, 1, 0, 2, 1, 0, &[])
        .add_task(2, 2, 0, 2, 1, 0, &[])
        .add_task(3, 3, 0, 2, 1, 0, &[]);
    let stats = run_fcfs(Rc::new(builder.build()), 1, 1);

    assert_eq!(span(&stats, 0), (0, 2));
    assert_eq!(span(&stats, 1), (2, 4));
    assert_eq!(span(&stats, 2), (4, 6));
}

#[test]
fn ewf_prefers_the_workflow_with_the_nearest_deadline() {
    // Workflow 1 has critical path 10, workflow 2 critical path 2; both are
    // submitted at 0, so workflow 2's deadline comes first.
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 10, 1, 0, &[]).add_task(2, 2, 0, 2, 1, 0, &[]);
    let trace = Rc::new(builder.build());

    let env = Environment::single_cluster(1, 1, 0);
    let workflow_stats = rc!(refcell!(WorkflowStatsCollector::new(trace.clone())));
    let mut sim = Simulation::new(
        trace.clone(),
        &env,
        Box::new(Ewf::new(trace.clone(), workflow_stats.clone())),
        Box::new(BestFit::new()),
    );
    sim.add_observer(workflow_stats.clone());
    let stats = rc!(refcell!(TaskStatsCollector::new(trace)));
    sim.add_observer(stats.clone());
    sim.run();
    sim.sanity_check();

    assert_eq!(span(&stats, 1), (0, 2));
    assert_eq!(span(&stats, 0), (2, 12));

    let workflow_stats = workflow_stats.borrow();
    assert_eq!(workflow_stats.makespan(1), Some(2));
    assert_eq!(workflow_stats.wait_time(0), Some(2));
    assert_eq!(workflow_stats.makespan(0), Some(12));
}

#[test]
fn zero_runtime_task_completes_at_its_start_tick() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 3, 0, 1, 0, &[]).add_task(2, 1, 3, 4, 1, 0, &[1]);
    let stats = run_fcfs(Rc::new(builder.build()), 1, 1);

    assert_eq!(span(&stats, 0), (3, 3));
    assert_eq!(span(&stats, 1), (3, 7));
}

#[test]
fn empty_trace_terminates_without_callbacks() {
    let trace = Rc::new(Trace::builder().build());
    let env = Environment::single_cluster(1, 1, 0);
    let mut sim = Simulation::new(
        trace.clone(),
        &env,
        Box::new(Fcfs::new(trace)),
        Box::new(BestFit::new()),
    );
    let probe = rc!(refcell!(Probe::default()));
    sim.add_observer(probe.clone());
    sim.run();

    assert_eq!(sim.time(), 0);
    let probe = probe.borrow();
    assert_eq!(probe.submitted + probe.ready + probe.started + probe.completed + probe.ticks, 0);
}

#[test]
fn full_machine_task_runs_alone() {
    let mut builder = Trace::builder();
    builder.add_task(1, 1, 0, 10, 4, 0, &[]).add_task(2, 2, 0, 10, 4, 0, &[]);
    let stats = run_fcfs(Rc::new(builder.build()), 1, 4);

    assert_eq!(span(&stats, 0), (0, 10));
    assert_eq!(span(&stats, 1), (10, 20));
}

#[test]
fn staggered_submissions_start_immediately_when_machines_are_free() {
    let mut builder = Trace::builder();
    builder
        .add_task(1, 1, 0, 3, 1, 0, &[])
        .add_task(2, 2, 5, 3, 1, 0, &[])
        .add_task(3, 3, 10, 3, 1, 0, &[]);
    let stats = run_fcfs(Rc::new(builder.build()), 3, 1);

    assert_eq!(span(&stats, 0), (0, 3));
    assert_eq!(span(&stats, 1), (5, 8));
    assert_eq!(span(&stats, 2), (10, 13));
}

#[test]
fn notification_counts_are_conserved() {
    let trace = Rc::new(SyntheticWorkload::default().generate());
    let env = Environment::single_cluster(4, 4, 0);
    let mut sim = Simulation::new(
        trace.clone(),
        &env,
        Box::new(Fcfs::new(trace.clone())),
        Box::new(BestFit::new()),
    );
    let probe = rc!(refcell!(Probe::default()));
    sim.add_observer(probe.clone());
    sim.run();
    sim.sanity_check();

    let probe = probe.borrow();
    assert_eq!(probe.submitted, trace.task_count());
    assert_eq!(probe.ready, trace.task_count());
    assert_eq!(probe.started, trace.task_count());
    assert_eq!(probe.completed, trace.task_count());
    assert!(probe.ticks > 0);
}

#[test]
fn identical_runs_produce_identical_schedules() {
    let timings = || {
        let trace = Rc::new(
            SyntheticWorkload {
                seed: 7,
                workflow_count: 25,
                ..SyntheticWorkload::default()
            }
            .generate(),
        );
        let stats = run_fcfs(trace.clone(), 3, 4);
        let stats = stats.borrow();
        (0..trace.task_count())
            .map(|t| (stats.start_time(t).unwrap(), stats.end_time(t).unwrap()))
            .collect::<Vec<_>>()
    };

    assert_eq!(timings(), timings());
}

#[test]
fn fcfs_is_insensitive_to_id_assignment_when_submissions_are_unique() {
    let forward = {
        let mut builder = Trace::builder();
        builder
            .add_task(1, 1, 0, 4, 1, 0, &[])
            .add_task(2, 2, 1, 4, 1, 0, &[])
            .add_task(3, 3, 2, 4, 1, 0, &[]);
        run_fcfs(Rc::new(builder.build()), 1, 1)
    };
    let reversed = {
        let mut builder = Trace::builder();
        builder
            .add_task(3, 1, 0, 4, 1, 0, &[])
            .add_task(2, 2, 1, 4, 1, 0, &[])
            .add_task(1, 3, 2, 4, 1, 0, &[]);
        run_fcfs(Rc::new(builder.build()), 1, 1)
    };

    let spans = |stats: &Rc<RefCell<TaskStatsCollector>>| {
        let stats = stats.borrow();
        let mut spans = (0..3)
            .map(|t| (stats.start_time(t).unwrap(), stats.end_time(t).unwrap()))
            .collect::<Vec<_>>();
        spans.sort_unstable();
        spans
    };
    assert_eq!(spans(&forward), spans(&reversed));
}

#[test]
fn head_of_queue_is_never_skipped() {
    // The wide head (id 1) does not fit next to the running task, so the
    // narrow task (id 3) must wait behind it even though it would fit.
    let mut builder = Trace::builder();
    builder
        .add_task(1, 1, 0, 10, 2, 0, &[])
        .add_task(2, 2, 1, 10, 3, 0, &[])
        .add_task(3, 3, 2, 1, 1, 0, &[]);
    let stats = run_fcfs(Rc::new(builder.build()), 1, 4);

    assert_eq!(span(&stats, 0), (0, 10));
    assert_eq!(span(&stats, 1), (10, 20));
    assert_eq!(span(&stats, 2), (10, 11));
}
