//! Statistics collectors persisting per-task and per-workflow timings.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use crate::environment::MachineIndex;
use crate::observer::Observer;
use crate::trace::{TaskIndex, Trace, WorkflowIndex};

fn tsv_writer(path: &Path) -> BufWriter<File> {
    BufWriter::new(
        File::create(path).unwrap_or_else(|e| panic!("Can't create file {}: {}", path.display(), e)),
    )
}

#[derive(Default, Clone)]
struct TaskTimings {
    start: Option<u64>,
    end: Option<u64>,
    machine: Option<MachineIndex>,
}

/// Records start/end/machine per task and dumps one tab-separated row per
/// task, after the run.
pub struct TaskStatsCollector {
    trace: Rc<Trace>,
    timings: Vec<TaskTimings>,
}

impl TaskStatsCollector {
    pub fn new(trace: Rc<Trace>) -> TaskStatsCollector {
        let timings = vec![TaskTimings::default(); trace.task_count()];
        TaskStatsCollector { trace, timings }
    }

    pub fn dump(&self, path: &Path) {
        let mut out = tsv_writer(path);
        writeln!(
            out,
            "task_id\tworkflow_id\tsubmit_time\tstart_time\tend_time\truntime\tcpus\tmachine_id"
        )
        .unwrap();
        for (i, task) in self.trace.tasks().iter().enumerate() {
            let timings = &self.timings[i];
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                task.id,
                self.trace.workflow(task.workflow).id,
                task.submit_time,
                timings.start.unwrap_or_else(|| panic!("task {}: no recorded start to dump", task.id)),
                timings.end.unwrap_or_else(|| panic!("task {}: no recorded end to dump", task.id)),
                task.runtime,
                task.cpus,
                timings.machine.unwrap_or_else(|| panic!("task {}: no recorded machine to dump", task.id)),
            )
            .unwrap();
        }
        out.flush().unwrap();
    }

    pub fn start_time(&self, task: TaskIndex) -> Option<u64> {
        self.timings[task].start
    }

    pub fn end_time(&self, task: TaskIndex) -> Option<u64> {
        self.timings[task].end
    }
}

impl Observer for TaskStatsCollector {
    fn on_task_started(&mut self, task: TaskIndex, machine: MachineIndex, t_start: u64) {
        let timings = &mut self.timings[task];
        timings.start = Some(t_start);
        timings.machine = Some(machine);
    }

    fn on_task_completed(&mut self, task: TaskIndex, t_end: u64) {
        self.timings[task].end = Some(t_end);
    }
}

/// Aggregates per-workflow timings. Doubles as the statistics source for the
/// earliest-workflow-first ordering policy, which holds a shared handle to it.
pub struct WorkflowStatsCollector {
    trace: Rc<Trace>,
    first_submit: Vec<Option<u64>>,
    first_start: Vec<Option<u64>>,
    last_completion: Vec<Option<u64>>,
}

impl WorkflowStatsCollector {
    pub fn new(trace: Rc<Trace>) -> WorkflowStatsCollector {
        let workflows = trace.workflows().len();
        WorkflowStatsCollector {
            trace,
            first_submit: vec![None; workflows],
            first_start: vec![None; workflows],
            last_completion: vec![None; workflows],
        }
    }

    /// Submission time of the earliest-submitted member seen so far. Events
    /// are processed in timestamp order, so once any member of the workflow
    /// has been submitted this is the workflow's true first submission.
    pub fn first_submission(&self, workflow: WorkflowIndex) -> Option<u64> {
        self.first_submit[workflow]
    }

    pub fn wait_time(&self, workflow: WorkflowIndex) -> Option<u64> {
        Some(self.first_start[workflow]? - self.first_submit[workflow]?)
    }

    pub fn makespan(&self, workflow: WorkflowIndex) -> Option<u64> {
        Some(self.last_completion[workflow]? - self.first_submit[workflow]?)
    }

    pub fn dump(&self, path: &Path) {
        let mut out = tsv_writer(path);
        writeln!(
            out,
            "workflow_id\tfirst_submit\tlast_completion\tcritical_path\twait_time\tmakespan"
        )
        .unwrap();
        for (w, workflow) in self.trace.workflows().iter().enumerate() {
            let missing = || panic!("workflow {}: no recorded timings to dump", workflow.id);
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                workflow.id,
                self.first_submit[w].unwrap_or_else(missing),
                self.last_completion[w].unwrap_or_else(missing),
                workflow.critical_path,
                self.wait_time(w).unwrap_or_else(missing),
                self.makespan(w).unwrap_or_else(missing),
            )
            .unwrap();
        }
        out.flush().unwrap();
    }
}

impl Observer for WorkflowStatsCollector {
    fn on_task_submitted(&mut self, task: TaskIndex, now: u64) {
        let workflow = self.trace.task(task).workflow;
        let slot = &mut self.first_submit[workflow];
        *slot = Some(slot.map_or(now, |t| t.min(now)));
    }

    fn on_task_started(&mut self, task: TaskIndex, _machine: MachineIndex, t_start: u64) {
        let workflow = self.trace.task(task).workflow;
        let slot = &mut self.first_start[workflow];
        *slot = Some(slot.map_or(t_start, |t| t.min(t_start)));
    }

    fn on_task_completed(&mut self, task: TaskIndex, t_end: u64) {
        let workflow = self.trace.task(task).workflow;
        let slot = &mut self.last_completion[workflow];
        *slot = Some(slot.map_or(t_end, |t| t.max(t_end)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_trace() -> Rc<Trace> {
        let mut builder = Trace::builder();
        builder.add_task(1, 9, 3, 10, 1, 0, &[]).add_task(2, 9, 5, 4, 1, 0, &[1]);
        Rc::new(builder.build())
    }

    #[test]
    fn workflow_timings_aggregate_over_members() {
        let trace = pair_trace();
        let mut stats = WorkflowStatsCollector::new(trace);

        stats.on_task_submitted(0, 3);
        stats.on_task_submitted(1, 5);
        stats.on_task_started(0, 0, 3);
        stats.on_task_completed(0, 13);
        stats.on_task_started(1, 0, 13);
        stats.on_task_completed(1, 17);

        assert_eq!(stats.first_submission(0), Some(3));
        assert_eq!(stats.wait_time(0), Some(0));
        assert_eq!(stats.makespan(0), Some(14));
    }

    #[test]
    fn task_rows_round_trip_through_the_file() {
        let trace = pair_trace();
        let mut stats = TaskStatsCollector::new(trace);
        stats.on_task_started(0, 2, 3);
        stats.on_task_completed(0, 13);
        stats.on_task_started(1, 0, 13);
        stats.on_task_completed(1, 17);

        let path = std::env::temp_dir().join(format!("tracesim-tasks-{}.tsv", std::process::id()));
        stats.dump(&path);
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1\t9\t3\t3\t13\t10\t1\t2");
        assert_eq!(lines[2], "2\t9\t5\t13\t17\t4\t1\t0");
    }
}
