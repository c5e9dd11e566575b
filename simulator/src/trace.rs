//! Trace domain model: tasks grouped into workflows with precedence edges.

use rustc_hash::FxHashMap;

pub type TaskIndex = usize;
pub type WorkflowIndex = usize;

/// A single task of the trace. Immutable after the trace is built; referenced
/// everywhere by its dense index into [`Trace::tasks`].
#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub workflow: WorkflowIndex,
    pub submit_time: u64,
    pub runtime: u64,
    pub cpus: u32,
    /// Tracked and reported but never enforced.
    pub memory: u64,
    pub deps: Vec<TaskIndex>,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: u64,
    pub tasks: Vec<TaskIndex>,
    /// Longest runtime-weighted chain of member tasks, ignoring edges that
    /// leave the workflow.
    pub critical_path: u64,
}

/// Owns all tasks and workflows of one simulation run.
pub struct Trace {
    tasks: Vec<Task>,
    workflows: Vec<Workflow>,
    dependents: Vec<Vec<TaskIndex>>,
    roots: Vec<TaskIndex>,
    topo_order: Vec<TaskIndex>,
    task_index: FxHashMap<u64, TaskIndex>,
    workflow_index: FxHashMap<u64, WorkflowIndex>,
}

impl Trace {
    pub fn builder() -> TraceBuilder {
        TraceBuilder::default()
    }

    pub fn task(&self, task: TaskIndex) -> &Task {
        &self.tasks[task]
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn workflow(&self, workflow: WorkflowIndex) -> &Workflow {
        &self.workflows[workflow]
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    /// Dense index of the task with the given trace id.
    pub fn task_by_id(&self, id: u64) -> TaskIndex {
        *self
            .task_index
            .get(&id)
            .unwrap_or_else(|| panic!("unknown task id {} in trace lookup", id))
    }

    pub fn workflow_by_id(&self, id: u64) -> WorkflowIndex {
        *self
            .workflow_index
            .get(&id)
            .unwrap_or_else(|| panic!("unknown workflow id {} in trace lookup", id))
    }

    /// Tasks that list `task` as a dependency.
    pub fn dependents(&self, task: TaskIndex) -> &[TaskIndex] {
        &self.dependents[task]
    }

    /// Tasks with no dependencies.
    pub fn roots(&self) -> &[TaskIndex] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest possible completion time of every task, assuming unbounded
    /// machines: a topological longest-path pass over the dependency DAG.
    pub fn earliest_finish_times(&self) -> Vec<u64> {
        let mut finish = vec![0u64; self.tasks.len()];
        for &t in &self.topo_order {
            let task = &self.tasks[t];
            let dep_bound = task.deps.iter().map(|&d| finish[d]).max().unwrap_or(0);
            finish[t] = task.submit_time.max(dep_bound) + task.runtime;
        }
        finish
    }
}

#[derive(Debug, Clone)]
struct RawTask {
    id: u64,
    workflow_id: u64,
    submit_time: u64,
    runtime: u64,
    cpus: u32,
    memory: u64,
    deps: Vec<u64>,
}

/// Two-phase construction: tasks may list dependencies that appear later in
/// the input, so edges are resolved only in [`TraceBuilder::build`].
#[derive(Default)]
pub struct TraceBuilder {
    raw: Vec<RawTask>,
}

impl TraceBuilder {
    pub fn add_task(
        &mut self,
        id: u64,
        workflow_id: u64,
        submit_time: u64,
        runtime: u64,
        cpus: u32,
        memory: u64,
        deps: &[u64],
    ) -> &mut Self {
        self.raw.push(RawTask {
            id,
            workflow_id,
            submit_time,
            runtime,
            cpus,
            memory,
            deps: deps.to_vec(),
        });
        self
    }

    pub fn task_count(&self) -> usize {
        self.raw.len()
    }

    /// Drops every task whose workflow id is not in `retained`.
    pub fn retain_workflows(&mut self, retained: &rustc_hash::FxHashSet<u64>) {
        self.raw.retain(|t| retained.contains(&t.workflow_id));
    }

    pub fn workflow_ids(&self) -> Vec<u64> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut ids = Vec::new();
        for t in &self.raw {
            if seen.insert(t.workflow_id) {
                ids.push(t.workflow_id);
            }
        }
        ids
    }

    pub fn build(self) -> Trace {
        let mut task_index = FxHashMap::default();
        for (i, t) in self.raw.iter().enumerate() {
            if t.cpus == 0 {
                panic!("task {}: cpu demand must be positive", t.id);
            }
            if task_index.insert(t.id, i).is_some() {
                panic!("task id {} appears twice in the trace", t.id);
            }
        }

        let mut workflow_index: FxHashMap<u64, WorkflowIndex> = FxHashMap::default();
        let mut workflows: Vec<Workflow> = Vec::new();
        let mut tasks: Vec<Task> = Vec::with_capacity(self.raw.len());

        for (i, t) in self.raw.iter().enumerate() {
            let workflow = *workflow_index.entry(t.workflow_id).or_insert_with(|| {
                workflows.push(Workflow {
                    id: t.workflow_id,
                    tasks: Vec::new(),
                    critical_path: 0,
                });
                workflows.len() - 1
            });
            workflows[workflow].tasks.push(i);

            let deps = t
                .deps
                .iter()
                .map(|dep_id| {
                    *task_index
                        .get(dep_id)
                        .unwrap_or_else(|| panic!("task {} depends on unknown task {}", t.id, dep_id))
                })
                .collect();

            tasks.push(Task {
                id: t.id,
                workflow,
                submit_time: t.submit_time,
                runtime: t.runtime,
                cpus: t.cpus,
                memory: t.memory,
                deps,
            });
        }

        let mut dependents = vec![Vec::new(); tasks.len()];
        let mut roots = Vec::new();
        for (i, task) in tasks.iter().enumerate() {
            if task.deps.is_empty() {
                roots.push(i);
            }
            for &d in &task.deps {
                dependents[d].push(i);
            }
        }

        let topo_order = topological_order(&tasks, &dependents);

        // Longest runtime-weighted downward chain, computed against the flow
        // of edges so each task sees its same-workflow dependents first.
        let mut chain = vec![0u64; tasks.len()];
        for &t in topo_order.iter().rev() {
            let task = &tasks[t];
            let tail = dependents[t]
                .iter()
                .filter(|&&d| tasks[d].workflow == task.workflow)
                .map(|&d| chain[d])
                .max()
                .unwrap_or(0);
            chain[t] = task.runtime + tail;
        }
        for workflow in workflows.iter_mut() {
            workflow.critical_path = workflow.tasks.iter().map(|&t| chain[t]).max().unwrap_or(0);
        }

        Trace {
            tasks,
            workflows,
            dependents,
            roots,
            topo_order,
            task_index,
            workflow_index,
        }
    }
}

fn topological_order(tasks: &[Task], dependents: &[Vec<TaskIndex>]) -> Vec<TaskIndex> {
    let mut indegree: Vec<usize> = tasks.iter().map(|t| t.deps.len()).collect();
    let mut order = Vec::with_capacity(tasks.len());
    let mut frontier: Vec<TaskIndex> = (0..tasks.len()).filter(|&t| indegree[t] == 0).collect();

    while let Some(t) = frontier.pop() {
        order.push(t);
        for &d in &dependents[t] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                frontier.push(d);
            }
        }
    }

    if order.len() != tasks.len() {
        let stuck = (0..tasks.len()).find(|&t| indegree[t] > 0).unwrap();
        panic!("dependency cycle in trace involving task {}", tasks[stuck].id);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Trace {
        // 1 -> {2, 3} -> 4, runtimes 5, 10, 2, 1
        let mut builder = Trace::builder();
        builder
            .add_task(1, 7, 0, 5, 1, 0, &[])
            .add_task(2, 7, 0, 10, 1, 0, &[1])
            .add_task(3, 7, 0, 2, 1, 0, &[1])
            .add_task(4, 7, 0, 1, 1, 0, &[2, 3]);
        builder.build()
    }

    #[test]
    fn roots_and_dependents() {
        let trace = diamond();
        assert_eq!(trace.roots(), &[0]);
        assert_eq!(trace.dependents(0), &[1, 2]);
        assert_eq!(trace.dependents(3), &[] as &[usize]);
        assert_eq!(trace.task_by_id(4), 3);
        assert_eq!(trace.workflow_by_id(7), 0);
    }

    #[test]
    fn critical_path_takes_longest_chain() {
        let trace = diamond();
        // 1 -> 2 -> 4: 5 + 10 + 1
        assert_eq!(trace.workflow(0).critical_path, 16);
    }

    #[test]
    fn critical_path_ignores_cross_workflow_edges() {
        let mut builder = Trace::builder();
        builder
            .add_task(1, 1, 0, 5, 1, 0, &[])
            .add_task(2, 2, 0, 3, 1, 0, &[1]);
        let trace = builder.build();
        assert_eq!(trace.workflow(0).critical_path, 5);
        assert_eq!(trace.workflow(1).critical_path, 3);
    }

    #[test]
    fn earliest_finish_respects_deps_and_submission() {
        let trace = diamond();
        let finish = trace.earliest_finish_times();
        assert_eq!(finish[0], 5);
        assert_eq!(finish[1], 15);
        assert_eq!(finish[2], 7);
        assert_eq!(finish[3], 16);
    }

    #[test]
    fn forward_dependency_references_resolve() {
        let mut builder = Trace::builder();
        builder.add_task(10, 1, 0, 1, 1, 0, &[11]).add_task(11, 1, 0, 1, 1, 0, &[]);
        let trace = builder.build();
        assert_eq!(trace.task(0).deps, vec![1]);
    }

    #[test]
    #[should_panic(expected = "unknown task 99")]
    fn unknown_dependency_is_fatal() {
        let mut builder = Trace::builder();
        builder.add_task(1, 1, 0, 1, 1, 0, &[99]);
        builder.build();
    }

    #[test]
    #[should_panic(expected = "appears twice")]
    fn duplicate_task_id_is_fatal() {
        let mut builder = Trace::builder();
        builder.add_task(1, 1, 0, 1, 1, 0, &[]).add_task(1, 1, 0, 1, 1, 0, &[]);
        builder.build();
    }

    #[test]
    #[should_panic(expected = "dependency cycle")]
    fn cycle_is_fatal() {
        let mut builder = Trace::builder();
        builder.add_task(1, 1, 0, 1, 1, 0, &[2]).add_task(2, 1, 0, 1, 1, 0, &[1]);
        builder.build();
    }
}
