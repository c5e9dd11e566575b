//! Tab-separated trace files, one task per row.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use csv::ReaderBuilder;
use rustc_hash::FxHashSet;
use serde::Deserialize;

use super::reader::TraceReader;
use crate::trace::{Trace, TraceBuilder};

#[derive(Debug, Deserialize)]
struct TaskRecord {
    task_id: u64,
    workflow_id: u64,
    submit_time: u64,
    runtime: u64,
    cpus: u32,
    #[serde(default)]
    memory: u64,
    /// Space-separated ids of dependency tasks; empty for roots.
    #[serde(default)]
    deps: String,
}

#[derive(Default)]
pub struct TabularTraceReader {
    records: u64,
}

impl TabularTraceReader {
    pub fn new() -> TabularTraceReader {
        TabularTraceReader::default()
    }

    fn read_into<R: Read>(&mut self, input: R, builder: &mut TraceBuilder) {
        let mut reader = ReaderBuilder::new().delimiter(b'\t').from_reader(input);
        for record in reader.deserialize() {
            let record: TaskRecord =
                record.unwrap_or_else(|e| panic!("Can't parse trace record {}: {}", self.records + 1, e));
            let deps = record
                .deps
                .split_whitespace()
                .map(|dep| {
                    dep.parse::<u64>().unwrap_or_else(|e| {
                        panic!("task {}: bad dependency id {:?}: {}", record.task_id, dep, e)
                    })
                })
                .collect::<Vec<_>>();
            builder.add_task(
                record.task_id,
                record.workflow_id,
                record.submit_time,
                record.runtime,
                record.cpus,
                record.memory,
                &deps,
            );
            self.records += 1;
        }
    }
}

impl TraceReader for TabularTraceReader {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn read_trace(&mut self, paths: &[PathBuf], sampling: Option<f64>) -> Trace {
        let mut builder = Trace::builder();
        for path in paths {
            let file =
                File::open(path).unwrap_or_else(|e| panic!("Can't read file {}: {}", path.display(), e));
            self.read_into(file, &mut builder);
        }
        if let Some(fraction) = sampling {
            let before = builder.task_count();
            apply_sampling(&mut builder, fraction);
            log::info!(
                "sampling {} retained {} of {} tasks",
                fraction,
                builder.task_count(),
                before
            );
        }
        log::info!("loaded {} tasks from {} file(s)", builder.task_count(), paths.len());
        builder.build()
    }
}

/// Workflow-level sampling: a workflow is retained iff a multiplicative hash
/// of its id lands below the fraction, so the subset is stable across runs
/// and input orderings.
pub fn apply_sampling(builder: &mut TraceBuilder, fraction: f64) {
    assert!(
        fraction > 0. && fraction <= 1.,
        "sampling fraction must lie in (0, 1], got {}",
        fraction
    );
    let retained: FxHashSet<u64> = builder
        .workflow_ids()
        .into_iter()
        .filter(|&id| keep_workflow(id, fraction))
        .collect();
    builder.retain_workflows(&retained);
}

fn keep_workflow(id: u64, fraction: f64) -> bool {
    let hashed = id.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17);
    hashed % 10_000 < (fraction * 10_000.) as u64
}
