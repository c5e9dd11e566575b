use std::path::PathBuf;

use crate::registry::Registry;
use crate::trace::Trace;

use super::tabular::TabularTraceReader;

/// Turns on-disk trace files into a [`Trace`]. The core treats formats as
/// opaque; readers are selected by name through the registry.
pub trait TraceReader {
    fn name(&self) -> &'static str;

    /// Reads one or more files into a single trace. `sampling` retains a
    /// deterministic subset of workflows with all their member tasks.
    fn read_trace(&mut self, paths: &[PathBuf], sampling: Option<f64>) -> Trace;
}

pub fn trace_readers() -> Registry<dyn TraceReader> {
    let mut registry = Registry::new();
    registry.register("tabular", || Box::new(TabularTraceReader::new()) as Box<dyn TraceReader>);
    registry.set_default("tabular");
    registry
}
