//! Named-provider lookup for policy and reader plug-ins.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::monitoring::WorkflowStatsCollector;
use crate::ordering::{Ewf, Fcfs, OrderingPolicy, Sjf};
use crate::placement::{BestFit, PlacementPolicy};
use crate::trace::Trace;

/// Maps a name to a zero-argument factory. Built once during host
/// initialization and passed to whatever needs plug-in selection; there is no
/// process-wide instance.
pub struct Registry<T: ?Sized> {
    providers: FxHashMap<String, Box<dyn Fn() -> Box<T>>>,
    default: Option<String>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Registry<T> {
        Registry {
            providers: FxHashMap::default(),
            default: None,
        }
    }

    pub fn register(&mut self, name: &str, provider: impl Fn() -> Box<T> + 'static) {
        if self.providers.insert(name.to_string(), Box::new(provider)).is_some() {
            panic!("provider {} is registered twice", name);
        }
    }

    pub fn set_default(&mut self, name: &str) {
        if !self.providers.contains_key(name) {
            panic!("cannot default to unregistered provider {}", name);
        }
        self.default = Some(name.to_string());
    }

    /// Builds the named provider, or the default when no name is given.
    pub fn get(&self, name: Option<&str>) -> Box<T> {
        let name = name
            .or(self.default.as_deref())
            .unwrap_or_else(|| panic!("no provider named and no default set, known: {:?}", self.names()));
        let provider = self
            .providers
            .get(name)
            .unwrap_or_else(|| panic!("unknown provider {}, known: {:?}", name, self.names()));
        provider()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|n| n.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Registry::new()
    }
}

/// The built-in task-ordering policies. The workflow statistics handle is the
/// one the host registered as an observer; `ewf` reads its deadlines from it.
pub fn ordering_policies(
    trace: Rc<Trace>,
    workflow_stats: Rc<RefCell<WorkflowStatsCollector>>,
) -> Registry<dyn OrderingPolicy> {
    let mut registry = Registry::new();
    let fcfs_trace = trace.clone();
    registry.register("fcfs", move || Box::new(Fcfs::new(fcfs_trace.clone())) as Box<dyn OrderingPolicy>);
    let sjf_trace = trace.clone();
    registry.register("sjf", move || Box::new(Sjf::new(sjf_trace.clone())) as Box<dyn OrderingPolicy>);
    registry.register("ewf", move || {
        Box::new(Ewf::new(trace.clone(), workflow_stats.clone())) as Box<dyn OrderingPolicy>
    });
    registry.set_default("fcfs");
    registry
}

/// The built-in machine-placement policies.
pub fn placement_policies() -> Registry<dyn PlacementPolicy> {
    let mut registry = Registry::new();
    registry.register("best-fit", || Box::new(BestFit::new()) as Box<dyn PlacementPolicy>);
    registry.set_default("best-fit");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_default() {
        let mut builder = Trace::builder();
        builder.add_task(1, 1, 0, 1, 1, 0, &[]);
        let trace = Rc::new(builder.build());
        let stats = Rc::new(RefCell::new(WorkflowStatsCollector::new(trace.clone())));

        let registry = ordering_policies(trace, stats);
        assert_eq!(registry.names(), vec!["ewf", "fcfs", "sjf"]);
        assert_eq!(registry.get(Some("sjf")).name(), "sjf");
        assert_eq!(registry.get(None).name(), "fcfs");
    }

    #[test]
    #[should_panic(expected = "unknown provider")]
    fn unknown_name_is_fatal() {
        placement_policies().get(Some("worst-fit"));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_is_fatal() {
        let mut registry: Registry<dyn PlacementPolicy> = Registry::new();
        registry.register("best-fit", || Box::new(BestFit::new()) as _);
        registry.register("best-fit", || Box::new(BestFit::new()) as _);
    }
}
