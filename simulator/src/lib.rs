#![doc = include_str!("../readme.md")]

pub mod config;
pub mod environment;
pub mod event_queue;
pub mod machine_state;
pub mod monitoring;
pub mod observer;
pub mod ordering;
pub mod placement;
pub mod registry;
pub mod simulation;
pub mod task_state;
pub mod trace;
pub mod workload;

pub use config::SimulationConfig;
pub use environment::{Environment, EnvironmentBuilder, Machine};
pub use monitoring::{TaskStatsCollector, WorkflowStatsCollector};
pub use observer::Observer;
pub use ordering::OrderingPolicy;
pub use placement::PlacementPolicy;
pub use registry::Registry;
pub use simulation::Simulation;
pub use trace::{Task, Trace, Workflow};
pub use workload::reader::TraceReader;
