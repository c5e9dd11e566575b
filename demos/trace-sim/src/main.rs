//! Trace replay host: wires a trace, an environment and a policy pair into a
//! simulation run and persists the timing statistics.

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser;
use env_logger::Builder;
use sugars::{rc, refcell};

use tracesim::config::SimulationConfig;
use tracesim::environment::EnvironmentBuilder;
use tracesim::monitoring::{TaskStatsCollector, WorkflowStatsCollector};
use tracesim::registry::{ordering_policies, placement_policies};
use tracesim::simulation::Simulation;
use tracesim::workload::reader::trace_readers;
use tracesim::workload::synthetic::SyntheticWorkload;

#[derive(Parser)]
#[command(name = "trace-sim")]
#[command(about = "Replay a workflow task trace on a simulated cluster", version)]
struct Cli {
    /// Trace files (tab-separated, one task per row)
    input: Vec<PathBuf>,

    /// Experiment configuration file; flags override its values
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory for tasks.tsv and workflows.tsv
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Explicit machine count
    #[arg(long)]
    machines: Option<usize>,

    /// Target utilization in (0, 1]; sizes the cluster from the trace
    #[arg(long)]
    utilization: Option<f64>,

    /// Cores per machine
    #[arg(long)]
    cores: Option<u32>,

    /// Memory per machine (reserved; not enforced)
    #[arg(long)]
    memory: Option<u64>,

    /// Task-order policy: fcfs, sjf or ewf
    #[arg(long)]
    order: Option<String>,

    /// Task-placement policy: best-fit
    #[arg(long)]
    placement: Option<String>,

    /// Trace reader plug-in
    #[arg(long)]
    reader: Option<String>,

    /// Fraction of workflows to retain
    #[arg(long)]
    sampling: Option<f64>,

    /// Generate a synthetic workload instead of reading trace files
    #[arg(long)]
    synthetic: bool,

    /// Seed for the synthetic workload
    #[arg(long)]
    seed: Option<u64>,
}

fn effective_config(cli: &Cli) -> SimulationConfig {
    let mut config = cli
        .config
        .as_deref()
        .map(SimulationConfig::from_file)
        .unwrap_or_default();

    if !cli.input.is_empty() {
        config.trace_paths = cli.input.clone();
    }
    if cli.synthetic && config.synthetic.is_none() {
        config.synthetic = Some(SyntheticWorkload::default());
    }
    if let (Some(seed), Some(synthetic)) = (cli.seed, config.synthetic.as_mut()) {
        synthetic.seed = seed;
    }
    if cli.output_dir.is_some() {
        config.output_dir = cli.output_dir.clone();
    }
    if cli.machines.is_some() {
        config.machine_count = cli.machines;
    }
    if cli.utilization.is_some() {
        config.target_utilization = cli.utilization;
    }
    if let Some(cores) = cli.cores {
        config.cpus_per_machine = cores;
    }
    if let Some(memory) = cli.memory {
        config.memory_per_machine = memory;
    }
    if cli.order.is_some() {
        config.task_order_policy = cli.order.clone();
    }
    if cli.placement.is_some() {
        config.task_placement_policy = cli.placement.clone();
    }
    if cli.reader.is_some() {
        config.trace_reader = cli.reader.clone();
    }
    if cli.sampling.is_some() {
        config.sampling_fraction = cli.sampling;
    }
    config
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let cli = Cli::parse();
    let config = effective_config(&cli);

    let trace = if let Some(synthetic) = &config.synthetic {
        synthetic.generate()
    } else {
        if config.trace_paths.is_empty() {
            panic!("no trace files given and no synthetic workload configured");
        }
        let mut reader = trace_readers().get(config.trace_reader.as_deref());
        reader.read_trace(&config.trace_paths, config.sampling_fraction)
    };
    let trace = Rc::new(trace);

    let mut environment = EnvironmentBuilder::new(config.cpus_per_machine, config.memory_per_machine);
    if let Some(count) = config.machine_count {
        environment = environment.with_machine_count(count);
    }
    if let Some(rho) = config.target_utilization {
        environment = environment.with_target_utilization(rho);
    }
    let environment = environment.build(&trace);

    let workflow_stats = rc!(refcell!(WorkflowStatsCollector::new(trace.clone())));
    let task_stats = rc!(refcell!(TaskStatsCollector::new(trace.clone())));

    let ordering = ordering_policies(trace.clone(), workflow_stats.clone())
        .get(config.task_order_policy.as_deref());
    let placement = placement_policies().get(config.task_placement_policy.as_deref());

    let mut sim = Simulation::new(trace.clone(), &environment, ordering, placement);
    sim.add_observer(workflow_stats.clone());
    sim.add_observer(task_stats.clone());

    let t = Instant::now();
    sim.run();
    let elapsed = t.elapsed();
    sim.sanity_check();

    println!(
        "Replayed {} tasks in {:.3}s: simulated time {}, {} events",
        trace.task_count(),
        elapsed.as_secs_f64(),
        sim.time(),
        sim.event_count()
    );

    if let Some(output_dir) = &config.output_dir {
        std::fs::create_dir_all(output_dir)
            .unwrap_or_else(|e| panic!("Can't create directory {}: {}", output_dir.display(), e));
        task_stats.borrow().dump(&output_dir.join("tasks.tsv"));
        workflow_stats.borrow().dump(&output_dir.join("workflows.tsv"));
        println!("Statistics written to {}", output_dir.display());
    }
}
