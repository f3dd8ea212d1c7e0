//! ---
//! ah_section: "05-networking-external-interfaces"
//! ah_subsection: "binary"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Operator CLI driving the autoheal pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use autoheal_bus::{BusMetrics, EventBus, SharedBus};
use autoheal_common::{
    init_tracing, new_registry, render_text, AppConfig, DatasetConfig, DatasetKind, PolicyKind,
    SharedRegistry,
};
use autoheal_resilience::{
    CycleOptions, CycleReport, FailureHint, FeedbackProvider, FixedFeedback, HumanFeedback,
    IncidentController, ResilienceMetrics,
};
use autoheal_sim::{AnomalyInjector, SimulatedDeployment};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

mod prompt;
mod simulate;
mod table;
mod train;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Self-healing deployment pipeline control utility",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", global = true, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run one detect, deploy and heal cycle")]
    Run(RunArgs),
    #[command(about = "Run the training scenarios against the adaptive policy")]
    Train(train::TrainArgs),
    #[command(about = "Print the learned value table and best strategy per state")]
    ShowTable,
    #[command(about = "Run the concurrent deployment fleet")]
    Simulate(simulate::SimulateArgs),
}

impl Commands {
    /// Names the log file this invocation writes to.
    fn component(&self) -> &'static str {
        match self {
            Commands::Run(_) => "run",
            Commands::Train(_) => "train",
            Commands::ShowTable => "show-table",
            Commands::Simulate(_) => "simulate",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailType {
    Crash,
    Latency,
}

impl From<FailType> for FailureHint {
    fn from(value: FailType) -> Self {
        match value {
            FailType::Crash => FailureHint::Crash,
            FailType::Latency => FailureHint::Latency,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Planner {
    Random,
    Rl,
}

impl From<Planner> for PolicyKind {
    fn from(value: Planner) -> Self {
        match value {
            Planner::Random => PolicyKind::Random,
            Planner::Rl => PolicyKind::Adaptive,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Scores,
    Health,
    Unmonitored,
}

impl From<Kind> for DatasetKind {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Scores => DatasetKind::Scores,
            Kind::Health => DatasetKind::Health,
            Kind::Unmonitored => DatasetKind::Unmonitored,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Verdict {
    Accept,
    Reject,
    Ask,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, value_name = "PATH", help = "Dataset to monitor")]
    dataset: Option<PathBuf>,
    #[arg(long, value_enum, help = "Kind of data the dataset holds")]
    kind: Option<Kind>,
    #[arg(long, value_enum, help = "Force the deployment to fail in this way")]
    fail_type: Option<FailType>,
    #[arg(long, help = "Inject an anomaly into the dataset before detection")]
    force_anomaly: bool,
    #[arg(long, value_enum, help = "Healing strategy selection")]
    planner: Option<Planner>,
    #[arg(long, help = "Try every action before exploiting")]
    train: bool,
    #[arg(long, value_enum, help = "Operator verdict on the healing decision")]
    feedback: Option<Verdict>,
    #[arg(long, help = "Seed every random component")]
    seed: Option<u64>,
    #[arg(long, help = "Print collected metrics in Prometheus text format")]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/autoheal.toml"));

    let (config, source) = match AppConfig::load_with_source(&candidates)? {
        Some(loaded) => (loaded.config, loaded.source),
        None => (AppConfig::default(), None),
    };
    init_tracing(cli.command.component(), &config.logging)?;
    match &source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => warn!("no configuration file found; using defaults"),
    }

    match cli.command {
        Commands::Run(args) => run(config, args)?,
        Commands::Train(args) => train::run(config, args)?,
        Commands::ShowTable => table::show(&config)?,
        Commands::Simulate(args) => simulate::run(config, args).await?,
    }
    Ok(())
}

/// Print every metric family gathered in `registry`.
pub(crate) fn print_metrics(registry: &SharedRegistry) -> Result<()> {
    let text = render_text(registry).context("unable to encode metrics")?;
    println!();
    print!("{text}");
    Ok(())
}

/// Event bus with metrics registered in `registry`.
pub(crate) fn instrumented_bus(registry: &SharedRegistry) -> Result<SharedBus> {
    let metrics = BusMetrics::register(registry).context("unable to register bus metrics")?;
    Ok(Arc::new(EventBus::new().with_metrics(metrics)))
}

/// Build a controller wired to the simulated trigger and anomaly injector.
pub(crate) fn controller(
    config: &AppConfig,
    bus: SharedBus,
    registry: SharedRegistry,
    feedback: Arc<dyn FeedbackProvider>,
    seed: Option<u64>,
) -> Result<IncidentController> {
    let metrics = ResilienceMetrics::new(registry).context("unable to register metrics")?;
    let (trigger, injector) = match seed {
        Some(seed) => (
            SimulatedDeployment::new().with_seed(seed),
            AnomalyInjector::new().with_seed(seed),
        ),
        None => (SimulatedDeployment::new(), AnomalyInjector::new()),
    };
    let controller = IncidentController::from_config(config, bus, Arc::new(trigger), Some(metrics))?
        .with_feedback(feedback)
        .with_mutator(Arc::new(injector));
    Ok(controller)
}

/// Fold command-line overrides into the loaded configuration. Flags that are
/// absent leave the configured value alone.
fn apply_run_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(path) = &args.dataset {
        config.dataset.path = path.clone();
    }
    if let Some(kind) = args.kind {
        config.dataset.kind = kind.into();
    }
    if let Some(planner) = args.planner {
        config.policy.kind = planner.into();
    }
    if args.train {
        config.policy.training = true;
    }
    if let Some(seed) = args.seed {
        config.policy.seed = Some(seed);
    }
}

fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    apply_run_overrides(&mut config, &args);
    config.validate()?;

    let feedback: Arc<dyn FeedbackProvider> = match args.feedback {
        Some(Verdict::Accept) => Arc::new(FixedFeedback(HumanFeedback::Accepted)),
        Some(Verdict::Reject) => Arc::new(FixedFeedback(HumanFeedback::Rejected)),
        Some(Verdict::Ask) => Arc::new(prompt::TerminalFeedback),
        None => Arc::new(autoheal_resilience::NoFeedback),
    };
    let registry = new_registry();
    let bus = instrumented_bus(&registry)?;
    let mut controller = controller(&config, bus, registry.clone(), feedback, args.seed)?;

    let report = controller.run_cycle(CycleOptions {
        failure_hint: args.fail_type.map(Into::into),
        force_anomaly: args.force_anomaly,
        force_failure: false,
    });
    print_report(&config.dataset, &report);
    if args.metrics {
        print_metrics(&registry)?;
    }
    Ok(())
}

pub(crate) fn print_report(dataset: &DatasetConfig, report: &CycleReport) {
    println!("Dataset: {} ({})", dataset.label(), dataset.kind.as_str());
    println!(
        "Deployment: {} in {:.2} ms",
        report.deployment.outcome, report.deployment.latency_ms
    );
    println!("Detected: {} ({})", report.detection.state, report.detection.reason);
    if let Some(healing) = &report.healing {
        println!(
            "Healing: {} -> {} in {:.2} ms",
            healing.action, healing.outcome, healing.latency_ms
        );
    }
    if let Some(value) = report.new_value {
        println!("Updated estimate: {:.3}", value);
    }
    if !report.is_up() {
        println!("Healing attempt failed. The service remains down.");
    }
    println!("Status: {}", report.status);
    for error in &report.errors {
        println!("warning: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(["autohealctl", "run"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn configured_training_survives_absent_flag() {
        let mut config = AppConfig::default();
        config.policy.training = true;
        apply_run_overrides(&mut config, &parse_run(&[]));
        assert!(config.policy.training);
    }

    #[test]
    fn flags_override_configuration() {
        let mut config = AppConfig::default();
        config.policy.training = false;
        apply_run_overrides(
            &mut config,
            &parse_run(&["--train", "--planner", "random", "--kind", "health", "--seed", "9"]),
        );
        assert!(config.policy.training);
        assert_eq!(config.policy.kind, PolicyKind::Random);
        assert_eq!(config.dataset.kind, DatasetKind::Health);
        assert_eq!(config.policy.seed, Some(9));
    }
}
