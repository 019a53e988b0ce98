use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use ensemble::agents::AgentRegistry;
use ensemble::config::Config;
use ensemble::core::Workflow;
use ensemble::orchestration::{
    analyze_workflow_complexity, validate_workflow, ExecutionPlan, ResourceAllocator,
};
use ensemble::state::{FileStateStore, StateStore, LAST_RESULT_KEY, METRICS_KEY};
use ensemble::{elog, Error, Result};

/// Ensemble - multi-agent workflow coordination engine
#[derive(Parser, Debug)]
#[command(name = "ensemble")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    ENSEMBLE_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.ensemble/ensemble.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file to use instead of ~/.ensemble/ensemble.toml
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check a workflow file for structural errors
    Validate {
        /// Workflow file (.json or .toml)
        workflow: PathBuf,
    },

    /// Score task and workflow complexity
    Analyze {
        /// Workflow file (.json or .toml)
        workflow: PathBuf,
    },

    /// Show phases, agent assignments and the duration estimate
    Plan {
        /// Workflow file (.json or .toml)
        workflow: PathBuf,
    },

    /// Show the metrics and last run published to the state file
    Status,
}

fn main() {
    let cli = Cli::parse();
    ensemble::log::init_with_debug(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Validate { workflow } => run_validate(&workflow, &config, cli.json),
        Command::Analyze { workflow } => run_analyze(&workflow, cli.json),
        Command::Plan { workflow } => run_plan(&workflow, &config, cli.json),
        Command::Status => run_status(&config, cli.json),
    }
}

fn run_validate(path: &Path, config: &Config, json: bool) -> Result<()> {
    elog!("Validate command: {}", path.display());
    let workflow = Workflow::load(path)?;
    let registry = AgentRegistry::with_overrides(&config.agents);
    let report = validate_workflow(&workflow, &registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for error in &report.errors {
            println!("  error:   {}", error);
        }
        for warning in &report.warnings {
            println!("  warning: {}", warning);
        }
        println!(
            "{}: {}",
            workflow.name,
            if report.valid { "valid" } else { "invalid" }
        );
    }

    if report.valid {
        Ok(())
    } else {
        Err(Error::InvalidWorkflow(report.errors))
    }
}

fn run_analyze(path: &Path, json: bool) -> Result<()> {
    elog!("Analyze command: {}", path.display());
    let workflow = Workflow::load(path)?;
    let analysis = analyze_workflow_complexity(&workflow);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    for task in &analysis.tasks {
        println!(
            "  {:<24} {:>3}  {}",
            task.task_id.as_str(), task.score.score, task.score.category
        );
    }
    println!();
    println!("  Overall:  {:.1} ({})", analysis.overall, analysis.category);
    println!("  Strategy: {}", analysis.strategy);
    Ok(())
}

fn run_plan(path: &Path, config: &Config, json: bool) -> Result<()> {
    elog!("Plan command: {}", path.display());
    let workflow = Workflow::load(path)?;
    let registry = AgentRegistry::with_overrides(&config.agents);

    let report = validate_workflow(&workflow, &registry);
    if !report.valid {
        return Err(Error::InvalidWorkflow(report.errors));
    }

    let allocator = ResourceAllocator::new(
        &registry,
        std::time::Duration::from_secs(config.average_task_duration_secs),
    );
    let plan = allocator.plan(&workflow)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&workflow, &plan);
    }
    Ok(())
}

fn print_plan(workflow: &Workflow, plan: &ExecutionPlan) {
    println!("Workflow: {} ({})", workflow.name, workflow.id);
    println!("Mode:     {}", plan.mode);
    println!("Estimate: {}s", plan.estimated_duration.as_secs());
    println!();
    for (index, phase) in plan.phases.iter().enumerate() {
        println!("Phase {}:", index + 1);
        for task in phase {
            let agent = plan
                .agent_of(&task.id)
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<24} -> {}", task.id.as_str(), agent);
        }
    }
    println!();
    for (agent, slots) in &plan.concurrency {
        let count = plan.assignments.get(agent).map(Vec::len).unwrap_or(0);
        println!("  {:<24} {} tasks, {} at a time", agent.as_str(), count, slots);
    }
}

fn run_status(config: &Config, json: bool) -> Result<()> {
    let path = config.state_path()?;
    elog!("Status command: {}", path.display());
    let store = FileStateStore::open(&path)?;
    let metrics = store.get(METRICS_KEY)?;
    let last = store.get(LAST_RESULT_KEY)?;

    if json {
        let status = serde_json::json!({ "metrics": metrics, "last_result": last });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match metrics {
        Some(m) => println!("Metrics:\n{}", serde_json::to_string_pretty(&m)?),
        None => println!("No runs recorded in {}", path.display()),
    }
    if let Some(last) = last {
        println!("Last run:\n{}", serde_json::to_string_pretty(&last)?);
    }
    Ok(())
}
