//! htn-sim - headless HTN planner simulation.
//!
//! - `htn-sim run` - tick the reference agent and print a summary
//! - `htn-sim plan <GOAL>` - plan once from the initial world state and print the plan
//! - `htn-sim tasks` - list registered tasks and the task graph

mod config;
mod domain;
mod selector;
mod sim;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use htn::generate_plan;
use htn_tools::{TraceEvent, TraceSink};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::SimConfig;
use crate::sim::{initial_state, SimSummary, Simulation};

#[derive(Parser)]
#[command(name = "htn-sim")]
#[command(about = "Headless HTN planner simulation", version)]
struct Cli {
    /// Simulation config (YAML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation
    Run {
        /// Number of ticks (overrides the config)
        #[arg(long)]
        ticks: Option<u64>,

        /// Print trace events as they are emitted
        #[arg(long)]
        trace: bool,

        /// Print trace events and the summary as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Plan once for a goal and print the flattened plan
    Plan {
        /// Task id of the goal, e.g. `bother`
        goal: String,
    },

    /// List registered tasks
    Tasks,
}

/// Prints each event on its own line.
struct StdoutSink {
    json: bool,
}

impl TraceSink for StdoutSink {
    fn emit(&mut self, event: TraceEvent) {
        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(%err, "failed to encode trace event"),
            }
        } else {
            println!("{event}");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = SimConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { ticks, trace, json } => run(config, ticks, trace, json),
        Commands::Plan { goal } => plan(config, &goal),
        Commands::Tasks => list_tasks(config),
    }
}

fn run(config: SimConfig, ticks: Option<u64>, trace: bool, json: bool) -> Result<()> {
    let ticks = ticks.unwrap_or(config.ticks);
    tracing::info!(ticks, agent = %config.agent.name, "Starting simulation");

    let mut sim = Simulation::new(config)?;
    if trace || json {
        sim = sim.with_trace_sink(StdoutSink { json });
    }

    let summary = sim.run(ticks);
    if json {
        println!("{}", summary_json(&summary));
    } else {
        print_summary(&summary);
        if let Some(best) = sim.selector().last_best() {
            println!("Last top goal:   {} ({:.2})", best.goal, best.score);
        }
        if let Some(task) = sim.driver().plan().current_task() {
            println!("Current task:    {} (tick {})", task.name, sim.tick());
        }
    }
    Ok(())
}

fn summary_json(summary: &SimSummary) -> serde_json::Value {
    serde_json::json!({
        "ticks": summary.ticks,
        "plan_calls": summary.plan_calls,
        "plan_starts": summary.plan_starts,
        "plans_finished": summary.plans_finished,
        "plans_failed": summary.plans_failed,
        "repairs": summary.repairs,
        "actions_performed": summary.actions_performed,
        "goals": summary.goals.iter().map(|g| g.0).collect::<Vec<_>>(),
    })
}

fn print_summary(summary: &SimSummary) {
    println!("Simulation Summary");
    println!("==================");
    println!("Ticks:           {}", summary.ticks);
    println!("Plan calls:      {}", summary.plan_calls);
    println!("Plans started:   {}", summary.plan_starts);
    println!("Plans finished:  {}", summary.plans_finished);
    println!("Plans failed:    {}", summary.plans_failed);
    println!("Repairs:         {}", summary.repairs);
    println!("Actions:         {}", summary.actions_performed);
    let goals: Vec<_> = summary.goals.iter().map(|g| g.0).collect();
    println!("Recent goals:    {}", goals.join(", "));
}

fn plan(config: SimConfig, goal: &str) -> Result<()> {
    let sim = Simulation::new(config.clone())?;
    let goal = domain::task_id(sim.database(), goal)
        .with_context(|| format!("Unknown goal `{goal}`; see `htn-sim tasks`"))?;

    let mut state = initial_state(&config)?;
    let plan = generate_plan(
        goal,
        &mut state,
        sim.querier(),
        sim.database(),
        sim.predicates(),
        &config.driver.planner,
    );

    if plan.is_failed() {
        println!("No plan for `{goal}` from the initial state.");
        return Ok(());
    }

    let path: Vec<_> = plan.plan_path().iter().map(|id| id.0).collect();
    println!("Plan for `{goal}`: {}", path.join(" -> "));
    println!();
    print!("{}", plan.describe());
    Ok(())
}

fn list_tasks(config: SimConfig) -> Result<()> {
    let sim = Simulation::new(config)?;
    let database = sim.database();

    println!("{:<28} {:<10} SATISFIED BY", "TASK", "KIND");
    for vertex in database.graph() {
        let Some(task) = database.task(vertex.id) else {
            continue;
        };
        let mut kind = task.kind_name().to_string();
        if let Some(owner) = database.abstract_for(vertex.id) {
            kind = format!("{kind} ({owner})");
        }
        let adjacent: Vec<_> = vertex.adjacent.iter().map(|id| id.0).collect();
        println!("{:<28} {:<10} {}", vertex.id.0, kind, adjacent.join(", "));
    }

    let initial = sim.state();
    println!();
    println!(
        "Initial facts: {} flags, {} values, {} vectors",
        initial.current.flags.len(),
        initial.current.values.len(),
        initial.current.vectors.len()
    );
    Ok(())
}
