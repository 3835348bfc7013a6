//! Manyworlds - Entry Point
//!
//! Loads a scenario, runs the many-worlds planner against its goal, and
//! prints every plan found with its score, best first.

use std::path::PathBuf;

use clap::Parser;
use tokio::runtime::Runtime;

use manyworlds::core::cancel::CancelFlag;
use manyworlds::core::config::PlannerConfig;
use manyworlds::core::error::{Result, SimError};
use manyworlds::htn::registry::goal_catalog;
use manyworlds::htn::build_goal;
use manyworlds::planner::{ManyWorldsPlanner, Scorer, TeamStrengthScorer};
use manyworlds::scenario;

#[derive(Parser, Debug)]
#[command(name = "manyworlds", about = "Branching combat simulation planner")]
struct Args {
    /// Scenario JSON file with agents and a goal section
    scenario: Option<PathBuf>,

    /// List the available goal kinds and exit
    #[arg(long)]
    list_goals: bool,

    /// Optional planner configuration TOML; defaults apply otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many plans, overriding the config value
    #[arg(long)]
    max_plans: Option<usize>,

    /// Step branches on rayon worker threads
    #[arg(long)]
    multithread: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manyworlds=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.list_goals {
        for descriptor in goal_catalog() {
            println!("{:<20} {}", descriptor.name, descriptor.summary);
        }
        return Ok(());
    }
    let scenario_path = args.scenario.as_ref().ok_or_else(|| {
        SimError::GoalConfiguration("a scenario file is required unless --list-goals".into())
    })?;

    let mut config = match &args.config {
        Some(path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(max_plans) = args.max_plans {
        config.max_plans = max_plans;
    }
    if args.multithread {
        config.multithread = true;
    }

    let scenario = scenario::load_from_file(scenario_path)?;
    let goal_params = scenario.goal.as_ref().ok_or_else(|| {
        SimError::GoalConfiguration("scenario file has no goal section".into())
    })?;
    let team = scenario.world.friendly_team();
    let goal = build_goal(team, scenario.friendly_agents.clone(), goal_params)?;

    tracing::info!(
        agents = scenario.world.agents().count(),
        goal = goal.name(),
        "search starting"
    );

    let planner = ManyWorldsPlanner::new(config, CancelFlag::new());
    let rt = Runtime::new()?;
    let plans = rt.block_on(async {
        let mut rx = planner.plan_stream(&scenario.world, goal);
        let mut plans = Vec::new();
        while let Some(plan) = rx.recv().await {
            println!("--- plan {} ---", plans.len() + 1);
            println!("{}", plan.describe());
            plans.push(plan);
        }
        plans
    });

    if plans.is_empty() {
        println!("no plan satisfies the goal within the configured budgets");
        return Ok(());
    }

    let scorer = TeamStrengthScorer::new(team);
    let mut ranked: Vec<(usize, f64)> = plans
        .iter()
        .enumerate()
        .map(|(i, p)| (i, scorer.evaluate(&p.terminal)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("\n=== ranking ===");
    for (index, score) in &ranked {
        println!(
            "plan {} score {:.1} ({:.0}s simulated)",
            index + 1,
            score,
            plans[*index].sim_seconds
        );
    }
    let best = ranked[0].0;
    println!("\nbest plan:\n{}", plans[best].describe());

    Ok(())
}
