//! Plan-execution orchestration CLI.
//!
//! Works on `.boulder/` in the current directory: plans live in
//! `.boulder/plans/`, the execution state in `.boulder/boulder.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use boulder::checkpoint::{CheckpointMessage, check_wave_checkpoint, decide};
use boulder::continuation::{ContinuationController, ContinuationOutcome, SessionEvent};
use boulder::core::checkpoint::CheckpointMode;
use boulder::core::story::StoryStatus;
use boulder::exit_codes;
use boulder::io::boulder_state::{
    PlanType, clear_boulder_state, get_plan_progress, read_boulder_state,
    record_quality_gate_iteration,
};
use boulder::io::config::load_config;
use boulder::io::delivery::StdoutDelivery;
use boulder::io::init::{BoulderPaths, InitOptions, init_boulder};
use boulder::io::story::FsStoryReader;
use boulder::logging;
use boulder::plans::{complete_task, find_plans, next_task};
use boulder::start::{StartOptions, start_work};
use boulder::story_guard::{GuardVerdict, TransitionRequest, guard_story_transition};

#[derive(Parser)]
#[command(
    name = "boulder",
    version,
    about = "Plan-execution orchestration: waves, checkpoints, story lifecycle and continuation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.boulder/` with a plans directory and default config.
    Init {
        /// Overwrite engine-owned files.
        #[arg(short, long)]
        force: bool,
    },
    /// Start executing a plan, replacing any active state.
    Start {
        plan: PathBuf,
        /// Agent that must be acting before continuations are injected.
        #[arg(long)]
        agent: Option<String>,
        /// story-driven | task-driven | research
        #[arg(long)]
        plan_type: Option<PlanType>,
        #[arg(long)]
        squad: Option<String>,
        #[arg(long)]
        executor: Option<String>,
        /// Session starting the work.
        #[arg(long)]
        session: Option<String>,
    },
    /// Show the active execution state.
    Status,
    /// Print checkbox progress of a plan (the active one by default).
    Progress { plan: Option<PathBuf> },
    /// List plans under `.boulder/plans/`.
    Plans,
    /// Print the next incomplete task of the active plan.
    Next,
    /// Tick task `number` in the active plan.
    Complete { number: u32 },
    /// Evaluate the boundary after a wave of the active plan.
    Checkpoint {
        wave: u32,
        /// Overrides `[checkpoint] mode` from config.
        #[arg(long)]
        mode: Option<CheckpointMode>,
    },
    /// Apply a GO/PAUSE/REVIEW/ABORT reply to a wave checkpoint.
    Decide {
        wave: u32,
        #[arg(required = true, num_args = 1..)]
        response: Vec<String>,
    },
    /// Count another iteration of a quality gate for the active plan.
    Gate { name: String },
    /// Check a story status change against the lifecycle guard.
    Transition {
        story: PathBuf,
        status: StoryStatus,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Handle an idle event for a session, printing a directive if one is due.
    Idle {
        session: String,
        /// Agent that last acted in the session.
        #[arg(long)]
        agent: Option<String>,
        /// Treat the session as the host's main session.
        #[arg(long)]
        main: bool,
    },
    /// Delete the execution state.
    Clear,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Start {
            plan,
            agent,
            plan_type,
            squad,
            executor,
            session,
        } => cmd_start(
            &root,
            &StartOptions {
                plan,
                agent,
                plan_type,
                squad,
                executor,
                session_id: session,
            },
        ),
        Command::Status => cmd_status(&root),
        Command::Progress { plan } => cmd_progress(&root, plan.as_deref()),
        Command::Plans => cmd_plans(&root),
        Command::Next => cmd_next(&root),
        Command::Complete { number } => cmd_complete(&root, number),
        Command::Checkpoint { wave, mode } => cmd_checkpoint(&root, wave, mode),
        Command::Decide { wave, response } => cmd_decide(&root, wave, &response.join(" ")),
        Command::Gate { name } => cmd_gate(&root, &name),
        Command::Transition {
            story,
            status,
            agent,
        } => cmd_transition(&root, &story, status, agent.as_deref()),
        Command::Idle {
            session,
            agent,
            main,
        } => cmd_idle(&root, session, agent, main),
        Command::Clear => {
            clear_boulder_state(&root)?;
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_boulder(root, &InitOptions { force })?;
    println!("initialized {}", paths.boulder_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_start(root: &Path, options: &StartOptions) -> Result<i32> {
    let outcome = start_work(root, options)?;
    if let Some(previous) = &outcome.replaced {
        println!("replaced active plan {previous}");
    }
    println!(
        "started {} ({}/{} completed)",
        outcome.plan_name, outcome.progress.completed, outcome.progress.total
    );
    Ok(exit_codes::OK)
}

fn cmd_status(root: &Path) -> Result<i32> {
    let Some(state) = read_boulder_state(root) else {
        println!("no active plan");
        return Ok(exit_codes::OK);
    };
    let progress = get_plan_progress(&BoulderPaths::new(root).resolve_plan(&state.active_plan));
    println!("plan: {} ({})", state.plan_name, state.active_plan);
    println!("started: {}", state.started_at);
    println!("progress: {}/{} completed", progress.completed, progress.total);
    if let Some(agent) = &state.agent {
        println!("agent: {agent}");
    }
    if let Some(plan_type) = state.plan_type {
        println!("plan type: {plan_type}");
    }
    if let Some(wave) = state.current_wave {
        println!("current wave: {wave}");
    }
    if !state.session_ids.is_empty() {
        println!("sessions: {}", state.session_ids.join(", "));
    }
    Ok(exit_codes::OK)
}

fn cmd_progress(root: &Path, plan: Option<&Path>) -> Result<i32> {
    let plan_path = match plan {
        Some(plan) => root.join(plan),
        None => {
            let state = read_boulder_state(root).ok_or_else(|| anyhow!("no active plan"))?;
            BoulderPaths::new(root).resolve_plan(&state.active_plan)
        }
    };
    let progress = get_plan_progress(&plan_path);
    println!(
        "{}/{} completed{}",
        progress.completed,
        progress.total,
        if progress.is_complete { " (complete)" } else { "" }
    );
    Ok(exit_codes::OK)
}

fn cmd_plans(root: &Path) -> Result<i32> {
    for plan in find_plans(root)? {
        let modified = plan
            .modified
            .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{}\t{}/{}\t{modified}",
            plan.name, plan.progress.completed, plan.progress.total
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_next(root: &Path) -> Result<i32> {
    let Some(task) = next_task(root)? else {
        println!("plan complete");
        return Ok(exit_codes::COMPLETE);
    };
    println!("{}. {}", task.number, task.title);
    if let Some(executor) = &task.executor {
        println!("executor: @{executor}");
    }
    Ok(exit_codes::OK)
}

fn cmd_complete(root: &Path, number: u32) -> Result<i32> {
    let progress = complete_task(root, number)?;
    println!("{}/{} completed", progress.completed, progress.total);
    Ok(exit_codes::OK)
}

fn cmd_checkpoint(root: &Path, wave: u32, mode: Option<CheckpointMode>) -> Result<i32> {
    let config = load_config(&BoulderPaths::new(root).config_path)?;
    let state = read_boulder_state(root).ok_or_else(|| anyhow!("no active plan"))?;
    let plan_path = BoulderPaths::new(root).resolve_plan(&state.active_plan);
    let mode = mode.unwrap_or(config.checkpoint.mode);
    match check_wave_checkpoint(root, &plan_path, wave, mode)? {
        None => Ok(exit_codes::OK),
        Some(message @ CheckpointMessage::AllWavesComplete(_)) => {
            print!("{}", message.text());
            Ok(exit_codes::OK)
        }
        Some(message @ CheckpointMessage::DecisionRequired(_)) => {
            print!("{}", message.text());
            Ok(exit_codes::BLOCKED)
        }
    }
}

fn cmd_decide(root: &Path, wave: u32, response: &str) -> Result<i32> {
    let (action, state) = decide(root, wave, response)?;
    match state.and_then(|state| state.current_wave) {
        Some(current) => println!("{action}: current wave {current}"),
        None => println!("{action}"),
    }
    Ok(exit_codes::OK)
}

fn cmd_transition(
    root: &Path,
    story: &Path,
    to: StoryStatus,
    agent: Option<&str>,
) -> Result<i32> {
    let config = load_config(&BoulderPaths::new(root).config_path)?;
    let request = TransitionRequest {
        story_path: story,
        to,
        agent,
    };
    match guard_story_transition(root, &config.story, &FsStoryReader, request) {
        Ok(GuardVerdict::Allowed { from, to }) => {
            println!("allowed: {from} -> {to}");
            Ok(exit_codes::OK)
        }
        Ok(GuardVerdict::Dormant) => {
            println!("allowed: story guard inactive");
            Ok(exit_codes::OK)
        }
        Ok(GuardVerdict::Overridden) => {
            println!("allowed: force override enabled");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("rejected: {err}");
            Ok(exit_codes::BLOCKED)
        }
    }
}

fn cmd_gate(root: &Path, name: &str) -> Result<i32> {
    let count = record_quality_gate_iteration(root, name)?
        .ok_or_else(|| anyhow!("no active plan (run `boulder start`)"))?;
    println!("{name}: {count}");
    Ok(exit_codes::OK)
}

fn cmd_idle(root: &Path, session: String, agent: Option<String>, main: bool) -> Result<i32> {
    let config = load_config(&BoulderPaths::new(root).config_path)?;
    let mut controller = ContinuationController::new(root, config.continuation, StdoutDelivery);
    if main {
        controller.set_main_session(Some(session.clone()));
    }
    if agent.is_some() {
        controller.handle_event(SessionEvent::MessageUpdated {
            session_id: session.clone(),
            agent,
        });
    }
    match controller.handle_event(SessionEvent::Idle {
        session_id: session,
    }) {
        ContinuationOutcome::Injected { .. } | ContinuationOutcome::Recorded => {
            Ok(exit_codes::OK)
        }
        ContinuationOutcome::Skipped(reason) => {
            eprintln!("skipped: {reason}");
            Ok(exit_codes::OK)
        }
        ContinuationOutcome::DeliveryFailed { failures } => Err(anyhow!(
            "continuation delivery failed ({failures} consecutive)"
        )),
    }
}
