//! Orchestration for starting work on a plan.
//!
//! Starting writes a fresh execution state pointing at the plan. Any previous
//! state is replaced, including its session list; the only carry-over is the
//! session that issued the start, if one is given.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::core::plan::parse_waves;
use crate::core::progress::PlanProgress;
use crate::io::boulder_state::{
    BoulderState, PlanType, get_plan_progress, plan_name_from_path, read_boulder_state,
    write_boulder_state,
};

/// Inputs for `boulder start`.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Plan file, relative to the project root or absolute.
    pub plan: PathBuf,
    /// Agent required for continuation; `None` falls back to the configured default.
    pub agent: Option<String>,
    pub plan_type: Option<PlanType>,
    pub squad: Option<String>,
    pub executor: Option<String>,
    /// Session starting the work, recorded as the first tracked session.
    pub session_id: Option<String>,
}

/// Outcome of `boulder start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub plan_name: String,
    pub progress: PlanProgress,
    pub current_wave: Option<u32>,
    /// Plan of the state that was replaced, if any.
    pub replaced: Option<String>,
}

/// Begin executing `options.plan` in `root`.
pub fn start_work(root: &Path, options: &StartOptions) -> Result<StartOutcome> {
    let plan_path = if options.plan.is_absolute() {
        options.plan.clone()
    } else {
        root.join(&options.plan)
    };
    if !plan_path.is_file() {
        return Err(anyhow!("plan not found: {}", plan_path.display()));
    }
    let text = fs::read_to_string(&plan_path)
        .with_context(|| format!("read plan {}", plan_path.display()))?;

    let replaced = read_boulder_state(root).map(|prior| prior.active_plan);
    let plan_name = plan_name_from_path(&plan_path);
    let waves = parse_waves(&text);

    let mut state = BoulderState::new(options.plan.to_string_lossy(), plan_name.clone());
    state.agent = options.agent.clone();
    state.plan_type = options.plan_type;
    state.squad = options.squad.clone();
    state.executor = options.executor.clone();
    state.current_wave = waves
        .iter()
        .find(|wave| !wave.is_complete())
        .or(waves.last())
        .map(|wave| wave.number);
    state.refresh_wave_snapshot(&waves);
    if let Some(session_id) = options.session_id.as_deref() {
        state.track_session(session_id);
    }

    if let Some(previous) = replaced.as_deref() {
        debug!(previous, "replacing existing boulder state");
    }
    write_boulder_state(root, &state)?;

    let progress = get_plan_progress(&plan_path);
    info!(
        plan = %state.active_plan,
        completed = progress.completed,
        total = progress.total,
        waves = waves.len(),
        "work started"
    );
    Ok(StartOutcome {
        plan_name,
        progress,
        current_wave: state.current_wave,
        replaced,
    })
}
