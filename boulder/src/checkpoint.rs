//! Wave checkpoint orchestration.
//!
//! Combines the pure decision in [`crate::core::checkpoint`] with the
//! execution state: auto mode advances `current_wave` immediately, interactive
//! mode renders a prompt and waits for [`apply_checkpoint_result`].

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::checkpoint::{
    CheckpointAction, CheckpointDecision, CheckpointMode, evaluate_checkpoint, parse_action,
};
use crate::core::plan::parse_waves;
use crate::io::boulder_state::{
    BoulderState, advance_wave, plan_name_from_path, read_boulder_state, update_boulder_state,
};
use crate::io::init::BoulderPaths;
use crate::io::prompt::{CheckpointInputs, render_checkpoint};

/// Text produced at a wave boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointMessage {
    /// The final wave finished; nothing left to gate.
    AllWavesComplete(String),
    /// Interactive prompt awaiting GO/PAUSE/REVIEW/ABORT.
    DecisionRequired(String),
}

impl CheckpointMessage {
    pub fn text(&self) -> &str {
        match self {
            Self::AllWavesComplete(text) | Self::DecisionRequired(text) => text,
        }
    }
}

/// Evaluate the boundary after `wave_number` of the plan at `plan_path`.
///
/// Returns `None` when the wave is unknown or unfinished, and when auto mode
/// has already advanced the state.
pub fn check_wave_checkpoint(
    root: &Path,
    plan_path: &Path,
    wave_number: u32,
    mode: CheckpointMode,
) -> Result<Option<CheckpointMessage>> {
    let text = fs::read_to_string(plan_path)
        .with_context(|| format!("read plan {}", plan_path.display()))?;
    let waves = parse_waves(&text);
    let plan_name = read_boulder_state(root)
        .map(|state| state.plan_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| plan_name_from_path(plan_path));

    match evaluate_checkpoint(&waves, wave_number, mode) {
        CheckpointDecision::NoCheckpoint => {
            debug!(wave = wave_number, "no checkpoint");
            Ok(None)
        }
        CheckpointDecision::AllWavesComplete { wave } => {
            info!(wave, plan = %plan_name, "all waves complete");
            Ok(Some(CheckpointMessage::AllWavesComplete(format!(
                "All {} waves of plan \"{plan_name}\" are complete (last: Wave {wave}).\n",
                waves.len()
            ))))
        }
        CheckpointDecision::Advance { wave, next_wave } => {
            info!(wave, next_wave, "auto checkpoint, advancing");
            apply_checkpoint_result(root, wave, CheckpointAction::Go)?;
            Ok(None)
        }
        CheckpointDecision::AwaitDecision { wave, next_wave } => {
            let (Some(current), Some(next)) = (
                waves.iter().find(|candidate| candidate.number == wave),
                waves.iter().find(|candidate| candidate.number == next_wave),
            ) else {
                return Ok(None);
            };
            let prompt = render_checkpoint(&CheckpointInputs {
                plan_name: &plan_name,
                wave: current,
                next_wave: next,
            })?;
            debug!(wave, next_wave, "awaiting checkpoint decision");
            Ok(Some(CheckpointMessage::DecisionRequired(prompt)))
        }
    }
}

/// Apply an explicit decision for the boundary after `wave_number`.
///
/// Only `GO` mutates state (move past `wave_number` once and refresh the wave
/// snapshot). Returns the state after the decision, or `None` if there is none.
pub fn apply_checkpoint_result(
    root: &Path,
    wave_number: u32,
    action: CheckpointAction,
) -> Result<Option<BoulderState>> {
    if action != CheckpointAction::Go {
        info!(wave = wave_number, action = %action, "checkpoint decision leaves state unchanged");
        return Ok(read_boulder_state(root));
    }

    let Some(advanced) = advance_wave(root, wave_number)? else {
        debug!(wave = wave_number, "no boulder state to advance");
        return Ok(None);
    };
    info!(from = wave_number, current_wave = ?advanced.current_wave, "wave advanced");

    let plan_path = BoulderPaths::new(root).resolve_plan(&advanced.active_plan);
    match fs::read_to_string(&plan_path) {
        Ok(text) => {
            let waves = parse_waves(&text);
            update_boulder_state(root, |state| state.refresh_wave_snapshot(&waves))
        }
        Err(err) => {
            debug!(path = %plan_path.display(), error = %err, "plan unreadable, snapshot kept");
            Ok(Some(advanced))
        }
    }
}

/// Parse a free-form reply and apply the resulting action.
pub fn decide(
    root: &Path,
    wave_number: u32,
    response: &str,
) -> Result<(CheckpointAction, Option<BoulderState>)> {
    let action = parse_action(response);
    let state = apply_checkpoint_result(root, wave_number, action)?;
    Ok((action, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::boulder_state::write_boulder_state;

    const PLAN: &str = "\
### Wave 1 - Setup
- [x] 1. Scaffold
### Wave 2 - Build
- [ ] 2. Implement
  **Executor**: @builder
";

    fn project(plan: &str, current_wave: Option<u32>) -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join(".boulder/plans");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("build.md"), plan).expect("write plan");
        let mut state = BoulderState::new(".boulder/plans/build.md", "build");
        state.current_wave = current_wave;
        write_boulder_state(temp.path(), &state).expect("write state");
        temp
    }

    fn plan_path(temp: &tempfile::TempDir) -> std::path::PathBuf {
        temp.path().join(".boulder/plans/build.md")
    }

    #[test]
    fn auto_mode_advances_once_and_returns_nothing() {
        let temp = project(PLAN, Some(1));
        let message = check_wave_checkpoint(temp.path(), &plan_path(&temp), 1, CheckpointMode::Auto)
            .expect("check");
        assert_eq!(message, None);

        let state = read_boulder_state(temp.path()).expect("state");
        assert_eq!(state.current_wave, Some(2));
        assert_eq!(state.waves.len(), 2);
    }

    #[test]
    fn repeated_checkpoint_or_go_for_one_wave_advances_once() {
        let temp = project(PLAN, Some(1));
        for _ in 0..3 {
            check_wave_checkpoint(temp.path(), &plan_path(&temp), 1, CheckpointMode::Auto)
                .expect("check");
        }
        assert_eq!(read_boulder_state(temp.path()).expect("state").current_wave, Some(2));

        let (_, after) = decide(temp.path(), 1, "GO").expect("decide");
        assert_eq!(after.expect("state").current_wave, Some(2));
    }

    #[test]
    fn interactive_mode_prompts_without_mutating() {
        let temp = project(PLAN, Some(1));
        let message = check_wave_checkpoint(
            temp.path(),
            &plan_path(&temp),
            1,
            CheckpointMode::Interactive,
        )
        .expect("check")
        .expect("prompt");
        let CheckpointMessage::DecisionRequired(prompt) = message else {
            panic!("expected decision prompt");
        };
        assert!(prompt.contains("[WAVE CHECKPOINT: plan \"build\"]"));
        assert!(prompt.contains("- Task 2: Implement (@builder)"));
        assert_eq!(
            read_boulder_state(temp.path()).expect("state").current_wave,
            Some(1)
        );

        let (action, state) = decide(temp.path(), 1, "go ahead").expect("decide");
        assert_eq!(action, CheckpointAction::Go);
        assert_eq!(state.expect("state").current_wave, Some(2));
    }

    #[test]
    fn non_go_actions_do_not_mutate() {
        let temp = project(PLAN, Some(1));
        for action in [
            CheckpointAction::Pause,
            CheckpointAction::Review,
            CheckpointAction::Abort,
        ] {
            let state = apply_checkpoint_result(temp.path(), 1, action)
                .expect("apply")
                .expect("state");
            assert_eq!(state.current_wave, Some(1));
        }
    }

    #[test]
    fn unfinished_or_unknown_wave_has_no_checkpoint() {
        let temp = project(PLAN, Some(1));
        for wave in [2, 7] {
            let message =
                check_wave_checkpoint(temp.path(), &plan_path(&temp), wave, CheckpointMode::Auto)
                    .expect("check");
            assert_eq!(message, None);
        }
        assert_eq!(
            read_boulder_state(temp.path()).expect("state").current_wave,
            Some(1)
        );
    }

    #[test]
    fn last_wave_reports_completion_in_auto_mode() {
        let temp = project(&PLAN.replace("- [ ] 2.", "- [x] 2."), Some(2));
        let message = check_wave_checkpoint(temp.path(), &plan_path(&temp), 2, CheckpointMode::Auto)
            .expect("check")
            .expect("message");
        assert!(matches!(message, CheckpointMessage::AllWavesComplete(_)));
        assert!(message.text().contains("All 2 waves"));
        assert_eq!(
            read_boulder_state(temp.path()).expect("state").current_wave,
            Some(2)
        );
    }
}
