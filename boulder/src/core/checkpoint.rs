//! Wave checkpoint decisions.
//!
//! Pure logic only: given freshly parsed waves, decide what happens at the
//! boundary after `wave_number`. State mutation lives in [`crate::checkpoint`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::plan::Wave;

/// How wave boundaries are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointMode {
    /// Advance to the next wave without asking.
    #[default]
    Auto,
    /// Stop and ask for GO/PAUSE/REVIEW/ABORT.
    Interactive,
}

impl FromStr for CheckpointMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "interactive" => Ok(Self::Interactive),
            other => Err(anyhow!(
                "unknown checkpoint mode '{other}' (expected auto|interactive)"
            )),
        }
    }
}

/// Decision taken at a wave boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckpointAction {
    Go,
    Pause,
    Review,
    Abort,
}

impl CheckpointAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::Pause => "PAUSE",
            Self::Review => "REVIEW",
            Self::Abort => "ABORT",
        }
    }
}

impl fmt::Display for CheckpointAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static ACTION_PATTERNS: LazyLock<Vec<(CheckpointAction, Regex)>> = LazyLock::new(|| {
    [
        (CheckpointAction::Abort, r"(?i)\babort\b"),
        (CheckpointAction::Review, r"(?i)\breview\b"),
        (CheckpointAction::Pause, r"(?i)\bpause\b"),
        (CheckpointAction::Go, r"(?i)\bgo\b"),
    ]
    .into_iter()
    .map(|(action, pattern)| (action, Regex::new(pattern).expect("action regex is valid")))
    .collect()
});

/// Extract an action from a free-form response.
///
/// Keywords are checked as `ABORT > REVIEW > PAUSE > GO`; ambiguous or empty
/// input resolves to `GO` so progress is never blocked.
pub fn parse_action(response: &str) -> CheckpointAction {
    ACTION_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(response))
        .map(|(action, _)| *action)
        .unwrap_or(CheckpointAction::Go)
}

/// Outcome of evaluating the boundary after a wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointDecision {
    /// Wave is unknown or still has open tasks.
    NoCheckpoint,
    /// The last wave finished; the plan has no further waves.
    AllWavesComplete { wave: u32 },
    /// Auto mode: move on to `next_wave` immediately.
    Advance { wave: u32, next_wave: u32 },
    /// Interactive mode: wait for an explicit action.
    AwaitDecision { wave: u32, next_wave: u32 },
}

/// Decide what happens once `wave_number` may have finished.
pub fn evaluate_checkpoint(
    waves: &[Wave],
    wave_number: u32,
    mode: CheckpointMode,
) -> CheckpointDecision {
    let Some(wave) = waves.iter().find(|wave| wave.number == wave_number) else {
        return CheckpointDecision::NoCheckpoint;
    };
    if !wave.is_complete() {
        return CheckpointDecision::NoCheckpoint;
    }
    let next_wave = wave_number.saturating_add(1);
    if !waves.iter().any(|wave| wave.number == next_wave) {
        return CheckpointDecision::AllWavesComplete { wave: wave_number };
    }
    match mode {
        CheckpointMode::Auto => CheckpointDecision::Advance {
            wave: wave_number,
            next_wave,
        },
        CheckpointMode::Interactive => CheckpointDecision::AwaitDecision {
            wave: wave_number,
            next_wave,
        },
    }
}
