//! Execution state ("boulder state") storage in `.boulder/boulder.json`.
//!
//! There is at most one record per project. Reads are lenient: a missing or
//! corrupt file is simply "no state". Mutations go through [`update_boulder_state`],
//! which merges `session_ids` with whatever is on disk right before committing.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::core::plan::Wave;
use crate::core::progress::{PlanProgress, count_checkboxes};
use crate::io::init::BoulderPaths;

/// Kind of plan being executed. Story-driven plans activate the story guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanType {
    StoryDriven,
    TaskDriven,
    Research,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoryDriven => "story-driven",
            Self::TaskDriven => "task-driven",
            Self::Research => "research",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "story-driven" => Ok(Self::StoryDriven),
            "task-driven" => Ok(Self::TaskDriven),
            "research" => Ok(Self::Research),
            other => Err(anyhow!(
                "unknown plan type '{other}' (expected story-driven|task-driven|research)"
            )),
        }
    }
}

/// Per-wave counts captured when the state was last written.
///
/// May be stale; gating decisions always re-parse the plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WaveSnapshot {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub total: usize,
    pub completed: usize,
}

/// Persisted execution state. Field names are a compatibility contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BoulderState {
    /// Plan path, relative to the project root or absolute.
    pub active_plan: String,
    /// RFC 3339 timestamp of when work on the plan started.
    pub started_at: String,
    /// Sessions that have worked on this plan, in first-seen order.
    pub session_ids: Vec<String>,
    pub plan_name: String,
    /// Agent required to be acting before a continuation is injected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squad: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_plan_type"
    )]
    pub plan_type: Option<PlanType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_wave: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waves: Vec<WaveSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub quality_gate_iterations: BTreeMap<String, u32>,
}

impl BoulderState {
    /// Fresh state for a plan, stamped with the current time.
    pub fn new(active_plan: impl Into<String>, plan_name: impl Into<String>) -> Self {
        Self {
            active_plan: active_plan.into(),
            started_at: Utc::now().to_rfc3339(),
            plan_name: plan_name.into(),
            ..Self::default()
        }
    }

    /// Add `session_id` unless it is already tracked. Returns true if added.
    pub fn track_session(&mut self, session_id: &str) -> bool {
        if self.session_ids.iter().any(|id| id == session_id) {
            return false;
        }
        self.session_ids.push(session_id.to_string());
        true
    }

    pub fn is_story_driven(&self) -> bool {
        self.plan_type == Some(PlanType::StoryDriven)
    }

    /// Replace the wave snapshot with counts from a live parse.
    pub fn refresh_wave_snapshot(&mut self, waves: &[Wave]) {
        self.waves = waves
            .iter()
            .map(|wave| WaveSnapshot {
                number: wave.number,
                name: (!wave.name.is_empty()).then(|| wave.name.clone()),
                total: wave.total(),
                completed: wave.completed(),
            })
            .collect();
    }
}

/// Unknown plan types degrade to `None` instead of rejecting the record.
fn lenient_plan_type<'de, D>(deserializer: D) -> std::result::Result<Option<PlanType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|value| value.parse().ok()))
}

/// Read the execution state for `root`.
///
/// Returns `None` when the file is missing, unreadable or corrupt.
pub fn read_boulder_state(root: &Path) -> Option<BoulderState> {
    let path = BoulderPaths::new(root).state_path;
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no boulder state");
            return None;
        }
    };
    match serde_json::from_str::<BoulderState>(&contents) {
        Ok(state) => {
            debug!(
                plan = %state.active_plan,
                sessions = state.session_ids.len(),
                "boulder state loaded"
            );
            Some(state)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring corrupt boulder state");
            None
        }
    }
}

/// Replace the execution state (no merge with the prior record).
pub fn write_boulder_state(root: &Path, state: &BoulderState) -> Result<()> {
    let path = BoulderPaths::new(root).state_path;
    debug!(path = %path.display(), plan = %state.active_plan, "writing boulder state");
    let mut buf = serde_json::to_string_pretty(state).context("serialize boulder state")?;
    buf.push('\n');
    write_atomic(&path, &buf)
}

/// Delete the execution state. Succeeds when nothing exists.
pub fn clear_boulder_state(root: &Path) -> Result<()> {
    let path = BoulderPaths::new(root).state_path;
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "cleared boulder state");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

/// Read-modify-write the execution state.
///
/// Returns `Ok(None)` without writing when no state exists. Just before the
/// write the on-disk record is re-read:
///
/// - gone (cleared meanwhile): nothing is written and `Ok(None)` is returned;
/// - a different run (other `active_plan` or `started_at`): nothing is written
///   and the newer record is returned unchanged;
/// - the same run: its `session_ids` are unioned in so a concurrent append is kept.
pub fn update_boulder_state<F>(root: &Path, mutate: F) -> Result<Option<BoulderState>>
where
    F: FnOnce(&mut BoulderState),
{
    let Some(mut state) = read_boulder_state(root) else {
        return Ok(None);
    };
    mutate(&mut state);

    let Some(latest) = read_boulder_state(root) else {
        debug!(plan = %state.active_plan, "boulder state cleared during update, dropping write");
        return Ok(None);
    };
    if latest.active_plan != state.active_plan || latest.started_at != state.started_at {
        debug!(
            stale = %state.active_plan,
            active = %latest.active_plan,
            "boulder state replaced during update, dropping write"
        );
        return Ok(Some(latest));
    }

    let mut merged = latest.session_ids;
    for id in &state.session_ids {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    state.session_ids = merged;

    write_boulder_state(root, &state)?;
    Ok(Some(state))
}

/// Add a session id to the execution state (idempotent union).
///
/// Never creates a state: returns `Ok(None)` if none exists.
pub fn append_session_id(root: &Path, session_id: &str) -> Result<Option<BoulderState>> {
    let Some(existing) = read_boulder_state(root) else {
        return Ok(None);
    };
    if existing.session_ids.iter().any(|id| id == session_id) {
        return Ok(Some(existing));
    }
    update_boulder_state(root, |state| {
        state.track_session(session_id);
    })
}

/// Move `current_wave` past the completed boundary `from_wave`.
///
/// The result is `max(current_wave, from_wave + 1)`, so repeating the same
/// boundary is a no-op. A state without a current wave lands on `from_wave + 1`.
pub fn advance_wave(root: &Path, from_wave: u32) -> Result<Option<BoulderState>> {
    let target = from_wave.saturating_add(1);
    update_boulder_state(root, |state| {
        state.current_wave = Some(state.current_wave.map_or(target, |current| current.max(target)));
    })
}

/// Increment the iteration counter for a quality gate, returning the stored value.
///
/// `None` when there is no active plan.
pub fn record_quality_gate_iteration(root: &Path, gate: &str) -> Result<Option<u32>> {
    let updated = update_boulder_state(root, |state| {
        *state
            .quality_gate_iterations
            .entry(gate.to_string())
            .or_insert(0) += 1;
    })?;
    Ok(updated.map(|state| state.quality_gate_iterations.get(gate).copied().unwrap_or(0)))
}

/// Count checkboxes in the plan at `plan_path`.
///
/// An unreadable plan counts as empty, which is complete.
pub fn get_plan_progress(plan_path: &Path) -> PlanProgress {
    match fs::read_to_string(plan_path) {
        Ok(contents) => count_checkboxes(&contents),
        Err(err) => {
            debug!(path = %plan_path.display(), error = %err, "plan unreadable, treating as empty");
            count_checkboxes("")
        }
    }
}

/// Display name for a plan: its file stem.
pub fn plan_name_from_path(plan_path: &Path) -> String {
    plan_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("boulder state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp boulder state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace boulder state {}", path.display()))?;
    Ok(())
}
