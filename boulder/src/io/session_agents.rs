//! Persisted last-agent map (`.boulder/session_agents.json`).
//!
//! Survives controller restarts so the continuation check can still tell who
//! was acting in a session before the in-memory map was rebuilt.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::agent::AgentStrategy;

/// Load the map; missing or corrupt files read as empty.
pub fn load_session_agents(path: &Path) -> BTreeMap<String, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    serde_json::from_str(&contents).unwrap_or_else(|err| {
        debug!(path = %path.display(), error = %err, "ignoring corrupt session agent map");
        BTreeMap::new()
    })
}

/// Record `agent` as the last agent seen in `session_id`.
pub fn record_session_agent(path: &Path, session_id: &str, agent: &str) -> Result<()> {
    let mut agents = load_session_agents(path);
    if agents.get(session_id).map(String::as_str) == Some(agent) {
        return Ok(());
    }
    agents.insert(session_id.to_string(), agent.to_string());
    write_session_agents(path, &agents)
}

/// Drop a session from the map (no-op when absent).
pub fn forget_session_agent(path: &Path, session_id: &str) -> Result<()> {
    let mut agents = load_session_agents(path);
    if agents.remove(session_id).is_none() {
        return Ok(());
    }
    write_session_agents(path, &agents)
}

fn write_session_agents(path: &Path, agents: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(agents).context("serialize session agents")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))
}

/// Resolution strategy backed by the persisted map.
pub struct PersistedAgents {
    path: PathBuf,
}

impl PersistedAgents {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AgentStrategy for PersistedAgents {
    fn name(&self) -> &'static str {
        "persisted-agents"
    }

    fn resolve(&self, session_id: &str) -> Option<String> {
        load_session_agents(&self.path).remove(session_id)
    }
}
