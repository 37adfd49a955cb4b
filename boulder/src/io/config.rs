//! Engine configuration stored under `.boulder/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::agent::DEFAULT_AGENT;
use crate::core::checkpoint::CheckpointMode;

/// Engine configuration (TOML).
///
/// Edited by humans; every field has a default so a missing or partial file
/// still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BoulderConfig {
    pub checkpoint: CheckpointConfig,
    pub story: StoryConfig,
    pub continuation: ContinuationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckpointConfig {
    /// `auto` advances between waves silently; `interactive` asks first.
    pub mode: CheckpointMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoryConfig {
    /// Skip story lifecycle enforcement entirely.
    pub allow_force_override: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContinuationConfig {
    /// Agent that must be acting before a continuation is injected, when the
    /// execution state does not name one.
    pub default_agent: String,

    /// Host message directory (`<dir>/<session-id>/*.json`) scanned as the
    /// last resort when resolving a session's agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_dir: Option<PathBuf>,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            default_agent: DEFAULT_AGENT.to_string(),
            message_dir: None,
        }
    }
}

impl BoulderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.continuation.default_agent.trim().is_empty() {
            return Err(anyhow!("continuation.default_agent must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BoulderConfig::default()`.
pub fn load_config(path: &Path) -> Result<BoulderConfig> {
    if !path.exists() {
        let cfg = BoulderConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BoulderConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BoulderConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BoulderConfig::default());
        assert_eq!(cfg.continuation.default_agent, "builder");
        assert_eq!(cfg.checkpoint.mode, CheckpointMode::Auto);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = BoulderConfig::default();
        cfg.checkpoint.mode = CheckpointMode::Interactive;
        cfg.continuation.message_dir = Some(PathBuf::from("/tmp/messages"));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[story]\nallow_force_override = true\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.story.allow_force_override);
        assert_eq!(cfg.continuation.default_agent, "builder");
    }

    #[test]
    fn rejects_blank_default_agent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[continuation]\ndefault_agent = \" \"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("default_agent"));
    }
}
