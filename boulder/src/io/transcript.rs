//! Transcript scan over the host's message directory.
//!
//! Layout: `<message_dir>/<session-id>/<message-id>.json`. Each message may
//! carry an `agent` and a `time.created` timestamp (milliseconds). The newest
//! message naming an agent decides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::core::agent::AgentStrategy;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TranscriptMessage {
    agent: Option<String>,
    time: MessageTime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageTime {
    created: Option<u64>,
}

/// Resolution strategy scanning stored messages for a session.
pub struct TranscriptScan {
    message_dir: PathBuf,
}

impl TranscriptScan {
    pub fn new(message_dir: impl Into<PathBuf>) -> Self {
        Self {
            message_dir: message_dir.into(),
        }
    }
}

impl AgentStrategy for TranscriptScan {
    fn name(&self) -> &'static str {
        "transcript"
    }

    fn resolve(&self, session_id: &str) -> Option<String> {
        latest_agent(&self.message_dir.join(session_id))
    }
}

/// Agent of the newest message in `session_dir`, ordered by `time.created`
/// then file name. Unreadable files are skipped.
pub fn latest_agent(session_dir: &Path) -> Option<String> {
    let entries = match fs::read_dir(session_dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %session_dir.display(), error = %err, "no transcript for session");
            return None;
        }
    };

    let mut newest: Option<((u64, String), String)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Ok(contents) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(message) = serde_json::from_str::<TranscriptMessage>(&contents) else {
            continue;
        };
        let Some(agent) = message.agent.filter(|agent| !agent.trim().is_empty()) else {
            continue;
        };
        let key = (
            message.time.created.unwrap_or(0),
            entry.file_name().to_string_lossy().into_owned(),
        );
        if newest.as_ref().is_none_or(|(best, _)| key > *best) {
            newest = Some((key, agent));
        }
    }
    newest.map(|(_, agent)| agent)
}
