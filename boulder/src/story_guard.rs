//! Story lifecycle guard.
//!
//! Enforcement is only active while the execution state says the plan is
//! story-driven, and the config can switch it off entirely. When active, the
//! current status is read from the story document on every check.

use std::path::Path;

use tracing::{debug, info};

use crate::core::story::{StoryStatus, TransitionError, role_from_agent, validate_transition};
use crate::io::boulder_state::read_boulder_state;
use crate::io::config::StoryConfig;
use crate::io::story::StoryReader;

/// A requested status change.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest<'a> {
    pub story_path: &'a Path,
    pub to: StoryStatus,
    /// Acting agent; its normalized name is the role.
    pub agent: Option<&'a str>,
}

/// Why a transition was let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// No story-driven plan is active.
    Dormant,
    /// `allow_force_override` is set.
    Overridden,
    Allowed { from: StoryStatus, to: StoryStatus },
}

/// Validate `request` against the lifecycle graph and role table.
pub fn guard_story_transition<R: StoryReader>(
    root: &Path,
    config: &StoryConfig,
    reader: &R,
    request: TransitionRequest<'_>,
) -> Result<GuardVerdict, TransitionError> {
    if config.allow_force_override {
        debug!(story = %request.story_path.display(), "story guard overridden by config");
        return Ok(GuardVerdict::Overridden);
    }
    if !read_boulder_state(root).is_some_and(|state| state.is_story_driven()) {
        debug!(story = %request.story_path.display(), "story guard dormant");
        return Ok(GuardVerdict::Dormant);
    }

    let story_path = if request.story_path.is_absolute() {
        request.story_path.to_path_buf()
    } else {
        root.join(request.story_path)
    };
    let from = reader
        .read_status(&story_path)
        .map_err(|err| TransitionError::StatusUnreadable {
            path: request.story_path.display().to_string(),
            reason: format!("{err:#}"),
        })?;

    let role = request.agent.and_then(role_from_agent);
    validate_transition(from, request.to, role.as_deref())?;
    info!(
        story = %request.story_path.display(),
        from = %from,
        to = %request.to,
        role = role.as_deref().unwrap_or("unknown"),
        "story transition allowed"
    );
    Ok(GuardVerdict::Allowed {
        from,
        to: request.to,
    })
}
