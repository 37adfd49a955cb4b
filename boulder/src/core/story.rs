//! Story lifecycle transition graph and role allowlist.
//!
//! ```text
//! DRAFT -> READY -> IN_PROGRESS -> REVIEW -> DONE
//!                        ^            |
//!                        +------------+
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a story document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryStatus {
    Draft,
    Ready,
    InProgress,
    Review,
    Done,
}

impl StoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
        }
    }

    /// Statuses reachable in one step.
    pub fn successors(self) -> &'static [StoryStatus] {
        match self {
            Self::Draft => &[Self::Ready],
            Self::Ready => &[Self::InProgress],
            Self::InProgress => &[Self::Review],
            Self::Review => &[Self::Done, Self::InProgress],
            Self::Done => &[],
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryStatus {
    type Err = String;

    /// Accepts any case and `-`/space separators (`in progress`, `In-Progress`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "DRAFT" => Ok(Self::Draft),
            "READY" => Ok(Self::Ready),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "REVIEW" => Ok(Self::Review),
            "DONE" => Ok(Self::Done),
            _ => Err(format!("unknown story status '{}'", value.trim())),
        }
    }
}

/// Rejection returned by the story lifecycle guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid story transition {from} -> {to} (allowed from {from}: {allowed})")]
    InvalidTransition {
        from: StoryStatus,
        to: StoryStatus,
        allowed: String,
    },

    #[error("role '{role}' may not move a story {from} -> {to} (allowed roles: {allowed})")]
    Unauthorized {
        from: StoryStatus,
        to: StoryStatus,
        role: String,
        allowed: String,
    },

    #[error("cannot read story status from {path}: {reason}")]
    StatusUnreadable { path: String, reason: String },
}

/// Roles allowed to take an edge. `None` means the edge is role-agnostic.
pub fn allowed_roles(from: StoryStatus, to: StoryStatus) -> Option<&'static [&'static str]> {
    match (from, to) {
        (StoryStatus::Draft, StoryStatus::Ready) => Some(&["sm", "po"]),
        (StoryStatus::Ready, StoryStatus::InProgress) => Some(&["dev"]),
        (StoryStatus::InProgress, StoryStatus::Review) => Some(&["dev"]),
        (StoryStatus::Review, StoryStatus::Done) => Some(&["qa"]),
        _ => None,
    }
}

/// Normalize an agent name into a role key (`@QA` -> `qa`).
pub fn role_from_agent(agent: &str) -> Option<String> {
    let trimmed = agent.trim();
    let role = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    if role.is_empty() {
        return None;
    }
    Some(role.to_ascii_lowercase())
}

/// Check an edge against the graph and the role table.
///
/// Self-transitions are always allowed. An unknown role (`None`) is not
/// rejected by the role table.
pub fn validate_transition(
    from: StoryStatus,
    to: StoryStatus,
    role: Option<&str>,
) -> Result<(), TransitionError> {
    if from == to {
        return Ok(());
    }
    if !from.successors().contains(&to) {
        return Err(TransitionError::InvalidTransition {
            from,
            to,
            allowed: render_list(from.successors().iter().map(|status| status.as_str())),
        });
    }
    let (Some(roles), Some(role)) = (allowed_roles(from, to), role) else {
        return Ok(());
    };
    if roles.contains(&role) {
        return Ok(());
    }
    Err(TransitionError::Unauthorized {
        from,
        to,
        role: role.to_string(),
        allowed: render_list(roles.iter().copied()),
    })
}

fn render_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let items: Vec<&str> = items.collect();
    if items.is_empty() {
        return "none".to_string();
    }
    items.join(", ")
}
