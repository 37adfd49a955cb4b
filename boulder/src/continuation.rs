//! Continuation controller.
//!
//! Consumes session lifecycle events and decides when an idle session should
//! be handed the next piece of plan work. Per-session bookkeeping lives in an
//! explicit map owned by [`ContinuationController`]: an entry is created on the
//! first event for a session and dropped on compaction or deletion.
//!
//! An idle event runs these checks in order, stopping at the first that fails:
//!
//! 1. the session is the main session, a tracked background-task session, or
//!    listed in the execution state
//! 2. the previous event was not an abort (the flag is consumed)
//! 3. fewer than [`MAX_CONSECUTIVE_FAILURES`] failed deliveries in a row
//! 4. no background task spawned by the session is still running
//! 5. an execution state exists and its plan has open checkboxes
//! 6. the last acting agent is the agent the state requires
//! 7. nothing was injected within [`CONTINUATION_COOLDOWN`]
//!
//! Then the directive is rendered and delivered.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::agent::{
    AgentStrategy, ResolvedAgent, SessionMemory, resolve_last_agent, same_agent,
};
use crate::core::plan::{next_incomplete_task, parse_tasks, parse_waves};
use crate::io::boulder_state::{
    BoulderState, append_session_id, get_plan_progress, read_boulder_state,
};
use crate::io::config::ContinuationConfig;
use crate::io::delivery::{Delivery, DeliveryRequest};
use crate::io::init::BoulderPaths;
use crate::io::prompt::{ContinuationInputs, render_continuation, wave_lines};
use crate::io::session_agents::{PersistedAgents, forget_session_agent, record_session_agent};
use crate::io::transcript::TranscriptScan;

/// Minimum gap between two injected continuations for one session.
pub const CONTINUATION_COOLDOWN: Duration = Duration::from_secs(5);

/// Consecutive failed deliveries after which a session is left alone until
/// it is compacted or deleted.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Session lifecycle notification from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Idle {
        session_id: String,
    },
    Error {
        session_id: String,
        /// The error was a user abort or cancellation.
        aborted: bool,
    },
    MessageUpdated {
        session_id: String,
        agent: Option<String>,
    },
    Compacted {
        session_id: String,
    },
    Deleted {
        session_id: String,
    },
    BackgroundTaskStarted {
        parent_session_id: String,
        task_session_id: String,
    },
    BackgroundTaskFinished {
        parent_session_id: String,
        task_session_id: String,
    },
}

/// In-memory continuation bookkeeping for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContinuationState {
    pub last_event_was_abort_error: bool,
    pub last_continuation_injected_at: Option<Instant>,
    pub prompt_failure_count: u32,
}

/// Why an idle session was not continued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotTracked,
    AfterAbort,
    FailureLimit { failures: u32 },
    BackgroundTasksRunning { running: usize },
    NoActiveState,
    PlanComplete,
    AgentMismatch {
        required: String,
        actual: Option<String>,
    },
    Cooldown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTracked => write!(f, "session does not participate in continuation"),
            Self::AfterAbort => write!(f, "previous event was an abort"),
            Self::FailureLimit { failures } => {
                write!(f, "continuation disabled after {failures} failed deliveries")
            }
            Self::BackgroundTasksRunning { running } => {
                write!(f, "{running} background task(s) still running")
            }
            Self::NoActiveState => write!(f, "no active plan"),
            Self::PlanComplete => write!(f, "plan is complete"),
            Self::AgentMismatch { required, actual } => write!(
                f,
                "last agent {} is not the required agent '{required}'",
                actual
                    .as_deref()
                    .map(|agent| format!("'{agent}'"))
                    .unwrap_or_else(|| "unknown".to_string())
            ),
            Self::Cooldown => write!(f, "continuation injected less than 5s ago"),
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationOutcome {
    /// Bookkeeping event; nothing to deliver.
    Recorded,
    Skipped(SkipReason),
    /// A directive was delivered.
    Injected { agent: String },
    /// Delivery failed; `failures` is the new consecutive failure count.
    DeliveryFailed { failures: u32 },
}

/// Per-project continuation state machine.
pub struct ContinuationController<D: Delivery, C: Clock = SystemClock> {
    paths: BoulderPaths,
    config: ContinuationConfig,
    delivery: D,
    clock: C,
    main_session: Option<String>,
    sessions: HashMap<String, SessionContinuationState>,
    last_agents: HashMap<String, String>,
    running_tasks: HashMap<String, HashSet<String>>,
    background_sessions: HashSet<String>,
}

impl<D: Delivery> ContinuationController<D, SystemClock> {
    pub fn new(root: impl Into<PathBuf>, config: ContinuationConfig, delivery: D) -> Self {
        Self::with_clock(root, config, delivery, SystemClock)
    }
}

impl<D: Delivery, C: Clock> ContinuationController<D, C> {
    pub fn with_clock(
        root: impl Into<PathBuf>,
        config: ContinuationConfig,
        delivery: D,
        clock: C,
    ) -> Self {
        Self {
            paths: BoulderPaths::new(root),
            config,
            delivery,
            clock,
            main_session: None,
            sessions: HashMap::new(),
            last_agents: HashMap::new(),
            running_tasks: HashMap::new(),
            background_sessions: HashSet::new(),
        }
    }

    /// Designate the primary session of the host.
    pub fn set_main_session(&mut self, session_id: Option<String>) {
        self.main_session = session_id;
    }

    pub fn main_session(&self) -> Option<&str> {
        self.main_session.as_deref()
    }

    /// Bookkeeping for `session_id`, if any event has been seen for it.
    pub fn session_state(&self, session_id: &str) -> Option<&SessionContinuationState> {
        self.sessions.get(session_id)
    }

    /// Process one event. Events for a session must arrive in order.
    pub fn handle_event(&mut self, event: SessionEvent) -> ContinuationOutcome {
        match event {
            SessionEvent::Idle { session_id } => self.on_idle(&session_id),
            SessionEvent::Error {
                session_id,
                aborted,
            } => {
                self.session_mut(&session_id).last_event_was_abort_error = aborted;
                if aborted {
                    debug!(session_id = %session_id, "abort recorded, next idle is skipped");
                }
                ContinuationOutcome::Recorded
            }
            SessionEvent::MessageUpdated { session_id, agent } => {
                self.session_mut(&session_id).last_event_was_abort_error = false;
                if let Some(agent) = agent.filter(|agent| !agent.trim().is_empty()) {
                    self.remember_agent(&session_id, agent);
                }
                ContinuationOutcome::Recorded
            }
            SessionEvent::Compacted { session_id } => {
                debug!(session_id = %session_id, "session compacted, continuation state reset");
                self.sessions.remove(&session_id);
                ContinuationOutcome::Recorded
            }
            SessionEvent::Deleted { session_id } => {
                self.teardown(&session_id);
                ContinuationOutcome::Recorded
            }
            SessionEvent::BackgroundTaskStarted {
                parent_session_id,
                task_session_id,
            } => {
                self.session_mut(&parent_session_id);
                self.background_sessions.insert(task_session_id.clone());
                self.running_tasks
                    .entry(parent_session_id)
                    .or_default()
                    .insert(task_session_id);
                ContinuationOutcome::Recorded
            }
            SessionEvent::BackgroundTaskFinished {
                parent_session_id,
                task_session_id,
            } => {
                self.finish_task(&parent_session_id, &task_session_id);
                ContinuationOutcome::Recorded
            }
        }
    }

    /// Resolve the last acting agent through memory, persisted map, transcript.
    pub fn resolve_agent(&self, session_id: &str) -> Option<ResolvedAgent> {
        let memory = SessionMemory::new(&self.last_agents);
        let persisted = PersistedAgents::new(&self.paths.session_agents_path);
        let transcript = self.config.message_dir.as_ref().map(TranscriptScan::new);

        let mut strategies: Vec<&dyn AgentStrategy> = vec![&memory, &persisted];
        if let Some(transcript) = transcript.as_ref() {
            strategies.push(transcript);
        }
        resolve_last_agent(&strategies, session_id)
    }

    fn on_idle(&mut self, session_id: &str) -> ContinuationOutcome {
        let state = read_boulder_state(&self.paths.root);

        if !self.is_eligible(session_id, state.as_ref()) {
            debug!(session_id, "idle session not tracked for continuation");
            return ContinuationOutcome::Skipped(SkipReason::NotTracked);
        }

        let session = self.session_mut(session_id);
        if session.last_event_was_abort_error {
            session.last_event_was_abort_error = false;
            return skip(session_id, SkipReason::AfterAbort);
        }
        if session.prompt_failure_count >= MAX_CONSECUTIVE_FAILURES {
            let failures = session.prompt_failure_count;
            return skip(session_id, SkipReason::FailureLimit { failures });
        }

        let running = self
            .running_tasks
            .get(session_id)
            .map(HashSet::len)
            .unwrap_or(0);
        if running > 0 {
            return skip(session_id, SkipReason::BackgroundTasksRunning { running });
        }

        let Some(mut state) = state else {
            return skip(session_id, SkipReason::NoActiveState);
        };
        let plan_path = self.paths.resolve_plan(&state.active_plan);
        let progress = get_plan_progress(&plan_path);
        if progress.is_complete {
            return skip(session_id, SkipReason::PlanComplete);
        }

        let required = state
            .agent
            .clone()
            .filter(|agent| !agent.trim().is_empty())
            .unwrap_or_else(|| self.config.default_agent.clone());
        let actual = self.resolve_agent(session_id);
        if !actual
            .as_ref()
            .is_some_and(|resolved| same_agent(&resolved.agent, &required))
        {
            return skip(
                session_id,
                SkipReason::AgentMismatch {
                    required,
                    actual: actual.map(|resolved| resolved.agent),
                },
            );
        }

        let now = self.clock.now();
        let session = self.session_mut(session_id);
        if session
            .last_continuation_injected_at
            .is_some_and(|at| now.saturating_duration_since(at) < CONTINUATION_COOLDOWN)
        {
            return skip(session_id, SkipReason::Cooldown);
        }
        session.last_continuation_injected_at = Some(now);

        if !state.session_ids.iter().any(|id| id == session_id) {
            match append_session_id(&self.paths.root, session_id) {
                Ok(Some(updated)) => state = updated,
                Ok(None) => {}
                Err(err) => warn!(session_id, error = %err, "failed to record session id"),
            }
        }

        let attempt = compose_directive(&state, &plan_path, &required).and_then(|text| {
            self.delivery.deliver(&DeliveryRequest {
                session_id: session_id.to_string(),
                agent: required.clone(),
                text,
            })
        });

        let session = self.session_mut(session_id);
        match attempt {
            Ok(()) => {
                session.prompt_failure_count = 0;
                info!(
                    session_id,
                    agent = %required,
                    completed = progress.completed,
                    total = progress.total,
                    "continuation injected"
                );
                ContinuationOutcome::Injected { agent: required }
            }
            Err(err) => {
                session.prompt_failure_count += 1;
                let failures = session.prompt_failure_count;
                warn!(session_id, failures, error = %err, "continuation delivery failed");
                ContinuationOutcome::DeliveryFailed { failures }
            }
        }
    }

    fn is_eligible(&self, session_id: &str, state: Option<&BoulderState>) -> bool {
        self.main_session.as_deref() == Some(session_id)
            || self.background_sessions.contains(session_id)
            || state.is_some_and(|state| state.session_ids.iter().any(|id| id == session_id))
    }

    fn session_mut(&mut self, session_id: &str) -> &mut SessionContinuationState {
        self.sessions.entry(session_id.to_string()).or_default()
    }

    fn remember_agent(&mut self, session_id: &str, agent: String) {
        if let Err(err) = record_session_agent(&self.paths.session_agents_path, session_id, &agent)
        {
            warn!(session_id, error = %err, "failed to persist session agent");
        }
        self.last_agents.insert(session_id.to_string(), agent);
    }

    fn finish_task(&mut self, parent_session_id: &str, task_session_id: &str) {
        if let Some(running) = self.running_tasks.get_mut(parent_session_id) {
            running.remove(task_session_id);
            if running.is_empty() {
                self.running_tasks.remove(parent_session_id);
            }
        }
    }

    fn teardown(&mut self, session_id: &str) {
        debug!(session_id, "session deleted, dropping continuation state");
        self.sessions.remove(session_id);
        self.last_agents.remove(session_id);
        self.running_tasks.remove(session_id);
        self.background_sessions.remove(session_id);
        for running in self.running_tasks.values_mut() {
            running.remove(session_id);
        }
        self.running_tasks.retain(|_, running| !running.is_empty());
        if self.main_session.as_deref() == Some(session_id) {
            self.main_session = None;
        }
        if let Err(err) = forget_session_agent(&self.paths.session_agents_path, session_id) {
            warn!(session_id, error = %err, "failed to forget session agent");
        }
    }
}

fn skip(session_id: &str, reason: SkipReason) -> ContinuationOutcome {
    debug!(session_id, reason = %reason, "continuation skipped");
    ContinuationOutcome::Skipped(reason)
}

/// Render the directive from a live parse of the active plan.
pub fn compose_directive(state: &BoulderState, plan_path: &Path, agent: &str) -> Result<String> {
    let text = fs::read_to_string(plan_path).unwrap_or_default();
    let tasks = parse_tasks(&text);
    render_continuation(&ContinuationInputs {
        agent: agent.to_string(),
        plan_name: state.plan_name.clone(),
        plan_path: state.active_plan.clone(),
        progress: get_plan_progress(plan_path),
        waves: wave_lines(&parse_waves(&text), state.current_wave),
        next_task: next_incomplete_task(&tasks).cloned(),
    })
}
