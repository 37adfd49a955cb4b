//! Test doubles and project fixtures.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::continuation::Clock;
use crate::io::boulder_state::{BoulderState, write_boulder_state};
use crate::io::delivery::{Delivery, DeliveryRequest};
use crate::io::init::BoulderPaths;

/// Temporary project root with a `.boulder/plans/` directory.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(BoulderPaths::new(dir.path()).plans_dir)?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `.boulder/plans/<name>` and return its root-relative path.
    pub fn write_plan(&self, name: &str, text: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(".boulder/plans").join(name);
        fs::write(self.root().join(&relative), text)?;
        Ok(relative)
    }

    /// Write an execution state for plan `name` tracking `sessions`.
    pub fn start(
        &self,
        name: &str,
        agent: Option<&str>,
        sessions: &[&str],
    ) -> Result<BoulderState> {
        let relative = PathBuf::from(".boulder/plans").join(name);
        let stem = Path::new(name)
            .file_stem()
            .ok_or_else(|| anyhow!("plan name has no stem: {name}"))?;
        let mut state = BoulderState::new(
            relative.to_string_lossy(),
            stem.to_string_lossy().into_owned(),
        );
        state.agent = agent.map(str::to_string);
        for session in sessions {
            state.track_session(session);
        }
        write_boulder_state(self.root(), &state)?;
        Ok(state)
    }
}

/// Records requests; each attempt succeeds or fails per script.
///
/// Once the script is exhausted the fallback outcome applies.
pub struct ScriptedDelivery {
    script: RefCell<VecDeque<bool>>,
    fallback: bool,
    requests: RefCell<Vec<DeliveryRequest>>,
    attempts: Cell<usize>,
}

impl ScriptedDelivery {
    pub fn scripted(outcomes: Vec<bool>) -> Self {
        Self {
            script: RefCell::new(outcomes.into()),
            fallback: true,
            requests: RefCell::new(Vec::new()),
            attempts: Cell::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fallback: false,
            ..Self::scripted(Vec::new())
        }
    }

    /// Requests that were delivered successfully.
    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.borrow().clone()
    }

    /// Every attempt, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }
}

impl Delivery for ScriptedDelivery {
    fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        self.attempts.set(self.attempts.get() + 1);
        let ok = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.fallback);
        if !ok {
            return Err(anyhow!("scripted delivery failure"));
        }
        self.requests.borrow_mut().push(request.clone());
        Ok(())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
