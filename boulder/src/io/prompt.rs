//! Directive and checkpoint prompt rendering.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::plan::{Task, Wave};
use crate::core::progress::PlanProgress;

const CONTINUATION_TEMPLATE: &str = include_str!("prompts/continuation.md");
const CHECKPOINT_TEMPLATE: &str = include_str!("prompts/checkpoint.md");

/// Position of a wave relative to the one being worked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveMarker {
    Done,
    Active,
    Pending,
}

impl WaveMarker {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Done => "[x]",
            Self::Active => "[>]",
            Self::Pending => "[ ]",
        }
    }
}

/// One line of the wave-progress summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveLine {
    pub number: u32,
    pub name: String,
    pub completed: usize,
    pub total: usize,
    pub marker: &'static str,
}

/// Summarize waves; the active wave is `current_wave` when it is still open,
/// otherwise the first wave with open tasks.
pub fn wave_lines(waves: &[Wave], current_wave: Option<u32>) -> Vec<WaveLine> {
    let active = current_wave
        .filter(|number| {
            waves
                .iter()
                .any(|wave| wave.number == *number && !wave.is_complete())
        })
        .or_else(|| {
            waves
                .iter()
                .find(|wave| !wave.is_complete())
                .map(|wave| wave.number)
        });

    waves
        .iter()
        .map(|wave| {
            let marker = if wave.is_complete() {
                WaveMarker::Done
            } else if Some(wave.number) == active {
                WaveMarker::Active
            } else {
                WaveMarker::Pending
            };
            WaveLine {
                number: wave.number,
                name: wave.name.clone(),
                completed: wave.completed(),
                total: wave.total(),
                marker: marker.symbol(),
            }
        })
        .collect()
}

/// Delegation context for the next task.
#[derive(Debug, Clone, Serialize)]
struct TaskContext {
    number: u32,
    title: String,
    executor: Option<String>,
    category: Option<String>,
    skills: Vec<String>,
    verify: Option<String>,
    checklist: Vec<String>,
}

impl TaskContext {
    fn from_task(task: &Task) -> Self {
        Self {
            number: task.number,
            title: task.title.clone(),
            executor: task.executor.clone().filter(|value| !value.is_empty()),
            category: task.category.clone().filter(|value| !value.is_empty()),
            skills: task.skills.clone(),
            verify: task.verify.as_ref().map(|verify| verify.as_str().to_string()),
            checklist: task
                .verify
                .as_ref()
                .map(|verify| verify.checklist())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct WaveContext {
    number: u32,
    name: String,
    completed: usize,
    total: usize,
    tasks: Vec<TaskContext>,
}

impl WaveContext {
    fn from_wave(wave: &Wave) -> Self {
        Self {
            number: wave.number,
            name: wave.name.clone(),
            completed: wave.completed(),
            total: wave.total(),
            tasks: wave.tasks.iter().map(TaskContext::from_task).collect(),
        }
    }
}

/// Everything a continuation directive is built from.
#[derive(Debug, Clone)]
pub struct ContinuationInputs {
    pub agent: String,
    pub plan_name: String,
    pub plan_path: String,
    pub progress: PlanProgress,
    pub waves: Vec<WaveLine>,
    pub next_task: Option<Task>,
}

/// Inputs for the interactive wave checkpoint prompt.
#[derive(Debug, Clone)]
pub struct CheckpointInputs<'a> {
    pub plan_name: &'a str,
    pub wave: &'a Wave,
    pub next_wave: &'a Wave,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("continuation", CONTINUATION_TEMPLATE)
            .expect("continuation template should be valid");
        env.add_template("checkpoint", CHECKPOINT_TEMPLATE)
            .expect("checkpoint template should be valid");
        Self { env }
    }

    fn render_continuation(&self, input: &ContinuationInputs) -> Result<String> {
        let template = self.env.get_template("continuation")?;
        let rendered = template.render(context! {
            agent => input.agent,
            plan_name => input.plan_name,
            plan_path => input.plan_path,
            progress => input.progress,
            remaining => input.progress.remaining(),
            waves => input.waves,
            task => input.next_task.as_ref().map(TaskContext::from_task),
        })?;
        Ok(rendered)
    }

    fn render_checkpoint(&self, input: &CheckpointInputs<'_>) -> Result<String> {
        let template = self.env.get_template("checkpoint")?;
        let rendered = template.render(context! {
            plan_name => input.plan_name,
            wave => WaveContext::from_wave(input.wave),
            next => WaveContext::from_wave(input.next_wave),
        })?;
        Ok(rendered)
    }
}

/// Render the continuation directive injected into an idle session.
pub fn render_continuation(input: &ContinuationInputs) -> Result<String> {
    let rendered = PromptEngine::new().render_continuation(input)?;
    debug!(
        agent = %input.agent,
        bytes = rendered.len(),
        "rendered continuation directive"
    );
    Ok(normalize(&rendered))
}

/// Render the GO/PAUSE/REVIEW/ABORT decision prompt.
pub fn render_checkpoint(input: &CheckpointInputs<'_>) -> Result<String> {
    let rendered = PromptEngine::new().render_checkpoint(input)?;
    Ok(normalize(&rendered))
}

/// Collapse runs of blank lines and end with exactly one newline.
fn normalize(rendered: &str) -> String {
    let mut out = String::with_capacity(rendered.len());
    let mut blank_run = 0;
    for line in rendered.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
