//! Plan document parser.
//!
//! Plans are markdown checklists. Parsing happens in two passes: [`tokenize`]
//! classifies every line into a typed [`Line`], then [`parse_tasks`] and
//! [`parse_waves`] interpret the token stream. Both entry points are total:
//! malformed input yields fewer items, never an error.

use std::sync::LazyLock;

use regex::Regex;

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+\[(.)\]\s+(\d+)\.\s+(.+?)\s*$").expect("task regex is valid")
});

static WAVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^### Wave (\d+)\s*(?:[—–-]\s*)?(.*)$").expect("wave regex is valid")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,3})(?:\s|$)").expect("heading regex is valid"));

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*]\s+)?\*\*(executor|verify|category|skills)\*\*\s*:\s*(.*?)\s*$")
        .expect("field regex is valid")
});

/// Verification strategy attached to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyMethod {
    Tdd,
    QaScenarios,
    Typecheck,
    None,
    Custom(String),
}

impl VerifyMethod {
    /// Parse a `**Verify**:` value. The value is expected to be lowercased.
    pub fn parse(value: &str) -> Self {
        match value {
            "tdd" => Self::Tdd,
            "qa-scenarios" => Self::QaScenarios,
            "typecheck" => Self::Typecheck,
            "none" => Self::None,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Tdd => "tdd",
            Self::QaScenarios => "qa-scenarios",
            Self::Typecheck => "typecheck",
            Self::None => "none",
            Self::Custom(value) => value.as_str(),
        }
    }

    /// Checklist the executor must satisfy before ticking the task.
    pub fn checklist(&self) -> Vec<String> {
        let items: &[&str] = match self {
            Self::Tdd => &[
                "Write a failing test that captures the expected behavior",
                "Implement until the new test passes",
                "Run the full test suite and confirm nothing regressed",
            ],
            Self::QaScenarios => &[
                "Walk through every QA scenario listed for this task",
                "Record the observed result of each scenario",
                "Fix and re-run any scenario that does not match expectations",
            ],
            Self::Typecheck => &[
                "Run the project's type checker",
                "Resolve every reported type error before marking the task done",
            ],
            Self::None => &[],
            Self::Custom(method) => {
                return vec![format!("Verify using: {method}")];
            }
        };
        items.iter().map(|item| item.to_string()).collect()
    }
}

/// A single checkbox task parsed from a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub number: u32,
    pub title: String,
    pub completed: bool,
    pub executor: Option<String>,
    pub verify: Option<VerifyMethod>,
    pub category: Option<String>,
    pub skills: Vec<String>,
    /// Task line plus every line absorbed into its block.
    pub raw_block: String,
}

/// A numbered group of tasks opened by a `### Wave N` heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    pub number: u32,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Wave {
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed(&self) -> usize {
        self.tasks.iter().filter(|task| task.completed).count()
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|task| task.completed)
    }
}

/// Metadata label recognized inside a task block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLabel {
    Executor,
    Verify,
    Category,
    Skills,
}

/// Typed classification of one plan line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Task {
        checkbox: char,
        number: u32,
        title: &'a str,
    },
    WaveHeading {
        number: u32,
        name: &'a str,
    },
    Heading {
        level: usize,
    },
    Field {
        label: FieldLabel,
        value: &'a str,
    },
    Text,
}

/// Classify every line of `text`, pairing each token with its source line.
pub fn tokenize(text: &str) -> Vec<(Line<'_>, &str)> {
    text.lines().map(|raw| (classify(raw), raw)).collect()
}

fn classify(raw: &str) -> Line<'_> {
    if let Some(caps) = WAVE_RE.captures(raw)
        && let Ok(number) = caps[1].parse::<u32>()
    {
        let name = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        return Line::WaveHeading { number, name };
    }
    if let Some(caps) = HEADING_RE.captures(raw) {
        return Line::Heading {
            level: caps[1].len(),
        };
    }
    if let Some(caps) = TASK_RE.captures(raw)
        && let Ok(number) = caps[2].parse::<u32>()
    {
        let checkbox = caps[1].chars().next().unwrap_or(' ');
        let title = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        return Line::Task {
            checkbox,
            number,
            title,
        };
    }
    if let Some(caps) = FIELD_RE.captures(raw) {
        let label = match caps[1].to_ascii_lowercase().as_str() {
            "executor" => FieldLabel::Executor,
            "verify" => FieldLabel::Verify,
            "category" => FieldLabel::Category,
            _ => FieldLabel::Skills,
        };
        let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return Line::Field { label, value };
    }
    Line::Text
}

/// Parse every task in `text`, in document order.
pub fn parse_tasks(text: &str) -> Vec<Task> {
    tasks_from_tokens(&tokenize(text))
}

fn tasks_from_tokens(tokens: &[(Line<'_>, &str)]) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut current: Option<TaskBuilder> = None;

    for (line, raw) in tokens {
        match line {
            Line::Task {
                checkbox,
                number,
                title,
            } => {
                if let Some(done) = current.take() {
                    tasks.push(done.finish());
                }
                current = Some(TaskBuilder::new(*number, title, *checkbox != ' ', raw));
            }
            Line::Heading { .. } | Line::WaveHeading { .. } => {
                if let Some(done) = current.take() {
                    tasks.push(done.finish());
                }
            }
            Line::Field { label, value } => {
                if let Some(builder) = current.as_mut() {
                    builder.absorb(raw);
                    builder.apply_field(*label, value);
                }
            }
            Line::Text => {
                if let Some(builder) = current.as_mut() {
                    builder.absorb(raw);
                }
            }
        }
    }

    if let Some(done) = current.take() {
        tasks.push(done.finish());
    }
    tasks
}

/// Parse `### Wave N` sections and the tasks inside each.
pub fn parse_waves(text: &str) -> Vec<Wave> {
    let tokens = tokenize(text);
    let mut waves = Vec::new();
    let mut current: Option<(u32, String, usize)> = None;

    for (idx, (line, _)) in tokens.iter().enumerate() {
        match line {
            Line::WaveHeading { number, name } => {
                if let Some((number, name, start)) = current.take() {
                    waves.push(build_wave(number, name, &tokens[start..idx]));
                }
                current = Some((*number, name.to_string(), idx + 1));
            }
            Line::Heading { level } if *level >= 2 => {
                if let Some((number, name, start)) = current.take() {
                    waves.push(build_wave(number, name, &tokens[start..idx]));
                }
            }
            _ => {}
        }
    }

    if let Some((number, name, start)) = current.take() {
        waves.push(build_wave(number, name, &tokens[start..]));
    }
    waves
}

fn build_wave(number: u32, name: String, body: &[(Line<'_>, &str)]) -> Wave {
    Wave {
        number,
        name,
        tasks: tasks_from_tokens(body),
    }
}

/// First task that is not completed.
pub fn next_incomplete_task(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|task| !task.completed)
}

/// Flip the checkbox of the first open task numbered `number` to `x`.
///
/// Every other byte of the document is preserved. Returns `None` when no open
/// task with that number exists.
pub fn mark_task_completed(text: &str, number: u32) -> Option<String> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        if let Some(caps) = TASK_RE.captures(body)
            && caps[2].parse::<u32>().ok() == Some(number)
            && &caps[1] == " "
        {
            let checkbox = caps.get(1)?;
            let at = offset + checkbox.start();
            let mut updated = String::with_capacity(text.len());
            updated.push_str(&text[..at]);
            updated.push('x');
            updated.push_str(&text[at + 1..]);
            return Some(updated);
        }
        offset += line.len();
    }
    None
}

struct TaskBuilder {
    task: Task,
    lines: Vec<String>,
}

impl TaskBuilder {
    fn new(number: u32, title: &str, completed: bool, raw: &str) -> Self {
        Self {
            task: Task {
                number,
                title: title.to_string(),
                completed,
                executor: None,
                verify: None,
                category: None,
                skills: Vec::new(),
                raw_block: String::new(),
            },
            lines: vec![raw.to_string()],
        }
    }

    fn absorb(&mut self, raw: &str) {
        self.lines.push(raw.to_string());
    }

    fn apply_field(&mut self, label: FieldLabel, value: &str) {
        let task = &mut self.task;
        match label {
            FieldLabel::Executor if task.executor.is_none() => {
                let value = value.trim();
                let value = value.strip_prefix('@').unwrap_or(value).trim();
                task.executor = Some(value.to_string());
            }
            FieldLabel::Verify if task.verify.is_none() => {
                task.verify = Some(VerifyMethod::parse(&value.trim().to_lowercase()));
            }
            FieldLabel::Category if task.category.is_none() => {
                task.category = Some(value.trim().to_string());
            }
            FieldLabel::Skills if task.skills.is_empty() => {
                task.skills = parse_skills(value);
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Task {
        let block = self.lines.join("\n");
        self.task.raw_block = block.trim_end().to_string();
        self.task
    }
}

fn parse_skills(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(|entry| entry.trim().trim_matches('`').trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}
