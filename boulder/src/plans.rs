//! Plan discovery and task bookkeeping on the active plan.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::plan::{Task, mark_task_completed, next_incomplete_task, parse_tasks};
use crate::core::progress::{PlanProgress, count_checkboxes};
use crate::io::boulder_state::{BoulderState, plan_name_from_path, read_boulder_state};
use crate::io::init::BoulderPaths;

/// A plan file found under `.boulder/plans/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub name: String,
    pub path: PathBuf,
    pub progress: PlanProgress,
    pub modified: Option<DateTime<Utc>>,
}

/// List `*.md` plans in the project, sorted by name.
pub fn find_plans(root: &Path) -> Result<Vec<PlanSummary>> {
    let plans_dir = BoulderPaths::new(root).plans_dir;
    let entries = match fs::read_dir(&plans_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %plans_dir.display(), "no plans directory");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", plans_dir.display())),
    };

    let mut plans = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", plans_dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("read plan {}", path.display()))?;
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        plans.push(PlanSummary {
            name: plan_name_from_path(&path),
            progress: count_checkboxes(&text),
            path,
            modified,
        });
    }
    plans.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(plans)
}

/// The active state and the plan text it points at.
pub fn load_active_plan(root: &Path) -> Result<(BoulderState, PathBuf, String)> {
    let state = read_boulder_state(root)
        .ok_or_else(|| anyhow!("no active plan (run `boulder start`)"))?;
    let plan_path = BoulderPaths::new(root).resolve_plan(&state.active_plan);
    let text = fs::read_to_string(&plan_path)
        .with_context(|| format!("read plan {}", plan_path.display()))?;
    Ok((state, plan_path, text))
}

/// First open task of the active plan, or `None` when every task is ticked.
pub fn next_task(root: &Path) -> Result<Option<Task>> {
    let (_, _, text) = load_active_plan(root)?;
    Ok(next_incomplete_task(&parse_tasks(&text)).cloned())
}

/// Tick task `number` in the active plan and return the new progress.
pub fn complete_task(root: &Path, number: u32) -> Result<PlanProgress> {
    let (_, plan_path, text) = load_active_plan(root)?;
    let updated = mark_task_completed(&text, number)
        .ok_or_else(|| anyhow!("task {number} not found or already completed"))?;
    fs::write(&plan_path, &updated)
        .with_context(|| format!("write plan {}", plan_path.display()))?;
    let progress = count_checkboxes(&updated);
    info!(
        task = number,
        completed = progress.completed,
        total = progress.total,
        "task completed"
    );
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::boulder_state::write_boulder_state;

    fn project() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join(".boulder/plans");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("beta.md"), "- [ ] 1. A\n- [x] 2. B\n- [ ] 3. C").expect("beta");
        fs::write(dir.join("alpha.md"), "- [x] 1. Done\n").expect("alpha");
        fs::write(dir.join("notes.txt"), "- [ ] 1. ignored\n").expect("notes");
        write_boulder_state(
            temp.path(),
            &BoulderState::new(".boulder/plans/beta.md", "beta"),
        )
        .expect("state");
        temp
    }

    #[test]
    fn finds_markdown_plans_sorted() {
        let temp = project();
        let plans = find_plans(temp.path()).expect("plans");
        let names: Vec<&str> = plans.iter().map(|plan| plan.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(plans[0].progress.is_complete);
        assert_eq!(plans[1].progress.completed, 1);
        assert!(plans[1].modified.is_some());
    }

    #[test]
    fn missing_plans_dir_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(find_plans(temp.path()).expect("plans").is_empty());
    }

    #[test]
    fn next_and_complete_walk_the_active_plan() {
        let temp = project();
        let task = next_task(temp.path()).expect("next").expect("task");
        assert_eq!((task.number, task.title.as_str()), (1, "A"));

        let progress = complete_task(temp.path(), 1).expect("complete");
        assert_eq!((progress.completed, progress.total), (2, 3));
        assert_eq!(next_task(temp.path()).expect("next").expect("task").number, 3);

        let err = complete_task(temp.path(), 2).expect_err("already done");
        assert!(err.to_string().contains("task 2"));
    }

    #[test]
    fn no_state_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(next_task(temp.path()).is_err());
    }
}
