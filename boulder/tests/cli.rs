//! CLI tests spawning the boulder binary.
//!
//! Verifies exit codes for plan completion, pending checkpoint decisions and
//! rejected story transitions, and that `idle` prints a framed directive.
//! Also covers the `gate` counter and the `plans` listing.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use boulder::exit_codes;
use boulder::io::boulder_state::read_boulder_state;
use boulder::io::init::{InitOptions, init_boulder};

fn boulder(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_boulder"))
        .current_dir(root)
        .args(args)
        .output()
        .expect("run boulder")
}

fn project(plan: &str) -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    init_boulder(temp.path(), &InitOptions { force: false }).expect("init");
    fs::write(temp.path().join(".boulder/plans/work.md"), plan).expect("plan");
    temp
}

#[test]
fn next_on_finished_plan_exits_complete() {
    let temp = project("- [x] 1. Done\n");
    let start = boulder(temp.path(), &["start", ".boulder/plans/work.md"]);
    assert_eq!(start.status.code(), Some(exit_codes::OK));

    let next = boulder(temp.path(), &["next"]);
    assert_eq!(next.status.code(), Some(exit_codes::COMPLETE));
}

#[test]
fn next_and_complete_walk_tasks() {
    let temp = project("- [ ] 1. First\n- [ ] 2. Second\n");
    boulder(temp.path(), &["start", ".boulder/plans/work.md"]);

    let next = boulder(temp.path(), &["next"]);
    assert_eq!(next.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&next.stdout), "1. First\n");

    let complete = boulder(temp.path(), &["complete", "1"]);
    assert_eq!(complete.status.code(), Some(exit_codes::OK));
    let plan = fs::read_to_string(temp.path().join(".boulder/plans/work.md")).expect("plan");
    assert_eq!(plan, "- [x] 1. First\n- [ ] 2. Second\n");
}

#[test]
fn interactive_checkpoint_exits_blocked_until_decided() {
    let temp = project("### Wave 1\n- [ ] 1. a\n### Wave 2\n- [ ] 2. b\n");
    boulder(temp.path(), &["start", ".boulder/plans/work.md"]);
    boulder(temp.path(), &["complete", "1"]);

    let checkpoint = boulder(temp.path(), &["checkpoint", "1", "--mode", "interactive"]);
    assert_eq!(checkpoint.status.code(), Some(exit_codes::BLOCKED));
    assert!(String::from_utf8_lossy(&checkpoint.stdout).contains("Reply with one of:"));

    let decide = boulder(temp.path(), &["decide", "1", "GO"]);
    assert_eq!(decide.status.code(), Some(exit_codes::OK));
    assert_eq!(
        read_boulder_state(temp.path()).expect("state").current_wave,
        Some(2)
    );
}

#[test]
fn rejected_transition_exits_blocked() {
    let temp = project("- [ ] 1. Story\n");
    fs::write(temp.path().join("story.md"), "---\nstatus: REVIEW\n---\n").expect("story");
    boulder(
        temp.path(),
        &["start", ".boulder/plans/work.md", "--plan-type", "story-driven"],
    );

    let rejected = boulder(temp.path(), &["transition", "story.md", "DONE", "--agent", "dev"]);
    assert_eq!(rejected.status.code(), Some(exit_codes::BLOCKED));
    assert!(String::from_utf8_lossy(&rejected.stderr).contains("role 'dev'"));

    let allowed = boulder(temp.path(), &["transition", "story.md", "DONE", "--agent", "qa"]);
    assert_eq!(allowed.status.code(), Some(exit_codes::OK));
}

#[test]
fn idle_prints_framed_directive() {
    let temp = project("- [ ] 1. Build it\n");
    boulder(
        temp.path(),
        &["start", ".boulder/plans/work.md", "--session", "ses-1"],
    );

    let idle = boulder(temp.path(), &["idle", "ses-1", "--agent", "builder"]);
    assert_eq!(idle.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&idle.stdout);
    assert!(stdout.starts_with("<!-- session:ses-1 agent:builder -->\n"));
    assert!(stdout.contains("Task 1: Build it"));
}

#[test]
fn gate_counts_iterations_for_active_plan() {
    let temp = project("- [ ] 1. Build it\n");
    let without_state = boulder(temp.path(), &["gate", "tests"]);
    assert_eq!(without_state.status.code(), Some(exit_codes::INVALID));

    boulder(temp.path(), &["start", ".boulder/plans/work.md"]);
    boulder(temp.path(), &["gate", "tests"]);
    let second = boulder(temp.path(), &["gate", "tests"]);
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&second.stdout), "tests: 2\n");
    let state = read_boulder_state(temp.path()).expect("state");
    assert_eq!(state.quality_gate_iterations.get("tests"), Some(&2));
}

#[test]
fn plans_lists_progress_and_modification_time() {
    let temp = project("- [x] 1. First\n- [ ] 2. Second\n");
    let plans = boulder(temp.path(), &["plans"]);
    assert_eq!(plans.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8_lossy(&plans.stdout);
    let columns: Vec<&str> = stdout.trim_end().split('\t').collect();
    assert_eq!(columns[..2], ["work", "1/2"]);
    // `YYYY-MM-DD HH:MM`
    assert_eq!(columns[2].len(), 16);
    assert_ne!(columns[2], "-");
}

#[test]
fn missing_state_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let next = boulder(temp.path(), &["next"]);
    assert_eq!(next.status.code(), Some(exit_codes::INVALID));
}
