//! Lifecycle tests driving a plan from start to completion.
//!
//! These combine `start_work`, the continuation controller, task completion
//! and wave checkpoints the way a host would: idle events trigger directives,
//! the agent ticks tasks, and wave boundaries advance the state.

use std::fs;
use std::time::Duration;

use boulder::checkpoint::{CheckpointMessage, check_wave_checkpoint, decide};
use boulder::continuation::{ContinuationController, ContinuationOutcome, SessionEvent, SkipReason};
use boulder::core::checkpoint::{CheckpointAction, CheckpointMode};
use boulder::core::story::{StoryStatus, TransitionError};
use boulder::io::boulder_state::{PlanType, read_boulder_state};
use boulder::io::config::{ContinuationConfig, StoryConfig};
use boulder::io::story::FsStoryReader;
use boulder::plans::complete_task;
use boulder::start::{StartOptions, start_work};
use boulder::story_guard::{GuardVerdict, TransitionRequest, guard_story_transition};
use boulder::test_support::{ManualClock, ScriptedDelivery, TestProject};

const PLAN: &str = "\
# Checkout

### Wave 1 - Cart
- [ ] 1. Cart model
  **Executor**: @builder
  **Verify**: tdd
- [ ] 2. Cart API

### Wave 2 - Payment
- [ ] 3. Payment provider
  **Skills**: stripe
";

fn idle() -> SessionEvent {
    SessionEvent::Idle {
        session_id: "ses-1".to_string(),
    }
}

/// Drive a two-wave plan through continuation and checkpoints.
///
/// 1. Start the plan from session `ses-1` requiring agent `builder`.
/// 2. Idle: directive for task 1 is injected.
/// 3. Tasks 1 and 2 are ticked; auto checkpoint after wave 1 advances to wave 2.
/// 4. Idle: directive now points at task 3.
/// 5. Task 3 ticked; checkpoint reports all waves complete and idle is skipped.
#[test]
fn plan_runs_to_completion_with_auto_checkpoints() {
    let project = TestProject::new().expect("project");
    let root = project.root();
    let plan = project.write_plan("checkout.md", PLAN).expect("plan");
    let outcome = start_work(
        root,
        &StartOptions {
            plan: plan.clone(),
            agent: Some("builder".to_string()),
            session_id: Some("ses-1".to_string()),
            ..StartOptions::default()
        },
    )
    .expect("start");
    assert_eq!(outcome.current_wave, Some(1));

    let clock = ManualClock::new();
    let delivery = ScriptedDelivery::succeeding();
    let mut controller =
        ContinuationController::with_clock(root, ContinuationConfig::default(), &delivery, &clock);
    controller.handle_event(SessionEvent::MessageUpdated {
        session_id: "ses-1".to_string(),
        agent: Some("builder".to_string()),
    });

    assert!(matches!(
        controller.handle_event(idle()),
        ContinuationOutcome::Injected { .. }
    ));
    let first = &delivery.requests()[0].text;
    assert!(first.contains("0/3 completed, 3 remaining."));
    assert!(first.contains("Task 1: Cart model"));
    assert!(first.contains("- [>] Wave 1: Cart (0/2)"));

    complete_task(root, 1).expect("complete 1");
    complete_task(root, 2).expect("complete 2");
    let plan_path = root.join(&plan);
    assert_eq!(
        check_wave_checkpoint(root, &plan_path, 1, CheckpointMode::Auto).expect("checkpoint"),
        None
    );
    assert_eq!(read_boulder_state(root).expect("state").current_wave, Some(2));

    clock.advance(Duration::from_secs(5));
    assert!(matches!(
        controller.handle_event(idle()),
        ContinuationOutcome::Injected { .. }
    ));
    let second = &delivery.requests()[1].text;
    assert!(second.contains("2/3 completed, 1 remaining."));
    assert!(second.contains("- [x] Wave 1: Cart (2/2)"));
    assert!(second.contains("- [>] Wave 2: Payment (0/1)"));
    assert!(second.contains("Task 3: Payment provider"));
    assert!(second.contains("- Skills: stripe"));

    complete_task(root, 3).expect("complete 3");
    let message = check_wave_checkpoint(root, &plan_path, 2, CheckpointMode::Auto)
        .expect("checkpoint")
        .expect("terminal message");
    assert!(matches!(message, CheckpointMessage::AllWavesComplete(_)));

    clock.advance(Duration::from_secs(5));
    assert_eq!(
        controller.handle_event(idle()),
        ContinuationOutcome::Skipped(SkipReason::PlanComplete)
    );
    assert_eq!(delivery.attempts(), 2);
}

/// Interactive checkpoints hold the wave until an explicit GO.
#[test]
fn interactive_checkpoint_waits_for_go() {
    let project = TestProject::new().expect("project");
    let root = project.root();
    let finished_wave_one = PLAN
        .replace("- [ ] 1.", "- [x] 1.")
        .replace("- [ ] 2.", "- [x] 2.");
    let plan = project.write_plan("checkout.md", &finished_wave_one).expect("plan");
    start_work(
        root,
        &StartOptions {
            plan: plan.clone(),
            ..StartOptions::default()
        },
    )
    .expect("start");
    let plan_path = root.join(&plan);

    let state = read_boulder_state(root).expect("state");
    assert_eq!(state.current_wave, Some(2));
    let mut state = state;
    state.current_wave = Some(1);
    boulder::io::boulder_state::write_boulder_state(root, &state).expect("rewind");

    let message = check_wave_checkpoint(root, &plan_path, 1, CheckpointMode::Interactive)
        .expect("checkpoint")
        .expect("prompt");
    assert!(matches!(message, CheckpointMessage::DecisionRequired(_)));
    assert!(message.text().contains("Up next: Wave 2 (Payment)"));

    let (action, after) = decide(root, 1, "let's pause for today").expect("pause");
    assert_eq!(action, CheckpointAction::Pause);
    assert_eq!(after.expect("state").current_wave, Some(1));

    let (action, after) = decide(root, 1, "ok").expect("default go");
    assert_eq!(action, CheckpointAction::Go);
    assert_eq!(after.expect("state").current_wave, Some(2));
}

/// Story transitions are enforced only for story-driven plans.
#[test]
fn story_guard_follows_active_plan_type() {
    let project = TestProject::new().expect("project");
    let root = project.root();
    let plan = project.write_plan("stories.md", "- [ ] 1. Login story\n").expect("plan");
    fs::create_dir_all(root.join("stories")).expect("mkdir");
    fs::write(
        root.join("stories/login.md"),
        "# Login\n\n## Status\n\n- Draft\n",
    )
    .expect("story");

    let request = TransitionRequest {
        story_path: std::path::Path::new("stories/login.md"),
        to: StoryStatus::Done,
        agent: Some("@qa"),
    };

    start_work(
        root,
        &StartOptions {
            plan: plan.clone(),
            plan_type: Some(PlanType::TaskDriven),
            ..StartOptions::default()
        },
    )
    .expect("start task-driven");
    assert_eq!(
        guard_story_transition(root, &StoryConfig::default(), &FsStoryReader, request)
            .expect("dormant"),
        GuardVerdict::Dormant
    );

    start_work(
        root,
        &StartOptions {
            plan,
            plan_type: Some(PlanType::StoryDriven),
            ..StartOptions::default()
        },
    )
    .expect("start story-driven");
    let err = guard_story_transition(root, &StoryConfig::default(), &FsStoryReader, request)
        .expect_err("draft cannot jump to done");
    assert!(matches!(
        err,
        TransitionError::InvalidTransition {
            from: StoryStatus::Draft,
            to: StoryStatus::Done,
            ..
        }
    ));

    let ready = TransitionRequest {
        to: StoryStatus::Ready,
        agent: Some("po"),
        ..request
    };
    assert_eq!(
        guard_story_transition(root, &StoryConfig::default(), &FsStoryReader, ready)
            .expect("po readies"),
        GuardVerdict::Allowed {
            from: StoryStatus::Draft,
            to: StoryStatus::Ready
        }
    );
}
