use fable_model::{Lifecycle, Meta, Outcome, Scenario, Scope, Story};
use fable_runner::testing::{RecordingReporter, ScriptedStep, ScriptedSteps, scripted_collector};
use fable_runner::{
    CompositeReporter, Configuration, IgnoreRemainingSteps, InMemoryStories, PendingStepFound,
    PendingStepPolicy, PerformableTree, RestartScenario, RestartStory, RunContext, SharedStep,
    Status, StepFailure, StoryControls, StoryEvent, TracingReporter, WorkerContext,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const GREETING_STEPS: [&str; 3] = [
    "Given a user named Alice",
    "When she says hello",
    "Then the reply is 'Hi Alice'",
];

fn greeting_story() -> Story {
    Story::new("greeting.story")
        .with_scenario(Scenario::new("say hello").with_steps(GREETING_STEPS))
}

fn build(
    configuration: Configuration,
    steps: &ScriptedSteps,
    stories: &[Story],
) -> (RunContext, PerformableTree) {
    let source = stories
        .iter()
        .fold(InMemoryStories::new(), |source, story| {
            source.with_story(story.clone())
        });
    let run = RunContext::new(
        configuration,
        Arc::new(scripted_collector(steps)),
        Arc::new(source),
    )
    .expect("run context should build");
    let mut tree = PerformableTree::new();
    tree.add_stories(&run, stories)
        .expect("stories should build");
    (run, tree)
}

fn perform(run: &RunContext, tree: &PerformableTree, story: &Story) -> RecordingReporter {
    let reporter = RecordingReporter::new();
    let mut worker = WorkerContext::new(Arc::new(reporter.clone()));
    tree.perform(run, &mut worker, story)
        .expect("story should perform");
    reporter
}

fn story_status(tree: &PerformableTree, path: &str) -> Option<Status> {
    tree.root()
        .story(path)
        .expect("story should be registered")
        .status()
}

#[test]
fn greeting_story_all_steps_succeed_expected_successful_status_and_event_order() {
    let story = greeting_story();
    let steps = ScriptedSteps::new().succeeding(GREETING_STEPS);
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    {
        let node = tree
            .root()
            .story("greeting.story")
            .expect("story should be registered");
        assert!(node.is_allowed());
        assert_eq!(node.scenarios().len(), 1);
        let scenario = &node.scenarios()[0];
        assert!(scenario.is_allowed());
        let normal = scenario.normal().expect("scenario should be normal");
        assert_eq!(normal.steps().texts(), GREETING_STEPS.to_vec());
    }

    let reporter = perform(&run, &tree, &story);

    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Successful));
    assert_eq!(
        reporter.kinds(),
        vec![
            "before_story",
            "before_story_steps",
            "after_story_steps",
            "before_scenario",
            "scenario_meta",
            "before_step",
            "successful",
            "before_step",
            "successful",
            "before_step",
            "successful",
            "after_scenario",
            "before_story_steps",
            "after_story_steps",
            "after_story",
        ]
    );
    assert!(run.failures().is_empty().expect("failures should be readable"));
}

#[test]
fn scenario_tagged_skip_excluded_by_filter_expected_not_allowed_event_and_no_failures() {
    let story = Story::new("greeting.story").with_scenario(
        Scenario::new("say hello")
            .with_meta(Meta::parse("@skip"))
            .with_steps(GREETING_STEPS),
    );
    let configuration = Configuration {
        meta_filter: "-skip".to_string(),
        ..Configuration::default()
    };
    let steps = ScriptedSteps::new().succeeding(GREETING_STEPS);
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    {
        let node = tree
            .root()
            .story("greeting.story")
            .expect("story should be registered");
        assert!(!node.scenarios()[0].is_allowed());
    }
    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("scenario_not_allowed"), 1);
    assert_eq!(reporter.count("before_scenario"), 0);
    assert!(reporter.step_outcomes().is_empty());
    assert_eq!(steps.performed_count("Given a user named Alice"), 0);
    assert!(run.failures().is_empty().expect("failures should be readable"));
}

#[test]
fn failing_step_expected_every_later_step_and_composed_step_not_performed() {
    let story = Story::new("failing.story").with_scenario(
        Scenario::new("breaks midway").with_steps([
            "Given a user named Alice",
            "When the server crashes",
            "Then the reply is 'Hi Alice'",
        ]),
    );
    let composed: SharedStep = Arc::new(ScriptedStep::succeeding("Then the audit log is written"));
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice"])
        .with(ScriptedStep::failing("When the server crashes", "connection reset"))
        .with(
            ScriptedStep::succeeding("Then the reply is 'Hi Alice'").with_composed(vec![composed]),
        );
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(
        reporter.step_outcomes(),
        vec![
            ("successful".to_string(), "Given a user named Alice".to_string()),
            ("failed".to_string(), "When the server crashes".to_string()),
            ("not_performed".to_string(), "Then the reply is 'Hi Alice'".to_string()),
            ("not_performed".to_string(), "Then the audit log is written".to_string()),
        ]
    );
    assert_eq!(steps.performed_count("Then the reply is 'Hi Alice'"), 0);
    assert_eq!(story_status(&tree, "failing.story"), Some(Status::Failed));
    let failure = run
        .failures()
        .get("failing.story")
        .expect("failures should be readable")
        .expect("failure should be recorded");
    assert_eq!(failure.cause().to_string(), "connection reset");

    let node = tree
        .root()
        .story("failing.story")
        .expect("story should be registered");
    assert_eq!(node.scenarios()[0].failure(), Some(&failure));
}

#[test]
fn restart_story_marker_expected_story_events_twice_and_last_attempt_wins() {
    let story = greeting_story();
    let attempts = Arc::new(AtomicUsize::new(0));
    let step_attempts = Arc::clone(&attempts);
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice", "Then the reply is 'Hi Alice'"])
        .with(ScriptedStep::from_fn("When she says hello", move || {
            if step_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StepFailure::new(RestartStory {
                    reason: "session expired".to_string(),
                }))
            } else {
                Ok(())
            }
        }));
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("before_story"), 2);
    assert_eq!(reporter.count("after_story"), 2);
    assert_eq!(reporter.count("restarted_story"), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(run.failures().is_empty().expect("failures should be readable"));
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Successful));
}

#[test]
fn restart_story_cap_reached_expected_failure_kept() {
    let story = greeting_story();
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice", "Then the reply is 'Hi Alice'"])
        .with(ScriptedStep::from_fn("When she says hello", || {
            Err(StepFailure::new(RestartStory {
                reason: "always".to_string(),
            }))
        }));
    let configuration = Configuration {
        story_controls: StoryControls {
            max_story_restarts: Some(1),
            ..StoryControls::default()
        },
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("before_story"), 2);
    assert_eq!(reporter.count("restarted_story"), 1);
    let failure = run
        .failures()
        .get("greeting.story")
        .expect("failures should be readable")
        .expect("failure should remain after the last attempt");
    assert!(failure.is_restart_story());
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Failed));
}

#[test]
fn restart_scenario_marker_expected_scenario_rerun_from_before_steps() {
    let story = Story::new("greeting.story")
        .with_lifecycle(Lifecycle::new().with_before(Scope::Scenario, ["Given a fresh session"]))
        .with_scenario(Scenario::new("say hello").with_steps(GREETING_STEPS));
    let attempts = Arc::new(AtomicUsize::new(0));
    let step_attempts = Arc::clone(&attempts);
    let steps = ScriptedSteps::new()
        .succeeding([
            "Given a fresh session",
            "Given a user named Alice",
            "Then the reply is 'Hi Alice'",
        ])
        .with(ScriptedStep::from_fn("When she says hello", move || {
            if step_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StepFailure::new(RestartScenario {
                    reason: "stale cache".to_string(),
                }))
            } else {
                Ok(())
            }
        }));
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("restarted"), 1);
    assert_eq!(reporter.count("before_scenario"), 1);
    assert_eq!(steps.performed_count("Given a fresh session"), 2);
    assert_eq!(steps.performed_count("Given a user named Alice"), 2);
    assert_eq!(steps.performed_count("Then the reply is 'Hi Alice'"), 1);
    assert!(run.failures().is_empty().expect("failures should be readable"));
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Successful));
}

#[test]
fn restart_scenario_without_restarts_left_expected_reported_as_failure() {
    let story = greeting_story();
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice", "Then the reply is 'Hi Alice'"])
        .with(ScriptedStep::from_fn("When she says hello", || {
            Err(StepFailure::new(RestartScenario {
                reason: "stale cache".to_string(),
            }))
        }));
    let configuration = Configuration {
        story_controls: StoryControls {
            max_scenario_restarts: Some(0),
            ..StoryControls::default()
        },
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("restarted"), 0);
    assert_eq!(reporter.count("failed"), 1);
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Failed));
}

#[test]
fn ignore_remaining_steps_marker_expected_rest_of_batch_ignorable_without_failure() {
    let story = greeting_story();
    let steps = ScriptedSteps::new()
        .succeeding(["When she says hello", "Then the reply is 'Hi Alice'"])
        .with(ScriptedStep::from_fn("Given a user named Alice", || {
            Err(StepFailure::new(IgnoreRemainingSteps {
                reason: "feature flag off".to_string(),
            }))
        }));
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(
        reporter.step_outcomes(),
        GREETING_STEPS
            .iter()
            .map(|step| ("ignorable".to_string(), step.to_string()))
            .collect::<Vec<_>>()
    );
    assert_eq!(steps.performed_count("When she says hello"), 0);
    assert!(run.failures().is_empty().expect("failures should be readable"));
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Successful));
}

#[test]
fn cancelled_before_start_expected_cancelled_then_after_story_and_no_step_events() {
    let story = greeting_story();
    let steps = ScriptedSteps::new().succeeding(GREETING_STEPS);
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);
    run.cancel_story("greeting.story", Duration::from_millis(42))
        .expect("cancel should succeed");

    let reporter = perform(&run, &tree, &story);

    assert_eq!(
        reporter.kinds(),
        vec!["before_story", "story_cancelled", "after_story"]
    );
    assert!(matches!(
        &reporter.events()[1],
        StoryEvent::StoryCancelled { path, duration }
            if path == "greeting.story" && *duration == Duration::from_millis(42)
    ));
    assert_eq!(steps.performed_count("Given a user named Alice"), 0);
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::NotPerformed));
}

#[test]
fn unmatched_step_expected_pending_status_and_generated_stub() {
    let story = greeting_story();
    let steps = ScriptedSteps::new().succeeding(["Given a user named Alice", "When she says hello"]);
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("pending"), 1);
    let methods = reporter
        .events()
        .into_iter()
        .find_map(|event| match event {
            StoryEvent::PendingMethods { methods } => Some(methods),
            _ => None,
        })
        .expect("pending methods should be reported");
    assert!(methods[0].contains("fn then_the_reply_is_hi_alice()"));
    assert!(run.failures().is_empty().expect("failures should be readable"));
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Pending));
}

#[test]
fn unmatched_step_with_failing_policy_expected_pending_failure_recorded() {
    let story = greeting_story();
    let steps = ScriptedSteps::new().succeeding(["Given a user named Alice", "When she says hello"]);
    let configuration = Configuration {
        pending_step_policy: PendingStepPolicy::Failing,
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    perform(&run, &tree, &story);

    let failure = run
        .failures()
        .get("greeting.story")
        .expect("failures should be readable")
        .expect("pending failure should be recorded");
    let pending = failure
        .find_in_chain::<PendingStepFound>()
        .expect("cause should be a pending step failure");
    assert_eq!(pending.steps, vec!["Then the reply is 'Hi Alice'".to_string()]);
}

#[test]
fn after_scenario_steps_gated_by_outcome_expected_only_failure_branch_runs() {
    let story = Story::new("audit.story")
        .with_lifecycle(
            Lifecycle::new()
                .with_after(Scope::Scenario, Outcome::Failure, ["Then take a screenshot"])
                .with_after(Scope::Scenario, Outcome::Success, ["Then archive the session"])
                .with_after(Scope::Scenario, Outcome::Any, ["Then close the browser"]),
        )
        .with_scenario(Scenario::new("breaks").with_steps(["When the server crashes"]));
    let steps = ScriptedSteps::new()
        .succeeding([
            "Then take a screenshot",
            "Then archive the session",
            "Then close the browser",
        ])
        .with(ScriptedStep::failing("When the server crashes", "connection reset"));
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    perform(&run, &tree, &story);

    assert_eq!(steps.performed_count("Then take a screenshot"), 1);
    assert_eq!(steps.performed_count("Then archive the session"), 0);
    assert_eq!(steps.performed_count("Then close the browser"), 1);
    assert_eq!(story_status(&tree, "audit.story"), Some(Status::Failed));
}

#[test]
fn skip_scenarios_after_failure_expected_later_scenarios_not_started() {
    let story = Story::new("two.story")
        .with_scenario(Scenario::new("first").with_steps(["When the server crashes"]))
        .with_scenario(Scenario::new("second").with_steps(["Given a user named Alice"]));
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice"])
        .with(ScriptedStep::failing("When the server crashes", "connection reset"));
    let configuration = Configuration {
        story_controls: StoryControls {
            skip_scenarios_after_failure: true,
            ..StoryControls::default()
        },
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(reporter.count("before_scenario"), 1);
    assert_eq!(steps.performed_count("Given a user named Alice"), 0);
}

#[test]
fn independent_scenarios_expected_second_runs_after_first_fails() {
    let story = Story::new("two.story")
        .with_scenario(Scenario::new("first").with_steps(["When the server crashes"]))
        .with_scenario(Scenario::new("second").with_steps(["Given a user named Alice"]));
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice"])
        .with(ScriptedStep::failing("When the server crashes", "connection reset"));
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);

    perform(&run, &tree, &story);

    assert_eq!(steps.performed_count("Given a user named Alice"), 1);
    let node = tree
        .root()
        .story("two.story")
        .expect("story should be registered");
    assert_eq!(node.scenarios()[0].status(), Some(Status::Failed));
    assert_eq!(node.scenarios()[1].status(), Some(Status::Successful));
    assert_eq!(node.status(), Some(Status::Failed));
}

#[test]
fn dry_run_expected_dry_run_event_after_before_story() {
    let story = greeting_story();
    let steps = ScriptedSteps::new().succeeding(GREETING_STEPS);
    let configuration = Configuration {
        story_controls: StoryControls {
            dry_run: true,
            ..StoryControls::default()
        },
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(&reporter.kinds()[..2], &["before_story", "dry_run"]);
}

#[test]
fn failed_scenario_without_scenario_reset_expected_next_scenario_not_performed() {
    let story = Story::new("two.story")
        .with_scenario(Scenario::new("first").with_steps(["When the server crashes"]))
        .with_scenario(Scenario::new("second").with_steps(["Given a user named Alice"]));
    let steps = ScriptedSteps::new()
        .succeeding(["Given a user named Alice"])
        .with(ScriptedStep::failing("When the server crashes", "connection reset"));
    let configuration = Configuration {
        story_controls: StoryControls {
            reset_state_before_scenario: false,
            ..StoryControls::default()
        },
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[story.clone()]);

    let reporter = perform(&run, &tree, &story);

    assert_eq!(steps.performed_count("Given a user named Alice"), 0);
    assert!(reporter.step_outcomes().contains(&(
        "not_performed".to_string(),
        "Given a user named Alice".to_string()
    )));
    let node = tree
        .root()
        .story("two.story")
        .expect("story should be registered");
    assert_eq!(node.scenarios()[1].status(), Some(Status::Failed));
}

#[test]
fn failed_worker_without_story_reset_expected_next_story_not_performed() {
    let broken = Story::new("broken.story")
        .with_scenario(Scenario::new("crash").with_steps(["When the server crashes"]));
    let story = greeting_story();
    let steps = ScriptedSteps::new()
        .succeeding(GREETING_STEPS)
        .with(ScriptedStep::failing("When the server crashes", "connection reset"));
    let configuration = Configuration {
        story_controls: StoryControls {
            reset_state_before_story: false,
            ..StoryControls::default()
        },
        ..Configuration::default()
    };
    let (run, tree) = build(configuration, &steps, &[broken.clone(), story.clone()]);
    let mut worker = WorkerContext::new(Arc::new(RecordingReporter::new()));

    tree.perform(&run, &mut worker, &broken)
        .expect("broken story should perform");
    assert!(worker.state().is_failed());
    tree.perform(&run, &mut worker, &story)
        .expect("greeting story should perform");

    assert_eq!(story_status(&tree, "broken.story"), Some(Status::Failed));
    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::NotPerformed));
}

#[test]
fn tracing_reporter_in_composite_expected_recording_reporter_still_sees_every_event() {
    let story = greeting_story();
    let steps = ScriptedSteps::new().succeeding(GREETING_STEPS);
    let (run, tree) = build(Configuration::default(), &steps, &[story.clone()]);
    let recording = RecordingReporter::new();
    let composite = CompositeReporter::new()
        .with(Arc::new(TracingReporter))
        .with(Arc::new(recording.clone()));
    assert!(composite.is_enabled());
    let mut worker = WorkerContext::new(Arc::new(composite));

    tree.perform(&run, &mut worker, &story)
        .expect("story should perform");

    assert_eq!(story_status(&tree, "greeting.story"), Some(Status::Successful));
    assert_eq!(recording.count("successful"), 3);
    assert_eq!(recording.kinds().first().map(String::as_str), Some("before_story"));
    assert_eq!(recording.kinds().last().map(String::as_str), Some("after_story"));
}
