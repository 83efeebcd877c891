use crate::context::Interrupt;
use crate::state::{Transition, run_step};
use crate::tree::{PerformableScenario, PerformableStory, PerformableSteps, ScenarioBody};
use crate::{
    PendingStepFound, PendingStepPolicy, PerformableTree, RunContext, RunnerError, State,
    Status, StepFailure, Stopwatch, StoryEvent, WorkerContext,
};
use fable_model::{Stage, Story};
use tracing::{debug, info, warn};

pub const BEFORE_STORIES_PATH: &str = "BeforeStories";
pub const AFTER_STORIES_PATH: &str = "AfterStories";

impl PerformableTree {
    /// Performs the node built for `story` on the calling worker.
    ///
    /// A failure carrying a restart-story marker performs the whole story
    /// again, up to `max_story_restarts` times.
    pub fn perform(
        &self,
        run: &RunContext,
        worker: &mut WorkerContext,
        story: &Story,
    ) -> Result<(), RunnerError> {
        let mut node = self.root.story(story.path())?;
        let path = story.path().to_string();
        let initial_state = worker.state().clone();
        let mut restarts: u32 = 0;
        loop {
            into_result(perform_story(run, worker, &mut node))?;

            let Some(failure) = run.failures().get(&path)? else {
                return Ok(());
            };
            let within_cap = run
                .controls()
                .max_story_restarts
                .is_none_or(|max| restarts < max);
            if !failure.is_restart_story() || !within_cap {
                return Ok(());
            }

            restarts += 1;
            warn!(story = %path, attempt = restarts, cause = %failure.cause(), "restarting story");
            worker.reporter().on_event(&StoryEvent::RestartedStory {
                path: path.clone(),
                cause: failure.cause().to_string(),
            });
            run.reset_failures(&path)?;
            worker.clear_pending(&path);
            worker.set_state(initial_state.clone());
        }
    }

    pub fn perform_before_or_after_stories(
        &self,
        run: &RunContext,
        worker: &mut WorkerContext,
        stage: Stage,
    ) -> Result<(), RunnerError> {
        let (steps, path) = match stage {
            Stage::Before => (&self.root.before_steps, BEFORE_STORIES_PATH),
            Stage::After => (&self.root.after_steps, AFTER_STORIES_PATH),
        };
        let reporter = worker.reporter();
        reporter.on_event(&StoryEvent::BeforeStoriesSteps { stage });
        worker.enter_story(path);
        worker.reset_state();
        let result = perform_steps(run, worker, steps, false);
        worker.leave_story();
        reporter.on_event(&StoryEvent::AfterStoriesSteps { stage });
        into_result(result)
    }
}

fn into_result(result: Result<(), Interrupt>) -> Result<(), RunnerError> {
    match result {
        Err(Interrupt::Fatal(error)) => Err(error),
        _ => Ok(()),
    }
}

fn perform_story(
    run: &RunContext,
    worker: &mut WorkerContext,
    story: &mut PerformableStory,
) -> Result<(), Interrupt> {
    let path = story.story.path().to_string();
    let reporter = worker.reporter();
    if !story.allowed {
        reporter.on_event(&StoryEvent::StoryNotAllowed {
            path,
            filter: run.filter().as_str().to_string(),
        });
        story.status = Some(Status::NotAllowed);
        return Ok(());
    }

    let stopwatch = Stopwatch::start();
    worker.enter_story(&path);
    let result = perform_story_body(run, worker, story);
    worker.leave_story();
    story.timing = stopwatch.stop();

    match result {
        Err(Interrupt::Cancelled) if !story.given_story => {
            let duration = run
                .cancelled_duration(&path)?
                .unwrap_or_else(|| stopwatch.elapsed());
            warn!(story = %path, duration_ms = duration.as_millis() as u64, "story cancelled");
            reporter.on_event(&StoryEvent::StoryCancelled {
                path: path.clone(),
                duration,
            });
            reporter.on_event(&StoryEvent::AfterStory {
                path,
                given_story: false,
            });
            story.status = Some(Status::NotPerformed);
            Ok(())
        }
        other => other,
    }
}

fn perform_story_body(
    run: &RunContext,
    worker: &mut WorkerContext,
    story: &mut PerformableStory,
) -> Result<(), Interrupt> {
    let controls = run.controls();
    let path = story.story.path().to_string();
    let given_story = story.given_story;
    let reporter = worker.reporter();

    reporter.on_event(&StoryEvent::BeforeStory {
        path: path.clone(),
        given_story,
    });
    if controls.dry_run {
        reporter.on_event(&StoryEvent::DryRun);
    }
    if !story.story.narrative().is_empty() {
        reporter.on_event(&StoryEvent::Narrative {
            narrative: story.story.narrative().clone(),
        });
    }
    if !story.story.lifecycle().is_empty() {
        reporter.on_event(&StoryEvent::Lifecycle {
            lifecycle: story.story.lifecycle().clone(),
        });
    }
    worker.interrupt_if_cancelled(run)?;

    if controls.reset_state_before_story {
        worker.reset_state();
        run.reset_failures(&path)?;
    }
    worker.clear_pending(&path);
    let initial_state = worker.state().clone();

    reporter.on_event(&StoryEvent::BeforeStorySteps {
        stage: Stage::Before,
    });
    perform_steps(run, worker, &story.before_steps, false)?;
    reporter.on_event(&StoryEvent::AfterStorySteps {
        stage: Stage::Before,
    });

    let given_failed = perform_given_stories(run, worker, &mut story.given_stories)?;

    if given_failed && controls.skip_story_if_given_story_failed {
        debug!(story = %path, "scenarios skipped after given story failure");
    } else {
        for scenario in &mut story.scenarios {
            perform_scenario(run, worker, scenario)?;
        }
    }

    reporter.on_event(&StoryEvent::BeforeStorySteps {
        stage: Stage::After,
    });
    perform_steps(run, worker, &story.after_steps, false)?;
    reporter.on_event(&StoryEvent::AfterStorySteps {
        stage: Stage::After,
    });

    let status = worker.status(run, &path, &initial_state)?;
    story.status = Some(status);
    info!(story = %path, given_story, status = ?status, "story performed");
    reporter.on_event(&StoryEvent::AfterStory { path, given_story });
    Ok(())
}

/// Returns whether any given story ended up failed.
///
/// Each given story starts from the enclosing state. Afterwards the
/// enclosing state is restored, switching to failed when a given story
/// failed, so a failed enclosing batch never goes back to clear.
fn perform_given_stories(
    run: &RunContext,
    worker: &mut WorkerContext,
    given_stories: &mut [PerformableStory],
) -> Result<bool, Interrupt> {
    if given_stories.is_empty() {
        return Ok(false);
    }
    let reporter = worker.reporter();
    reporter.on_event(&StoryEvent::BeforeGivenStories);
    reporter.on_event(&StoryEvent::GivenStories {
        paths: given_stories
            .iter()
            .map(|given| given.path().to_string())
            .collect(),
    });
    let enclosing = worker.state().clone();
    let mut merged = enclosing.clone();
    let mut failed = false;
    for given in given_stories.iter_mut() {
        worker.set_state(enclosing.clone());
        let result = perform_story(run, worker, given);
        if !merged.is_failed() {
            if let Some(failure) = given_failure(run, worker, given)? {
                merged = State::Failed(failure);
            }
        }
        worker.set_state(merged.clone());
        result?;
        failed |= given.status == Some(Status::Failed);
    }
    reporter.on_event(&StoryEvent::AfterGivenStories);
    Ok(failed)
}

fn given_failure(
    run: &RunContext,
    worker: &WorkerContext,
    given: &PerformableStory,
) -> Result<Option<StepFailure>, RunnerError> {
    if let Some(failure) = worker.state().failure() {
        return Ok(Some(failure.clone()));
    }
    if given.status == Some(Status::Failed) {
        return run.failures().get(given.path());
    }
    Ok(None)
}

fn perform_scenario(
    run: &RunContext,
    worker: &mut WorkerContext,
    scenario: &mut PerformableScenario,
) -> Result<(), Interrupt> {
    let reporter = worker.reporter();
    if !scenario.allowed {
        reporter.on_event(&StoryEvent::ScenarioNotAllowed {
            title: scenario.title().to_string(),
            filter: run.filter().as_str().to_string(),
        });
        scenario.status = Some(Status::NotAllowed);
        return Ok(());
    }
    if !scenario.is_performable() {
        return Ok(());
    }
    if run.controls().skip_scenarios_after_failure && worker.failure_occurred(run)? {
        debug!(scenario = %scenario.title(), "scenario skipped after failure");
        return Ok(());
    }

    let stopwatch = Stopwatch::start();
    reporter.on_event(&StoryEvent::BeforeScenario {
        title: scenario.title().to_string(),
    });
    reporter.on_event(&StoryEvent::ScenarioMeta {
        meta: scenario.meta.clone(),
    });

    let mut failed = false;
    if let Some(normal) = scenario.normal.as_mut() {
        failed = perform_scenario_body(run, worker, &mut normal.body)?;
    } else {
        reporter.on_event(&StoryEvent::BeforeExamples {
            steps: scenario.scenario.steps().to_vec(),
            table: scenario.examples_table.clone(),
        });
        for example in &mut scenario.examples {
            reporter.on_event(&StoryEvent::Example {
                parameters: example.parameters.clone(),
                index: example.index,
            });
            failed |= perform_scenario_body(run, worker, &mut example.body)?;
        }
        reporter.on_event(&StoryEvent::AfterExamples);
    }

    scenario.timing = stopwatch.stop();
    scenario.status = Some(if failed {
        Status::Failed
    } else {
        Status::Successful
    });
    reporter.on_event(&StoryEvent::AfterScenario {
        title: scenario.title().to_string(),
        timing: scenario.timing,
    });
    Ok(())
}

/// Runs before steps, given stories, steps and after steps, starting over
/// whenever the steps ask for the scenario to be restarted.
///
/// Returns whether the body ended in the failed state.
fn perform_scenario_body(
    run: &RunContext,
    worker: &mut WorkerContext,
    body: &mut ScenarioBody,
) -> Result<bool, Interrupt> {
    let controls = run.controls();
    let mut restarts: u32 = 0;
    loop {
        if controls.reset_state_before_scenario {
            worker.reset_state();
        }
        let restartable = controls
            .max_scenario_restarts
            .is_none_or(|max| restarts < max);
        match perform_scenario_attempt(run, worker, body, restartable) {
            Err(Interrupt::RestartScenario(failure)) => {
                restarts += 1;
                warn!(attempt = restarts, cause = %failure.cause(), "restarting scenario");
            }
            other => {
                other?;
                break;
            }
        }
    }
    body.failure = worker.state().failure().cloned();
    Ok(body.failure.is_some())
}

fn perform_scenario_attempt(
    run: &RunContext,
    worker: &mut WorkerContext,
    body: &mut ScenarioBody,
    restartable: bool,
) -> Result<(), Interrupt> {
    perform_steps(run, worker, &body.before_steps, restartable)?;
    perform_given_stories(run, worker, &mut body.given_stories)?;
    perform_steps(run, worker, &body.steps, restartable)?;
    perform_steps(run, worker, &body.after_steps, restartable)
}

/// Performs one batch, carrying the worker's state through every step.
///
/// The batch's first failure is recorded against the current story path.
fn perform_steps(
    run: &RunContext,
    worker: &mut WorkerContext,
    steps: &PerformableSteps,
    restartable: bool,
) -> Result<(), Interrupt> {
    if steps.is_empty() {
        return Ok(());
    }
    let reporter = worker.reporter();
    let path = worker.current_path().unwrap_or_default().to_string();
    let mut state = worker.state().clone();
    let mut ignoring = false;

    for step in &steps.steps {
        if let Err(interrupt) = worker.interrupt_if_cancelled(run) {
            worker.set_state(state);
            return Err(interrupt);
        }
        if ignoring {
            reporter.on_event(&StoryEvent::Ignorable {
                step: step.text().to_string(),
            });
            continue;
        }

        let was_failed = state.is_failed();
        state = match run_step(state, step.as_ref(), reporter.as_ref()) {
            Transition::Continue(next) => next,
            Transition::IgnoreRemaining(next) => {
                ignoring = true;
                next
            }
            Transition::RestartScenario(failure) if restartable => {
                reporter.on_event(&StoryEvent::Restarted {
                    step: step.text().to_string(),
                    cause: failure.cause().to_string(),
                });
                worker.set_state(State::Clear);
                return Err(Interrupt::RestartScenario(failure));
            }
            Transition::RestartScenario(failure) => {
                reporter.on_event(&StoryEvent::Failed {
                    step: step.text().to_string(),
                    failure_id: failure.id(),
                    cause: failure.cause().to_string(),
                });
                State::Failed(failure)
            }
        };
        if let (false, Some(failure)) = (was_failed, state.failure()) {
            run.failures().put(path.clone(), failure.clone())?;
        }
    }

    if !steps.pending.is_empty() {
        worker.mark_pending();
        let methods = run.pending_generator().generate(&steps.pending);
        reporter.on_event(&StoryEvent::PendingMethods { methods });
        if run.configuration().pending_step_policy == PendingStepPolicy::Failing {
            let failure = StepFailure::new(PendingStepFound {
                steps: steps.pending.clone(),
            });
            warn!(story = %path, steps = ?steps.pending, "pending steps fail the batch");
            if !state.is_failed() {
                run.failures().put(path, failure.clone())?;
                state = State::Failed(failure);
            }
        }
    }

    worker.set_state(state);
    Ok(())
}
