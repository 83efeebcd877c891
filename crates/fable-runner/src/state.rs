use crate::failures::Signal;
use crate::steps::{Step, StepOutcome};
use crate::{StepFailure, StoryEvent, StoryReporter};

/// Failure state of the step batch being performed.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum State {
    #[default]
    Clear,
    Failed(StepFailure),
}

impl State {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            Self::Clear => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Transition {
    Continue(State),
    /// The step asked for the rest of its batch to be ignored.
    IgnoreRemaining(State),
    RestartScenario(StepFailure),
}

/// Runs `step` and its composed steps from `state`.
///
/// Composed steps start from the state the parent step left behind, so the
/// children of a failing step are reported as not performed.
pub(crate) fn run_step(state: State, step: &dyn Step, reporter: &dyn StoryReporter) -> Transition {
    let mut state = match state {
        State::Clear => {
            reporter.on_event(&StoryEvent::BeforeStep {
                step: step.text().to_string(),
            });
            let result = step.perform(reporter, None);
            match &result.outcome {
                StepOutcome::Failed(failure) => match failure.signal() {
                    Some(Signal::RestartScenario) => {
                        return Transition::RestartScenario(failure.clone());
                    }
                    Some(Signal::IgnoreRemainingSteps) => {
                        reporter.on_event(&StoryEvent::Ignorable {
                            step: result.step.clone(),
                        });
                        return Transition::IgnoreRemaining(State::Clear);
                    }
                    _ => {
                        result.describe_to(reporter);
                        State::Failed(failure.clone())
                    }
                },
                _ => {
                    result.describe_to(reporter);
                    State::Clear
                }
            }
        }
        State::Failed(failure) => {
            step.do_not_perform(reporter, Some(&failure))
                .describe_to(reporter);
            State::Failed(failure)
        }
    };

    for composed in step.composed_steps() {
        match run_step(state, composed.as_ref(), reporter) {
            Transition::Continue(next) => state = next,
            other => return other,
        }
    }
    Transition::Continue(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingReporter, ScriptedStep};
    use crate::{RestartScenario, SharedStep};
    use std::sync::Arc;

    #[test]
    fn run_step_failing_composite_expected_children_not_performed() {
        let child: SharedStep = Arc::new(ScriptedStep::succeeding("Then the child runs"));
        let parent = ScriptedStep::failing("When the parent fails", "boom").with_composed(vec![child]);
        let reporter = RecordingReporter::new();

        let transition = run_step(State::Clear, &parent, &reporter);

        assert!(matches!(transition, Transition::Continue(State::Failed(_))));
        assert_eq!(
            reporter.step_outcomes(),
            vec![
                ("failed".to_string(), "When the parent fails".to_string()),
                ("not_performed".to_string(), "Then the child runs".to_string()),
            ]
        );
    }

    #[test]
    fn run_step_failed_state_expected_step_not_invoked() {
        let step = ScriptedStep::succeeding("Then nothing happens");
        let reporter = RecordingReporter::new();

        let transition = run_step(
            State::Failed(StepFailure::message("earlier failure")),
            &step,
            &reporter,
        );

        assert!(matches!(transition, Transition::Continue(State::Failed(_))));
        assert_eq!(step.performed_count(), 0);
    }

    #[test]
    fn run_step_restart_marker_expected_restart_transition_without_report() {
        let step = ScriptedStep::from_fn("When the cache is cold", || {
            Err(StepFailure::new(RestartScenario {
                reason: "warming".to_string(),
            }))
        });
        let reporter = RecordingReporter::new();

        let transition = run_step(State::Clear, &step, &reporter);

        assert!(matches!(transition, Transition::RestartScenario(_)));
        assert!(reporter.step_outcomes().is_empty());
    }
}
