mod collector;
mod pending;

pub use collector::{StepFactory, TextStepCollector};
pub use pending::{PendingStepMethodGenerator, RustStubGenerator};

use crate::{StepFailure, StoryEvent, StoryReporter};
use fable_model::{Lifecycle, Meta, Outcome, Parameters, Scenario, Scope, Stage, Story};
use std::sync::Arc;
use std::time::Duration;

/// Prefix marking a step text as a comment.
pub const COMMENT_PREFIX: &str = "!--";

/// An executable step handed over by a step provider.
pub trait Step: Send + Sync {
    fn text(&self) -> &str;

    fn perform(&self, reporter: &dyn StoryReporter, failure: Option<&StepFailure>) -> StepResult;

    /// Called instead of `perform` once the enclosing batch has failed.
    fn do_not_perform(
        &self,
        _reporter: &dyn StoryReporter,
        _failure: Option<&StepFailure>,
    ) -> StepResult {
        StepResult::not_performed(self.text())
    }

    fn composed_steps(&self) -> Vec<SharedStep> {
        Vec::new()
    }

    fn is_pending(&self) -> bool {
        false
    }
}

pub type SharedStep = Arc<dyn Step>;

#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    Successful,
    Failed(StepFailure),
    Pending,
    NotPerformed,
    Ignorable,
    Comment,
    /// An outcome-gated step whose condition did not hold. Reports nothing.
    Skipped,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    pub step: String,
    pub outcome: StepOutcome,
    pub duration: Duration,
}

impl StepResult {
    fn with_outcome(step: &str, outcome: StepOutcome) -> Self {
        Self {
            step: step.to_string(),
            outcome,
            duration: Duration::ZERO,
        }
    }

    pub fn successful(step: &str) -> Self {
        Self::with_outcome(step, StepOutcome::Successful)
    }

    pub fn failed(step: &str, failure: StepFailure) -> Self {
        Self::with_outcome(step, StepOutcome::Failed(failure))
    }

    pub fn pending(step: &str) -> Self {
        Self::with_outcome(step, StepOutcome::Pending)
    }

    pub fn not_performed(step: &str) -> Self {
        Self::with_outcome(step, StepOutcome::NotPerformed)
    }

    pub fn ignorable(step: &str) -> Self {
        Self::with_outcome(step, StepOutcome::Ignorable)
    }

    pub fn comment(step: &str) -> Self {
        Self::with_outcome(step, StepOutcome::Comment)
    }

    pub fn skipped(step: &str) -> Self {
        Self::with_outcome(step, StepOutcome::Skipped)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match &self.outcome {
            StepOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn describe_to(&self, reporter: &dyn StoryReporter) {
        let step = self.step.clone();
        let event = match &self.outcome {
            StepOutcome::Successful => StoryEvent::Successful { step },
            StepOutcome::Failed(failure) => StoryEvent::Failed {
                step,
                failure_id: failure.id(),
                cause: failure.cause().to_string(),
            },
            StepOutcome::Pending => StoryEvent::Pending { step },
            StepOutcome::NotPerformed => StoryEvent::NotPerformed { step },
            StepOutcome::Ignorable => StoryEvent::Ignorable { step },
            StepOutcome::Comment => StoryEvent::Comment { step },
            StepOutcome::Skipped => return,
        };
        reporter.on_event(&event);
    }
}

/// A step text no step definition matched.
#[derive(Clone, Debug)]
pub struct PendingStep {
    text: String,
}

impl PendingStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Step for PendingStep {
    fn text(&self) -> &str {
        &self.text
    }

    fn perform(&self, _reporter: &dyn StoryReporter, _failure: Option<&StepFailure>) -> StepResult {
        StepResult::pending(&self.text)
    }

    fn do_not_perform(
        &self,
        _reporter: &dyn StoryReporter,
        _failure: Option<&StepFailure>,
    ) -> StepResult {
        StepResult::pending(&self.text)
    }

    fn is_pending(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct CommentStep {
    text: String,
}

impl CommentStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Step for CommentStep {
    fn text(&self) -> &str {
        &self.text
    }

    fn perform(&self, _reporter: &dyn StoryReporter, _failure: Option<&StepFailure>) -> StepResult {
        StepResult::comment(&self.text)
    }

    fn do_not_perform(
        &self,
        _reporter: &dyn StoryReporter,
        _failure: Option<&StepFailure>,
    ) -> StepResult {
        StepResult::comment(&self.text)
    }
}

/// Runs `inner` only when the batch outcome so far satisfies `outcome`.
///
/// After-steps are wrapped in this so that a failure-gated step still runs
/// from the failed state.
pub struct UponOutcome {
    outcome: Outcome,
    inner: SharedStep,
}

impl UponOutcome {
    pub fn new(outcome: Outcome, inner: SharedStep) -> Self {
        Self { outcome, inner }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn applies(&self, failure: Option<&StepFailure>) -> bool {
        match self.outcome {
            Outcome::Any => true,
            Outcome::Success => failure.is_none(),
            Outcome::Failure => failure.is_some(),
        }
    }
}

impl Step for UponOutcome {
    fn text(&self) -> &str {
        self.inner.text()
    }

    fn perform(&self, reporter: &dyn StoryReporter, failure: Option<&StepFailure>) -> StepResult {
        if self.applies(failure) {
            self.inner.perform(reporter, failure)
        } else {
            StepResult::skipped(self.text())
        }
    }

    fn do_not_perform(
        &self,
        reporter: &dyn StoryReporter,
        failure: Option<&StepFailure>,
    ) -> StepResult {
        if self.applies(failure) {
            self.inner.perform(reporter, failure)
        } else {
            StepResult::skipped(self.text())
        }
    }

    fn is_pending(&self) -> bool {
        self.inner.is_pending()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScenarioType {
    #[default]
    Normal,
    Example,
    /// Hooks registered for every kind of scenario.
    Any,
}

impl ScenarioType {
    pub fn matches(self, other: ScenarioType) -> bool {
        self == ScenarioType::Any || other == ScenarioType::Any || self == other
    }
}

/// Supplies the executable steps of every scope of a run.
pub trait StepCollector: Send + Sync {
    fn before_or_after_stories_steps(&self, stage: Stage) -> Vec<SharedStep>;

    fn before_or_after_story_steps(
        &self,
        story: &Story,
        stage: Stage,
        given_story: bool,
    ) -> Vec<SharedStep>;

    fn before_or_after_scenario_steps(
        &self,
        meta: &Meta,
        stage: Stage,
        scenario_type: ScenarioType,
    ) -> Vec<SharedStep>;

    fn lifecycle_steps(
        &self,
        lifecycle: &Lifecycle,
        meta: &Meta,
        stage: Stage,
        scope: Scope,
        parameters: &Parameters,
    ) -> Vec<SharedStep>;

    /// Scenario steps with step-scoped lifecycle steps around each of them.
    fn scenario_steps(
        &self,
        lifecycle: &Lifecycle,
        scenario: &Scenario,
        parameters: &Parameters,
        meta: &Meta,
    ) -> Vec<SharedStep>;
}
