//! Reporters and steps for exercising the engine without real step
//! definitions.

use crate::steps::{SharedStep, Step, StepResult, TextStepCollector};
use crate::{StepFailure, StoryEvent, StoryReporter};
use fable_model::Parameters;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Captures every event it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<StoryEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StoryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The serialized `kind` tag of every event, e.g. `before_story`.
    pub fn kinds(&self) -> Vec<String> {
        self.events().iter().map(event_kind).collect()
    }

    /// `(kind, step)` for every event reporting how a step ended.
    pub fn step_outcomes(&self) -> Vec<(String, String)> {
        self.events()
            .iter()
            .filter(|event| {
                !matches!(
                    event,
                    StoryEvent::BeforeStep { .. } | StoryEvent::Restarted { .. }
                )
            })
            .filter_map(|event| {
                event
                    .step()
                    .map(|step| (event_kind(event), step.to_string()))
            })
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().iter().filter(|seen| *seen == kind).count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl StoryReporter for RecordingReporter {
    fn on_event(&self, event: &StoryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

pub fn event_kind(event: &StoryEvent) -> String {
    serde_json::to_value(event)
        .ok()
        .and_then(|value| {
            value
                .get("kind")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default()
}

type Action = Box<dyn Fn() -> Result<(), StepFailure> + Send + Sync>;

/// A step whose outcome is decided by a closure.
pub struct ScriptedStep {
    text: String,
    action: Action,
    composed: Vec<SharedStep>,
    performed: AtomicUsize,
}

impl ScriptedStep {
    pub fn from_fn<F>(text: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Result<(), StepFailure> + Send + Sync + 'static,
    {
        Self {
            text: text.into(),
            action: Box::new(action),
            composed: Vec::new(),
            performed: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(text: impl Into<String>) -> Self {
        Self::from_fn(text, || Ok(()))
    }

    pub fn failing(text: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(text, move || Err(StepFailure::message(message.clone())))
    }

    pub fn with_composed(mut self, composed: Vec<SharedStep>) -> Self {
        self.composed = composed;
        self
    }

    pub fn performed_count(&self) -> usize {
        self.performed.load(Ordering::SeqCst)
    }
}

impl Step for ScriptedStep {
    fn text(&self) -> &str {
        &self.text
    }

    fn perform(&self, _reporter: &dyn StoryReporter, _failure: Option<&StepFailure>) -> StepResult {
        self.performed.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let result = match (self.action)() {
            Ok(()) => StepResult::successful(&self.text),
            Err(failure) => StepResult::failed(&self.text, failure),
        };
        result.with_duration(started.elapsed())
    }

    fn composed_steps(&self) -> Vec<SharedStep> {
        self.composed.clone()
    }
}

/// Scripted steps keyed by their exact text.
#[derive(Clone, Default)]
pub struct ScriptedSteps {
    steps: IndexMap<String, Arc<ScriptedStep>>,
}

impl ScriptedSteps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: ScriptedStep) -> Self {
        self.steps.insert(step.text.clone(), Arc::new(step));
        self
    }

    pub fn succeeding<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for text in texts {
            self = self.with(ScriptedStep::succeeding(text));
        }
        self
    }

    pub fn step(&self, text: &str) -> Option<Arc<ScriptedStep>> {
        self.steps.get(text).cloned()
    }

    pub fn performed_count(&self, text: &str) -> usize {
        self.steps
            .get(text)
            .map_or(0, |step| step.performed_count())
    }
}

/// A collector matching texts against `steps`; anything else is pending.
pub fn scripted_collector(steps: &ScriptedSteps) -> TextStepCollector {
    let steps = Arc::new(steps.steps.clone());
    TextStepCollector::with_factory(move |text: &str, _parameters: &Parameters| {
        steps
            .get(text)
            .map(|step| Arc::clone(step) as SharedStep)
    })
}
