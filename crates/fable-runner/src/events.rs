use crate::Timing;
use fable_model::{ExamplesTable, Lifecycle, Meta, Narrative, Parameters, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything a run tells its reporters, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoryEvent {
    BeforeStoriesSteps {
        stage: Stage,
    },
    AfterStoriesSteps {
        stage: Stage,
    },
    StoryNotAllowed {
        path: String,
        filter: String,
    },
    BeforeStory {
        path: String,
        given_story: bool,
    },
    DryRun,
    Narrative {
        narrative: Narrative,
    },
    Lifecycle {
        lifecycle: Lifecycle,
    },
    BeforeStorySteps {
        stage: Stage,
    },
    AfterStorySteps {
        stage: Stage,
    },
    BeforeGivenStories,
    GivenStories {
        paths: Vec<String>,
    },
    AfterGivenStories,
    ScenarioNotAllowed {
        title: String,
        filter: String,
    },
    BeforeScenario {
        title: String,
    },
    ScenarioMeta {
        meta: Meta,
    },
    BeforeExamples {
        steps: Vec<String>,
        table: ExamplesTable,
    },
    Example {
        parameters: Parameters,
        index: Option<usize>,
    },
    AfterExamples,
    BeforeStep {
        step: String,
    },
    Successful {
        step: String,
    },
    Ignorable {
        step: String,
    },
    Comment {
        step: String,
    },
    Pending {
        step: String,
    },
    NotPerformed {
        step: String,
    },
    Failed {
        step: String,
        failure_id: Uuid,
        cause: String,
    },
    Restarted {
        step: String,
        cause: String,
    },
    RestartedStory {
        path: String,
        cause: String,
    },
    PendingMethods {
        methods: Vec<String>,
    },
    AfterScenario {
        title: String,
        timing: Timing,
    },
    StoryCancelled {
        path: String,
        duration: Duration,
    },
    AfterStory {
        path: String,
        given_story: bool,
    },
}

impl StoryEvent {
    /// Text of the step this event reports on, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::BeforeStep { step }
            | Self::Successful { step }
            | Self::Ignorable { step }
            | Self::Comment { step }
            | Self::Pending { step }
            | Self::NotPerformed { step }
            | Self::Failed { step, .. }
            | Self::Restarted { step, .. } => Some(step),
            _ => None,
        }
    }
}

pub trait StoryReporter: Send + Sync {
    fn on_event(&self, event: &StoryEvent);
}

impl<F> StoryReporter for F
where
    F: Fn(&StoryEvent) + Send + Sync,
{
    fn on_event(&self, event: &StoryEvent) {
        self(event);
    }
}

pub type SharedStoryReporter = Arc<dyn StoryReporter>;

#[derive(Clone, Copy, Debug, Default)]
pub struct NullStoryReporter;

impl StoryReporter for NullStoryReporter {
    fn on_event(&self, _event: &StoryEvent) {}
}

/// Fans every event out to each registered reporter in order.
#[derive(Clone, Default)]
pub struct CompositeReporter {
    reporters: Vec<SharedStoryReporter>,
}

impl CompositeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: SharedStoryReporter) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.reporters.is_empty()
    }
}

impl StoryReporter for CompositeReporter {
    fn on_event(&self, event: &StoryEvent) {
        for reporter in &self.reporters {
            reporter.on_event(event);
        }
    }
}

/// Forwards events to `tracing`; installs no subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl StoryReporter for TracingReporter {
    fn on_event(&self, event: &StoryEvent) {
        match event {
            StoryEvent::BeforeStory { path, given_story } => {
                info!(story = %path, given_story, "story started");
            }
            StoryEvent::AfterStory { path, given_story } => {
                info!(story = %path, given_story, "story finished");
            }
            StoryEvent::StoryNotAllowed { path, filter } => {
                info!(story = %path, filter = %filter, "story not allowed");
            }
            StoryEvent::ScenarioNotAllowed { title, filter } => {
                info!(scenario = %title, filter = %filter, "scenario not allowed");
            }
            StoryEvent::Failed {
                step,
                failure_id,
                cause,
            } => {
                warn!(step = %step, failure_id = %failure_id, cause = %cause, "step failed");
            }
            StoryEvent::Restarted { step, cause } => {
                warn!(step = %step, cause = %cause, "scenario restarted");
            }
            StoryEvent::RestartedStory { path, cause } => {
                warn!(story = %path, cause = %cause, "story restarted");
            }
            StoryEvent::StoryCancelled { path, duration } => {
                warn!(story = %path, duration_ms = duration.as_millis() as u64, "story cancelled");
            }
            StoryEvent::Pending { step } => {
                warn!(step = %step, "pending step");
            }
            other => {
                debug!(event = ?other, "story event");
            }
        }
    }
}
