mod builder;

pub use builder::EXAMPLE_META_PARAMETER;

use crate::steps::SharedStep;
use crate::{RunnerError, Status, StepFailure, Timing};
use fable_model::{ExamplesTable, Meta, Parameters, Scenario, Story};
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Performable units built from stories for one run.
#[derive(Debug, Default)]
pub struct PerformableTree {
    pub(crate) root: PerformableRoot,
}

impl PerformableTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &PerformableRoot {
        &self.root
    }
}

#[derive(Debug, Default)]
pub struct PerformableRoot {
    pub(crate) before_steps: PerformableSteps,
    pub(crate) stories: IndexMap<String, Mutex<PerformableStory>>,
    pub(crate) after_steps: PerformableSteps,
}

impl PerformableRoot {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.stories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn before_steps(&self) -> &PerformableSteps {
        &self.before_steps
    }

    pub fn after_steps(&self) -> &PerformableSteps {
        &self.after_steps
    }

    /// Locks the node of `path`; a path that was never added is fatal.
    pub fn story(&self, path: &str) -> Result<MutexGuard<'_, PerformableStory>, RunnerError> {
        self.stories
            .get(path)
            .ok_or_else(|| RunnerError::StoryNotRegistered(path.to_string()))?
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("performable story"))
    }
}

#[derive(Debug)]
pub struct PerformableStory {
    pub(crate) story: Story,
    pub(crate) given_story: bool,
    pub(crate) allowed: bool,
    pub(crate) status: Option<Status>,
    pub(crate) timing: Timing,
    pub(crate) given_stories: Vec<PerformableStory>,
    pub(crate) before_steps: PerformableSteps,
    pub(crate) scenarios: Vec<PerformableScenario>,
    pub(crate) after_steps: PerformableSteps,
}

impl PerformableStory {
    fn new(story: Story, given_story: bool, allowed: bool) -> Self {
        Self {
            story,
            given_story,
            allowed,
            status: None,
            timing: Timing::default(),
            given_stories: Vec::new(),
            before_steps: PerformableSteps::default(),
            scenarios: Vec::new(),
            after_steps: PerformableSteps::default(),
        }
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn path(&self) -> &str {
        self.story.path()
    }

    pub fn is_given_story(&self) -> bool {
        self.given_story
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// `None` until the story has been performed.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn given_stories(&self) -> &[PerformableStory] {
        &self.given_stories
    }

    pub fn before_steps(&self) -> &PerformableSteps {
        &self.before_steps
    }

    pub fn scenarios(&self) -> &[PerformableScenario] {
        &self.scenarios
    }

    pub fn after_steps(&self) -> &PerformableSteps {
        &self.after_steps
    }
}

#[derive(Debug)]
pub struct PerformableScenario {
    pub(crate) scenario: Scenario,
    pub(crate) allowed: bool,
    pub(crate) meta: Meta,
    pub(crate) story_row_index: Option<usize>,
    pub(crate) examples_table: ExamplesTable,
    pub(crate) normal: Option<NormalPerformableScenario>,
    pub(crate) examples: Vec<ExamplePerformableScenario>,
    pub(crate) status: Option<Status>,
    pub(crate) timing: Timing,
}

impl PerformableScenario {
    fn new(scenario: Scenario, allowed: bool, meta: Meta, story_row_index: Option<usize>) -> Self {
        Self {
            scenario,
            allowed,
            meta,
            story_row_index,
            examples_table: ExamplesTable::empty(),
            normal: None,
            examples: Vec::new(),
            status: None,
            timing: Timing::default(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn title(&self) -> &str {
        self.scenario.title()
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Index of the story-level examples row this node was built for.
    pub fn story_row_index(&self) -> Option<usize> {
        self.story_row_index
    }

    /// The table announced before the examples are performed.
    pub fn examples_table(&self) -> &ExamplesTable {
        &self.examples_table
    }

    pub fn normal(&self) -> Option<&NormalPerformableScenario> {
        self.normal.as_ref()
    }

    pub fn examples(&self) -> &[ExamplePerformableScenario] {
        &self.examples
    }

    pub fn has_examples(&self) -> bool {
        !self.examples.is_empty()
    }

    pub fn is_performable(&self) -> bool {
        self.normal.is_some() || !self.examples.is_empty() || !self.allowed
    }

    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// First failure left behind by the normal scenario or any example.
    pub fn failure(&self) -> Option<&StepFailure> {
        self.normal
            .as_ref()
            .and_then(|normal| normal.body.failure.as_ref())
            .or_else(|| {
                self.examples
                    .iter()
                    .find_map(|example| example.body.failure.as_ref())
            })
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScenarioBody {
    pub(crate) before_steps: PerformableSteps,
    pub(crate) given_stories: Vec<PerformableStory>,
    pub(crate) steps: PerformableSteps,
    pub(crate) after_steps: PerformableSteps,
    pub(crate) failure: Option<StepFailure>,
}

#[derive(Debug)]
pub struct NormalPerformableScenario {
    pub(crate) parameters: Parameters,
    pub(crate) body: ScenarioBody,
}

impl NormalPerformableScenario {
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn before_steps(&self) -> &PerformableSteps {
        &self.body.before_steps
    }

    pub fn given_stories(&self) -> &[PerformableStory] {
        &self.body.given_stories
    }

    pub fn steps(&self) -> &PerformableSteps {
        &self.body.steps
    }

    pub fn after_steps(&self) -> &PerformableSteps {
        &self.body.after_steps
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        self.body.failure.as_ref()
    }
}

#[derive(Debug)]
pub struct ExamplePerformableScenario {
    pub(crate) parameters: Parameters,
    pub(crate) meta: Meta,
    pub(crate) index: Option<usize>,
    pub(crate) story_row_index: Option<usize>,
    pub(crate) body: ScenarioBody,
}

impl ExamplePerformableScenario {
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Row of the scenario's own table; `None` for an example that only
    /// carries a story-level row.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn story_row_index(&self) -> Option<usize> {
        self.story_row_index
    }

    pub fn before_steps(&self) -> &PerformableSteps {
        &self.body.before_steps
    }

    pub fn given_stories(&self) -> &[PerformableStory] {
        &self.body.given_stories
    }

    pub fn steps(&self) -> &PerformableSteps {
        &self.body.steps
    }

    pub fn after_steps(&self) -> &PerformableSteps {
        &self.body.after_steps
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        self.body.failure.as_ref()
    }
}

/// An ordered batch of steps plus the texts of those that are pending.
#[derive(Clone, Default)]
pub struct PerformableSteps {
    pub(crate) steps: Vec<SharedStep>,
    pub(crate) pending: Vec<String>,
}

impl PerformableSteps {
    pub fn new(steps: Vec<SharedStep>) -> Self {
        let pending = steps
            .iter()
            .filter(|step| step.is_pending())
            .map(|step| step.text().to_string())
            .collect();
        Self { steps, pending }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.text()).collect()
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }
}

impl fmt::Debug for PerformableSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformableSteps")
            .field("steps", &self.texts())
            .field("pending", &self.pending)
            .finish()
    }
}
