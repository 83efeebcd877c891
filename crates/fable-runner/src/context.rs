use crate::steps::{PendingStepMethodGenerator, RustStubGenerator, StepCollector};
use crate::{
    Configuration, FailureAggregator, MetaFilter, NullStoryReporter, RunnerError,
    SharedStoryReporter, State, StepFailure, StoryControls, StorySource,
};
use fable_model::GivenStory;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Successful,
    Failed,
    Pending,
    NotPerformed,
    NotAllowed,
}

/// State shared by every worker of one run.
///
/// Cloning is cheap; clones share the configuration, collaborators, filter,
/// failure aggregator and cancellation map. A child context for a given story
/// additionally records the chain of story paths it was reached through.
#[derive(Clone)]
pub struct RunContext {
    configuration: Arc<Configuration>,
    collector: Arc<dyn StepCollector>,
    stories: Arc<dyn StorySource>,
    pending_generator: Arc<dyn PendingStepMethodGenerator>,
    filter: Arc<MetaFilter>,
    failures: FailureAggregator,
    cancelled: Arc<Mutex<IndexMap<String, Duration>>>,
    path: Option<String>,
    given_story: bool,
    given_chain: Vec<String>,
}

impl RunContext {
    pub fn new(
        configuration: Configuration,
        collector: Arc<dyn StepCollector>,
        stories: Arc<dyn StorySource>,
    ) -> Result<Self, RunnerError> {
        let filter = MetaFilter::parse(&configuration.meta_filter)?;
        Ok(Self {
            configuration: Arc::new(configuration),
            collector,
            stories,
            pending_generator: Arc::new(RustStubGenerator),
            filter: Arc::new(filter),
            failures: FailureAggregator::new(),
            cancelled: Arc::new(Mutex::new(IndexMap::new())),
            path: None,
            given_story: false,
            given_chain: Vec::new(),
        })
    }

    pub fn with_pending_step_generator(
        mut self,
        generator: Arc<dyn PendingStepMethodGenerator>,
    ) -> Self {
        self.pending_generator = generator;
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn controls(&self) -> &StoryControls {
        &self.configuration.story_controls
    }

    pub fn collector(&self) -> &dyn StepCollector {
        self.collector.as_ref()
    }

    pub fn stories(&self) -> &dyn StorySource {
        self.stories.as_ref()
    }

    pub fn pending_generator(&self) -> &dyn PendingStepMethodGenerator {
        self.pending_generator.as_ref()
    }

    pub fn filter(&self) -> &MetaFilter {
        &self.filter
    }

    pub fn failures(&self) -> &FailureAggregator {
        &self.failures
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_given_story(&self) -> bool {
        self.given_story
    }

    /// Context for building a top-level story.
    pub fn story_context(&self, path: &str) -> RunContext {
        RunContext {
            path: Some(path.to_string()),
            given_story: false,
            given_chain: vec![path.to_string()],
            ..self.clone()
        }
    }

    /// Context for building `given` as a given story of this context's story.
    pub fn child_context_for(&self, given: &GivenStory) -> Result<RunContext, RunnerError> {
        let path = self
            .configuration
            .path_resolution
            .resolve(self.path.as_deref(), given.path());
        let mut chain = self.given_chain.clone();
        let repeated = chain.contains(&path);
        chain.push(path.clone());
        if repeated {
            return Err(RunnerError::GivenStoryCycle { chain });
        }
        Ok(RunContext {
            path: Some(path),
            given_story: true,
            given_chain: chain,
            ..self.clone()
        })
    }

    pub fn cancel_story(&self, path: &str, duration: Duration) -> Result<(), RunnerError> {
        let mut cancelled = self
            .cancelled
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("cancelled stories"))?;
        cancelled.insert(path.to_string(), duration);
        Ok(())
    }

    pub fn is_cancelled(&self, path: &str) -> Result<bool, RunnerError> {
        Ok(self.cancelled_duration(path)?.is_some())
    }

    pub fn cancelled_duration(&self, path: &str) -> Result<Option<Duration>, RunnerError> {
        let cancelled = self
            .cancelled
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("cancelled stories"))?;
        Ok(cancelled.get(path).copied())
    }

    /// Forgets the failure recorded for `path`.
    pub fn reset_failures(&self, path: &str) -> Result<(), RunnerError> {
        self.failures.remove(path)?;
        Ok(())
    }
}

/// Reasons a perform pass unwinds before finishing a node.
#[derive(Debug)]
pub(crate) enum Interrupt {
    Cancelled,
    RestartScenario(StepFailure),
    Fatal(RunnerError),
}

impl From<RunnerError> for Interrupt {
    fn from(error: RunnerError) -> Self {
        Self::Fatal(error)
    }
}

/// Execution state owned by one worker.
///
/// Created by whoever schedules stories, one per worker, and passed down
/// every call of that worker's perform chain. Nothing in it is shared.
pub struct WorkerContext {
    reporter: SharedStoryReporter,
    state: State,
    path_stack: Vec<String>,
    pending_paths: IndexSet<String>,
}

impl WorkerContext {
    pub fn new(reporter: SharedStoryReporter) -> Self {
        Self {
            reporter,
            state: State::Clear,
            path_stack: Vec::new(),
            pending_paths: IndexSet::new(),
        }
    }

    pub fn bind_reporter(&mut self, reporter: SharedStoryReporter) {
        self.reporter = reporter;
    }

    pub fn reporter(&self) -> SharedStoryReporter {
        Arc::clone(&self.reporter)
    }

    /// Path of the innermost story being performed.
    pub fn current_path(&self) -> Option<&str> {
        self.path_stack.last().map(String::as_str)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    pub fn reset_state(&mut self) {
        self.state = State::Clear;
    }

    pub fn failure_occurred(&self, run: &RunContext) -> Result<bool, RunnerError> {
        if self.state.is_failed() {
            return Ok(true);
        }
        match self.current_path() {
            Some(path) => Ok(run.failures().get(path)?.is_some()),
            None => Ok(false),
        }
    }

    pub(crate) fn enter_story(&mut self, path: &str) {
        self.path_stack.push(path.to_string());
    }

    pub(crate) fn leave_story(&mut self) {
        self.path_stack.pop();
    }

    pub(crate) fn mark_pending(&mut self) {
        if let Some(path) = self.path_stack.last() {
            self.pending_paths.insert(path.clone());
        }
    }

    pub(crate) fn clear_pending(&mut self, path: &str) {
        self.pending_paths.shift_remove(path);
    }

    pub fn has_pending_steps(&self, path: &str) -> bool {
        self.pending_paths.contains(path)
    }

    /// Fails with `Interrupt::Cancelled` if any story on the stack is cancelled.
    pub(crate) fn interrupt_if_cancelled(&self, run: &RunContext) -> Result<(), Interrupt> {
        for path in &self.path_stack {
            if run.is_cancelled(path)? {
                return Err(Interrupt::Cancelled);
            }
        }
        Ok(())
    }

    pub fn status(
        &self,
        run: &RunContext,
        path: &str,
        initial_state: &State,
    ) -> Result<Status, RunnerError> {
        if self.has_pending_steps(path) {
            return Ok(Status::Pending);
        }
        if initial_state.is_failed() {
            return Ok(Status::NotPerformed);
        }
        if self.state.is_failed() || run.failures().get(path)?.is_some() {
            return Ok(Status::Failed);
        }
        Ok(Status::Successful)
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::new(Arc::new(NullStoryReporter))
    }
}
