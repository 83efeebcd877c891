use crate::RunnerError;
use indexmap::IndexMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

pub type FailureCause = Arc<dyn Error + Send + Sync + 'static>;

/// Plain step error carrying only a message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StepError(pub String);

/// Asks the enclosing scenario to run again from its first before-step.
#[derive(Debug, Error)]
#[error("scenario restart requested: {reason}")]
pub struct RestartScenario {
    pub reason: String,
}

/// Asks the enclosing story to run again once it has finished.
#[derive(Debug, Error)]
#[error("story restart requested: {reason}")]
pub struct RestartStory {
    pub reason: String,
}

/// Reports the rest of the current step batch as ignorable.
#[derive(Debug, Error)]
#[error("ignoring remaining steps: {reason}")]
pub struct IgnoreRemainingSteps {
    pub reason: String,
}

#[derive(Debug, Error)]
#[error("pending steps found: {}", steps.join(", "))]
pub struct PendingStepFound {
    pub steps: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    RestartScenario,
    RestartStory,
    IgnoreRemainingSteps,
}

/// Finds the first control-flow marker in the `source()` chain of `error`.
pub fn signal_of(error: &(dyn Error + 'static)) -> Option<Signal> {
    let mut current = Some(error);
    while let Some(error) = current {
        if error.is::<RestartScenario>() {
            return Some(Signal::RestartScenario);
        }
        if error.is::<RestartStory>() {
            return Some(Signal::RestartStory);
        }
        if error.is::<IgnoreRemainingSteps>() {
            return Some(Signal::IgnoreRemainingSteps);
        }
        current = error.source();
    }
    None
}

/// Envelope around a step failure.
///
/// Every envelope gets its own id, so two failures of the same step with the
/// same message stay distinguishable.
#[derive(Clone)]
pub struct StepFailure {
    id: Uuid,
    cause: FailureCause,
}

impl StepFailure {
    pub fn new<E>(cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::from_cause(Arc::new(cause))
    }

    pub fn from_cause(cause: FailureCause) -> Self {
        Self {
            id: Uuid::new_v4(),
            cause,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(StepError(message.into()))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    pub fn signal(&self) -> Option<Signal> {
        signal_of(self.cause.as_ref())
    }

    pub fn is_restart_story(&self) -> bool {
        self.signal() == Some(Signal::RestartStory)
    }

    pub fn find_in_chain<T>(&self) -> Option<&T>
    where
        T: Error + 'static,
    {
        let mut current: Option<&(dyn Error + 'static)> = Some(self.cause.as_ref());
        while let Some(error) = current {
            if let Some(found) = error.downcast_ref::<T>() {
                return Some(found);
            }
            current = error.source();
        }
        None
    }
}

impl PartialEq for StepFailure {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFailure")
            .field("id", &self.id)
            .field("cause", &self.cause.to_string())
            .finish()
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.cause, self.id)
    }
}

impl Error for StepFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Failures of one run keyed by story path, shared by every worker.
///
/// A later failure for the same path replaces the earlier one.
#[derive(Clone, Default)]
pub struct FailureAggregator {
    inner: Arc<Mutex<IndexMap<String, StepFailure>>>,
}

impl FailureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, failure: StepFailure) -> Result<(), RunnerError> {
        let mut failures = self
            .inner
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("failure aggregator"))?;
        failures.insert(key.into(), failure);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<StepFailure>, RunnerError> {
        let failures = self
            .inner
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("failure aggregator"))?;
        Ok(failures.get(key).cloned())
    }

    pub fn remove(&self, key: &str) -> Result<Option<StepFailure>, RunnerError> {
        let mut failures = self
            .inner
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("failure aggregator"))?;
        Ok(failures.shift_remove(key))
    }

    pub fn is_empty(&self) -> Result<bool, RunnerError> {
        let failures = self
            .inner
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("failure aggregator"))?;
        Ok(failures.is_empty())
    }

    pub fn snapshot(&self) -> Result<IndexMap<String, StepFailure>, RunnerError> {
        let failures = self
            .inner
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("failure aggregator"))?;
        Ok(failures.clone())
    }
}
