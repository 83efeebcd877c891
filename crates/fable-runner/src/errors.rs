use fable_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("story '{0}' is not part of the performable tree")]
    StoryNotRegistered(String),
    #[error("failed to load story '{path}': {reason}")]
    StoryLoad { path: String, reason: String },
    #[error("given story cycle: {}", chain.join(" -> "))]
    GivenStoryCycle { chain: Vec<String> },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
    #[error(transparent)]
    Model(#[from] ModelError),
}
