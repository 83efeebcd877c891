pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod events;
pub mod failures;
pub mod filter;
pub mod source;
pub mod state;
pub mod steps;
pub mod testing;
pub mod timing;
pub mod tree;

pub use config::*;
pub use context::{RunContext, Status, WorkerContext};
pub use engine::{AFTER_STORIES_PATH, BEFORE_STORIES_PATH};
pub use errors::*;
pub use events::*;
pub use failures::*;
pub use filter::*;
pub use source::*;
pub use state::State;
pub use steps::{
    COMMENT_PREFIX, CommentStep, PendingStep, PendingStepMethodGenerator, RustStubGenerator,
    ScenarioType, SharedStep, Step, StepCollector, StepFactory, StepOutcome, StepResult,
    TextStepCollector, UponOutcome,
};
pub use timing::*;
pub use tree::{
    EXAMPLE_META_PARAMETER, ExamplePerformableScenario, NormalPerformableScenario, PerformableRoot,
    PerformableScenario, PerformableStory, PerformableSteps, PerformableTree,
};
