use super::{
    COMMENT_PREFIX, CommentStep, PendingStep, ScenarioType, SharedStep, StepCollector, UponOutcome,
};
use fable_model::{
    Lifecycle, Meta, Outcome, Parameters, Scenario, Scope, Stage, Story, substitute_placeholders,
};
use std::sync::Arc;

/// Turns a step text, already substituted with its parameters, into a step.
pub type StepFactory = Arc<dyn Fn(&str, &Parameters) -> Option<SharedStep> + Send + Sync>;

#[derive(Clone)]
struct Hook {
    stage: Stage,
    outcome: Outcome,
    step: SharedStep,
}

impl Hook {
    fn to_step(&self) -> SharedStep {
        match self.stage {
            Stage::Before => Arc::clone(&self.step),
            Stage::After => Arc::new(UponOutcome::new(self.outcome, Arc::clone(&self.step))),
        }
    }
}

/// Step collector over a text-matching step factory plus registered hooks.
///
/// Texts the factory does not recognise become pending steps.
#[derive(Clone)]
pub struct TextStepCollector {
    factory: StepFactory,
    stories_hooks: Vec<Hook>,
    story_hooks: Vec<(bool, Hook)>,
    scenario_hooks: Vec<(ScenarioType, Hook)>,
}

impl TextStepCollector {
    pub fn new(factory: StepFactory) -> Self {
        Self {
            factory,
            stories_hooks: Vec::new(),
            story_hooks: Vec::new(),
            scenario_hooks: Vec::new(),
        }
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&str, &Parameters) -> Option<SharedStep> + Send + Sync + 'static,
    {
        Self::new(Arc::new(factory))
    }

    pub fn with_stories_hook(mut self, stage: Stage, outcome: Outcome, step: SharedStep) -> Self {
        self.stories_hooks.push(Hook {
            stage,
            outcome,
            step,
        });
        self
    }

    /// Registers a story hook that runs for top-level stories, or for given
    /// stories only when `upon_given_story` is set.
    pub fn with_story_hook(
        mut self,
        stage: Stage,
        outcome: Outcome,
        upon_given_story: bool,
        step: SharedStep,
    ) -> Self {
        self.story_hooks.push((
            upon_given_story,
            Hook {
                stage,
                outcome,
                step,
            },
        ));
        self
    }

    pub fn with_scenario_hook(
        mut self,
        stage: Stage,
        scenario_type: ScenarioType,
        outcome: Outcome,
        step: SharedStep,
    ) -> Self {
        self.scenario_hooks.push((
            scenario_type,
            Hook {
                stage,
                outcome,
                step,
            },
        ));
        self
    }

    fn create_step(&self, text: &str, parameters: &Parameters) -> SharedStep {
        let text = substitute_placeholders(text, parameters);
        if text.trim_start().starts_with(COMMENT_PREFIX) {
            return Arc::new(CommentStep::new(text));
        }
        match (self.factory)(&text, parameters) {
            Some(step) => step,
            None => Arc::new(PendingStep::new(text)),
        }
    }

    fn gated_steps(&self, steps: Vec<(Outcome, &str)>, stage: Stage, parameters: &Parameters) -> Vec<SharedStep> {
        steps
            .into_iter()
            .map(|(outcome, text)| {
                let step = self.create_step(text, parameters);
                match stage {
                    Stage::Before => step,
                    Stage::After => Arc::new(UponOutcome::new(outcome, step)) as SharedStep,
                }
            })
            .collect()
    }
}

impl StepCollector for TextStepCollector {
    fn before_or_after_stories_steps(&self, stage: Stage) -> Vec<SharedStep> {
        self.stories_hooks
            .iter()
            .filter(|hook| hook.stage == stage)
            .map(Hook::to_step)
            .collect()
    }

    fn before_or_after_story_steps(
        &self,
        _story: &Story,
        stage: Stage,
        given_story: bool,
    ) -> Vec<SharedStep> {
        self.story_hooks
            .iter()
            .filter(|(upon_given_story, hook)| hook.stage == stage && *upon_given_story == given_story)
            .map(|(_, hook)| hook.to_step())
            .collect()
    }

    fn before_or_after_scenario_steps(
        &self,
        _meta: &Meta,
        stage: Stage,
        scenario_type: ScenarioType,
    ) -> Vec<SharedStep> {
        self.scenario_hooks
            .iter()
            .filter(|(hook_type, hook)| hook.stage == stage && hook_type.matches(scenario_type))
            .map(|(_, hook)| hook.to_step())
            .collect()
    }

    fn lifecycle_steps(
        &self,
        lifecycle: &Lifecycle,
        _meta: &Meta,
        stage: Stage,
        scope: Scope,
        parameters: &Parameters,
    ) -> Vec<SharedStep> {
        self.gated_steps(lifecycle.steps_for(stage, scope), stage, parameters)
    }

    fn scenario_steps(
        &self,
        lifecycle: &Lifecycle,
        scenario: &Scenario,
        parameters: &Parameters,
        _meta: &Meta,
    ) -> Vec<SharedStep> {
        let mut steps = Vec::new();
        for text in scenario.steps() {
            steps.extend(self.gated_steps(
                lifecycle.steps_for(Stage::Before, Scope::Step),
                Stage::Before,
                parameters,
            ));
            steps.push(self.create_step(text, parameters));
            steps.extend(self.gated_steps(
                lifecycle.steps_for(Stage::After, Scope::Step),
                Stage::After,
                parameters,
            ));
        }
        steps
    }
}
