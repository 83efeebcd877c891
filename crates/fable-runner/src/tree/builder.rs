use super::{
    ExamplePerformableScenario, NormalPerformableScenario, PerformableScenario, PerformableStory,
    PerformableSteps, PerformableTree, ScenarioBody,
};
use crate::steps::{ScenarioType, SharedStep};
use crate::{FilteredStory, RunContext, RunnerError};
use fable_model::{
    GivenStories, Meta, Parameters, Scenario, Scope, Stage, Story, merge_parameters,
    resolve_placeholders,
};
use std::sync::Mutex;
use tracing::debug;

/// Parameter carrying per-example meta, e.g. `@theme smoke`.
pub const EXAMPLE_META_PARAMETER: &str = "Meta:";

impl PerformableTree {
    /// Builds a node for every story, replacing nodes already built for the
    /// same path, and refreshes the before/after stories steps.
    pub fn add_stories(&mut self, run: &RunContext, stories: &[Story]) -> Result<(), RunnerError> {
        self.root.before_steps =
            PerformableSteps::new(run.collector().before_or_after_stories_steps(Stage::Before));
        for story in stories {
            let context = run.story_context(story.path());
            let performable = performable_story(&context, story, &Parameters::new())?;
            self.root
                .stories
                .insert(story.path().to_string(), Mutex::new(performable));
        }
        self.root.after_steps =
            PerformableSteps::new(run.collector().before_or_after_stories_steps(Stage::After));
        Ok(())
    }
}

fn performable_story(
    run: &RunContext,
    story: &Story,
    story_parameters: &Parameters,
) -> Result<PerformableStory, RunnerError> {
    let controls = run.controls();
    let given_story = run.is_given_story();
    let filter = FilteredStory::new(
        run.filter(),
        story,
        controls,
        given_story && controls.ignore_meta_filters_if_given_story,
    );

    if !filter.allowed() {
        debug!(story = %story.path(), filter = %run.filter().as_str(), "story excluded");
        return Ok(PerformableStory::new(story.clone(), given_story, false));
    }

    let mut performable = PerformableStory::new(story.clone(), given_story, true);
    let collector = run.collector();
    let story_meta = filter.story_meta();

    let mut before = collector.before_or_after_story_steps(story, Stage::Before, given_story);
    before.extend(collector.lifecycle_steps(
        story.lifecycle(),
        story_meta,
        Stage::Before,
        Scope::Story,
        story_parameters,
    ));
    performable.before_steps = PerformableSteps::new(before);

    performable.scenarios = performable_scenarios(run, story, &filter, story_parameters)?;

    let mut after = collector.lifecycle_steps(
        story.lifecycle(),
        story_meta,
        Stage::After,
        Scope::Story,
        story_parameters,
    );
    after.extend(collector.before_or_after_story_steps(story, Stage::After, given_story));
    performable.after_steps = PerformableSteps::new(after);

    if performable.scenarios.iter().any(PerformableScenario::is_allowed) {
        performable.given_stories = performable_given_stories(
            run,
            story.given_stories(),
            &story.meta().as_parameters(),
            story.meta(),
        )?;
    }
    Ok(performable)
}

/// Story-level rows drive the outer loop and scenarios the inner one.
fn performable_scenarios(
    run: &RunContext,
    story: &Story,
    filter: &FilteredStory,
    story_parameters: &Parameters,
) -> Result<Vec<PerformableScenario>, RunnerError> {
    let story_table = story.lifecycle().examples();
    let story_rows: Vec<StoryRow<'_>> = if story_table.is_empty() {
        vec![StoryRow {
            index: None,
            values: Parameters::new(),
            story_parameters,
        }]
    } else {
        story_table
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, values)| StoryRow {
                index: Some(index),
                values,
                story_parameters,
            })
            .collect()
    };

    let mut scenarios = Vec::new();
    for story_row in &story_rows {
        for (index, scenario) in story.scenarios().iter().enumerate() {
            if run.controls().skip_scenarios_after_failure && !run.failures().is_empty()? {
                debug!(
                    story = %story.path(),
                    scenario = %scenario.title(),
                    "scenario skipped after failure"
                );
                scenarios.push(PerformableScenario::new(
                    scenario.clone(),
                    true,
                    Meta::new(),
                    story_row.index,
                ));
                continue;
            }
            scenarios.push(performable_scenario(
                run, story, filter, index, scenario, story_row,
            )?);
        }
    }
    Ok(scenarios)
}

/// A story-level examples row, or the empty row when the story has none.
struct StoryRow<'a> {
    index: Option<usize>,
    values: Parameters,
    story_parameters: &'a Parameters,
}

fn performable_scenario(
    run: &RunContext,
    story: &Story,
    filter: &FilteredStory,
    index: usize,
    scenario: &Scenario,
    story_row: &StoryRow<'_>,
) -> Result<PerformableScenario, RunnerError> {
    let story_row_index = story_row.index;
    let story_parameters = story_row.story_parameters;
    let story_row = &story_row.values;
    let allowed = filter.is_scenario_allowed(index);
    let meta = filter
        .scenario_meta(index)
        .cloned()
        .unwrap_or_else(|| scenario.meta().clone());
    let mut performable =
        PerformableScenario::new(scenario.clone(), allowed, meta.clone(), story_row_index);
    if !allowed {
        debug!(story = %story.path(), scenario = %scenario.title(), "scenario excluded");
        return Ok(performable);
    }

    if scenario.is_parameterised_by_examples() {
        let table = scenario.examples();
        let story_and_scenario_meta = scenario.meta().inherit_from(filter.story_meta());
        for (example_index, row) in table.rows().into_iter().enumerate() {
            let row = resolve_placeholders(&row, story_row);
            let parameters = merge_parameters([story_parameters, story_row, &row]);
            let example_meta = parameters
                .get(EXAMPLE_META_PARAMETER)
                .map(|text| Meta::parse(text))
                .unwrap_or_default()
                .inherit_from(&story_and_scenario_meta);
            if !run.filter().allow(&example_meta) {
                debug!(
                    story = %story.path(),
                    scenario = %scenario.title(),
                    example = example_index,
                    "example excluded"
                );
                continue;
            }
            let body = scenario_body(
                run,
                story,
                scenario,
                &example_meta,
                ScenarioType::Example,
                &parameters,
                scenario.given_stories().clone(),
            )?;
            performable.examples.push(ExamplePerformableScenario {
                parameters,
                meta: example_meta,
                index: Some(example_index),
                story_row_index,
                body,
            });
        }
        performable.examples_table = table.clone();
    } else if story_row_index.is_some() {
        let parameters = merge_parameters([story_parameters, story_row]);
        let given_stories = bound_given_stories(scenario)?;
        let body = scenario_body(
            run,
            story,
            scenario,
            &meta,
            ScenarioType::Example,
            &parameters,
            given_stories,
        )?;
        performable.examples.push(ExamplePerformableScenario {
            parameters,
            meta,
            index: None,
            story_row_index,
            body,
        });
        performable.examples_table = story.lifecycle().examples().clone();
    } else {
        let parameters = story_parameters.clone();
        let given_stories = bound_given_stories(scenario)?;
        let body = scenario_body(
            run,
            story,
            scenario,
            &meta,
            ScenarioType::Normal,
            &parameters,
            given_stories,
        )?;
        performable.normal = Some(NormalPerformableScenario { parameters, body });
    }
    Ok(performable)
}

/// Given stories of a scenario whose references point at its examples rows.
fn bound_given_stories(scenario: &Scenario) -> Result<GivenStories, RunnerError> {
    if scenario.given_stories().requires_parameters() {
        Ok(scenario
            .given_stories()
            .use_examples_table(scenario.examples())?)
    } else {
        Ok(scenario.given_stories().clone())
    }
}

fn scenario_body(
    run: &RunContext,
    story: &Story,
    scenario: &Scenario,
    meta: &Meta,
    scenario_type: ScenarioType,
    parameters: &Parameters,
    given_stories: GivenStories,
) -> Result<ScenarioBody, RunnerError> {
    let collector = run.collector();
    let lifecycle = story.lifecycle();
    let skip_scenario_steps = run.is_given_story()
        && run.controls().skip_before_and_after_scenario_steps_if_given_story;

    let (before, after): (Vec<SharedStep>, Vec<SharedStep>) = if skip_scenario_steps {
        (Vec::new(), Vec::new())
    } else {
        let mut before = collector.before_or_after_scenario_steps(meta, Stage::Before, scenario_type);
        before.extend(collector.lifecycle_steps(
            lifecycle,
            meta,
            Stage::Before,
            Scope::Scenario,
            parameters,
        ));
        let mut after =
            collector.lifecycle_steps(lifecycle, meta, Stage::After, Scope::Scenario, parameters);
        after.extend(collector.before_or_after_scenario_steps(meta, Stage::After, scenario_type));
        (before, after)
    };

    Ok(ScenarioBody {
        before_steps: PerformableSteps::new(before),
        given_stories: performable_given_stories(run, &given_stories, parameters, meta)?,
        steps: PerformableSteps::new(collector.scenario_steps(lifecycle, scenario, parameters, meta)),
        after_steps: PerformableSteps::new(after),
        failure: None,
    })
}

fn performable_given_stories(
    run: &RunContext,
    given_stories: &GivenStories,
    parameters: &Parameters,
    meta: &Meta,
) -> Result<Vec<PerformableStory>, RunnerError> {
    let mut performables = Vec::new();
    for given in given_stories
        .stories()
        .iter()
        .filter(|given| !given.path().is_empty())
    {
        let context = run.child_context_for(given)?;
        let path = context.path().unwrap_or(given.path());
        let mut story = run.stories().story_of_path(path)?;
        if !meta.is_empty() {
            story = story.with_inherited_meta(meta);
        }
        if given.has_anchor_parameters() {
            story = story_with_matching_scenarios(&story, given.anchor_parameters());
        }
        let given_parameters = merge_parameters([parameters, given.parameters()]);
        performables.push(performable_story(&context, &story, &given_parameters)?);
    }
    Ok(performables)
}

/// Keeps the scenarios whose meta equals an anchor parameter on some key.
fn story_with_matching_scenarios(story: &Story, anchor: &Parameters) -> Story {
    let scenarios = story
        .scenarios()
        .iter()
        .filter(|scenario| {
            anchor.iter().any(|(name, value)| {
                scenario
                    .meta()
                    .properties()
                    .iter()
                    .any(|property| &property.name == name && &property.value == value)
            })
        })
        .cloned()
        .collect();
    story.clone().with_scenarios(scenarios)
}
