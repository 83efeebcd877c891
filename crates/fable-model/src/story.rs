use crate::{ExamplesTable, GivenStories, Lifecycle, Meta};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub in_order_to: String,
    pub as_a: String,
    pub i_want_to: String,
    pub so_that: String,
}

impl Narrative {
    pub fn is_empty(&self) -> bool {
        self.in_order_to.is_empty()
            && self.as_a.is_empty()
            && self.i_want_to.is_empty()
            && self.so_that.is_empty()
    }

    pub fn as_text(&self) -> String {
        [
            ("In order to", &self.in_order_to),
            ("As a", &self.as_a),
            ("I want to", &self.i_want_to),
            ("So that", &self.so_that),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(keyword, value)| format!("{keyword} {value}"))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    title: String,
    meta: Meta,
    given_stories: GivenStories,
    examples: ExamplesTable,
    steps: Vec<String>,
}

impl Scenario {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_given_stories(mut self, given_stories: GivenStories) -> Self {
        self.given_stories = given_stories;
        self
    }

    pub fn with_examples(mut self, examples: ExamplesTable) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn given_stories(&self) -> &GivenStories {
        &self.given_stories
    }

    pub fn examples(&self) -> &ExamplesTable {
        &self.examples
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// True when every row of the examples table instantiates an example.
    ///
    /// A table consumed by given-story row references does not.
    pub fn is_parameterised_by_examples(&self) -> bool {
        !self.examples.is_empty() && !self.given_stories.requires_parameters()
    }

    pub fn as_meta(&self, prefix: &str) -> Meta {
        Meta::new()
            .with_property(format!("{prefix}title"), self.title.clone())
            .with_property(
                format!("{prefix}givenStories"),
                self.given_stories.as_text(),
            )
            .with_property(format!("{prefix}examplesTable"), self.examples.as_text())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    path: String,
    description: String,
    meta: Meta,
    narrative: Narrative,
    given_stories: GivenStories,
    lifecycle: Lifecycle,
    scenarios: Vec<Scenario>,
    parse_failure: Option<String>,
}

impl Story {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Placeholder standing in for a story whose text could not be parsed.
    pub fn failed_to_parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parse_failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_narrative(mut self, narrative: Narrative) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn with_given_stories(mut self, given_stories: GivenStories) -> Self {
        self.given_stories = given_stories;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_scenarios(mut self, scenarios: Vec<Scenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// A copy whose meta inherits from `parent`.
    pub fn with_inherited_meta(&self, parent: &Meta) -> Story {
        Story {
            meta: self.meta.inherit_from(parent),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, e.g. `login.story` for `auth/login.story`.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn narrative(&self) -> &Narrative {
        &self.narrative
    }

    pub fn given_stories(&self) -> &GivenStories {
        &self.given_stories
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn parse_failure(&self) -> Option<&str> {
        self.parse_failure.as_deref()
    }

    pub fn is_parse_failure(&self) -> bool {
        self.parse_failure.is_some()
    }

    pub fn as_meta(&self, prefix: &str) -> Meta {
        Meta::new()
            .with_property(format!("{prefix}path"), self.path.clone())
            .with_property(format!("{prefix}description"), self.description.clone())
            .with_property(format!("{prefix}narrative"), self.narrative.as_text())
    }
}
