use crate::{RunnerError, StoryControls};
use fable_model::{Meta, Story};
use regex::Regex;

#[derive(Clone, Debug)]
struct Clause {
    name: String,
    value: Option<Regex>,
}

impl Clause {
    fn new(name: &str, value: &[&str]) -> Result<Self, RunnerError> {
        if name.is_empty() {
            return Err(RunnerError::Configuration(
                "meta filter clause is missing a property name".to_string(),
            ));
        }
        let value = if value.is_empty() {
            None
        } else {
            let pattern = value
                .join(" ")
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let regex = Regex::new(&format!("^{pattern}$")).map_err(|error| {
                RunnerError::Configuration(format!("invalid meta filter value for '{name}': {error}"))
            })?;
            Some(regex)
        };
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }

    fn matches(&self, meta: &Meta) -> bool {
        meta.properties()
            .iter()
            .filter(|property| property.name == self.name)
            .any(|property| {
                self.value
                    .as_ref()
                    .is_none_or(|value| value.is_match(&property.value))
            })
    }
}

/// Tag predicate written as `+name [value]` and `-name [value]` clauses.
///
/// Values may use `*` as a wildcard. An empty filter allows everything.
#[derive(Clone, Debug, Default)]
pub struct MetaFilter {
    source: String,
    includes: Vec<Clause>,
    excludes: Vec<Clause>,
}

impl MetaFilter {
    pub fn parse(text: &str) -> Result<Self, RunnerError> {
        let mut filter = Self {
            source: text.trim().to_string(),
            ..Self::default()
        };

        let mut pending: Option<(char, &str, Vec<&str>)> = None;
        for token in text.split_whitespace() {
            let sign = token.chars().next();
            match sign {
                Some(sign @ ('+' | '-')) => {
                    if let Some(clause) = pending.take() {
                        filter.push(clause)?;
                    }
                    pending = Some((sign, &token[1..], Vec::new()));
                }
                _ => match pending.as_mut() {
                    Some((_, _, value)) => value.push(token),
                    None => {
                        return Err(RunnerError::Configuration(format!(
                            "meta filter '{text}' must start with a '+' or '-' clause"
                        )));
                    }
                },
            }
        }
        if let Some(clause) = pending.take() {
            filter.push(clause)?;
        }
        Ok(filter)
    }

    fn push(&mut self, (sign, name, value): (char, &str, Vec<&str>)) -> Result<(), RunnerError> {
        let clause = Clause::new(name, &value)?;
        if sign == '+' {
            self.includes.push(clause);
        } else {
            self.excludes.push(clause);
        }
        Ok(())
    }

    pub fn allow(&self, meta: &Meta) -> bool {
        let included =
            self.includes.is_empty() || self.includes.iter().any(|clause| clause.matches(meta));
        included && !self.excludes.iter().any(|clause| clause.matches(meta))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

/// Eligibility of a story and each of its scenarios, computed once per run.
#[derive(Clone, Debug)]
pub struct FilteredStory {
    parse_failure: bool,
    always_allowed: bool,
    story_allowed: bool,
    story_meta: Meta,
    scenarios: Vec<(bool, Meta)>,
}

impl FilteredStory {
    pub fn new(
        filter: &MetaFilter,
        story: &Story,
        controls: &StoryControls,
        always_allowed: bool,
    ) -> Self {
        let story_meta = story
            .meta()
            .inherit_from(&story.as_meta(&controls.story_meta_prefix));
        let story_allowed = filter.allow(&story_meta);

        let scenarios = story
            .scenarios()
            .iter()
            .map(|scenario| {
                let meta = scenario.meta().inherit_from(
                    &scenario
                        .as_meta(&controls.scenario_meta_prefix)
                        .inherit_from(&story_meta),
                );
                let examples = scenario.examples();
                let meta_by_row = examples.meta_by_row().unwrap_or(controls.meta_by_row);
                if !examples.is_empty() && meta_by_row {
                    (true, meta)
                } else {
                    (filter.allow(&meta), meta)
                }
            })
            .collect();

        Self {
            parse_failure: story.is_parse_failure(),
            always_allowed,
            story_allowed,
            story_meta,
            scenarios,
        }
    }

    pub fn allowed(&self) -> bool {
        if self.parse_failure {
            return false;
        }
        if self.always_allowed {
            return true;
        }
        self.story_allowed || self.scenarios.iter().any(|(allowed, _)| *allowed)
    }

    pub fn is_scenario_allowed(&self, index: usize) -> bool {
        self.always_allowed || self.scenarios.get(index).is_some_and(|(allowed, _)| *allowed)
    }

    pub fn story_meta(&self) -> &Meta {
        &self.story_meta
    }

    /// Scenario meta inheriting from the story meta.
    pub fn scenario_meta(&self, index: usize) -> Option<&Meta> {
        self.scenarios.get(index).map(|(_, meta)| meta)
    }
}
