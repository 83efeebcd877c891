use crate::ExamplesTable;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Before,
    After,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Story,
    #[default]
    Scenario,
    Step,
}

/// Condition under which an after-step runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Any,
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSteps {
    pub scope: Scope,
    pub outcome: Outcome,
    pub steps: Vec<String>,
}

/// Story-level before/after steps and examples shared by all scenarios.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    examples: ExamplesTable,
    before: Vec<LifecycleSteps>,
    after: Vec<LifecycleSteps>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_examples(mut self, examples: ExamplesTable) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_before<I, S>(mut self, scope: Scope, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before.push(LifecycleSteps {
            scope,
            outcome: Outcome::Any,
            steps: steps.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_after<I, S>(mut self, scope: Scope, outcome: Outcome, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.push(LifecycleSteps {
            scope,
            outcome,
            steps: steps.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn examples(&self) -> &ExamplesTable {
        &self.examples
    }

    pub fn before(&self) -> &[LifecycleSteps] {
        &self.before
    }

    pub fn after(&self) -> &[LifecycleSteps] {
        &self.after
    }

    pub fn before_steps(&self, scope: Scope) -> Vec<&str> {
        self.before
            .iter()
            .filter(|group| group.scope == scope)
            .flat_map(|group| group.steps.iter().map(String::as_str))
            .collect()
    }

    /// After-steps of `scope`, each paired with the outcome it is gated on.
    pub fn after_steps(&self, scope: Scope) -> Vec<(Outcome, &str)> {
        self.after
            .iter()
            .filter(|group| group.scope == scope)
            .flat_map(|group| {
                group
                    .steps
                    .iter()
                    .map(move |step| (group.outcome, step.as_str()))
            })
            .collect()
    }

    pub fn steps_for(&self, stage: Stage, scope: Scope) -> Vec<(Outcome, &str)> {
        match stage {
            Stage::Before => self
                .before_steps(scope)
                .into_iter()
                .map(|step| (Outcome::Any, step))
                .collect(),
            Stage::After => self.after_steps(scope),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty() && self.before.is_empty() && self.after.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_by_scope_expected_filtered_in_declaration_order() {
        let lifecycle = Lifecycle::new()
            .with_before(Scope::Scenario, ["Given a clean db"])
            .with_before(Scope::Story, ["Given a server"])
            .with_before(Scope::Scenario, ["Given a session"])
            .with_after(Scope::Scenario, Outcome::Failure, ["Then dump logs"])
            .with_after(Scope::Scenario, Outcome::Any, ["Then close session"]);

        assert_eq!(
            lifecycle.before_steps(Scope::Scenario),
            vec!["Given a clean db", "Given a session"]
        );
        assert_eq!(lifecycle.before_steps(Scope::Story), vec!["Given a server"]);
        assert_eq!(
            lifecycle.after_steps(Scope::Scenario),
            vec![
                (Outcome::Failure, "Then dump logs"),
                (Outcome::Any, "Then close session")
            ]
        );
        assert!(lifecycle.after_steps(Scope::Step).is_empty());
    }
}
