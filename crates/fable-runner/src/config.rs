use crate::RunnerError;
use serde::{Deserialize, Serialize};

/// Toggles governing filtering, state carry-over and skip policies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryControls {
    pub dry_run: bool,
    pub reset_state_before_story: bool,
    pub reset_state_before_scenario: bool,
    pub skip_scenarios_after_failure: bool,
    pub skip_story_if_given_story_failed: bool,
    pub skip_before_and_after_scenario_steps_if_given_story: bool,
    pub ignore_meta_filters_if_given_story: bool,
    pub meta_by_row: bool,
    pub story_meta_prefix: String,
    pub scenario_meta_prefix: String,
    /// `None` restarts a scenario for as long as it asks to be restarted.
    pub max_scenario_restarts: Option<u32>,
    pub max_story_restarts: Option<u32>,
}

impl Default for StoryControls {
    fn default() -> Self {
        Self {
            dry_run: false,
            reset_state_before_story: true,
            reset_state_before_scenario: true,
            skip_scenarios_after_failure: false,
            skip_story_if_given_story_failed: false,
            skip_before_and_after_scenario_steps_if_given_story: false,
            ignore_meta_filters_if_given_story: false,
            meta_by_row: false,
            story_meta_prefix: String::new(),
            scenario_meta_prefix: String::new(),
            max_scenario_restarts: None,
            max_story_restarts: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStepPolicy {
    /// Pending steps are reported and execution continues.
    #[default]
    Passing,
    /// A batch with pending steps fails its scenario.
    Failing,
}

/// How a given-story path is resolved against the story that declares it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathResolution {
    #[default]
    Absolute,
    Relative,
}

impl PathResolution {
    pub fn resolve(self, parent_path: Option<&str>, given_path: &str) -> String {
        match (self, parent_path) {
            (Self::Absolute, _) | (Self::Relative, None) => given_path.to_string(),
            (Self::Relative, Some(_)) if given_path.starts_with('/') => {
                normalize_path(given_path.trim_start_matches('/'))
            }
            (Self::Relative, Some(parent)) => {
                let directory = parent.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                if directory.is_empty() {
                    normalize_path(given_path)
                } else {
                    normalize_path(&format!("{directory}/{given_path}"))
                }
            }
        }
    }
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub story_controls: StoryControls,
    pub pending_step_policy: PendingStepPolicy,
    /// Tag predicate, e.g. `+theme smoke -skip`.
    pub meta_filter: String,
    pub path_resolution: PathResolution,
}

impl Configuration {
    pub fn from_json_str(raw: &str) -> Result<Self, RunnerError> {
        serde_json::from_str(raw)
            .map_err(|error| RunnerError::Configuration(format!("invalid configuration: {error}")))
    }

    pub fn controls(&self) -> &StoryControls {
        &self.story_controls
    }
}
