use crate::{ExamplesTable, ModelError, Parameters};
use serde::{Deserialize, Serialize};

/// A reference to a story performed as a prerequisite.
///
/// Written as `path` or `path#{anchor}`. An anchor made of `key:value` pairs
/// separated by `;` selects scenarios by meta; any other anchor references an
/// examples row of the enclosing scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GivenStory {
    source: String,
    path: String,
    anchor: Option<String>,
    anchor_parameters: Parameters,
    parameters: Parameters,
}

impl GivenStory {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            source: path.clone(),
            path,
            anchor: None,
            anchor_parameters: Parameters::new(),
            parameters: Parameters::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let source = text.trim();
        let Some((path, remainder)) = source.split_once("#{") else {
            return Ok(Self::new(source));
        };
        let Some(anchor) = remainder.strip_suffix('}') else {
            return Err(ModelError::InvalidAnchor {
                given_story: source.to_string(),
                reason: "anchor is not closed with '}'".to_string(),
            });
        };
        let anchor = anchor.trim();

        let mut anchor_parameters = Parameters::new();
        if anchor.contains(':') {
            for pair in anchor.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
                let Some((key, value)) = pair.split_once(':') else {
                    return Err(ModelError::InvalidAnchor {
                        given_story: source.to_string(),
                        reason: format!("'{pair}' is not a key:value pair"),
                    });
                };
                let key = key.trim();
                if key.is_empty() {
                    return Err(ModelError::InvalidAnchor {
                        given_story: source.to_string(),
                        reason: format!("'{pair}' has an empty key"),
                    });
                }
                anchor_parameters.insert(key.to_string(), value.trim().to_string());
            }
        }

        Ok(Self {
            source: source.to_string(),
            path: path.trim().to_string(),
            anchor: (!anchor.is_empty()).then(|| anchor.to_string()),
            anchor_parameters,
            parameters: Parameters::new(),
        })
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn has_anchor(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor_parameters(&self) -> &Parameters {
        &self.anchor_parameters
    }

    pub fn has_anchor_parameters(&self) -> bool {
        !self.anchor_parameters.is_empty()
    }

    /// The examples-row reference, when the anchor is not a meta selector.
    pub fn parameter_reference(&self) -> Option<&str> {
        self.anchor().filter(|_| !self.has_anchor_parameters())
    }

    pub fn requires_parameters(&self) -> bool {
        self.parameter_reference().is_some()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn as_text(&self) -> &str {
        &self.source
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GivenStories {
    stories: Vec<GivenStory>,
}

impl GivenStories {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(stories: Vec<GivenStory>) -> Self {
        Self { stories }
    }

    /// Parses a comma separated list of given story references.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let stories = text
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(GivenStory::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stories })
    }

    pub fn stories(&self) -> &[GivenStory] {
        &self.stories
    }

    pub fn paths(&self) -> Vec<&str> {
        self.stories
            .iter()
            .map(GivenStory::path)
            .filter(|path| !path.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn requires_parameters(&self) -> bool {
        self.stories.iter().any(GivenStory::requires_parameters)
    }

    /// Binds every row reference to the referenced row of `table`.
    pub fn use_examples_table(&self, table: &ExamplesTable) -> Result<Self, ModelError> {
        let stories = self
            .stories
            .iter()
            .map(|story| {
                let Some(reference) = story.parameter_reference() else {
                    return Ok(story.clone());
                };
                let index: usize =
                    reference
                        .parse()
                        .map_err(|_| ModelError::InvalidAnchor {
                            given_story: story.as_text().to_string(),
                            reason: format!("'{reference}' is not an examples row index"),
                        })?;
                let row = table.row(index).ok_or_else(|| ModelError::MissingExamplesRow {
                    path: story.path().to_string(),
                    index,
                    rows: table.row_count(),
                })?;
                Ok(story.clone().with_parameters(row))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        Ok(Self { stories })
    }

    pub fn as_text(&self) -> String {
        self.stories
            .iter()
            .map(GivenStory::as_text)
            .collect::<Vec<_>>()
            .join(",")
    }
}
