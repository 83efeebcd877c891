use crate::Parameters;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaProperty {
    pub name: String,
    pub value: String,
}

/// Ordered multimap of tag properties.
///
/// Lookups return the first value recorded for a name. Inheritance builds a
/// new `Meta` in which the child's own properties shadow the parent's.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    properties: Vec<MetaProperty>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: pairs
                .into_iter()
                .map(|(name, value)| MetaProperty {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Parses `@name value` clauses, e.g. `@skip @author Mauro`.
    pub fn parse(text: &str) -> Self {
        let properties = text
            .split('@')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(|clause| match clause.split_once(char::is_whitespace) {
                Some((name, value)) => MetaProperty {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                },
                None => MetaProperty {
                    name: clause.to_string(),
                    value: String::new(),
                },
            })
            .collect();
        Self { properties }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(MetaProperty {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn properties(&self) -> &[MetaProperty] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .map(|property| property.value.as_str())
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|property| property.name == name)
    }

    /// Distinct property names in first-seen order.
    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for property in &self.properties {
            if !names.contains(&property.name.as_str()) {
                names.push(&property.name);
            }
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn inherit_from(&self, parent: &Meta) -> Meta {
        let mut properties = self.properties.clone();
        properties.extend(
            parent
                .properties
                .iter()
                .filter(|inherited| !self.has_property(&inherited.name))
                .cloned(),
        );
        Meta { properties }
    }

    /// First value of every property, keyed by name.
    pub fn as_parameters(&self) -> Parameters {
        let mut parameters = Parameters::new();
        for property in &self.properties {
            parameters
                .entry(property.name.clone())
                .or_insert_with(|| property.value.clone());
        }
        parameters
    }

    pub fn as_text(&self) -> String {
        self.properties
            .iter()
            .map(|property| {
                if property.value.is_empty() {
                    format!("@{}", property.name)
                } else {
                    format!("@{} {}", property.name, property.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
