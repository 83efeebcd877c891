use crate::{ModelError, Parameters, substitute_placeholders};
use serde::{Deserialize, Serialize};

/// Table property enabling row-level meta filtering.
pub const META_BY_ROW_PROPERTY: &str = "metaByRow";

/// Tabular example data.
///
/// Every row holds a value for every header; missing values are stored as
/// empty strings. Named parameters are substituted when rows are read, not
/// when they are added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplesTable {
    headers: Vec<String>,
    rows: Vec<Parameters>,
    properties: Parameters,
    named_parameters: Parameters,
}

impl ExamplesTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I, S>(headers: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for header in headers {
            let header = header.into();
            if table.headers.contains(&header) {
                return Err(ModelError::DuplicateHeader(header));
            }
            table.headers.push(header);
        }
        Ok(table)
    }

    /// Appends a row given as `(header, value)` pairs.
    pub fn with_row<I, K, V>(mut self, values: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let row_index = self.rows.len();
        let mut row: Parameters = self
            .headers
            .iter()
            .map(|header| (header.clone(), String::new()))
            .collect();
        for (header, value) in values {
            let header = header.into();
            match row.get_mut(&header) {
                Some(slot) => *slot = value.into(),
                None => {
                    return Err(ModelError::UnknownHeader {
                        row: row_index,
                        header,
                    });
                }
            }
        }
        self.rows.push(row);
        Ok(self)
    }

    /// Appends a row given positionally, in header order.
    pub fn with_values<I, V>(self, values: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() > self.headers.len() {
            return Err(ModelError::TooManyValues {
                row: self.rows.len(),
                expected: self.headers.len(),
                found: values.len(),
            });
        }
        let pairs: Vec<(String, String)> = self.headers.iter().cloned().zip(values).collect();
        self.with_row(pairs)
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_named_parameters(mut self, named_parameters: Parameters) -> Self {
        self.named_parameters = named_parameters;
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A table is empty when it has no rows, whatever its headers.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Parameters> {
        self.rows.get(index).map(|row| self.resolve_row(row))
    }

    pub fn rows(&self) -> Vec<Parameters> {
        self.rows.iter().map(|row| self.resolve_row(row)).collect()
    }

    pub fn properties(&self) -> &Parameters {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// The table-level `metaByRow` override, if present.
    pub fn meta_by_row(&self) -> Option<bool> {
        self.property(META_BY_ROW_PROPERTY)
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    pub fn as_text(&self) -> String {
        if self.headers.is_empty() {
            return String::new();
        }
        let mut text = format!("|{}|\n", self.headers.join("|"));
        for row in &self.rows {
            let cells: Vec<&str> = self
                .headers
                .iter()
                .map(|header| row.get(header).map(String::as_str).unwrap_or_default())
                .collect();
            text.push_str(&format!("|{}|\n", cells.join("|")));
        }
        text
    }

    fn resolve_row(&self, row: &Parameters) -> Parameters {
        if self.named_parameters.is_empty() {
            return row.clone();
        }
        row.iter()
            .map(|(header, value)| {
                (
                    header.clone(),
                    substitute_placeholders(value, &self.named_parameters),
                )
            })
            .collect()
    }
}
