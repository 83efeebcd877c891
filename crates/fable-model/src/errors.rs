use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("duplicate examples table header '{0}'")]
    DuplicateHeader(String),
    #[error("examples row {row} has a value for unknown header '{header}'")]
    UnknownHeader { row: usize, header: String },
    #[error("examples row {row} has {found} value(s) but the table has {expected} header(s)")]
    TooManyValues {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("given story '{path}' references examples row {index} but the table has {rows} row(s)")]
    MissingExamplesRow {
        path: String,
        index: usize,
        rows: usize,
    },
    #[error("given story '{given_story}' has an invalid anchor: {reason}")]
    InvalidAnchor { given_story: String, reason: String },
}
