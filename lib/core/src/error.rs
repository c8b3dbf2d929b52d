use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("empty index key computed for record {0}")]
    EmptyIndexKey(String),

    #[error("record {id}: expected {expected} fields, got {actual}")]
    FieldCount {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field position {position} out of range for record {id}")]
    FieldOutOfRange { position: usize, id: String },

    #[error("linkage requires two distinct index collections")]
    SameIndices,

    #[error("index collections differ: {left} vs {right} indexes")]
    StrategyMismatch { left: usize, right: usize },

    #[error("component {component} of the {class} centroid has no non-missing contributors")]
    DegenerateCentroid { class: String, component: usize },

    #[error("invalid rule verdict {value:?}, expected match, nonmatch or uncertain")]
    InvalidVerdict { value: String },

    #[error("rule failed for pair ({left}, {right}): {source}")]
    Rule {
        left: String,
        right: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
