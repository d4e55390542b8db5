use crate::cell::CellError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeaturizeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeaturizeError {
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),

    #[error("No knot sequence for pair ({0}, {1})")]
    MissingKnotData(String, String),

    #[error("Geometry {index} contains no atoms")]
    EmptyGeometry { index: usize },

    #[error("Duplicate {order}-body interaction {key}")]
    DuplicateInteraction { order: usize, key: String },

    #[error("Interaction degree must be 2 or 3, got {0}")]
    InvalidDegree(usize),

    #[error("Cutoff must be positive and finite, got {0}")]
    InvalidCutoff(f64),

    #[error("Geometry {index}: {source}")]
    Cell { index: usize, source: CellError },

    #[error("{0}")]
    ShapeMismatch(String),

    #[error("Batch holds {0} atoms, more than an i32 offset can address")]
    TooManyAtoms(usize),

    #[error("Inconsistent batch: {0}")]
    InconsistentBatch(String),
}
