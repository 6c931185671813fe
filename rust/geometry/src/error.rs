use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("empty vertex cloud")]
    EmptyGeometry,

    #[error("eigen decomposition did not converge")]
    EigenFailure,

    #[error("degenerate face: {0}")]
    DegenerateFace(String),
}
