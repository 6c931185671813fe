use thiserror::Error;

use crate::pipeline::RunReport;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while processing elements.
///
/// The pipeline splits these into two classes: recoverable errors are logged
/// into the run report and the offending face/element/record is skipped;
/// everything else aborts the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("geometry error: {0}")]
    Geometry(#[from] shellform_geometry::Error),

    #[error("spatial index error: {0}")]
    Index(#[from] shellform_index::Error),

    #[error("record rejected by store: {0}")]
    WriteRejected(String),

    #[error("persistence failure: {0}")]
    StoreFatal(String),

    #[error("worker pool failure: {0}")]
    Pool(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the pipeline may skip the offending unit of work and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Geometry(_) | Error::Index(_) | Error::WriteRejected(_)
        )
    }
}

/// A fatal abort, carrying the recoverable issues accumulated before it.
#[derive(Error, Debug)]
#[error("{cause}")]
pub struct RunFailure {
    pub cause: Error,
    pub report: RunReport,
}
