use thiserror::Error;

/// Result type for spatial-index operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying the spatial index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("geometry lies outside the world bounding box")]
    OutsideWorld,

    #[error("octree depth {0} exceeds the supported maximum")]
    DepthTooDeep(u8),

    #[error("cell coordinate {0} out of range for depth {1}")]
    CoordOutOfRange(u32, u8),

    #[error("invalid packed cell id {0:#x}")]
    InvalidCellId(u64),

    #[error("world bounding box is not finite")]
    InvalidWorld,
}
