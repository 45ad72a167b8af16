//! Error taxonomy for the annotation engine

/// Errors surfaced by geometry, storage, and session operations
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    /// Malformed input to a geometry function (caller bug)
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The id is not among the records of the loaded image
    #[error("Unknown record: {0}")]
    UnknownRecord(i64),

    /// A mutation needs an active record but none is selected
    #[error("No active selection")]
    NoActiveSelection,

    /// The session has no image view loaded
    #[error("No image loaded")]
    NoImageLoaded,

    /// The label database failed to read or write
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] rusqlite::Error),

    /// The image provider could not read native dimensions
    #[error("Image unavailable: {0}")]
    ImageUnavailable(#[from] image::ImageError),

    /// Reading the image directory or a config file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
