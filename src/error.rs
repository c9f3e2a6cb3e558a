//! Error handling for Orapaint
//!
//! Every fallible operation returns [`Result`]. Errors fall into three kinds
//! (see [`ErrorKind`]): rejected input, I/O failures, and history/engine
//! consistency faults. A failed operation leaves document state untouched.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Orapaint operations
pub type Result<T> = std::result::Result<T, PaintError>;

/// Broad classification of a [`PaintError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was malformed; nothing happened.
    InvalidInput,
    /// Reading or writing a file (or encoding its content) failed.
    IoFailure,
    /// The undo log and the stroke engine disagree.
    ConsistencyFault,
}

/// Main error type for Orapaint operations
#[derive(Error, Debug)]
pub enum PaintError {
    // Input Errors
    #[error("Image is empty")]
    EmptyImage,

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid destination: {path} ({reason})")]
    InvalidDestination { path: PathBuf, reason: String },

    #[error("Fill seed ({x}, {y}) is outside the {width}x{height} canvas")]
    SeedOutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    #[error("Document has no layers")]
    NoLayers,

    #[error("Layer index {index} out of range (stack has {len} layers)")]
    LayerIndexOutOfRange { index: usize, len: usize },

    #[error("Layer '{name}' is {actual_width}x{actual_height}, canvas is {width}x{height}")]
    LayerSizeMismatch {
        name: String,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Invalid brush size: {size}")]
    InvalidBrushSize { size: f32 },

    #[error("Invalid paint script: {reason}")]
    InvalidScript { reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Codec Errors
    #[error("PNG encode failed: {reason}")]
    ImageEncode { reason: String },

    #[error("PNG decode failed: {reason}")]
    ImageDecode { reason: String },

    #[error("Malformed archive: {reason}")]
    ArchiveFormat { reason: String },

    #[error("Malformed stack.xml: {reason}")]
    ManifestFormat { reason: String },

    // History Errors
    #[error("History out of sync with layer content: {reason}")]
    ConsistencyFault { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaintError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PaintError::EmptyImage => "EMPTY_IMAGE",
            PaintError::InvalidDimensions { .. } => "INVALID_DIMENSIONS",
            PaintError::InvalidDestination { .. } => "INVALID_DESTINATION",
            PaintError::SeedOutOfBounds { .. } => "SEED_OUT_OF_BOUNDS",
            PaintError::NoLayers => "NO_LAYERS",
            PaintError::LayerIndexOutOfRange { .. } => "LAYER_INDEX_OUT_OF_RANGE",
            PaintError::LayerSizeMismatch { .. } => "LAYER_SIZE_MISMATCH",
            PaintError::InvalidBrushSize { .. } => "INVALID_BRUSH_SIZE",
            PaintError::InvalidScript { .. } => "INVALID_SCRIPT",
            PaintError::FileNotFound { .. } => "FILE_NOT_FOUND",
            PaintError::FileReadError { .. } => "FILE_READ_ERROR",
            PaintError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            PaintError::DirectoryCreateError { .. } => "DIRECTORY_CREATE_ERROR",
            PaintError::ImageEncode { .. } => "IMAGE_ENCODE",
            PaintError::ImageDecode { .. } => "IMAGE_DECODE",
            PaintError::ArchiveFormat { .. } => "ARCHIVE_FORMAT",
            PaintError::ManifestFormat { .. } => "MANIFEST_FORMAT",
            PaintError::ConsistencyFault { .. } => "CONSISTENCY_FAULT",
            PaintError::Io(_) => "IO_ERROR",
            PaintError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaintError::EmptyImage
            | PaintError::InvalidDimensions { .. }
            | PaintError::InvalidDestination { .. }
            | PaintError::SeedOutOfBounds { .. }
            | PaintError::NoLayers
            | PaintError::LayerIndexOutOfRange { .. }
            | PaintError::LayerSizeMismatch { .. }
            | PaintError::InvalidBrushSize { .. }
            | PaintError::InvalidScript { .. } => ErrorKind::InvalidInput,
            PaintError::ConsistencyFault { .. } => ErrorKind::ConsistencyFault,
            _ => ErrorKind::IoFailure,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Nothing is retried automatically; a recoverable error means the user
    /// can fix the request and try again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::ConsistencyFault)
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PaintError::InvalidDestination { .. } => vec![
                "Save to a path ending in .ora",
                "Check the destination directory is writable",
            ],
            PaintError::SeedOutOfBounds { .. } => {
                vec!["Click inside the canvas to fill a region"]
            }
            PaintError::NoLayers => vec!["Add at least one layer before saving"],
            PaintError::LayerSizeMismatch { .. } => vec![
                "Flatten every layer at the canvas size before saving",
            ],
            PaintError::InvalidScript { .. } => vec![
                "Colors are written as #rrggbb or #rrggbbaa",
                "Every stroke and erase needs at least one point",
            ],
            PaintError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            PaintError::FileWriteError { .. } | PaintError::DirectoryCreateError { .. } => vec![
                "Free up disk space",
                "Save to a different location",
            ],
            PaintError::ArchiveFormat { .. } | PaintError::ManifestFormat { .. } => vec![
                "The file may be corrupted - try re-exporting from source",
                "Open the file in another OpenRaster editor and save it again",
            ],
            PaintError::ConsistencyFault { .. } => vec![
                "Save your work to a new file",
                "Clear the layer to reset its history",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PaintError::FileNotFound {
            path: PathBuf::from("missing.ora"),
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn test_kinds() {
        let err = PaintError::SeedOutOfBounds {
            x: -1,
            y: 4,
            width: 10,
            height: 10,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.is_recoverable());

        let fault = PaintError::ConsistencyFault {
            reason: "no stroke to remove".to_string(),
        };
        assert_eq!(fault.kind(), ErrorKind::ConsistencyFault);
        assert!(!fault.is_recoverable());
        assert!(!fault.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: PaintError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
