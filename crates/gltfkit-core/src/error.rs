//! Error handling for glTF load and save operations
//!
//! Every failure surfaced by the engine carries one of the stable numeric
//! [`ErrorCode`] values, so callers across an FFI or logging boundary can
//! match on the code without parsing messages.

use std::collections::TryReserveError;
use std::fmt;
use std::io;

use thiserror::Error;

/// Stable error codes of the glTF error domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Fewer bytes were present than a declared length requires
    DataTooShort = 1,
    /// Container magic, version or chunk layout not recognized
    UnknownFormat = 2,
    /// Malformed JSON text
    InvalidJson = 3,
    /// Well-formed JSON that violates document invariants
    InvalidDocument = 4,
    /// Export options cannot be honored for this document
    InvalidOptions = 5,
    /// A referenced file does not exist
    FileNotFound = 6,
    /// Underlying storage access failed
    IoError = 7,
    /// Allocation failed
    OutOfMemory = 8,
    /// glTF 1.0 content
    LegacyFormatUnsupported = 9,
    /// Input was empty
    NoDataToLoad = 10,
    /// Load failed for a reason outside the other codes
    LoadFailed = 11,
    /// A required extension has no handler
    UnsupportedExtension = 12,
    /// The operation was cancelled by the caller
    Cancelled = 13,
}

impl ErrorCode {
    /// Returns the name of this error code as a string
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::DataTooShort => "DATA_TOO_SHORT",
            ErrorCode::UnknownFormat => "UNKNOWN_FORMAT",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::InvalidDocument => "INVALID_DOCUMENT",
            ErrorCode::InvalidOptions => "INVALID_OPTIONS",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::LegacyFormatUnsupported => "LEGACY_FORMAT_UNSUPPORTED",
            ErrorCode::NoDataToLoad => "NO_DATA_TO_LOAD",
            ErrorCode::LoadFailed => "LOAD_FAILED",
            ErrorCode::UnsupportedExtension => "UNSUPPORTED_EXTENSION",
            ErrorCode::Cancelled => "CANCELLED",
        }
    }

    /// Numeric value of the code.
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Framing errors come from malformed container headers, chunking or
    /// truncated input.
    pub const fn is_framing(self) -> bool {
        matches!(
            self,
            ErrorCode::DataTooShort
                | ErrorCode::UnknownFormat
                | ErrorCode::NoDataToLoad
                | ErrorCode::LegacyFormatUnsupported
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors produced while loading, decoding or saving a document.
#[derive(Error, Debug)]
pub enum GltfError {
    #[error("data too short: {0}")]
    DataTooShort(String),

    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("legacy glTF 1.0 content is not supported: {0}")]
    LegacyFormatUnsupported(String),

    #[error("no data to load")]
    NoDataToLoad,

    #[error("load failed: {0}")]
    LoadFailed(String),

    #[error("unsupported required extension: {0}")]
    UnsupportedExtension(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GltfError>;

impl GltfError {
    /// The stable code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            GltfError::DataTooShort(_) => ErrorCode::DataTooShort,
            GltfError::UnknownFormat(_) => ErrorCode::UnknownFormat,
            GltfError::InvalidJson(_) => ErrorCode::InvalidJson,
            GltfError::InvalidDocument(_) => ErrorCode::InvalidDocument,
            GltfError::InvalidOptions(_) => ErrorCode::InvalidOptions,
            GltfError::FileNotFound(_) => ErrorCode::FileNotFound,
            GltfError::Io(_) => ErrorCode::IoError,
            GltfError::OutOfMemory(_) => ErrorCode::OutOfMemory,
            GltfError::LegacyFormatUnsupported(_) => ErrorCode::LegacyFormatUnsupported,
            GltfError::NoDataToLoad => ErrorCode::NoDataToLoad,
            GltfError::LoadFailed(_) => ErrorCode::LoadFailed,
            GltfError::UnsupportedExtension(_) => ErrorCode::UnsupportedExtension,
            GltfError::Cancelled => ErrorCode::Cancelled,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        GltfError::InvalidDocument(msg.into())
    }

    pub fn too_short(msg: impl Into<String>) -> Self {
        GltfError::DataTooShort(msg.into())
    }

    /// Map a failure to open or read a file. A missing file gets its own code.
    pub fn from_file_io(err: io::Error, path: &std::path::Path) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            GltfError::FileNotFound(path.display().to_string())
        } else {
            GltfError::Io(err)
        }
    }
}

impl From<TryReserveError> for GltfError {
    fn from(err: TryReserveError) -> Self {
        GltfError::OutOfMemory(err.to_string())
    }
}

impl From<serde_json::Error> for GltfError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match err.classify() {
            Category::Syntax | Category::Eof => GltfError::InvalidJson(err.to_string()),
            Category::Data => GltfError::InvalidDocument(err.to_string()),
            Category::Io => GltfError::Io(io::Error::new(io::ErrorKind::Other, err)),
        }
    }
}

/// Allocate a zeroed byte vector, reporting allocation failure as an error.
pub fn try_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)?;
    bytes.resize(len, 0);
    Ok(bytes)
}
