//! Error types for the GeoTIFF codec

use std::fmt;
use std::io;

/// Errors raised while reading or writing GeoTIFF rasters
#[derive(Debug)]
pub enum TiffError {
    /// I/O error
    IoError(io::Error),
    /// File does not start with a TIFF header
    InvalidHeader,
    /// Invalid byte order marker
    InvalidByteOrder(u16),
    /// Version field is neither classic TIFF nor BigTIFF
    UnsupportedVersion(u16),
    /// BigTIFF files are recognised but not decoded
    BigTiffNotSupported,
    /// A required tag is missing from the first IFD
    TagNotFound(u16),
    /// Field type that the codec cannot interpret
    UnsupportedFieldType(u16),
    /// Compression code without a handler
    UnsupportedCompression(u64),
    /// (sample format, bits per sample) combination that cannot be mapped
    UnsupportedSampleType(u16, u16),
    /// Tiled layouts are not decoded
    TiledLayoutNotSupported,
    /// Decoded strip length does not match the expected byte count
    StripSizeMismatch { strip: usize, expected: usize, actual: usize },
    /// Image dimensions not found
    MissingDimensions,
    /// Generic error with message
    GenericError(String),
}

impl fmt::Display for TiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffError::IoError(e) => write!(f, "I/O error: {}", e),
            TiffError::InvalidHeader => write!(f, "Invalid TIFF header"),
            TiffError::InvalidByteOrder(v) => write!(f, "Invalid byte order marker: {:#06x}", v),
            TiffError::UnsupportedVersion(v) => write!(f, "Unsupported TIFF version: {}", v),
            TiffError::BigTiffNotSupported => write!(f, "BigTIFF rasters are not supported"),
            TiffError::TagNotFound(tag) => write!(f, "Tag not found: {}", tag),
            TiffError::UnsupportedFieldType(ft) => write!(f, "Unsupported field type: {}", ft),
            TiffError::UnsupportedCompression(c) => write!(f, "Unsupported compression method: {}", c),
            TiffError::UnsupportedSampleType(format, bits) => {
                write!(f, "Unsupported sample type: format {} with {} bits", format, bits)
            }
            TiffError::TiledLayoutNotSupported => write!(f, "Tiled TIFF layouts are not supported"),
            TiffError::StripSizeMismatch { strip, expected, actual } => write!(
                f,
                "Strip {} decoded to {} bytes, expected {}",
                strip, actual, expected
            ),
            TiffError::MissingDimensions => write!(f, "Image dimensions not found"),
            TiffError::GenericError(msg) => write!(f, "TIFF error: {}", msg),
        }
    }
}

impl std::error::Error for TiffError {}

impl From<io::Error> for TiffError {
    fn from(error: io::Error) -> Self {
        TiffError::IoError(error)
    }
}

impl From<String> for TiffError {
    fn from(msg: String) -> Self {
        TiffError::GenericError(msg)
    }
}

/// Result type for codec operations
pub type TiffResult<T> = Result<T, TiffError>;
