//! Pipeline error types
//!
//! Every layer above the GeoTIFF codec reports failures through
//! [`PipelineError`]. Per-scene and per-tile failures are usually folded
//! into outcome values and audit rows by the caller; the variants that
//! escape a run are the data-integrity ones.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::tiff::errors::TiffError;

/// A site that overlapped more than one buffered tile
#[derive(Debug, Clone, PartialEq)]
pub struct AmbiguousSite {
    /// Site name from the site layer
    pub site: String,
    /// Unique numeric id of the site
    pub uid: i64,
    /// Every tile the site resolved to
    pub tiles: Vec<String>,
}

/// Errors raised by the correlation, masking and extraction engine
#[derive(Debug)]
pub enum PipelineError {
    /// I/O error
    IoError(io::Error),
    /// Error from the GeoTIFF codec
    Raster(TiffError),
    /// CSV serialisation failure
    Csv(csv::Error),
    /// JSON (GeoJSON) parse failure
    Json(serde_json::Error),
    /// Configuration file could not be parsed
    Config(toml::de::Error),
    /// Input that breaks a documented contract
    InvalidInput(String),
    /// A layer lacks a required attribute column
    MissingColumn { layer: String, column: String },
    /// One or more sites overlap several buffered tiles
    AmbiguousAssignment(Vec<AmbiguousSite>),
    /// The external alignment step could not resample the source
    Alignment(String),
    /// Geometry operation failed (e.g. buffering a non-convex tile)
    Geometry(String),
    /// Product code missing from the registry
    UnknownProduct(String),
    /// Calendar-window selector outside the closed set
    UnknownSelector(String),
    /// A raster band referenced by index does not exist
    MissingBand { path: PathBuf, band: usize },
    /// Run stopped by the caller's cancellation signal
    Cancelled,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::IoError(e) => write!(f, "I/O error: {}", e),
            PipelineError::Raster(e) => write!(f, "Raster error: {}", e),
            PipelineError::Csv(e) => write!(f, "CSV error: {}", e),
            PipelineError::Json(e) => write!(f, "JSON error: {}", e),
            PipelineError::Config(e) => write!(f, "Configuration error: {}", e),
            PipelineError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PipelineError::MissingColumn { layer, column } => {
                write!(f, "Layer '{}' has no '{}' attribute", layer, column)
            }
            PipelineError::AmbiguousAssignment(sites) => {
                let names: Vec<String> = sites
                    .iter()
                    .map(|s| format!("{} (uid {}) -> {}", s.site, s.uid, s.tiles.join("/")))
                    .collect();
                write!(
                    f,
                    "{} site(s) resolve to more than one buffered tile: {}",
                    sites.len(),
                    names.join(", ")
                )
            }
            PipelineError::Alignment(msg) => write!(f, "Alignment failed: {}", msg),
            PipelineError::Geometry(msg) => write!(f, "Geometry error: {}", msg),
            PipelineError::UnknownProduct(code) => write!(f, "Unknown product code: {}", code),
            PipelineError::UnknownSelector(code) => write!(f, "Unknown season selector: {}", code),
            PipelineError::MissingBand { path, band } => {
                write!(f, "Band {} not present in {}", band, path.display())
            }
            PipelineError::Cancelled => write!(f, "Run cancelled"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<io::Error> for PipelineError {
    fn from(error: io::Error) -> Self {
        PipelineError::IoError(error)
    }
}

impl From<TiffError> for PipelineError {
    fn from(error: TiffError) -> Self {
        PipelineError::Raster(error)
    }
}

impl From<csv::Error> for PipelineError {
    fn from(error: csv::Error) -> Self {
        PipelineError::Csv(error)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Json(error)
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(error: toml::de::Error) -> Self {
        PipelineError::Config(error)
    }
}

impl From<String> for PipelineError {
    fn from(msg: String) -> Self {
        PipelineError::InvalidInput(msg)
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
