//! Asset descriptors produced by the catalog

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::products::TemporalKind;

/// Provenance family of an annual fire-scar raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FireFamily {
    Archival,
    NearRealTime,
}

impl fmt::Display for FireFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FireFamily::Archival => write!(f, "archival"),
            FireFamily::NearRealTime => write!(f, "near-real-time"),
        }
    }
}

/// A dated or date-ranged product raster
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub product: String,
    pub temporal: TemporalKind,
    /// Sensor family token (e.g. `l8olre`); empty for gridded products
    pub sensor: String,
    /// Path/row tile id (`101077`) when the name carries one
    pub tile: Option<String>,
    pub year: i32,
    pub start_month: u8,
    pub end_month: u8,
    /// Acquisition date, or first day of the first month
    pub start_date: NaiveDate,
    /// Acquisition date, or last day of the last month
    pub end_date: NaiveDate,
}

impl ImageAsset {
    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }
}

/// An annual fire-scar raster of month codes
#[derive(Debug, Clone, PartialEq)]
pub struct FireScarAsset {
    pub path: PathBuf,
    pub family: FireFamily,
    pub year: i32,
    /// Path/row tile id; `None` for region-wide products
    pub tile: Option<String>,
}

impl FireScarAsset {
    /// Whether this raster can cover a scene on `tile`
    pub fn covers_tile(&self, tile: Option<&str>) -> bool {
        match (&self.tile, tile) {
            (None, _) => true,
            (Some(own), Some(other)) => own == other,
            (Some(_), None) => false,
        }
    }
}

/// A parsed catalog entry, tagged by product family
#[derive(Debug, Clone, PartialEq)]
pub enum AssetDescriptor {
    /// Single-date scene
    Scene(ImageAsset),
    /// Seasonal composite
    Composite(ImageAsset),
    /// Monthly grid
    Monthly(ImageAsset),
    FireScar(FireScarAsset),
}

impl AssetDescriptor {
    pub fn path(&self) -> &Path {
        match self {
            AssetDescriptor::Scene(a) | AssetDescriptor::Composite(a) | AssetDescriptor::Monthly(a) => &a.path,
            AssetDescriptor::FireScar(f) => &f.path,
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            AssetDescriptor::Scene(a) | AssetDescriptor::Composite(a) | AssetDescriptor::Monthly(a) => a.year,
            AssetDescriptor::FireScar(f) => f.year,
        }
    }

    /// The image asset, unless this is a fire-scar entry
    pub fn into_image(self) -> Option<ImageAsset> {
        match self {
            AssetDescriptor::Scene(a) | AssetDescriptor::Composite(a) | AssetDescriptor::Monthly(a) => Some(a),
            AssetDescriptor::FireScar(_) => None,
        }
    }

    pub fn into_fire_scar(self) -> Option<FireScarAsset> {
        match self {
            AssetDescriptor::FireScar(f) => Some(f),
            _ => None,
        }
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
