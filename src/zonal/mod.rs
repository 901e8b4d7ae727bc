//! Per-site zonal statistics
//!
//! The extractor reduces every planned band of an image to twelve
//! statistics per site polygon, applying the product's sensor band limits,
//! missing-band policy and radiometric offset, and emits one wide row per
//! site and image.

mod extractor;
mod row;
mod stats;

pub use extractor::{BandPlan, MissingBandPolicy, PixelInclusion, SitePolygon, ZonalExtractor};
pub use row::{BandRecord, ZonalRow};
pub use stats::{ZoneStats, STAT_NAMES};
