pub mod io;
pub mod tiff;
pub mod coordinate;
pub mod raster;
pub mod vector;
pub mod errors;
pub mod products;
pub mod config;
pub mod catalog;
pub mod tiles;
pub mod masking;
pub mod gate;
pub mod zonal;
pub mod aggregate;
pub mod audit;
pub mod workspace;
pub mod pipeline;
pub mod utils;
pub mod commands;
pub mod api;

pub use crate::api::FirescarZonal;

pub use config::PipelineConfig;
pub use errors::{PipelineError, PipelineResult};
pub use catalog::{Catalog, FireScarAsset, ImageAsset};
pub use masking::{MaskOutcome, SeasonSelector, WindowPolicy};
pub use pipeline::{CancellationToken, RunReport};
pub use raster::{GeoTiffStore, GridAligner, Raster, RasterAligner, RasterStore};
pub use zonal::{ZonalRow, ZoneStats};
