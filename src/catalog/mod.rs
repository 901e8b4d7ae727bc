//! Asset Catalog Builder
//!
//! Turns a directory tree of product rasters and fire-scar rasters into
//! typed descriptors. Parsing rules live in [`AssetParser`] and are tested
//! independently of directory walking.

mod asset;
mod parser;
mod scanner;

pub use asset::{AssetDescriptor, FireFamily, FireScarAsset, ImageAsset};
pub use parser::{last_day_of_month, AssetParser};
pub use scanner::{read_asset_list, write_asset_list, Catalog, CatalogBuilder};
