//! Tile Sufficiency Gate
//!
//! A tile goes on to zonal extraction only when it holds at least the
//! minimum number of scenes. Both outcomes are audit records, never errors.

use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::audit::{write_records, TileStatus};
use crate::catalog::{write_asset_list, ImageAsset};
use crate::errors::PipelineResult;
use crate::workspace::WorkspaceContext;

/// Group key for assets whose names carry no tile
pub const UNTILED: &str = "all";

/// Ready and insufficient tiles, each sorted by tile id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateResult {
    pub ready: Vec<TileStatus>,
    pub insufficient: Vec<TileStatus>,
}

impl GateResult {
    pub fn is_ready(&self, tile: &str) -> bool {
        self.ready.iter().any(|t| t.tile == tile)
    }
}

/// Group images by tile, with untiled assets under [`UNTILED`]
pub fn group_by_tile(images: &[ImageAsset]) -> BTreeMap<String, Vec<ImageAsset>> {
    let mut groups: BTreeMap<String, Vec<ImageAsset>> = BTreeMap::new();
    for image in images {
        let key = image.tile.clone().unwrap_or_else(|| UNTILED.to_string());
        groups.entry(key).or_default().push(image.clone());
    }
    groups
}

/// Split tiles by scene count
///
/// # Arguments
/// * `tile_lists` - Scenes per tile
/// * `minimum` - Smallest scene count that qualifies a tile
pub fn gate(tile_lists: &BTreeMap<String, Vec<ImageAsset>>, minimum: usize) -> GateResult {
    let mut result = GateResult::default();
    for (tile, scenes) in tile_lists {
        let status = TileStatus { tile: tile.clone(), scenes: scenes.len() };
        if scenes.len() >= minimum {
            result.ready.push(status);
        } else {
            warn!("Tile {} has {} scene(s), below the minimum of {}", tile, scenes.len(), minimum);
            result.insufficient.push(status);
        }
    }
    info!("{} tile(s) ready, {} insufficient", result.ready.len(), result.insufficient.len());
    result
}

/// Write the per-tile scene lists and the ready/insufficient lists
///
/// Layout under the export directory:
/// `<product>_for_processing/<tile>_<product>_tile_list.csv`,
/// `<product>_tiles_ready.csv` and `<product>_tiles_insufficient.csv`.
pub fn persist(
    result: &GateResult,
    tile_lists: &BTreeMap<String, Vec<ImageAsset>>,
    product: &str,
    workspace: &WorkspaceContext,
) -> PipelineResult<Vec<PathBuf>> {
    let list_dir = workspace.export_subdir(&format!("{}_for_processing", product))?;
    let mut written = Vec::new();
    for (tile, scenes) in tile_lists {
        let path = list_dir.join(format!("{}_{}_tile_list.csv", tile, product));
        write_asset_list(scenes.iter().map(|s| s.path.as_path()), &path)?;
        written.push(path);
    }

    let ready = workspace.export_path(&format!("{}_tiles_ready.csv", product));
    write_records(&result.ready, &ready)?;
    let insufficient = workspace.export_path(&format!("{}_tiles_insufficient.csv", product));
    write_records(&result.insufficient, &insufficient)?;
    written.push(ready);
    written.push(insufficient);
    Ok(written)
}
