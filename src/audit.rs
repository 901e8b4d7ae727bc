//! Machine-readable audit lists
//!
//! Every list is a CSV with a fixed header, written even when empty so a
//! rerun can tell "nothing went wrong" from "step never ran".

use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::catalog::{FireScarAsset, ImageAsset};
use crate::errors::{AmbiguousSite, PipelineResult};
use crate::masking::UnmatchedReason;

pub const UNMATCHED_FILE: &str = "unmatched.csv";
pub const ALIGNMENT_FAILED_FILE: &str = "alignment_failed.csv";
pub const AMBIGUOUS_FILE: &str = "ambiguous.csv";
pub const FAILED_FILE: &str = "failed_scenes.csv";

/// A row type with a fixed CSV header
pub trait AuditRecord: Serialize {
    const HEADER: &'static [&'static str];
}

/// A scene with no usable fire-scar raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedScene {
    pub scene: String,
    pub year: i32,
    pub tile: String,
    pub reason: String,
}

impl UnmatchedScene {
    pub fn new(scene: &ImageAsset, reason: &UnmatchedReason) -> Self {
        UnmatchedScene {
            scene: scene.path.to_string_lossy().into_owned(),
            year: scene.year,
            tile: scene.tile.clone().unwrap_or_default(),
            reason: reason.code().to_string(),
        }
    }
}

impl AuditRecord for UnmatchedScene {
    const HEADER: &'static [&'static str] = &["scene", "year", "tile", "reason"];
}

/// A scene whose fire-scar raster could not be aligned, or that failed I/O
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedScene {
    pub scene: String,
    pub fire: String,
    pub message: String,
}

impl AuditRecord for FailedScene {
    const HEADER: &'static [&'static str] = &["scene", "fire", "message"];
}

/// A site resolving to several buffered tiles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousRow {
    pub uid: i64,
    pub site: String,
    /// Tiles joined with `;`
    pub tiles: String,
}

impl From<&AmbiguousSite> for AmbiguousRow {
    fn from(site: &AmbiguousSite) -> Self {
        AmbiguousRow { uid: site.uid, site: site.site.clone(), tiles: site.tiles.join(";") }
    }
}

impl AuditRecord for AmbiguousRow {
    const HEADER: &'static [&'static str] = &["uid", "site", "tiles"];
}

/// Pairing of a masked scene with its fire-scar raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootprintRow {
    pub scene: String,
    pub fire: String,
    pub year: i32,
    pub family: String,
    /// Kept aligned footprint; empty when not kept
    pub aligned: String,
}

impl FootprintRow {
    pub fn new(scene: &ImageAsset, fire: &FireScarAsset, aligned: Option<&Path>) -> Self {
        FootprintRow {
            scene: scene.path.to_string_lossy().into_owned(),
            fire: fire.path.to_string_lossy().into_owned(),
            year: fire.year,
            family: fire.family.to_string(),
            aligned: aligned.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
        }
    }
}

impl AuditRecord for FootprintRow {
    const HEADER: &'static [&'static str] = &["scene", "fire", "year", "family", "aligned"];
}

/// Scene count of one tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileStatus {
    pub tile: String,
    pub scenes: usize,
}

impl AuditRecord for TileStatus {
    const HEADER: &'static [&'static str] = &["tile", "scenes"];
}

/// Write `rows` under their header to `path`
///
/// # Returns
/// Number of rows written
pub fn write_records<T: AuditRecord>(rows: &[T], path: &Path) -> PipelineResult<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(T::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Write the ambiguous-assignment list
pub fn write_ambiguous(sites: &[AmbiguousSite], path: &Path) -> PipelineResult<usize> {
    let rows: Vec<AmbiguousRow> = sites.iter().map(AmbiguousRow::from).collect();
    write_records(&rows, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_still_carry_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join(UNMATCHED_FILE);
        assert_eq!(write_records::<UnmatchedScene>(&[], &path).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "scene,year,tile,reason\n");
    }

    #[test]
    fn ambiguous_sites_list_every_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AMBIGUOUS_FILE);
        let sites = vec![AmbiguousSite { site: "NTABRT0001".to_string(), uid: 7, tiles: vec!["104072".into(), "104073".into()] }];
        write_ambiguous(&sites, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "uid,site,tiles\n7,NTABRT0001,104072;104073\n");
    }
}
