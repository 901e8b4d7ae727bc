//! Directory scanning and asset-list files

use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::asset::{file_name, AssetDescriptor, FireScarAsset, ImageAsset};
use super::parser::AssetParser;
use crate::errors::{PipelineError, PipelineResult};

/// Product rasters and fire scars found for one run
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub images: Vec<ImageAsset>,
    pub fire_scars: Vec<FireScarAsset>,
}

/// Asset Catalog Builder
///
/// Walks a directory tree and parses every file whose name ends with one
/// of the requested suffixes. Walk order is sorted by file name so the
/// same tree always yields the same catalog.
pub struct CatalogBuilder {
    parser: AssetParser,
}

impl CatalogBuilder {
    pub fn new(parser: AssetParser) -> Self {
        CatalogBuilder { parser }
    }

    pub fn parser(&self) -> &AssetParser {
        &self.parser
    }

    /// Parse every file under `root` ending with one of `suffixes`
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn scan(&self, root: &Path, suffixes: &[&str]) -> PipelineResult<Vec<AssetDescriptor>> {
        if !root.is_dir() {
            return Err(PipelineError::InvalidInput(format!("{} is not a directory", root.display())));
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = file_name(entry.path());
            if !suffixes.iter().any(|s| name.ends_with(s)) {
                continue;
            }
            match self.parser.parse(entry.path()) {
                Ok(descriptor) => {
                    debug!("Catalogued {}", entry.path().display());
                    found.push(descriptor);
                }
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }
        Ok(found)
    }

    /// Scan product rasters under `scene_root` and fire scars under `fire_root`
    pub fn build(
        &self,
        scene_root: &Path,
        scene_suffix: &str,
        fire_root: Option<(&Path, [&str; 2])>,
    ) -> PipelineResult<Catalog> {
        let mut catalog = Catalog::default();
        for descriptor in self.scan(scene_root, &[scene_suffix])? {
            match descriptor {
                AssetDescriptor::FireScar(fire) => catalog.fire_scars.push(fire),
                other => catalog.images.extend(other.into_image()),
            }
        }
        if let Some((root, suffixes)) = fire_root {
            let fires = self.scan(root, &suffixes)?;
            catalog.fire_scars.extend(fires.into_iter().filter_map(AssetDescriptor::into_fire_scar));
        }
        info!(
            "Catalogued {} image(s) and {} fire scar raster(s)",
            catalog.images.len(),
            catalog.fire_scars.len()
        );
        Ok(catalog)
    }
}

/// Writes one path per line, without a header
pub fn write_asset_list<'a, I>(paths: I, out: &Path) -> PipelineResult<()>
where
    I: IntoIterator<Item = &'a Path>,
{
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(out)?;
    let mut count = 0usize;
    for path in paths {
        writer.write_record([path.to_string_lossy().as_ref()])?;
        count += 1;
    }
    writer.flush()?;
    info!("Wrote {} path(s) to {}", count, out.display());
    Ok(())
}

/// Reads a list written by [`write_asset_list`]
pub fn read_asset_list(path: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut paths = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(p) = record.get(0).map(str::trim).filter(|p| !p.is_empty()) {
            paths.push(PathBuf::from(p));
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FireFamily;
    use crate::products::ProductRegistry;

    fn builder() -> CatalogBuilder {
        let product = ProductRegistry::builtin().get("dbg").unwrap();
        CatalogBuilder::new(AssetParser::new(product, "dkaa2.tif", "dkna2.tif"))
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn scans_scenes_and_fire_scars() {
        let dir = tempfile::tempdir().unwrap();
        let scenes = dir.path().join("scenes");
        let fire = dir.path().join("fire");
        touch(&scenes, "101077/2019/l8olre_p101r077_20190612_dbgm3_zstdmask.tif");
        touch(&scenes, "101077/2018/l8olre_p101r077_20180101_dbgm3_zstdmask.tif");
        touch(&scenes, "101077/l8olre_p101r077_nodate_dbgm3_zstdmask.tif");
        touch(&scenes, "101077/l8olre_p101r077_20190612_dbgm3.tif");
        touch(&fire, "nt_p101r077_2016_dkaa2.tif");
        touch(&fire, "nt_p101r077_2019_dkna2.tif");
        touch(&fire, "readme.txt");

        let catalog = builder()
            .build(&scenes, "_zstdmask.tif", Some((&fire, ["dkaa2.tif", "dkna2.tif"])))
            .unwrap();

        let years: Vec<i32> = catalog.images.iter().map(|a| a.year).collect();
        assert_eq!(years, vec![2018, 2019]);
        let families: Vec<FireFamily> = catalog.fire_scars.iter().map(|f| f.family).collect();
        assert_eq!(families, vec![FireFamily::Archival, FireFamily::NearRealTime]);
    }

    #[test]
    fn scanning_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_p101r077_20190101_x.tif", "a_p101r077_20190102_x.tif", "c_p101r077_20190103_x.tif"] {
            touch(dir.path(), name);
        }
        let first = builder().scan(dir.path(), &["_x.tif"]).unwrap();
        let second = builder().scan(dir.path(), &["_x.tif"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(builder().scan(&dir.path().join("absent"), &[".tif"]).is_err());
    }

    #[test]
    fn asset_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("lists/dbg_image_list.csv");
        let paths = vec![PathBuf::from("/a/one.tif"), PathBuf::from("/b/two, three.tif")];
        write_asset_list(paths.iter().map(PathBuf::as_path), &out).unwrap();
        assert_eq!(read_asset_list(&out).unwrap(), paths);
    }
}
