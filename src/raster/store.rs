//! Raster persistence

use log::{debug, warn};
use std::path::Path;

use super::Raster;
use crate::coordinate::{CoordinateSystem, CoordinateSystemFactory, GeoTransform};
use crate::errors::{PipelineError, PipelineResult};
use crate::tiff::{Compression, GeoTiffImage, ImageInfo, TiffReader, TiffWriter};

/// Strategy trait for reading and writing rasters
pub trait RasterStore: Send + Sync {
    /// Read every band of the raster at `path`
    fn read(&self, path: &Path) -> PipelineResult<Raster>;

    /// Write `raster` to `path`, replacing any existing file
    fn write(&self, raster: &Raster, path: &Path) -> PipelineResult<()>;
}

/// GeoTIFF-backed raster store
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffStore {
    compression: Compression,
}

impl GeoTiffStore {
    /// Store writing with the given strip compression
    pub fn new(compression: Compression) -> Self {
        GeoTiffStore { compression }
    }

    fn to_raster(image: GeoTiffImage, path: &Path) -> PipelineResult<Raster> {
        let info = image.info;
        let geotransform = match (info.tiepoint, info.pixel_scale) {
            (Some(tiepoint), Some(scale)) => GeoTransform::from_tiepoint(&tiepoint, &scale),
            _ => {
                return Err(PipelineError::InvalidInput(format!(
                    "{} carries no georeferencing",
                    path.display()
                )))
            }
        };
        let crs = match info.epsg {
            Some(code) => CoordinateSystemFactory::from_epsg(code),
            None => {
                warn!("{} declares no EPSG code", path.display());
                CoordinateSystem::Other(0)
            }
        };
        Raster::new(info.width, info.height, geotransform, crs, info.sample_type, info.nodata, image.bands)
    }

    fn to_image(raster: &Raster) -> GeoTiffImage {
        let (tiepoint, scale) = raster.geotransform.to_tiepoint();
        let epsg = match raster.crs {
            CoordinateSystem::Other(0) => None,
            crs => Some(crs.epsg_code()),
        };
        GeoTiffImage {
            info: ImageInfo {
                width: raster.width,
                height: raster.height,
                bands: raster.band_count(),
                sample_type: raster.sample_type,
                pixel_scale: Some(scale),
                tiepoint: Some(tiepoint),
                epsg,
                nodata: raster.nodata,
            },
            bands: raster.bands.clone(),
        }
    }
}

impl RasterStore for GeoTiffStore {
    fn read(&self, path: &Path) -> PipelineResult<Raster> {
        let image = TiffReader::new().load(path)?;
        let raster = Self::to_raster(image, path)?;
        debug!("{}: {}x{} x{} {}", path.display(), raster.width, raster.height, raster.band_count(), raster.crs);
        Ok(raster)
    }

    fn write(&self, raster: &Raster, path: &Path) -> PipelineResult<()> {
        TiffWriter::new(self.compression).write(&Self::to_image(raster), path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::test_support::utm_raster;

    #[test]
    fn write_then_read_preserves_grid_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.tif");
        let raster = utm_raster(3, 2, 600000.0, 7100000.0, vec![1.0, -2.0, 3.0, 4.0, 5.0, 32767.0], Some(32767.0));

        let store = GeoTiffStore::new(Compression::Zstd);
        store.write(&raster, &path).unwrap();
        let back = store.read(&path).unwrap();

        assert!(back.same_grid(&raster));
        assert_eq!(back.bands, raster.bands);
        assert_eq!(back.nodata, Some(32767.0));
        assert_eq!(back.crs, CoordinateSystem::UTM(53, false));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GeoTiffStore::default().read(&dir.path().join("absent.tif")).is_err());
    }
}
