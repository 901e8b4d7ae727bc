//! In-memory rasters and the raster I/O and alignment seams
//!
//! A [`Raster`] is a fully decoded, georeferenced multi-band grid. Reading
//! and writing go through the [`RasterStore`] trait and resampling onto
//! another grid through [`RasterAligner`], so callers can plug in a
//! different backend without touching the pipeline.

mod align;
mod region;
mod store;

pub use align::{GridAligner, RasterAligner};
pub use region::Region;
pub use store::{GeoTiffStore, RasterStore};

use crate::coordinate::{BoundingBox, CoordinateSystem, GeoTransform};
use crate::errors::{PipelineError, PipelineResult};
use crate::tiff::SampleType;

/// A decoded, georeferenced raster
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub geotransform: GeoTransform,
    pub crs: CoordinateSystem,
    /// Sample type used when the raster is written
    pub sample_type: SampleType,
    pub nodata: Option<f64>,
    /// Row-major samples, one vector per band
    pub bands: Vec<Vec<f32>>,
}

impl Raster {
    /// Creates a raster, checking every band against the dimensions
    pub fn new(
        width: u32,
        height: u32,
        geotransform: GeoTransform,
        crs: CoordinateSystem,
        sample_type: SampleType,
        nodata: Option<f64>,
        bands: Vec<Vec<f32>>,
    ) -> PipelineResult<Self> {
        let expected = width as usize * height as usize;
        if let Some(bad) = bands.iter().position(|b| b.len() != expected) {
            return Err(PipelineError::InvalidInput(format!(
                "band {} holds {} samples, expected {}x{}",
                bad + 1, bands[bad].len(), width, height
            )));
        }
        Ok(Raster { width, height, geotransform, crs, sample_type, nodata, bands })
    }

    /// A raster of `band_count` bands all set to `value`
    pub fn filled(
        width: u32,
        height: u32,
        geotransform: GeoTransform,
        crs: CoordinateSystem,
        sample_type: SampleType,
        nodata: Option<f64>,
        band_count: usize,
        value: f32,
    ) -> Self {
        let bands = vec![vec![value; width as usize * height as usize]; band_count];
        Raster { width, height, geotransform, crs, sample_type, nodata, bands }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band by 1-based index
    pub fn band(&self, index: usize) -> Option<&[f32]> {
        index.checked_sub(1).and_then(|i| self.bands.get(i)).map(Vec::as_slice)
    }

    /// Sample of band `band` (0-based) at (col, row)
    pub fn value(&self, band: usize, col: u32, row: u32) -> f32 {
        self.bands[band][row as usize * self.width as usize + col as usize]
    }

    /// Footprint in the raster's CRS
    pub fn bounds(&self) -> BoundingBox {
        self.geotransform.bounds(self.width, self.height)
    }

    /// Whether `value` is this raster's no-data value (NaN aware)
    pub fn is_nodata(&self, value: f32) -> bool {
        match self.nodata {
            Some(nd) if nd.is_nan() => value.is_nan(),
            Some(nd) => value as f64 == nd || value == nd as f32,
            None => false,
        }
    }

    /// No-data value as a sample, NaN when the raster declares none
    pub fn nodata_sample(&self) -> f32 {
        self.nodata.map(|v| v as f32).unwrap_or(f32::NAN)
    }

    /// Whether both rasters share dimensions, grid and CRS
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.crs == other.crs
            && self.geotransform.same_grid(&other.geotransform)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::utm_raster;
    use super::*;

    #[test]
    fn rejects_mismatched_bands() {
        let result = Raster::new(
            2, 2,
            GeoTransform::new(0.0, 1.0, 0.0, -1.0),
            CoordinateSystem::WGS84,
            SampleType::U8,
            None,
            vec![vec![0.0; 4], vec![0.0; 3]],
        );
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn band_lookup_is_one_based() {
        let r = utm_raster(2, 1, 0.0, 0.0, vec![1.0, 2.0], Some(-999.0));
        assert_eq!(r.band(1), Some(&[1.0f32, 2.0][..]));
        assert!(r.band(0).is_none());
        assert!(r.band(2).is_none());
        assert_eq!(r.value(0, 1, 0), 2.0);
    }

    #[test]
    fn nodata_comparison_handles_nan() {
        let mut r = utm_raster(1, 1, 0.0, 0.0, vec![0.0], Some(32767.0));
        assert!(r.is_nodata(32767.0));
        assert!(!r.is_nodata(0.0));
        r.nodata = Some(f64::NAN);
        assert!(r.is_nodata(f32::NAN));
        r.nodata = None;
        assert!(!r.is_nodata(0.0));
        assert!(r.nodata_sample().is_nan());
    }
}
