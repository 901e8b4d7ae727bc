//! Raster alignment
//!
//! Resamples a source raster onto the grid, extent and CRS of a reference
//! raster. Band count, sample type and no-data value follow the source.

use log::{debug, info};

use super::Raster;
use crate::coordinate::{CoordinateTransformer, Point};
use crate::errors::{PipelineError, PipelineResult};

/// Strategy trait for the alignment service
pub trait RasterAligner: Send + Sync {
    /// Resample `source` onto `reference`'s grid
    fn align(&self, source: &Raster, reference: &Raster) -> PipelineResult<Raster>;
}

/// Nearest-neighbour aligner suited to categorical rasters
///
/// Reference pixels whose centre falls outside the source footprint are
/// set to the source no-data value (NaN when the source has none).
#[derive(Debug, Clone, Copy, Default)]
pub struct GridAligner {
    transformer: CoordinateTransformer,
}

impl GridAligner {
    pub fn new() -> Self {
        GridAligner { transformer: CoordinateTransformer }
    }

    /// Source pixel (col, row) under a point in source CRS coordinates
    fn source_pixel(source: &Raster, x: f64, y: f64) -> Option<(u32, u32)> {
        let (col, row) = source.geotransform.world_to_pixel(x, y);
        if col < 0.0 || row < 0.0 || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (col, row) = (col.floor() as u64, row.floor() as u64);
        (col < source.width as u64 && row < source.height as u64).then_some((col as u32, row as u32))
    }
}

impl RasterAligner for GridAligner {
    fn align(&self, source: &Raster, reference: &Raster) -> PipelineResult<Raster> {
        if source.same_grid(reference) {
            debug!("Source already on the reference grid");
            return Ok(source.clone());
        }
        if source.geotransform.pixel_width == 0.0 || source.geotransform.pixel_height == 0.0 {
            return Err(PipelineError::Alignment("source grid has a zero pixel size".to_string()));
        }

        let reprojecting = source.crs != reference.crs;
        info!(
            "Aligning {}x{} {} raster onto {}x{} {} grid",
            source.width, source.height, source.crs, reference.width, reference.height, reference.crs
        );

        let fill = source.nodata_sample();
        let mut out = Raster::filled(
            reference.width,
            reference.height,
            reference.geotransform,
            reference.crs,
            source.sample_type,
            source.nodata,
            source.band_count(),
            fill,
        );

        let width = reference.width as usize;
        for row in 0..reference.height as usize {
            for col in 0..width {
                let (x, y) = reference.geotransform.pixel_center(col, row);
                let (sx, sy) = if reprojecting {
                    let p = self
                        .transformer
                        .transform_point(&Point::new(x, y), &reference.crs, &source.crs)
                        .map_err(|e| PipelineError::Alignment(e.to_string()))?;
                    (p.x, p.y)
                } else {
                    (x, y)
                };
                if let Some((scol, srow)) = Self::source_pixel(source, sx, sy) {
                    for (band, target) in out.bands.iter_mut().enumerate() {
                        target[row * width + col] = source.value(band, scol, srow);
                    }
                }
            }
        }

        Ok(out)
    }
}
