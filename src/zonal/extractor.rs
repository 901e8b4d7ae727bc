//! Zonal Statistics Extractor

use geo::{BoundingRect, Intersects, MultiPolygon, Point as GeoPoint, Rect};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;

use super::row::{BandRecord, ZonalRow};
use super::stats::ZoneStats;
use crate::catalog::ImageAsset;
use crate::coordinate::BoundingBox;
use crate::errors::{PipelineError, PipelineResult};
use crate::products::ProductDefinition;
use crate::raster::Raster;

/// Which pixels count as inside a site polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelInclusion {
    /// Pixel centre inside (or on the boundary of) the polygon
    #[default]
    Strict,
    /// Any part of the pixel touches the polygon
    AllTouched,
}

/// What a band the sensor does not carry is reported as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingBandPolicy {
    /// Count 0 and every statistic set to a sentinel
    #[default]
    Fill,
    /// Band 1 statistics under the missing band's label
    ReuseFirst,
}

/// A site polygon in the raster's CRS
#[derive(Debug, Clone)]
pub struct SitePolygon {
    pub uid: i64,
    pub site: String,
    pub geometry: MultiPolygon<f64>,
}

/// Bands, labels and corrections extracted for one product
#[derive(Debug, Clone, PartialEq)]
pub struct BandPlan {
    pub bands: Vec<usize>,
    pub label: String,
    pub offset: f64,
    pub nodata: f64,
    sensor_limits: HashMap<String, usize>,
}

impl BandPlan {
    pub fn for_product(product: &ProductDefinition) -> Self {
        BandPlan {
            bands: product.bands.clone(),
            label: product.label().to_string(),
            offset: product.offset,
            nodata: product.nodata,
            sensor_limits: product.sensor_bands.clone(),
        }
    }

    /// Highest band `sensor` carries in a raster of `band_count` bands
    pub fn band_limit(&self, sensor: &str, band_count: usize) -> usize {
        self.sensor_limits.get(sensor).map_or(band_count, |limit| (*limit).min(band_count))
    }
}

/// Computes per-site statistics for every planned band of an image
#[derive(Debug, Clone)]
pub struct ZonalExtractor {
    plan: BandPlan,
    inclusion: PixelInclusion,
    missing: MissingBandPolicy,
    sentinel: f64,
}

impl ZonalExtractor {
    /// # Arguments
    /// * `plan` - Bands and corrections for the product
    /// * `inclusion` - Pixel inclusion rule
    /// * `missing` - Policy for bands beyond the sensor's stack
    /// * `sentinel` - Statistic value of filled bands; the plan's no-data when `None`
    pub fn new(plan: BandPlan, inclusion: PixelInclusion, missing: MissingBandPolicy, sentinel: Option<f64>) -> Self {
        let sentinel = sentinel.unwrap_or(plan.nodata);
        ZonalExtractor { plan, inclusion, missing, sentinel }
    }

    pub fn plan(&self) -> &BandPlan {
        &self.plan
    }

    /// Row-major indices of the pixels belonging to `geometry`
    fn site_pixels(&self, raster: &Raster, geometry: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let gt = &raster.geotransform;
        let region = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
            .to_pixel_region(gt, raster.width, raster.height);

        let mut pixels = Vec::new();
        for row in region.y..region.end_y() {
            for col in region.x..region.end_x() {
                let inside = match self.inclusion {
                    PixelInclusion::Strict => {
                        let (x, y) = gt.pixel_center(col as usize, row as usize);
                        geometry.intersects(&GeoPoint::new(x, y))
                    }
                    PixelInclusion::AllTouched => {
                        let x0 = gt.origin_x + col as f64 * gt.pixel_width;
                        let y0 = gt.origin_y + row as f64 * gt.pixel_height;
                        let cell = Rect::new(
                            (x0, y0),
                            (x0 + gt.pixel_width, y0 + gt.pixel_height),
                        );
                        geometry.intersects(&cell)
                    }
                };
                if inside {
                    pixels.push(row as usize * raster.width as usize + col as usize);
                }
            }
        }
        pixels
    }

    fn band_stats(&self, raster: &Raster, band: &[f32], pixels: &[usize]) -> ZoneStats {
        let values: Vec<f64> = pixels
            .iter()
            .map(|i| band[*i])
            .filter(|v| !v.is_nan() && !raster.is_nodata(*v) && *v as f64 != self.plan.nodata)
            .map(f64::from)
            .collect();
        ZoneStats::from_values(values).corrected(self.plan.offset)
    }

    /// One row per site for `image`, already read into `raster`
    pub fn extract(&self, image: &ImageAsset, raster: &Raster, sites: &[SitePolygon]) -> PipelineResult<Vec<ZonalRow>> {
        if raster.band_count() == 0 {
            return Err(PipelineError::MissingBand { path: image.path.clone(), band: 1 });
        }
        let limit = self.plan.band_limit(&image.sensor, raster.band_count());
        let file_name = image.file_name();
        let planned = self.plan.bands.iter().copied().max().unwrap_or(0);
        if raster.band_count() < planned && !self.plan.sensor_limits.contains_key(&image.sensor) {
            warn!("{} holds {} band(s), plan reaches band {}", file_name, raster.band_count(), planned);
        } else if limit < planned {
            debug!("{}: sensor '{}' stops at band {} ({:?})", file_name, image.sensor, limit, self.missing);
        }

        let mut rows = Vec::with_capacity(sites.len());
        for site in sites {
            let pixels = self.site_pixels(raster, &site.geometry);
            let mut records = Vec::with_capacity(self.plan.bands.len());
            for &band in &self.plan.bands {
                let source = if band <= limit {
                    Some(band)
                } else {
                    match self.missing {
                        MissingBandPolicy::ReuseFirst if limit >= 1 => Some(1),
                        _ => None,
                    }
                };
                let stats = match source.and_then(|b| raster.band(b)) {
                    Some(data) => self.band_stats(raster, data, &pixels),
                    None => ZoneStats::filled(self.sentinel),
                };
                records.push(BandRecord { band, stats });
            }
            rows.push(ZonalRow {
                uid: site.uid,
                site: site.site.clone(),
                image: file_name.clone(),
                start_date: image.start_date,
                end_date: image.end_date,
                label: self.plan.label.clone(),
                bands: records,
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::{CoordinateSystem, GeoTransform};
    use crate::products::TemporalKind;
    use crate::tiff::SampleType;
    use chrono::NaiveDate;
    use geo::polygon;

    fn image(sensor: &str) -> ImageAsset {
        let date = NaiveDate::from_ymd_opt(2019, 6, 12).unwrap();
        ImageAsset {
            path: format!("{}_p101r077_20190612_refm9.tif", sensor).into(),
            product: "ref".into(),
            temporal: TemporalKind::SingleDate,
            sensor: sensor.into(),
            tile: Some("101077".into()),
            year: 2019,
            start_month: 6,
            end_month: 6,
            start_date: date,
            end_date: date,
        }
    }

    /// 4x4 30 m grid with top-left at (0, 120); band b holds (pixel index + 1) * b + 100
    fn raster(bands: usize) -> Raster {
        let data: Vec<Vec<f32>> = (1..=bands)
            .map(|b| (0..16).map(|i| ((i + 1) * b + 100) as f32).collect())
            .collect();
        Raster::new(
            4, 4,
            GeoTransform::new(0.0, 30.0, 120.0, -30.0),
            CoordinateSystem::UTM(53, false),
            SampleType::I16,
            Some(32767.0),
            data,
        )
        .unwrap()
    }

    fn site(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> SitePolygon {
        SitePolygon {
            uid: 1,
            site: "alpha".into(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: min_x, y: min_y), (x: max_x, y: min_y), (x: max_x, y: max_y), (x: min_x, y: max_y), (x: min_x, y: min_y),
            ]]),
        }
    }

    fn plan(bands: Vec<usize>, offset: f64, limits: &[(&str, usize)]) -> BandPlan {
        BandPlan {
            bands,
            label: "ref".into(),
            offset,
            nodata: 32767.0,
            sensor_limits: limits.iter().map(|(s, l)| (s.to_string(), *l)).collect(),
        }
    }

    #[test]
    fn strict_uses_centres_and_all_touched_uses_cells() {
        let sites = [site(20.0, 50.0, 70.0, 100.0)];
        let strict = ZonalExtractor::new(plan(vec![1], 0.0, &[]), PixelInclusion::Strict, MissingBandPolicy::Fill, None);
        let rows = strict.extract(&image("l8olre"), &raster(1), &sites).unwrap();
        assert_eq!(rows[0].bands[0].stats.count, 1);
        // pixel (col 1, row 1) is index 5
        assert_eq!(rows[0].bands[0].stats.min, Some(106.0));

        let touched = ZonalExtractor::new(plan(vec![1], 0.0, &[]), PixelInclusion::AllTouched, MissingBandPolicy::Fill, None);
        let rows = touched.extract(&image("l8olre"), &raster(1), &sites).unwrap();
        assert_eq!(rows[0].bands[0].stats.count, 9);
    }

    #[test]
    fn nodata_pixels_are_ignored_and_offset_removed() {
        let mut r = raster(1);
        r.bands[0][5] = 32767.0;
        r.bands[0][6] = f32::NAN;
        let sites = [site(30.0, 30.0, 90.0, 90.0)];
        let extractor = ZonalExtractor::new(plan(vec![1], 100.0, &[]), PixelInclusion::Strict, MissingBandPolicy::Fill, None);
        let stats = extractor.extract(&image("l8olre"), &r, &sites).unwrap()[0].bands[0].stats;
        // indices 5, 6, 9, 10 inside; 9 and 10 remain
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, Some(10.0));
        assert_eq!(stats.max, Some(11.0));
        assert_eq!(stats.range, Some(1.0));
    }

    #[test]
    fn site_outside_raster_gives_empty_record() {
        let sites = [site(1000.0, 1000.0, 1100.0, 1100.0)];
        let extractor = ZonalExtractor::new(plan(vec![1], 100.0, &[]), PixelInclusion::Strict, MissingBandPolicy::Fill, None);
        let stats = extractor.extract(&image("l8olre"), &raster(1), &sites).unwrap()[0].bands[0].stats;
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, None);
    }

    #[test]
    fn short_sensor_bands_are_filled_by_default() {
        let sites = [site(30.0, 30.0, 90.0, 90.0)];
        let extractor = ZonalExtractor::new(
            plan(vec![1, 2, 3], 0.0, &[("l5tmre", 2)]),
            PixelInclusion::Strict,
            MissingBandPolicy::Fill,
            None,
        );
        let row = &extractor.extract(&image("l5tmre"), &raster(3), &sites).unwrap()[0];
        assert_eq!(row.band_numbers(), vec![1, 2, 3]);
        assert_eq!(row.bands[1].stats.count, 4);
        assert_eq!(row.bands[2].stats, ZoneStats::filled(32767.0));

        // Same raster from a sensor without a limit uses its real band 3
        let row = &extractor.extract(&image("l8olre"), &raster(3), &sites).unwrap()[0];
        assert_eq!(row.bands[2].stats.count, 4);
    }

    #[test]
    fn reuse_first_copies_band_one_statistics() {
        let sites = [site(30.0, 30.0, 90.0, 90.0)];
        let extractor = ZonalExtractor::new(
            plan(vec![1, 2, 3], 100.0, &[("l7tmre", 2)]),
            PixelInclusion::Strict,
            MissingBandPolicy::ReuseFirst,
            None,
        );
        let row = &extractor.extract(&image("l7tmre"), &raster(3), &sites).unwrap()[0];
        assert_eq!(row.bands[2].band, 3);
        assert_eq!(row.bands[2].stats, row.bands[0].stats);
        assert_ne!(row.bands[1].stats, row.bands[0].stats);
    }

    #[test]
    fn custom_sentinel_and_absent_bands() {
        let sites = [site(30.0, 30.0, 90.0, 90.0)];
        let extractor = ZonalExtractor::new(
            plan(vec![1, 2], 0.0, &[]),
            PixelInclusion::Strict,
            MissingBandPolicy::Fill,
            Some(-9999.0),
        );
        let row = &extractor.extract(&image("l8olre"), &raster(1), &sites).unwrap()[0];
        assert_eq!(row.bands[1].stats, ZoneStats::filled(-9999.0));
    }
}
