//! File-name parsing
//!
//! Names are split on `_` and the date-bearing token is located by shape:
//! `YYYYMMDD` for single-date scenes, `mYYYYMMYYYYMM` for seasonal
//! composites and a leading `YYYYMM` for monthly grids. Fire-scar rasters
//! carry their year as the third token (`<sensor>_<region>_<YYYY>_...`).

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::asset::{file_name, AssetDescriptor, FireFamily, FireScarAsset, ImageAsset};
use crate::errors::{PipelineError, PipelineResult};
use crate::products::{ProductDefinition, TemporalKind};

lazy_static! {
    static ref DATE_TOKEN: Regex = Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap();
    static ref COMPOSITE_TOKEN: Regex = Regex::new(r"^m(\d{4})(\d{2})(\d{4})(\d{2})$").unwrap();
    static ref MONTH_PREFIX: Regex = Regex::new(r"^(\d{4})(\d{2})(?:\D|$)").unwrap();
    static ref TILE_TOKEN: Regex = Regex::new(r"^p(\d{3})r(\d{3})$").unwrap();
    static ref YEAR_TOKEN: Regex = Regex::new(r"^\d{4}$").unwrap();
}

/// Last calendar day of `month` in `year`
pub fn last_day_of_month(year: i32, month: u8) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month as u32 + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Tile id (`PPPRRR`) from a `pPPPrRRR` token
fn tile_from_tokens(tokens: &[&str]) -> Option<String> {
    tokens.iter().find_map(|t| TILE_TOKEN.captures(t).map(|c| format!("{}{}", &c[1], &c[2])))
}

fn invalid(name: &str, reason: &str) -> PipelineError {
    PipelineError::InvalidInput(format!("{}: {}", name, reason))
}

/// Parses file names into [`AssetDescriptor`]s for one product
#[derive(Debug, Clone)]
pub struct AssetParser {
    product: String,
    temporal: TemporalKind,
    archival_suffix: String,
    near_real_time_suffix: String,
}

impl AssetParser {
    /// # Arguments
    /// * `product` - Product whose scenes are being catalogued
    /// * `archival_suffix` - File-name ending of archival fire scars
    /// * `near_real_time_suffix` - File-name ending of near-real-time fire scars
    pub fn new(product: &ProductDefinition, archival_suffix: &str, near_real_time_suffix: &str) -> Self {
        AssetParser {
            product: product.code.clone(),
            temporal: product.temporal,
            archival_suffix: archival_suffix.to_string(),
            near_real_time_suffix: near_real_time_suffix.to_string(),
        }
    }

    /// Fire-scar family implied by a file name, if any
    pub fn fire_family(&self, name: &str) -> Option<FireFamily> {
        if name.ends_with(&self.archival_suffix) {
            Some(FireFamily::Archival)
        } else if name.ends_with(&self.near_real_time_suffix) {
            Some(FireFamily::NearRealTime)
        } else {
            None
        }
    }

    /// Parse any catalogued file
    ///
    /// Fire-scar suffixes take precedence; everything else is parsed as a
    /// product raster of the configured temporal kind.
    pub fn parse(&self, path: &Path) -> PipelineResult<AssetDescriptor> {
        let name = file_name(path);
        match self.fire_family(&name) {
            Some(family) => self.parse_fire_scar(path, family).map(AssetDescriptor::FireScar),
            None => {
                let asset = self.parse_image(path)?;
                Ok(match self.temporal {
                    TemporalKind::SingleDate => AssetDescriptor::Scene(asset),
                    TemporalKind::Seasonal => AssetDescriptor::Composite(asset),
                    TemporalKind::Monthly => AssetDescriptor::Monthly(asset),
                })
            }
        }
    }

    /// Parse an annual fire-scar file name
    pub fn parse_fire_scar(&self, path: &Path, family: FireFamily) -> PipelineResult<FireScarAsset> {
        let name = file_name(path);
        let stem = name.split('.').next().unwrap_or_default();
        let tokens: Vec<&str> = stem.split('_').collect();
        let year_token = tokens
            .get(2)
            .filter(|t| YEAR_TOKEN.is_match(t))
            .or_else(|| tokens.iter().find(|t| YEAR_TOKEN.is_match(t)))
            .ok_or_else(|| invalid(&name, "no 4-digit year token"))?;
        let year = year_token.parse::<i32>().map_err(|_| invalid(&name, "unreadable year"))?;

        Ok(FireScarAsset { path: path.to_path_buf(), family, year, tile: tile_from_tokens(&tokens) })
    }

    /// Parse a product raster file name
    pub fn parse_image(&self, path: &Path) -> PipelineResult<ImageAsset> {
        let name = file_name(path);
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let tokens: Vec<&str> = stem.split('_').collect();

        let (year, start_month, start_date, end_month, end_date) = match self.temporal {
            TemporalKind::SingleDate => {
                let caps = tokens
                    .iter()
                    .find_map(|t| DATE_TOKEN.captures(t))
                    .ok_or_else(|| invalid(&name, "no YYYYMMDD date token"))?;
                let (y, m, d) = (caps[1].parse::<i32>(), caps[2].parse::<u32>(), caps[3].parse::<u32>());
                let date = match (y, m, d) {
                    (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
                    _ => None,
                }
                .ok_or_else(|| invalid(&name, "date token is not a calendar date"))?;
                let month = date.month() as u8;
                (date.year(), month, date, month, date)
            }
            TemporalKind::Seasonal => {
                let caps = tokens
                    .iter()
                    .find_map(|t| COMPOSITE_TOKEN.captures(t))
                    .ok_or_else(|| invalid(&name, "no mYYYYMMYYYYMM season token"))?;
                let year: i32 = caps[1].parse().map_err(|_| invalid(&name, "unreadable year"))?;
                let start_month: u8 = caps[2].parse().map_err(|_| invalid(&name, "unreadable month"))?;
                let end_year: i32 = caps[3].parse().map_err(|_| invalid(&name, "unreadable year"))?;
                let end_month: u8 = caps[4].parse().map_err(|_| invalid(&name, "unreadable month"))?;
                let start = NaiveDate::from_ymd_opt(year, start_month as u32, 1)
                    .ok_or_else(|| invalid(&name, "start month out of range"))?;
                let end = last_day_of_month(end_year, end_month)
                    .filter(|_| (1..=12).contains(&end_month))
                    .ok_or_else(|| invalid(&name, "end month out of range"))?;
                if end < start {
                    return Err(invalid(&name, "season ends before it starts"));
                }
                (year, start_month, start, end_month, end)
            }
            TemporalKind::Monthly => {
                let caps = MONTH_PREFIX
                    .captures(&name)
                    .ok_or_else(|| invalid(&name, "no leading YYYYMM token"))?;
                let year: i32 = caps[1].parse().map_err(|_| invalid(&name, "unreadable year"))?;
                let month: u8 = caps[2].parse().map_err(|_| invalid(&name, "unreadable month"))?;
                let start = NaiveDate::from_ymd_opt(year, month as u32, 1)
                    .ok_or_else(|| invalid(&name, "month out of range"))?;
                let end = last_day_of_month(year, month).ok_or_else(|| invalid(&name, "month out of range"))?;
                (year, month, start, month, end)
            }
        };

        let sensor = match self.temporal {
            TemporalKind::Monthly => String::new(),
            _ => tokens.first().map(|t| t.to_string()).unwrap_or_default(),
        };

        Ok(ImageAsset {
            path: path.to_path_buf(),
            product: self.product.clone(),
            temporal: self.temporal,
            sensor,
            tile: tile_from_tokens(&tokens),
            year,
            start_month,
            end_month,
            start_date,
            end_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::ProductRegistry;

    fn parser(code: &str) -> AssetParser {
        AssetParser::new(ProductRegistry::builtin().get(code).unwrap(), "dkaa2.tif", "dkna2.tif")
    }

    #[test]
    fn single_date_scene() {
        let asset = parser("dbg")
            .parse_image(Path::new("/data/l8olre_p101r077_20190612_dbgm3_zstdmask.tif"))
            .unwrap();
        assert_eq!(asset.sensor, "l8olre");
        assert_eq!(asset.tile.as_deref(), Some("101077"));
        assert_eq!((asset.year, asset.start_month, asset.end_month), (2019, 6, 6));
        assert_eq!(asset.start_date, NaiveDate::from_ymd_opt(2019, 6, 12).unwrap());
        assert_eq!(asset.end_date, asset.start_date);
        assert_eq!(asset.product, "dbg");
    }

    #[test]
    fn seasonal_composite_spanning_new_year() {
        let desc = parser("dbi").parse(Path::new("lztmre_p104r072_m201912202002_dbia2.tif")).unwrap();
        let AssetDescriptor::Composite(asset) = desc else { panic!("expected a composite") };
        assert_eq!((asset.year, asset.start_month, asset.end_month), (2019, 12, 2));
        assert_eq!(asset.start_date, NaiveDate::from_ymd_opt(2019, 12, 1).unwrap());
        assert_eq!(asset.end_date, NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
    }

    #[test]
    fn monthly_grid() {
        let desc = parser("rainfall").parse(Path::new("/silo/201902.monthly_rain.tif")).unwrap();
        let AssetDescriptor::Monthly(asset) = desc else { panic!("expected a monthly grid") };
        assert_eq!((asset.year, asset.start_month), (2019, 2));
        assert_eq!(asset.end_date, NaiveDate::from_ymd_opt(2019, 2, 28).unwrap());
        assert!(asset.sensor.is_empty());
        assert!(asset.tile.is_none());
    }

    #[test]
    fn fire_scars_by_family() {
        let p = parser("dbg");
        let desc = p.parse(Path::new("/fire/nt_p101r077_2016_dkaa2.tif")).unwrap();
        assert_eq!(
            desc,
            AssetDescriptor::FireScar(FireScarAsset {
                path: "/fire/nt_p101r077_2016_dkaa2.tif".into(),
                family: FireFamily::Archival,
                year: 2016,
                tile: Some("101077".to_string()),
            })
        );
        let nrt = p.parse(Path::new("nt_region_2021_dkna2.tif")).unwrap().into_fire_scar().unwrap();
        assert_eq!((nrt.family, nrt.year, nrt.tile), (FireFamily::NearRealTime, 2021, None));
    }

    #[test]
    fn names_without_a_year_are_rejected() {
        let p = parser("dbg");
        assert!(p.parse(Path::new("l8olre_p101r077_dbgm3_zstdmask.tif")).is_err());
        assert!(p.parse(Path::new("nt_region_dkaa2.tif")).is_err());
        assert!(p.parse(Path::new("l8olre_p101r077_20191340_dbgm3.tif")).is_err());
        assert!(parser("dbi").parse(Path::new("x_p101r077_m201913201915_dbia2.tif")).is_err());
    }

    #[test]
    fn last_day_handles_leap_years() {
        assert_eq!(last_day_of_month(2020, 2), NaiveDate::from_ymd_opt(2020, 2, 29));
        assert_eq!(last_day_of_month(2019, 12), NaiveDate::from_ymd_opt(2019, 12, 31));
    }
}
