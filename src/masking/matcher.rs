//! Fire-year correlation between scenes and annual fire-scar rasters

use log::debug;
use std::fmt;

use crate::catalog::{FireFamily, FireScarAsset, ImageAsset};

/// Why a scene found no fire-scar raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// Nothing in the catalog covers the scene's year and tile
    NoFireYear,
    /// More than one raster covers the scene's year, tile and family
    Duplicate(usize),
}

impl UnmatchedReason {
    /// Short code written to the audit list
    pub fn code(&self) -> &'static str {
        match self {
            UnmatchedReason::NoFireYear => "no_fire_year",
            UnmatchedReason::Duplicate(_) => "duplicate",
        }
    }
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::NoFireYear => write!(f, "no fire-scar raster for the scene year and tile"),
            UnmatchedReason::Duplicate(n) => write!(f, "{} fire-scar rasters match the scene year and tile", n),
        }
    }
}

/// Matches scenes to the fire-scar raster of their year
///
/// When the catalog holds both provenance families the family is chosen
/// by `cutoff_year`: archival up to and including the cutoff, near-real-time
/// after it. A catalog holding a single family serves every year from it.
#[derive(Debug, Clone)]
pub struct FireYearMatcher {
    fire_scars: Vec<FireScarAsset>,
    cutoff_year: i32,
    both_families: bool,
}

impl FireYearMatcher {
    pub fn new(fire_scars: Vec<FireScarAsset>, cutoff_year: i32) -> Self {
        let has = |family| fire_scars.iter().any(|f| f.family == family);
        let both_families = has(FireFamily::Archival) && has(FireFamily::NearRealTime);
        FireYearMatcher { fire_scars, cutoff_year, both_families }
    }

    pub fn fire_scars(&self) -> &[FireScarAsset] {
        &self.fire_scars
    }

    /// Family required for `year`, or `None` when any family will do
    pub fn family_for(&self, year: i32) -> Option<FireFamily> {
        if !self.both_families {
            return None;
        }
        if year <= self.cutoff_year {
            Some(FireFamily::Archival)
        } else {
            Some(FireFamily::NearRealTime)
        }
    }

    /// Find the single fire-scar raster for `scene`
    ///
    /// Tile-specific rasters win over region-wide ones; two or more
    /// candidates at the same specificity are a correlation error.
    pub fn find(&self, scene: &ImageAsset) -> Result<&FireScarAsset, UnmatchedReason> {
        let family = self.family_for(scene.year);
        let tile = scene.tile.as_deref();
        let candidates: Vec<&FireScarAsset> = self
            .fire_scars
            .iter()
            .filter(|f| f.year == scene.year)
            .filter(|f| family.map_or(true, |family| f.family == family))
            .filter(|f| f.covers_tile(tile))
            .collect();

        let exact: Vec<&FireScarAsset> = candidates.iter().copied().filter(|f| f.tile.is_some()).collect();
        let pool = if exact.is_empty() { candidates } else { exact };

        match pool.as_slice() {
            [] => Err(UnmatchedReason::NoFireYear),
            [only] => {
                debug!("{} -> {}", scene.file_name(), only.path.display());
                Ok(*only)
            }
            many => Err(UnmatchedReason::Duplicate(many.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::TemporalKind;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn scene(year: i32, tile: Option<&str>) -> ImageAsset {
        let date = NaiveDate::from_ymd_opt(year, 7, 1).unwrap();
        ImageAsset {
            path: PathBuf::from(format!("l8olre_p101r077_{}0701_dbgm3_zstdmask.tif", year)),
            product: "dbg".to_string(),
            temporal: TemporalKind::SingleDate,
            sensor: "l8olre".to_string(),
            tile: tile.map(str::to_string),
            year,
            start_month: 7,
            end_month: 7,
            start_date: date,
            end_date: date,
        }
    }

    fn fire(year: i32, family: FireFamily, tile: Option<&str>) -> FireScarAsset {
        let suffix = match family {
            FireFamily::Archival => "dkaa2",
            FireFamily::NearRealTime => "dkna2",
        };
        FireScarAsset {
            path: PathBuf::from(format!("nt_{}_{}_{}.tif", tile.unwrap_or("region"), year, suffix)),
            family,
            year,
            tile: tile.map(str::to_string),
        }
    }

    #[test]
    fn family_follows_cutoff_when_both_are_present() {
        let matcher = FireYearMatcher::new(
            vec![
                fire(2017, FireFamily::Archival, Some("101077")),
                fire(2017, FireFamily::NearRealTime, Some("101077")),
                fire(2018, FireFamily::Archival, Some("101077")),
                fire(2018, FireFamily::NearRealTime, Some("101077")),
            ],
            2017,
        );
        let at_cutoff = matcher.find(&scene(2017, Some("101077"))).unwrap();
        assert_eq!(at_cutoff.family, FireFamily::Archival);
        let after = matcher.find(&scene(2018, Some("101077"))).unwrap();
        assert_eq!(after.family, FireFamily::NearRealTime);
    }

    #[test]
    fn single_family_serves_every_year() {
        let matcher = FireYearMatcher::new(vec![fire(2021, FireFamily::Archival, None)], 2017);
        assert_eq!(matcher.family_for(2021), None);
        assert_eq!(matcher.find(&scene(2021, Some("101077"))).unwrap().year, 2021);
    }

    #[test]
    fn missing_year_or_tile_is_unmatched() {
        let matcher = FireYearMatcher::new(vec![fire(2019, FireFamily::NearRealTime, Some("104072"))], 2017);
        assert_eq!(matcher.find(&scene(2020, Some("104072"))), Err(UnmatchedReason::NoFireYear));
        assert_eq!(matcher.find(&scene(2019, Some("101077"))), Err(UnmatchedReason::NoFireYear));
    }

    #[test]
    fn duplicates_are_reported_not_picked() {
        let mut second = fire(2019, FireFamily::NearRealTime, Some("101077"));
        second.path = PathBuf::from("copy/nt_101077_2019_dkna2.tif");
        let matcher =
            FireYearMatcher::new(vec![fire(2019, FireFamily::NearRealTime, Some("101077")), second], 2017);
        let reason = matcher.find(&scene(2019, Some("101077"))).unwrap_err();
        assert_eq!(reason, UnmatchedReason::Duplicate(2));
        assert_eq!(reason.code(), "duplicate");
    }

    #[test]
    fn tile_specific_raster_beats_region_wide() {
        let matcher = FireYearMatcher::new(
            vec![
                fire(2019, FireFamily::NearRealTime, None),
                fire(2019, FireFamily::NearRealTime, Some("101077")),
            ],
            2017,
        );
        assert_eq!(matcher.find(&scene(2019, Some("101077"))).unwrap().tile.as_deref(), Some("101077"));
        assert!(matcher.find(&scene(2019, Some("104072"))).unwrap().tile.is_none());
    }
}
