//! Run configuration
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Command-line flags are applied on top by the commands.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::masking::{SeasonMode, SeasonSelector, WindowPolicy};
use crate::products::{ProductDefinition, ProductRegistry};
use crate::tiff::Compression;
use crate::tiles::{ColumnNames, ZoneRule};
use crate::zonal::{MissingBandPolicy, PixelInclusion};

/// Fire-scar discovery and year matching
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FireScarConfig {
    /// File-name ending of the archival family
    pub archival_suffix: String,
    /// File-name ending of the near-real-time family
    pub near_real_time_suffix: String,
    /// Last year served by the archival family
    pub cutoff_year: i32,
}

impl Default for FireScarConfig {
    fn default() -> Self {
        FireScarConfig {
            archival_suffix: "dkaa2.tif".to_string(),
            near_real_time_suffix: "dkna2.tif".to_string(),
            cutoff_year: 2017,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub export_dir: PathBuf,
    /// Parent of the scoped temporary workspace; system temp when unset
    pub temp_root: Option<PathBuf>,
    pub scene_root: PathBuf,
    pub fire_root: Option<PathBuf>,
    pub tiles_path: Option<PathBuf>,
    pub sites_path: Option<PathBuf>,
    pub product: String,
    /// Overrides the product's file-name suffix
    pub scene_suffix: Option<String>,
    pub fire: FireScarConfig,
    /// Processing suffix removed from scene stems before tagging
    pub stripped_suffix: String,
    /// `per-scene` or a fixed selector code
    pub season: String,
    /// Selector for composites whose start month has no window
    pub default_selector: String,
    pub window_policy: WindowPolicy,
    pub min_scene_count: usize,
    pub buffer_metres: f64,
    pub zones: Vec<ZoneRule>,
    pub pixel_inclusion: PixelInclusion,
    pub missing_band: MissingBandPolicy,
    /// Statistic value for filled bands; product no-data when unset
    pub missing_band_sentinel: Option<f64>,
    pub workers: usize,
    pub columns: ColumnNames,
    pub compression: Compression,
    /// Keep aligned fire-scar footprints under the export directory
    pub keep_footprints: bool,
    pub log_file: PathBuf,
    pub log_level: String,
    /// Product definitions merged over the built-in registry
    pub products: BTreeMap<String, toml::Table>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            export_dir: PathBuf::from("export"),
            temp_root: None,
            scene_root: PathBuf::from("."),
            fire_root: None,
            tiles_path: None,
            sites_path: None,
            product: "dbg".to_string(),
            scene_suffix: None,
            fire: FireScarConfig::default(),
            stripped_suffix: "_zstdmask".to_string(),
            season: "per-scene".to_string(),
            default_selector: "0112".to_string(),
            window_policy: WindowPolicy::default(),
            min_scene_count: 100,
            buffer_metres: 4000.0,
            zones: ZoneRule::defaults(),
            pixel_inclusion: PixelInclusion::default(),
            missing_band: MissingBandPolicy::default(),
            missing_band_sentinel: None,
            workers: 1,
            columns: ColumnNames::default(),
            compression: Compression::default(),
            keep_footprints: false,
            log_file: PathBuf::from("firescar-zonal.log"),
            log_level: "info".to_string(),
            products: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document
    pub fn from_str(content: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        match path {
            Some(path) => Self::from_str(&fs::read_to_string(path)?),
            None => Ok(PipelineConfig::default()),
        }
    }

    /// Check the fields that serde cannot
    pub fn validate(&self) -> PipelineResult<()> {
        self.season_mode()?;
        if self.zones.is_empty() {
            return Err(PipelineError::InvalidInput("at least one zone rule is required".to_string()));
        }
        if !self.buffer_metres.is_finite() || self.buffer_metres < 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "buffer_metres must be a non-negative distance, got {}",
                self.buffer_metres
            )));
        }
        if self.workers == 0 {
            return Err(PipelineError::InvalidInput("workers must be at least 1".to_string()));
        }
        self.log_level_filter()?;
        Ok(())
    }

    pub fn season_mode(&self) -> PipelineResult<SeasonMode> {
        if self.season.trim().eq_ignore_ascii_case("per-scene") {
            Ok(SeasonMode::PerScene { fallback: SeasonSelector::parse(&self.default_selector)? })
        } else {
            Ok(SeasonMode::Fixed(SeasonSelector::parse(&self.season)?))
        }
    }

    pub fn log_level_filter(&self) -> PipelineResult<log::LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| PipelineError::InvalidInput(format!("unknown log level '{}'", self.log_level)))
    }

    /// Built-in products with this configuration's overrides applied
    pub fn registry(&self) -> PipelineResult<ProductRegistry> {
        ProductRegistry::builtin().with_overrides(&self.products)
    }

    /// Definition of the configured product
    pub fn product_definition(&self) -> PipelineResult<ProductDefinition> {
        self.registry()?.get(&self.product).cloned()
    }

    /// Scene suffix: the explicit override or the product's own
    pub fn scene_suffix_for(&self, product: &ProductDefinition) -> String {
        self.scene_suffix.clone().unwrap_or_else(|| product.suffix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = PipelineConfig::from_str("").unwrap();
        assert_eq!(config.min_scene_count, 100);
        assert_eq!(config.buffer_metres, 4000.0);
        assert_eq!(config.fire.cutoff_year, 2017);
        assert_eq!(config.columns.site, "site_name");
        assert_eq!(config.zones.len(), 2);
        assert_eq!(config.pixel_inclusion, PixelInclusion::Strict);
        assert_eq!(config.missing_band, MissingBandPolicy::Fill);
        assert_eq!(
            config.season_mode().unwrap(),
            SeasonMode::PerScene { fallback: SeasonSelector::WholeYear }
        );
    }

    #[test]
    fn fields_and_product_overrides_parse() {
        let config = PipelineConfig::from_str(
            r#"
            product = "ref"
            season = "0509"
            window_policy = "cumulative"
            pixel_inclusion = "all-touched"
            missing_band = "reuse-first"
            compression = "zstd"
            min_scene_count = 5

            [fire]
            cutoff_year = 2019

            [columns]
            tile = "PATH_ROW"

            [[zones]]
            zone = 54
            min_code = 90000

            [products.ref]
            nodata = -999.0
            "#,
        )
        .unwrap();
        assert_eq!(config.season_mode().unwrap(), SeasonMode::Fixed(SeasonSelector::DrySeason));
        assert_eq!(config.window_policy, WindowPolicy::Cumulative);
        assert_eq!(config.pixel_inclusion, PixelInclusion::AllTouched);
        assert_eq!(config.missing_band, MissingBandPolicy::ReuseFirst);
        assert_eq!(config.compression, Compression::Zstd);
        assert_eq!(config.fire.cutoff_year, 2019);
        assert_eq!(config.fire.archival_suffix, "dkaa2.tif");
        assert_eq!(config.columns.tile, "PATH_ROW");
        assert_eq!(config.columns.uid, "uid");
        assert_eq!(config.zones[0].crs(), crate::coordinate::CoordinateSystem::UTM(54, false));

        let product = config.product_definition().unwrap();
        assert_eq!(product.nodata, -999.0);
        assert_eq!(product.bands.len(), 9);
        assert_eq!(config.scene_suffix_for(&product), "_dbgm9.tif");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_str("season = \"0305\""),
            Err(PipelineError::UnknownSelector(_))
        ));
        assert!(PipelineConfig::from_str("workers = 0").is_err());
        assert!(PipelineConfig::from_str("buffer_metres = -5.0").is_err());
        assert!(PipelineConfig::from_str("log_level = \"chatty\"").is_err());
        assert!(matches!(PipelineConfig::from_str("min_scene_count = \"many\""), Err(PipelineError::Config(_))));
    }

    #[test]
    fn unknown_product_surfaces_on_lookup() {
        let config = PipelineConfig { product: "ndvi".to_string(), ..PipelineConfig::default() };
        assert!(matches!(config.product_definition(), Err(PipelineError::UnknownProduct(_))));
    }
}
