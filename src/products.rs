//! Product registry
//!
//! Maps a product code to its temporal kind, band plan, no-data value,
//! radiometric offset and output naming. The built-in definitions are
//! embedded from `products.toml`; a run configuration may merge its own
//! `[products.<code>]` tables over them.

use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::errors::{PipelineError, PipelineResult};

lazy_static! {
    // Parse the embedded definitions once
    static ref BUILTIN_PRODUCTS: ProductRegistry = {
        let content = include_str!("../products.toml");
        ProductRegistry::from_str(content).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse product definitions: {}", e);
            ProductRegistry::default()
        })
    };
}

/// How a product's acquisitions are dated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemporalKind {
    /// One acquisition date (`YYYYMMDD` token)
    SingleDate,
    /// A start/end month range (`mYYYYMMYYYYMM` token)
    Seasonal,
    /// One calendar month (`YYYYMM` token)
    Monthly,
}

impl fmt::Display for TemporalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemporalKind::SingleDate => "single-date",
            TemporalKind::Seasonal => "seasonal",
            TemporalKind::Monthly => "monthly",
        };
        write!(f, "{}", name)
    }
}

/// Output tags appended to masked rasters, per fire-scar family
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MaskTags {
    pub archival: String,
    pub near_real_time: String,
}

/// One raster product
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductDefinition {
    #[serde(skip)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub temporal: TemporalKind,
    /// File name suffix identifying the product's rasters
    pub suffix: String,
    /// 1-based band numbers extracted for zonal statistics
    pub bands: Vec<usize>,
    pub nodata: f64,
    /// Constant subtracted from location statistics; 0 disables correction
    #[serde(default)]
    pub offset: f64,
    /// Column namespace; defaults to the code
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub fire_masked: bool,
    #[serde(default)]
    pub mask_tags: Option<MaskTags>,
    /// Sensors whose stacks hold fewer bands than the plan
    #[serde(default)]
    pub sensor_bands: HashMap<String, usize>,
}

impl ProductDefinition {
    /// Column namespace for this product
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.code)
    }

    /// Number of bands `sensor` actually carries, if limited
    pub fn band_limit(&self, sensor: &str) -> Option<usize> {
        self.sensor_bands.get(sensor).copied()
    }

    /// Mask tags, failing for products that are never fire-masked
    pub fn mask_tags(&self) -> PipelineResult<&MaskTags> {
        self.mask_tags.as_ref().filter(|_| self.fire_masked).ok_or_else(|| {
            PipelineError::InvalidInput(format!("product '{}' is not fire-masked", self.code))
        })
    }
}

/// Registry of product definitions keyed by code
#[derive(Debug, Clone, Default)]
pub struct ProductRegistry {
    raw: BTreeMap<String, toml::Table>,
    products: BTreeMap<String, ProductDefinition>,
}

impl ProductRegistry {
    /// The embedded definitions
    pub fn builtin() -> &'static ProductRegistry {
        &BUILTIN_PRODUCTS
    }

    /// Parse definitions from a TOML document of `[<code>]` tables
    pub fn from_str(content: &str) -> PipelineResult<Self> {
        let document: toml::Table = content.parse()?;
        let mut registry = ProductRegistry::default();
        for (code, value) in document {
            let table = value.as_table().cloned().ok_or_else(|| {
                PipelineError::InvalidInput(format!("product '{}' is not a table", code))
            })?;
            registry.insert(code, table)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, code: String, table: toml::Table) -> PipelineResult<()> {
        let mut definition: ProductDefinition = toml::Value::Table(table.clone()).try_into()?;
        definition.code = code.clone();
        if definition.bands.is_empty() || definition.bands.contains(&0) {
            return Err(PipelineError::InvalidInput(format!(
                "product '{}' needs a non-empty, 1-based band list",
                code
            )));
        }
        self.raw.insert(code.clone(), table);
        self.products.insert(code, definition);
        Ok(())
    }

    /// Copy of the registry with `overrides` merged key by key
    ///
    /// A code absent from the registry defines a new product and must carry
    /// every required field.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, toml::Table>) -> PipelineResult<Self> {
        let mut merged = self.clone();
        for (code, table) in overrides {
            let mut base = merged.raw.get(code).cloned().unwrap_or_default();
            for (key, value) in table {
                base.insert(key.clone(), value.clone());
            }
            merged.insert(code.clone(), base)?;
        }
        Ok(merged)
    }

    /// Definition for `code`
    pub fn get(&self, code: &str) -> PipelineResult<&ProductDefinition> {
        self.products.get(code).ok_or_else(|| PipelineError::UnknownProduct(code.to_string()))
    }

    /// Registered codes in sorted order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }
}
