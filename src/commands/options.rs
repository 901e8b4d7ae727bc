//! Shared command-line options
//!
//! Every subcommand accepts the same global flags. A flag overrides the
//! matching field of the configuration file.

use clap::{Arg, ArgAction, ArgMatches};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};

/// Global arguments understood by every subcommand
pub fn global_args() -> Vec<Arg> {
    let value = |id: &'static str, name: &'static str, help: &'static str| {
        Arg::new(id).long(id).value_name(name).help(help).global(true).required(false)
    };
    vec![
        value("config", "FILE", "TOML configuration file"),
        value("product", "CODE", "Product code (dbg, dbi, ref, dp0, dp1, rainfall, ...)"),
        value("scene-root", "DIR", "Directory searched for product rasters"),
        value("fire-root", "DIR", "Directory searched for fire-scar rasters"),
        value("tiles", "FILE", "Tile-grid GeoJSON layer"),
        value("sites", "FILE", "Site polygon GeoJSON layer"),
        value("export-dir", "DIR", "Directory receiving lists, audits and tables"),
        value("temp-root", "DIR", "Parent directory for scratch space"),
        value("season", "SELECTOR", "'per-scene' or a fixed selector (0112, 1202, 0509, 0608, 0911, 01..12)"),
        value("window-policy", "POLICY", "Multi-month window policy (inclusive, cumulative)"),
        value("min-scenes", "N", "Minimum scene count for a tile to be processed"),
        value("buffer", "METRES", "Inward tile buffer in metres"),
        value("workers", "N", "Worker threads for masking and extraction"),
        value("pixel-inclusion", "POLICY", "Pixel inclusion policy (strict, all-touched)"),
        value("missing-band", "POLICY", "Missing band policy (fill, reuse-first)"),
        value("compression", "NAME", "Compression of written rasters (none, deflate, zstd)"),
        value("log-level", "LEVEL", "Log level (error, warn, info, debug, trace)"),
        Arg::new("keep-footprints")
            .long("keep-footprints")
            .help("Keep aligned fire-scar footprints under the export directory")
            .action(ArgAction::SetTrue)
            .global(true),
    ]
}

fn path(args: &ArgMatches, id: &str) -> Option<PathBuf> {
    args.get_one::<String>(id).map(PathBuf::from)
}

fn number<T: std::str::FromStr>(args: &ArgMatches, id: &str) -> PipelineResult<Option<T>> {
    match args.get_one::<String>(id) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| PipelineError::InvalidInput(format!("--{} expects a number, got '{}'", id, raw))),
        None => Ok(None),
    }
}

/// Parse a kebab-case policy name into its configuration enum
fn policy<T: DeserializeOwned>(args: &ArgMatches, id: &str) -> PipelineResult<Option<T>> {
    match args.get_one::<String>(id) {
        Some(raw) => toml::Value::String(raw.trim().to_lowercase())
            .try_into::<T>()
            .map(Some)
            .map_err(|_| PipelineError::InvalidInput(format!("--{}: unknown value '{}'", id, raw))),
        None => Ok(None),
    }
}

/// Load the configuration file (if any) and apply command-line overrides
pub fn load_config(args: &ArgMatches) -> PipelineResult<PipelineConfig> {
    let mut config = PipelineConfig::load(path(args, "config").as_deref())?;

    if let Some(product) = args.get_one::<String>("product") {
        config.product = product.clone();
    }
    if let Some(dir) = path(args, "scene-root") {
        config.scene_root = dir;
    }
    if let Some(dir) = path(args, "fire-root") {
        config.fire_root = Some(dir);
    }
    if let Some(file) = path(args, "tiles") {
        config.tiles_path = Some(file);
    }
    if let Some(file) = path(args, "sites") {
        config.sites_path = Some(file);
    }
    if let Some(dir) = path(args, "export-dir") {
        config.export_dir = dir;
    }
    if let Some(dir) = path(args, "temp-root") {
        config.temp_root = Some(dir);
    }
    if let Some(season) = args.get_one::<String>("season") {
        config.season = season.clone();
    }
    if let Some(level) = args.get_one::<String>("log-level") {
        config.log_level = level.clone();
    }
    if let Some(min) = number(args, "min-scenes")? {
        config.min_scene_count = min;
    }
    if let Some(buffer) = number(args, "buffer")? {
        config.buffer_metres = buffer;
    }
    if let Some(workers) = number(args, "workers")? {
        config.workers = workers;
    }
    if let Some(window) = policy(args, "window-policy")? {
        config.window_policy = window;
    }
    if let Some(inclusion) = policy(args, "pixel-inclusion")? {
        config.pixel_inclusion = inclusion;
    }
    if let Some(missing) = policy(args, "missing-band")? {
        config.missing_band = missing;
    }
    if let Some(compression) = policy(args, "compression")? {
        config.compression = compression;
    }
    if args.get_flag("keep-footprints") {
        config.keep_footprints = true;
    }

    config.validate()?;
    config.product_definition()?;
    Ok(config)
}
