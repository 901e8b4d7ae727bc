//! Pipeline orchestration
//!
//! Steps run in dependency order: catalog, resolve, mask, gate, extract,
//! aggregate. Scenes (masking) and tile/image pairs (extraction) are
//! explicit work items run on a worker pool; every item gets its own
//! scratch directory and the cancellation token is checked before each
//! one starts. Per-item failures become audit rows. Only data-integrity
//! errors and cancellation end a run early.

use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::aggregate::{aggregate, write_site_tables};
use crate::audit::{
    write_ambiguous, write_records, FailedScene, FootprintRow, UnmatchedScene, ALIGNMENT_FAILED_FILE,
    AMBIGUOUS_FILE, FAILED_FILE, UNMATCHED_FILE,
};
use crate::catalog::{write_asset_list, AssetParser, Catalog, CatalogBuilder, ImageAsset};
use crate::config::PipelineConfig;
use crate::coordinate::CoordinateSystem;
use crate::errors::{PipelineError, PipelineResult};
use crate::gate::{gate, group_by_tile, persist, GateResult, UNTILED};
use crate::masking::{FireYearMatcher, MaskNaming, MaskOutcome, SceneMasker, SeasonSelector};
use crate::products::ProductDefinition;
use crate::raster::{RasterAligner, RasterStore};
use crate::tiles::{write_assignments, SiteTileAssignment, TileResolver};
use crate::utils::progress::ProgressTracker;
use crate::vector::{read_geojson, Layer};
use crate::workspace::WorkspaceContext;
use crate::zonal::{BandPlan, SitePolygon, ZonalExtractor, ZonalRow};

/// File name of the site/tile identity table
pub const ASSIGNMENT_FILE: &str = "site_tile_assignment.csv";

/// Shared stop signal, checked between work items
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancelled
    pub fn check(&self) -> PipelineResult<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One scene to mask
#[derive(Debug, Clone)]
pub struct SceneWorkItem {
    pub scene: ImageAsset,
    pub selector: SeasonSelector,
}

impl SceneWorkItem {
    pub fn label(&self) -> String {
        self.scene.file_name()
    }
}

/// One gated tile: its images and the sites assigned to it
#[derive(Debug, Clone)]
pub struct TileWorkItem {
    pub tile: String,
    pub images: Vec<ImageAsset>,
    /// Assigned sites in the site layer's CRS
    pub sites: Layer,
    /// `(uid, site)` per feature of `sites`
    pub site_keys: Vec<(i64, String)>,
}

impl TileWorkItem {
    /// Site polygons reprojected into `crs`
    pub fn site_polygons(&self, crs: CoordinateSystem) -> PipelineResult<Vec<SitePolygon>> {
        let layer = self.sites.reproject(crs)?;
        Ok(layer
            .features
            .into_iter()
            .zip(&self.site_keys)
            .map(|(feature, (uid, site))| SitePolygon { uid: *uid, site: site.clone(), geometry: feature.geometry })
            .collect())
    }
}

/// Result of the masking step
#[derive(Debug, Clone, Default)]
pub struct MaskSummary {
    pub masked: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub unmatched: Vec<UnmatchedScene>,
    pub alignment_failed: Vec<FailedScene>,
    pub failed: Vec<FailedScene>,
    pub footprints: Vec<FootprintRow>,
}

impl MaskSummary {
    /// Every masked raster available after the step, new or cached
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.masked.iter().chain(self.skipped.iter())
    }
}

/// Result of the extraction step
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub rows: Vec<ZonalRow>,
    pub images: usize,
    pub failed: Vec<FailedScene>,
}

/// What a full run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub images: usize,
    pub fire_scars: usize,
    pub assignments: usize,
    pub mask: Option<MaskSummary>,
    pub gate: GateResult,
    pub extracted_images: usize,
    pub failed_images: usize,
    pub rows: usize,
    pub site_tables: Vec<PathBuf>,
}

impl RunReport {
    /// `key: value` lines for the run log
    pub fn summary_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("images catalogued", self.images.to_string()),
            ("fire-scar rasters", self.fire_scars.to_string()),
            ("sites assigned", self.assignments.to_string()),
        ];
        if let Some(mask) = &self.mask {
            entries.push(("scenes masked", mask.masked.len().to_string()));
            entries.push(("scenes already masked", mask.skipped.len().to_string()));
            entries.push(("scenes unmatched", mask.unmatched.len().to_string()));
            entries.push(("alignment failures", mask.alignment_failed.len().to_string()));
            entries.push(("scene failures", mask.failed.len().to_string()));
        }
        entries.push(("tiles ready", self.gate.ready.len().to_string()));
        entries.push(("tiles insufficient", self.gate.insufficient.len().to_string()));
        entries.push(("images extracted", self.extracted_images.to_string()));
        entries.push(("images failed", self.failed_images.to_string()));
        entries.push(("zonal rows", self.rows.to_string()));
        entries.push(("site tables", self.site_tables.len().to_string()));
        entries
    }
}

/// The correlation, masking and zonal-aggregation engine for one product
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    product: ProductDefinition,
    workspace: &'a WorkspaceContext,
    store: &'a dyn RasterStore,
    aligner: &'a dyn RasterAligner,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    /// # Arguments
    /// * `config` - Run configuration; its product must be in the registry
    /// * `workspace` - Export directory and scratch space
    /// * `store` - Raster reader/writer
    /// * `aligner` - Alignment service for fire-scar rasters
    pub fn new(
        config: &'a PipelineConfig,
        workspace: &'a WorkspaceContext,
        store: &'a dyn RasterStore,
        aligner: &'a dyn RasterAligner,
    ) -> PipelineResult<Self> {
        let product = config.product_definition()?;
        Ok(Pipeline { config, product, workspace, store, aligner, cancel: CancellationToken::new() })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn product(&self) -> &ProductDefinition {
        &self.product
    }

    fn parser(&self) -> AssetParser {
        AssetParser::new(&self.product, &self.config.fire.archival_suffix, &self.config.fire.near_real_time_suffix)
    }

    fn export_file(&self, name: &str) -> PathBuf {
        self.workspace.export_path(&format!("{}_{}", self.product.code, name))
    }

    /// Scan scenes (and fire scars for masked products) and write the image list
    pub fn catalog(&self) -> PipelineResult<Catalog> {
        let builder = CatalogBuilder::new(self.parser());
        let suffix = self.config.scene_suffix_for(&self.product);
        let fire_suffixes = [self.config.fire.archival_suffix.as_str(), self.config.fire.near_real_time_suffix.as_str()];
        let fire_root = match (&self.config.fire_root, self.product.fire_masked) {
            (Some(root), true) => Some((root.as_path(), fire_suffixes)),
            (None, true) => {
                warn!("No fire_root configured; every {} scene will be unmatched", self.product.code);
                None
            }
            _ => None,
        };
        let catalog = builder.build(&self.config.scene_root, &suffix, fire_root)?;
        write_asset_list(catalog.images.iter().map(|i| i.path.as_path()), &self.export_file("image_list.csv"))?;
        Ok(catalog)
    }

    fn read_layer(path: &Option<PathBuf>, what: &str) -> PipelineResult<Layer> {
        match path {
            Some(path) => read_geojson(path),
            None => Err(PipelineError::InvalidInput(format!("no {} layer configured", what))),
        }
    }

    pub fn load_sites(&self) -> PipelineResult<Layer> {
        Self::read_layer(&self.config.sites_path, "site")
    }

    pub fn load_tiles(&self) -> PipelineResult<Layer> {
        Self::read_layer(&self.config.tiles_path, "tile-grid")
    }

    /// Assign sites to tiles and write the identity table
    ///
    /// An ambiguous assignment writes `ambiguous.csv` and aborts.
    pub fn resolve(&self, tiles: &Layer, sites: &Layer) -> PipelineResult<Vec<SiteTileAssignment>> {
        let resolver = TileResolver::new(self.config.zones.clone(), self.config.buffer_metres, self.config.columns.clone());
        match resolver.resolve(tiles, sites) {
            Ok(assignments) => {
                write_assignments(&assignments, &self.workspace.export_path(ASSIGNMENT_FILE))?;
                Ok(assignments)
            }
            Err(PipelineError::AmbiguousAssignment(ambiguous)) => {
                write_ambiguous(&ambiguous, &self.workspace.export_path(AMBIGUOUS_FILE))?;
                error!("{} site(s) overlap several buffered tiles; see {}", ambiguous.len(), AMBIGUOUS_FILE);
                Err(PipelineError::AmbiguousAssignment(ambiguous))
            }
            Err(e) => Err(e),
        }
    }

    /// Pair every scene with its season selector
    pub fn scene_items(&self, images: &[ImageAsset]) -> PipelineResult<Vec<SceneWorkItem>> {
        let mode = self.config.season_mode()?;
        Ok(images
            .iter()
            .map(|scene| SceneWorkItem { scene: scene.clone(), selector: mode.selector_for(scene) })
            .collect())
    }

    /// Run `work` over `items` on the worker pool, in input order
    ///
    /// Items not yet started when the token is cancelled are dropped.
    fn run_items<T, R, F>(&self, items: &[T], work: F) -> PipelineResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| PipelineError::InvalidInput(format!("cannot start {} worker(s): {}", self.config.workers, e)))?;
        let results: Vec<Option<R>> = pool.install(|| {
            items
                .par_iter()
                .map(|item| if self.cancel.is_cancelled() { None } else { Some(work(item)) })
                .collect()
        });
        Ok(results.into_iter().flatten().collect())
    }

    /// Mask every catalogued scene and write the masking audit lists
    pub fn mask(&self, catalog: &Catalog) -> PipelineResult<MaskSummary> {
        let naming = MaskNaming::new(&self.config.stripped_suffix, self.product.mask_tags()?);
        let matcher = FireYearMatcher::new(catalog.fire_scars.clone(), self.config.fire.cutoff_year);
        let mut masker = SceneMasker::new(&matcher, naming, self.store, self.aligner)
            .with_policy(self.config.window_policy)
            .with_fallback_nodata(self.product.nodata);
        if self.config.keep_footprints {
            let dir = self.workspace.export_subdir(&format!("{}_fire_footprints", self.product.code))?;
            masker = masker.keep_footprints_in(dir);
        }

        let items = self.scene_items(&catalog.images)?;
        info!("Masking {} {} scene(s)", items.len(), self.product.code);
        let progress = ProgressTracker::for_terminal(items.len() as u64, "Masking scenes");
        let outcomes = self.run_items(&items, |item| {
            let outcome = match self.workspace.item_dir(&item.label()) {
                Ok(scratch) => masker.process(&item.scene, item.selector, &scratch),
                Err(e) => MaskOutcome::Failed { message: e.to_string() },
            };
            progress.increment(1);
            (item.scene.clone(), outcome)
        })?;
        progress.finish();

        let mut summary = MaskSummary::default();
        for (scene, outcome) in outcomes {
            let scene = &scene;
            let scene_path = scene.path.to_string_lossy().into_owned();
            match outcome {
                MaskOutcome::Done { output, fire, footprint, .. } => {
                    summary.footprints.push(FootprintRow::new(scene, &fire, footprint.as_deref()));
                    summary.masked.push(output);
                }
                MaskOutcome::Skipped { output } => summary.skipped.push(output),
                MaskOutcome::Unmatched { reason } => summary.unmatched.push(UnmatchedScene::new(scene, &reason)),
                MaskOutcome::AlignmentFailed { fire, message } => summary.alignment_failed.push(FailedScene {
                    scene: scene_path,
                    fire: fire.path.to_string_lossy().into_owned(),
                    message,
                }),
                MaskOutcome::Failed { message } => {
                    summary.failed.push(FailedScene { scene: scene_path, fire: String::new(), message })
                }
            }
        }

        write_records(&summary.unmatched, &self.export_file(UNMATCHED_FILE))?;
        write_records(&summary.alignment_failed, &self.export_file(ALIGNMENT_FAILED_FILE))?;
        write_records(&summary.failed, &self.export_file(FAILED_FILE))?;
        write_records(&summary.footprints, &self.export_file("fire_footprints.csv"))?;
        info!(
            "Masking: {} written, {} cached, {} unmatched, {} alignment failure(s), {} failure(s)",
            summary.masked.len(),
            summary.skipped.len(),
            summary.unmatched.len(),
            summary.alignment_failed.len(),
            summary.failed.len()
        );
        self.cancel.check()?;
        Ok(summary)
    }

    /// Images to extract statistics from
    ///
    /// Fire-masked products use the masked outputs: those of `mask` when
    /// given, else every masked raster found under the scene root. Other
    /// products use the catalogued images.
    pub fn zonal_inputs(&self, mask: Option<&MaskSummary>, catalog: Option<&Catalog>) -> PipelineResult<Vec<ImageAsset>> {
        let parser = self.parser();
        let mut images = if !self.product.fire_masked {
            match catalog {
                Some(catalog) => catalog.images.clone(),
                None => self.catalog()?.images,
            }
        } else if let Some(mask) = mask {
            let mut images = Vec::new();
            for path in mask.outputs() {
                match parser.parse_image(path) {
                    Ok(image) => images.push(image),
                    Err(e) => warn!("Skipping masked output {}: {}", path.display(), e),
                }
            }
            images
        } else {
            let naming = MaskNaming::new(&self.config.stripped_suffix, self.product.mask_tags()?);
            let suffixes = naming.output_suffixes();
            let suffixes: Vec<&str> = suffixes.iter().map(String::as_str).collect();
            CatalogBuilder::new(parser)
                .scan(&self.config.scene_root, &suffixes)?
                .into_iter()
                .filter_map(|d| d.into_image())
                .collect()
        };
        images.sort_by(|a, b| a.path.cmp(&b.path));
        images.dedup_by(|a, b| a.path == b.path);
        Ok(images)
    }

    /// Gate the images per tile and build work items for ready tiles
    pub fn tile_items(
        &self,
        images: &[ImageAsset],
        sites: &Layer,
        assignments: &[SiteTileAssignment],
    ) -> PipelineResult<(GateResult, Vec<TileWorkItem>)> {
        let groups = group_by_tile(images);
        let result = gate(&groups, self.config.min_scene_count);
        persist(&result, &groups, &self.product.code, self.workspace)?;

        let mut items = Vec::new();
        for status in &result.ready {
            let mut layer = Layer::new(sites.name.clone(), sites.crs);
            let mut site_keys = Vec::new();
            for assignment in assignments.iter().filter(|a| status.tile == UNTILED || a.tile == status.tile) {
                match sites.features.get(assignment.feature_index) {
                    Some(feature) => {
                        layer.features.push(feature.clone());
                        site_keys.push((assignment.uid, assignment.site.clone()));
                    }
                    None => warn!("Assignment for uid {} points past the site layer", assignment.uid),
                }
            }
            if layer.is_empty() {
                info!("Tile {} is ready but has no assigned sites", status.tile);
                continue;
            }
            let images = groups.get(&status.tile).cloned().unwrap_or_default();
            items.push(TileWorkItem { tile: status.tile.clone(), images, sites: layer, site_keys });
        }
        Ok((result, items))
    }

    /// Zonal statistics for every image of every tile work item
    pub fn extract(&self, items: &[TileWorkItem]) -> PipelineResult<ExtractionSummary> {
        let extractor = ZonalExtractor::new(
            BandPlan::for_product(&self.product),
            self.config.pixel_inclusion,
            self.config.missing_band,
            self.config.missing_band_sentinel,
        );
        let work: Vec<(&TileWorkItem, &ImageAsset)> =
            items.iter().flat_map(|tile| tile.images.iter().map(move |image| (tile, image))).collect();
        info!("Extracting {} statistics from {} image(s) on {} tile(s)", self.product.code, work.len(), items.len());

        let polygons: Mutex<HashMap<(String, CoordinateSystem), Arc<Vec<SitePolygon>>>> = Mutex::new(HashMap::new());
        let sites_for = |tile: &TileWorkItem, crs: CoordinateSystem| -> PipelineResult<Arc<Vec<SitePolygon>>> {
            let key = (tile.tile.clone(), crs);
            if let Some(found) = polygons.lock().ok().and_then(|cache| cache.get(&key).cloned()) {
                return Ok(found);
            }
            let built = Arc::new(tile.site_polygons(crs)?);
            if let Ok(mut cache) = polygons.lock() {
                cache.insert(key, built.clone());
            }
            Ok(built)
        };

        let progress = ProgressTracker::for_terminal(work.len() as u64, "Extracting statistics");
        let results = self.run_items(&work, |(tile, image)| {
            let result = self
                .store
                .read(&image.path)
                .and_then(|raster| {
                    let sites = sites_for(*tile, raster.crs)?;
                    extractor.extract(*image, &raster, &sites)
                });
            progress.increment(1);
            (*image, result)
        })?;
        progress.finish();

        let mut summary = ExtractionSummary::default();
        for (image, result) in results {
            match result {
                Ok(rows) => {
                    summary.images += 1;
                    summary.rows.extend(rows);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", image.file_name(), e);
                    summary.failed.push(FailedScene {
                        scene: image.path.to_string_lossy().into_owned(),
                        fire: String::new(),
                        message: e.to_string(),
                    });
                }
            }
        }
        write_records(&summary.failed, &self.export_file("zonal_failed.csv"))?;
        info!("Extracted {} row(s) from {} image(s)", summary.rows.len(), summary.images);
        self.cancel.check()?;
        Ok(summary)
    }

    /// Write one zonal-statistics table per site
    pub fn write_tables(&self, rows: Vec<ZonalRow>) -> PipelineResult<Vec<PathBuf>> {
        let out_dir = self.workspace.export_subdir(&format!("{}_zonal_stats", self.product.code))?;
        let tables = aggregate(rows);
        write_site_tables(&tables, &self.product.code, self.product.label(), &out_dir)
    }

    /// Every step, end to end
    pub fn run(&self) -> PipelineResult<RunReport> {
        info!("Starting {} run ({})", self.product.code, self.product.description);
        let catalog = self.catalog()?;
        let sites = self.load_sites()?;
        let tiles = self.load_tiles()?;
        let assignments = self.resolve(&tiles, &sites)?;
        self.cancel.check()?;

        let mask = if self.product.fire_masked { Some(self.mask(&catalog)?) } else { None };
        let inputs = self.zonal_inputs(mask.as_ref(), Some(&catalog))?;
        let (gate, items) = self.tile_items(&inputs, &sites, &assignments)?;
        let extraction = self.extract(&items)?;
        let rows = extraction.rows.len();
        let site_tables = self.write_tables(extraction.rows)?;

        Ok(RunReport {
            images: catalog.images.len(),
            fire_scars: catalog.fire_scars.len(),
            assignments: assignments.len(),
            mask,
            gate,
            extracted_images: extraction.images,
            failed_images: extraction.failed.len(),
            rows,
            site_tables,
        })
    }
}
