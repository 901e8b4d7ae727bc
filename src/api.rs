use log::info;
use std::path::Path;

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::errors::PipelineResult;
use crate::pipeline::{CancellationToken, MaskSummary, Pipeline, RunReport};
use crate::raster::{GeoTiffStore, GridAligner};
use crate::tiles::SiteTileAssignment;
use crate::workspace::WorkspaceContext;

/// Workspace and raster services for one call
struct Session {
    workspace: WorkspaceContext,
    store: GeoTiffStore,
    aligner: GridAligner,
}

impl Session {
    fn open(config: &PipelineConfig) -> PipelineResult<Self> {
        Ok(Session {
            workspace: WorkspaceContext::new(&config.export_dir, config.temp_root.as_deref())?,
            store: GeoTiffStore::new(config.compression),
            aligner: GridAligner::new(),
        })
    }

    fn pipeline<'s>(&'s self, config: &'s PipelineConfig, cancel: &CancellationToken) -> PipelineResult<Pipeline<'s>> {
        Ok(Pipeline::new(config, &self.workspace, &self.store, &self.aligner)?.with_cancellation(cancel.clone()))
    }
}

/// Main interface to the firescar-zonal library
///
/// Every method opens a fresh workspace under the configured export
/// directory; scratch space is gone when the method returns.
pub struct FirescarZonal {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl FirescarZonal {
    /// Create an instance over a validated configuration
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(FirescarZonal { config, cancel: CancellationToken::new() })
    }

    /// Create an instance from a TOML file, or the defaults when `None`
    pub fn from_file(path: Option<&Path>) -> PipelineResult<Self> {
        Self::new(PipelineConfig::load(path)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that stops the current and later calls between work items
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Catalogue scenes and fire scars and write the image list
    pub fn catalog(&self) -> PipelineResult<Catalog> {
        let session = Session::open(&self.config)?;
        session.pipeline(&self.config, &self.cancel)?.catalog()
    }

    /// Assign sites to tiles
    ///
    /// # Returns
    /// One assignment per resolved site, or `AmbiguousAssignment`
    pub fn resolve(&self) -> PipelineResult<Vec<SiteTileAssignment>> {
        let session = Session::open(&self.config)?;
        let pipeline = session.pipeline(&self.config, &self.cancel)?;
        let sites = pipeline.load_sites()?;
        let tiles = pipeline.load_tiles()?;
        pipeline.resolve(&tiles, &sites)
    }

    /// Catalogue and fire-mask every scene of the product
    pub fn mask(&self) -> PipelineResult<MaskSummary> {
        let session = Session::open(&self.config)?;
        let pipeline = session.pipeline(&self.config, &self.cancel)?;
        let catalog = pipeline.catalog()?;
        pipeline.mask(&catalog)
    }

    /// Gate, extract and aggregate from rasters already on disk
    ///
    /// Fire-masked products read the masked outputs of an earlier `mask`.
    pub fn zonal(&self) -> PipelineResult<RunReport> {
        let session = Session::open(&self.config)?;
        let pipeline = session.pipeline(&self.config, &self.cancel)?;
        let sites = pipeline.load_sites()?;
        let tiles = pipeline.load_tiles()?;
        let assignments = pipeline.resolve(&tiles, &sites)?;
        let inputs = pipeline.zonal_inputs(None, None)?;
        info!("{} image(s) available for extraction", inputs.len());

        let (gate, items) = pipeline.tile_items(&inputs, &sites, &assignments)?;
        let extraction = pipeline.extract(&items)?;
        let rows = extraction.rows.len();
        let site_tables = pipeline.write_tables(extraction.rows)?;
        Ok(RunReport {
            images: inputs.len(),
            assignments: assignments.len(),
            gate,
            extracted_images: extraction.images,
            failed_images: extraction.failed.len(),
            rows,
            site_tables,
            ..RunReport::default()
        })
    }

    /// Every step end to end
    pub fn run(&self) -> PipelineResult<RunReport> {
        let session = Session::open(&self.config)?;
        session.pipeline(&self.config, &self.cancel)?.run()
    }
}
