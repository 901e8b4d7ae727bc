//! Catalog command
//!
//! Scans the scene root (and fire-scar root for masked products) and
//! writes the product's image list.

use clap::ArgMatches;
use log::info;

use crate::api::FirescarZonal;
use crate::commands::command_traits::Command;
use crate::commands::options::load_config;
use crate::errors::PipelineResult;
use crate::utils::logger::Logger;

/// Command for cataloguing product and fire-scar rasters
pub struct CatalogCommand<'a> {
    api: FirescarZonal,
    logger: &'a Logger,
}

impl<'a> CatalogCommand<'a> {
    /// Create a new catalog command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `logger` - Logger for recording the run summary
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        Ok(CatalogCommand { api: FirescarZonal::new(load_config(args)?)?, logger })
    }
}

impl<'a> Command for CatalogCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let config = self.api.config();
        info!("Cataloguing {} under {}", config.product, config.scene_root.display());
        let catalog = self.api.catalog()?;

        let mut years: Vec<i32> = catalog.images.iter().map(|i| i.year).collect();
        years.sort_unstable();
        let span = match (years.first(), years.last()) {
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => "none".to_string(),
        };
        self.logger.log_summary(
            &format!("Catalog of {}", config.product),
            &[
                ("images", catalog.images.len().to_string()),
                ("fire-scar rasters", catalog.fire_scars.len().to_string()),
                ("years", span),
            ],
        )?;
        Ok(())
    }
}
