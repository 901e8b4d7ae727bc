//! Mask command
//!
//! Catalogues the product's scenes and writes a fire-masked copy of each
//! one that has a fire-scar raster for its year.

use clap::ArgMatches;

use crate::api::FirescarZonal;
use crate::commands::command_traits::Command;
use crate::commands::options::load_config;
use crate::errors::PipelineResult;
use crate::utils::logger::Logger;

/// Command for fire-masking scenes
pub struct MaskCommand<'a> {
    api: FirescarZonal,
    logger: &'a Logger,
}

impl<'a> MaskCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        let api = FirescarZonal::new(load_config(args)?)?;
        api.config().product_definition()?.mask_tags()?;
        Ok(MaskCommand { api, logger })
    }
}

impl<'a> Command for MaskCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let summary = self.api.mask()?;
        self.logger.log_summary(
            &format!("Fire masking of {}", self.api.config().product),
            &[
                ("masked", summary.masked.len().to_string()),
                ("already masked", summary.skipped.len().to_string()),
                ("unmatched", summary.unmatched.len().to_string()),
                ("alignment failures", summary.alignment_failed.len().to_string()),
                ("failures", summary.failed.len().to_string()),
            ],
        )?;
        Ok(())
    }
}
