//! Zonal command
//!
//! Gates tiles, extracts per-site statistics from rasters already on disk
//! and writes one table per site.

use clap::ArgMatches;

use crate::api::FirescarZonal;
use crate::commands::command_traits::Command;
use crate::commands::options::load_config;
use crate::errors::PipelineResult;
use crate::utils::logger::Logger;

/// Command for zonal statistics extraction
pub struct ZonalCommand<'a> {
    api: FirescarZonal,
    logger: &'a Logger,
}

impl<'a> ZonalCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        Ok(ZonalCommand { api: FirescarZonal::new(load_config(args)?)?, logger })
    }
}

impl<'a> Command for ZonalCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let report = self.api.zonal()?;
        self.logger.log_summary(
            &format!("Zonal statistics of {}", self.api.config().product),
            &report.summary_entries(),
        )?;
        Ok(())
    }
}
