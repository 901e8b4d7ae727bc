//! Resolve command
//!
//! Assigns every site to at most one buffered tile and writes the
//! site/tile identity table.

use clap::ArgMatches;
use log::info;
use std::collections::BTreeSet;

use crate::api::FirescarZonal;
use crate::commands::command_traits::Command;
use crate::commands::options::load_config;
use crate::errors::PipelineResult;
use crate::utils::logger::Logger;

/// Command for resolving sites to tiles
pub struct ResolveCommand<'a> {
    api: FirescarZonal,
    logger: &'a Logger,
}

impl<'a> ResolveCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        Ok(ResolveCommand { api: FirescarZonal::new(load_config(args)?)?, logger })
    }
}

impl<'a> Command for ResolveCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let assignments = self.api.resolve()?;
        let tiles: BTreeSet<&str> = assignments.iter().map(|a| a.tile.as_str()).collect();
        info!("{} site(s) resolved onto {} tile(s)", assignments.len(), tiles.len());
        self.logger.log_summary(
            "Site/tile assignment",
            &[
                ("sites", assignments.len().to_string()),
                ("tiles", tiles.into_iter().collect::<Vec<_>>().join(" ")),
            ],
        )?;
        Ok(())
    }
}
