//! Run command
//!
//! Every step end to end: catalog, resolve, mask, gate, extract and
//! aggregate.

use clap::ArgMatches;
use log::info;

use crate::api::FirescarZonal;
use crate::commands::command_traits::Command;
use crate::commands::options::load_config;
use crate::errors::PipelineResult;
use crate::utils::logger::Logger;

/// Command for a complete pipeline run
pub struct RunCommand<'a> {
    api: FirescarZonal,
    logger: &'a Logger,
}

impl<'a> RunCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        Ok(RunCommand { api: FirescarZonal::new(load_config(args)?)?, logger })
    }
}

impl<'a> Command for RunCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let report = self.api.run()?;
        info!(
            "Run finished: {} row(s) in {} site table(s)",
            report.rows,
            report.site_tables.len()
        );
        self.logger.log_summary(&format!("Run of {}", self.api.config().product), &report.summary_entries())?;
        Ok(())
    }
}
