//! CLI command implementations
//!
//! This module contains implementations of the subcommands
//! supported by the CLI application using the Command pattern.

pub mod command_traits;
pub mod options;
pub mod catalog_command;
pub mod resolve_command;
pub mod mask_command;
pub mod zonal_command;
pub mod run_command;

pub use command_traits::{Command, CommandFactory};
pub use catalog_command::CatalogCommand;
pub use resolve_command::ResolveCommand;
pub use mask_command::MaskCommand;
pub use zonal_command::ZonalCommand;
pub use run_command::RunCommand;
pub use options::{global_args, load_config};

use clap::ArgMatches;
use crate::errors::{PipelineError, PipelineResult};
use crate::utils::logger::Logger;

/// Factory for creating command instances based on CLI arguments
///
/// This factory examines the chosen subcommand and creates
/// the appropriate command instance for execution.
pub struct FirescarCommandFactory;

impl FirescarCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        FirescarCommandFactory
    }
}

impl Default for FirescarCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CommandFactory<'a> for FirescarCommandFactory {
    fn create_command(&self, args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Box<dyn Command + 'a>> {
        match args.subcommand() {
            Some(("catalog", sub)) => Ok(Box::new(CatalogCommand::new(sub, logger)?)),
            Some(("resolve", sub)) => Ok(Box::new(ResolveCommand::new(sub, logger)?)),
            Some(("mask", sub)) => Ok(Box::new(MaskCommand::new(sub, logger)?)),
            Some(("zonal", sub)) => Ok(Box::new(ZonalCommand::new(sub, logger)?)),
            Some(("run", sub)) => Ok(Box::new(RunCommand::new(sub, logger)?)),
            Some((other, _)) => Err(PipelineError::InvalidInput(format!("unknown command '{}'", other))),
            None => Err(PipelineError::InvalidInput("no command given".to_string())),
        }
    }
}
