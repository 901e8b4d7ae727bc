//! Command pattern interfaces
//!
//! Each subcommand is a `Command` built by a `CommandFactory` from the
//! parsed arguments, so `main` only parses, builds and executes.

use crate::errors::PipelineResult;
use crate::utils::logger::Logger;

/// One pipeline step invoked from the command line
pub trait Command {
    /// Run the step
    ///
    /// # Returns
    /// `Ok(())` once the step's outputs and audit lists are written
    fn execute(&self) -> PipelineResult<()>;
}

/// Builds the command matching the chosen subcommand
pub trait CommandFactory<'a> {
    /// Create the command for `args`
    ///
    /// # Arguments
    /// * `args` - Top-level matches from clap
    /// * `logger` - Run-summary logger borrowed by the command
    ///
    /// # Returns
    /// The boxed command, or an error when its configuration is invalid
    fn create_command(&self, args: &clap::ArgMatches, logger: &'a Logger) -> PipelineResult<Box<dyn Command + 'a>>;
}
