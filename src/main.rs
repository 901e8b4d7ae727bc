use clap::Command as ClapCommand;
use std::process;
use log::error;

use firescar_zonal::utils::logger::Logger;
use firescar_zonal::commands::{global_args, load_config, CommandFactory, FirescarCommandFactory};

fn main() {
    let matches = ClapCommand::new("firescar-zonal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fire-scar masking and per-site zonal statistics for raster time series")
        .args(global_args())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(ClapCommand::new("catalog").about("Catalogue scenes and fire-scar rasters"))
        .subcommand(ClapCommand::new("resolve").about("Assign sites to buffered tiles"))
        .subcommand(ClapCommand::new("mask").about("Write fire-masked copies of every scene"))
        .subcommand(ClapCommand::new("zonal").about("Gate tiles and extract per-site statistics"))
        .subcommand(ClapCommand::new("run").about("Run every step end to end"))
        .get_matches();

    let sub_matches = match matches.subcommand() {
        Some((_, sub)) => sub,
        None => {
            eprintln!("Error: no command given");
            process::exit(1);
        }
    };

    let config = match load_config(sub_matches) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let level = match config.log_level_filter() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = Logger::init_global_logger(&config.log_file, level) {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    let logger = match Logger::new(&config.export_dir.join("run_summary.log")) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error initializing logger: {}", e);
            process::exit(1);
        }
    };

    let factory = FirescarCommandFactory::new();

    let command_result = factory.create_command(&matches, &logger);
    match command_result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}
