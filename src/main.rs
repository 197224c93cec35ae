//! dynsyn CLI binary.

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use dynamic_synonym::cli::args::*;
use dynamic_synonym::cli::commands::*;

fn main() -> anyhow::Result<()> {
    let args = DynsynArgs::parse();

    let log_level = match args.verbosity() {
        0 => LevelFilter::Error, // Quiet mode
        1 => LevelFilter::Warn,  // Default
        2 => LevelFilter::Info,  // Verbose
        _ => LevelFilter::Debug, // Very verbose (3+)
    };

    Builder::new()
        .filter_level(log_level)
        .parse_env("DYNSYN_LOG")
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    let command = args.command.name();
    execute_command(args).with_context(|| format!("dynsyn {command} failed"))
}
