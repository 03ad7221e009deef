//! # stratum CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

mod commands;
mod logging;

use clap::Parser;

use crate::commands::{DetectArgs, DumpArgs, GetArgs};
use crate::logging::LogConfig;

/// Stratum policy inspector.
///
/// Detects policy file formats, dumps loaded policies and looks up values by
/// dotted path.
#[derive(Parser, Debug)]
#[command(name = "stratum", version, about)]
struct Cli {
    /// Log filter directive, overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Name the format of a policy file.
    Detect(DetectArgs),
    /// Load a policy file and print it.
    Dump(DumpArgs),
    /// Print the values stored at a path.
    Get(GetArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&LogConfig::from_flags(&cli.log_level, cli.log_json))?;

    let output = match &cli.command {
        Commands::Detect(args) => commands::detect(&args.file)?,
        Commands::Dump(args) => commands::dump(args)?,
        Commands::Get(args) => commands::get(args)?,
    };
    println!("{output}");

    Ok(())
}
