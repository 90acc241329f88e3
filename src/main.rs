//! @dose
//! purpose: This is the CLI entry point for apidoctool. It parses command-line arguments using
//!     clap, installs the tracing subscriber, loads apidoctool.toml and dispatches to the
//!     handler of the chosen action.
//!
//! when-editing:
//!     - !The root directory defaults to current working directory if not specified
//!     - Error messages are printed to stderr and exit with code 1
//!
//! invariants:
//!     - One and only one subcommand is always executed per invocation
//!     - The process exits with 0 on success, 1 on any error; warnings never change it
//!
//! do-not:
//!     - Never add business logic here - delegate to command modules
//!
//! gotchas:
//!     - APIDOCTOOL_LOG overrides the level chosen by --verbose/--quiet

use anyhow::{bail, Context};
use apidoctool::cli::{Cli, Commands};
use apidoctool::commands::{
    resolve_path, run_code_to_json, run_code_to_xml, run_sort_xml, run_xml_to_code,
};
use apidoctool::config::Config;
use clap::Parser;
use std::env;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("APIDOCTOOL_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    // Determine root directory
    let root = match cli.root {
        Some(root) => root,
        None => env::current_dir().context("Failed to get current directory")?,
    };

    let config = match &cli.config {
        Some(path) => {
            let path = resolve_path(&root, path);
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            Config::load_file(&path)
        }
        None => Config::load(&root),
    };

    match cli.command {
        Commands::CodeToXml(args) => run_code_to_xml(&args, &root, &config),
        Commands::XmlToCode(args) => run_xml_to_code(&args, &root, &config),
        Commands::SortXml(args) => run_sort_xml(&args, &root),
        Commands::CodeToJson(args) => run_code_to_json(&args, &root, &config),
    }
}
