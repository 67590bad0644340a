//! docpub - clean, rebuild and force-publish cargo documentation.

mod cli;
mod core;
mod error;
mod logger;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;

fn main() {
    if let Err(err) = run() {
        log!("error"; "{err:#}");
        std::process::exit(error::exit_code(&err));
    }
}

fn run() -> Result<()> {
    // Install the Ctrl+C handler before any step can create the scoped
    // repository, so interrupt cleanup is armed for the whole run.
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    cli::publish::run()
}
