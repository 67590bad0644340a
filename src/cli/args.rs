//! Command-line interface definitions.
//!
//! The publisher takes no positional arguments and no subcommands:
//! running `docpub` with zero parameters performs the full
//! clean/build/publish sequence. The flags below only tune output.

use clap::{ColorChoice, Parser};

/// docpub documentation publisher CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
