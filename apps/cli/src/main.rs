//! archmap CLI — architecture metadata extraction and diagram pipeline.
//!
//! Aggregates extractor-produced IR fragments into one model and drives the
//! generate/render/docs stages over it.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
