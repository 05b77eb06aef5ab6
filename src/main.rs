//! CLI entry point for the urban growth model

use clap::Parser;
use sprawl::io::cli::{Cli, ScenarioRunner};

fn main() -> sprawl::Result<()> {
    let cli = Cli::parse();
    ScenarioRunner::new(cli).run()
}
