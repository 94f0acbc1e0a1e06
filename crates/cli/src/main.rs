//! CLI entry point for rs-select.

use clap::Parser;
use cli::{init_tracing, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let output = cli.command.run()?;
    println!("{}", output.trim_end());
    Ok(())
}
