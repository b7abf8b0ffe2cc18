//! The main entry point for the program.
use anyhow::Result;
use human_panic::setup_panic;
use osprey::commands::run_cli;

fn main() -> Result<()> {
    setup_panic!();
    run_cli()
}
