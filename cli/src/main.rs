mod cli;
mod commands;

use clap::{Parser, error::ErrorKind};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use commands::create;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => err.exit(),
        Err(err) => {
            // a missing or malformed argument is a usage error with exit status 1
            let _ = err.print();
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose);
    create::run(&cli)
}

fn main() -> anyhow::Result<()> { run() }
