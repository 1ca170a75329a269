//! Coxswain CLI - drive CMake sessions and inspect their diagnostics

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("coxswain=debug")
    } else {
        EnvFilter::new("coxswain=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Configure(args) => commands::configure::execute(cli.project, args),
        Commands::Build(args) => commands::build::execute(cli.project, args),
        Commands::Targets(args) => commands::targets::execute(cli.project, args),
        Commands::Diagnose(args) => commands::diagnose::execute(cli.project, args),
        Commands::Doctor(args) => commands::doctor::execute(cli.project, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
