//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Coxswain - A CMake session driver and diagnostics engine
#[derive(Parser)]
#[command(name = "coxswain")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root containing .coxswain/config.toml (defaults to the
    /// current directory)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the project
    Configure(ConfigureArgs),

    /// Build targets
    Build(BuildArgs),

    /// List build targets discovered from the tool
    Targets(TargetsArgs),

    /// Parse a saved tool log into resolved diagnostics
    Diagnose(DiagnoseArgs),

    /// Report tool availability and the negotiated communication mode
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ConfigureArgs {
    /// Delete the cache and configure from scratch
    #[arg(long)]
    pub clean: bool,

    /// Replay cached settings only
    #[arg(long, conflicts_with = "clean")]
    pub cache_only: bool,

    /// Print the configure command instead of running it
    #[arg(long)]
    pub show_command: bool,

    /// Extra arguments passed to the tool (e.g. -DVAR=VALUE)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Targets to build (default target when omitted)
    pub targets: Vec<String>,
}

#[derive(Args)]
pub struct TargetsArgs {
    /// Emit the target list as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DiagnoseArgs {
    /// Log file to parse
    pub log: PathBuf,

    /// Treat the log as configure-stage output
    #[arg(long)]
    pub configure: bool,

    /// Base directories for file resolution, in priority order
    #[arg(long = "base-path")]
    pub base_paths: Vec<PathBuf>,

    /// Vendor parsers to enable (default: all)
    #[arg(long = "parser")]
    pub parsers: Vec<String>,

    /// Emit diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DoctorArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
