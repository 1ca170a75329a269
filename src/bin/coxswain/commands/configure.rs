//! `coxswain configure` command

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::cli::ConfigureArgs;
use crate::commands::{load_project, print_diagnostics, summarize_diagnostics};
use coxswain::{ConfigureType, SessionManager};

pub fn execute(project: Option<PathBuf>, args: ConfigureArgs) -> Result<()> {
    let config = load_project(project)?;
    let manager = SessionManager::from_config(config);

    if args.show_command {
        println!("{}", manager.configure_command(&args.args)?);
        return Ok(());
    }

    let configure_type = if args.clean {
        ConfigureType::Clean
    } else if args.cache_only {
        ConfigureType::Cache
    } else {
        ConfigureType::Normal
    };

    let code = manager.configure(configure_type, &args.args)?;

    let diagnostics = manager.configure_diagnostics();
    print_diagnostics(&diagnostics);
    if !diagnostics.is_empty() {
        eprintln!("{}", summarize_diagnostics(&diagnostics));
    }

    if code != 0 {
        bail!("configure failed with exit code {}", code);
    }
    Ok(())
}
