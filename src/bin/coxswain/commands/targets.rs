//! `coxswain targets` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::TargetsArgs;
use crate::commands::load_project;
use coxswain::SessionManager;

pub fn execute(project: Option<PathBuf>, args: TargetsArgs) -> Result<()> {
    let config = load_project(project)?;
    let manager = SessionManager::from_config(config);

    let targets = manager.targets().map_err(anyhow::Error::from)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    if targets.is_empty() {
        eprintln!("no targets discovered; run `coxswain configure` first");
        return Ok(());
    }
    for target in targets {
        println!("{} ({})", target.name, target.kind);
    }
    Ok(())
}
