//! `coxswain doctor` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::DoctorArgs;
use crate::commands::load_project;
use coxswain::driver::capabilities::{
    minimum_supported_version, negotiate, parse_mode_setting, probe, CommunicationMode,
};
use coxswain::util::process::find_cmake;

pub fn execute(project: Option<PathBuf>, _args: DoctorArgs) -> Result<()> {
    let config = load_project(project)?;

    let cmake = config.settings.cmake_path.clone().or_else(find_cmake);
    let Some(cmake) = cmake else {
        println!("cmake:        not found");
        println!();
        println!("Install CMake or set `cmake_path` in .coxswain/config.toml");
        std::process::exit(1);
    };
    println!("cmake:        {}", cmake.display());

    let caps = match probe(&cmake) {
        Ok(caps) => caps,
        Err(e) => {
            println!("version:      unavailable ({})", e);
            std::process::exit(1);
        }
    };

    match &caps.version {
        Some(version) => {
            println!("version:      {}", version);
            if caps.below_minimum() {
                println!(
                    "              (older than the supported minimum {})",
                    minimum_supported_version()
                );
            }
        }
        None => println!("version:      unrecognized output"),
    }

    for mode in [
        CommunicationMode::FileApi,
        CommunicationMode::ServerApi,
        CommunicationMode::Legacy,
    ] {
        let supported = if caps.supports(mode) { "yes" } else { "no" };
        println!("{:<13} {}", format!("{}:", mode), supported);
    }

    let requested = parse_mode_setting(config.settings.communication_mode.as_deref());
    println!("negotiated:   {}", negotiate(&caps, requested));

    Ok(())
}
