//! Server-mode driver.
//!
//! Used for the tool generations between file-api and plain invocation.
//! Configure and build run the same way as every other mode; target
//! introspection asks the generator for its target listing via the `help`
//! meta-target after a successful configure.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

use anyhow::Result;
use regex::Regex;

use crate::diag::{BuildOutputConsumer, ConfigureOutputConsumer};
use crate::driver::invoker::CMakeInvoker;
use crate::driver::{
    BuildTarget, CommunicationMode, ConfigureRequest, Driver, ProgressEvent,
};
use crate::util::process::ProcessBuilder;

/// Makefile help listing: `... app (the default if no target is provided)`.
static HELP_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.\.\s+(\S+)").expect("help target pattern"));

/// Driver for the server-mode tool generation.
pub struct ServerApiDriver {
    invoker: CMakeInvoker,
    build_args: Vec<String>,
    targets: Mutex<Vec<BuildTarget>>,
}

impl ServerApiDriver {
    pub fn new(
        cmake: PathBuf,
        source_dir: PathBuf,
        binary_dir: PathBuf,
        build_args: Vec<String>,
    ) -> Self {
        ServerApiDriver {
            invoker: CMakeInvoker::new(cmake, source_dir, binary_dir),
            build_args,
            targets: Mutex::new(Vec::new()),
        }
    }

    fn discover_targets(&self) -> Vec<BuildTarget> {
        let output = ProcessBuilder::new(self.invoker.cmake_path())
            .arg("--build")
            .arg(self.invoker.binary_dir())
            .arg("--target")
            .arg("help")
            .exec();

        let listing = match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            _ => return builtin_targets(),
        };

        let targets: Vec<BuildTarget> = parse_help_listing(&listing);
        if targets.is_empty() {
            builtin_targets()
        } else {
            targets
        }
    }
}

fn parse_help_listing(listing: &str) -> Vec<BuildTarget> {
    listing
        .lines()
        .filter_map(|line| HELP_TARGET.captures(line))
        .map(|caps| BuildTarget {
            name: caps[1].to_string(),
            kind: "UNKNOWN".to_string(),
        })
        .collect()
}

fn builtin_targets() -> Vec<BuildTarget> {
    ["all", "clean"]
        .into_iter()
        .map(|name| BuildTarget {
            name: name.to_string(),
            kind: "UTILITY".to_string(),
        })
        .collect()
}

impl Driver for ServerApiDriver {
    fn communication_mode(&self) -> CommunicationMode {
        CommunicationMode::ServerApi
    }

    fn source_dir(&self) -> &Path {
        self.invoker.source_dir()
    }

    fn binary_dir(&self) -> &Path {
        self.invoker.binary_dir()
    }

    fn configure(
        &self,
        request: &ConfigureRequest,
        consumer: &mut ConfigureOutputConsumer,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<i32> {
        let code = self.invoker.run_configure(request, consumer, progress)?;
        if code == 0 {
            *self
                .targets
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = self.discover_targets();
        }
        Ok(code)
    }

    fn configure_command(&self, request: &ConfigureRequest) -> String {
        self.invoker.configure_command(request)
    }

    fn build(&self, targets: &[String], consumer: &mut BuildOutputConsumer) -> Result<i32> {
        self.invoker.run_build(targets, &self.build_args, consumer)
    }

    fn stop(&self) {
        self.invoker.stop();
    }

    fn targets(&self) -> Vec<BuildTarget> {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn shutdown(&self) -> Result<()> {
        self.invoker.stop();
        Ok(())
    }
}
