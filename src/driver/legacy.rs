//! Legacy text-only driver.
//!
//! The weakest communication mode: plain invocations with no target
//! introspection beyond the generator's built-in meta-targets.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::diag::{BuildOutputConsumer, ConfigureOutputConsumer};
use crate::driver::invoker::CMakeInvoker;
use crate::driver::{
    BuildTarget, CommunicationMode, ConfigureRequest, Driver, ProgressEvent,
};

/// Driver for tools that offer no structured introspection.
pub struct LegacyDriver {
    invoker: CMakeInvoker,
    build_args: Vec<String>,
}

impl LegacyDriver {
    pub fn new(
        cmake: PathBuf,
        source_dir: PathBuf,
        binary_dir: PathBuf,
        build_args: Vec<String>,
    ) -> Self {
        LegacyDriver {
            invoker: CMakeInvoker::new(cmake, source_dir, binary_dir),
            build_args,
        }
    }
}

impl Driver for LegacyDriver {
    fn communication_mode(&self) -> CommunicationMode {
        CommunicationMode::Legacy
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
        self.invoker.run_configure(request, consumer, progress)
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
        ["all", "clean"]
            .into_iter()
            .map(|name| BuildTarget {
                name: name.to_string(),
                kind: "UTILITY".to_string(),
            })
            .collect()
    }

    fn shutdown(&self) -> Result<()> {
        self.invoker.stop();
        Ok(())
    }
}
