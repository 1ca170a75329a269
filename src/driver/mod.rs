//! Driver layer: live sessions with the CMake process.
//!
//! A [`Driver`] represents one live connection to the tool over a
//! negotiated communication mode. Drivers are created, replaced and torn
//! down exclusively by the [`session::SessionManager`]; callers never
//! construct one directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::diag::{BuildOutputConsumer, ConfigureOutputConsumer};

pub mod capabilities;
pub mod file_api;
pub mod invoker;
pub mod legacy;
pub mod server_api;
pub mod session;

pub use capabilities::{CommunicationMode, ToolCapabilities};
pub use session::{ConfigureType, SessionError, SessionManager};

/// A raw progress report from the tool: `current` within `[minimum, maximum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub current: u32,
    pub minimum: u32,
    pub maximum: u32,
}

impl ProgressEvent {
    pub fn new(current: u32, minimum: u32, maximum: u32) -> Self {
        ProgressEvent {
            current,
            minimum,
            maximum,
        }
    }
}

/// A build target discovered from the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    /// Target name as passed to `--target`
    pub name: String,

    /// Target kind reported by the tool (e.g. `EXECUTABLE`, `STATIC_LIBRARY`,
    /// `UTILITY`)
    pub kind: String,
}

/// Inputs to one configure invocation.
#[derive(Debug, Clone, Default)]
pub struct ConfigureRequest {
    /// Generator to pass with `-G`; `None` reuses whatever the cache holds
    pub generator: Option<String>,

    /// Cache variables passed as `-D` definitions
    pub cache_variables: BTreeMap<String, String>,

    /// Extra arguments appended verbatim
    pub extra_args: Vec<String>,

    /// Replay cached settings only: suppress generator and definition
    /// arguments so the tool re-runs from its existing cache
    pub cache_only: bool,
}

/// One live session with the build tool.
///
/// Methods take `&self`; implementations use interior mutability so a
/// session can be shared behind an `Arc` while remaining cancellable.
pub trait Driver: Send + Sync {
    /// The wire protocol this driver was created for.
    fn communication_mode(&self) -> CommunicationMode;

    /// Source tree root.
    fn source_dir(&self) -> &Path;

    /// Build tree root.
    fn binary_dir(&self) -> &Path;

    /// Path to the tool's cache file inside the binary directory.
    fn cache_path(&self) -> PathBuf {
        self.binary_dir().join("CMakeCache.txt")
    }

    /// Run a configure pass, streaming output through `consumer` and
    /// reporting raw progress events. Returns the tool's exit code.
    fn configure(
        &self,
        request: &ConfigureRequest,
        consumer: &mut ConfigureOutputConsumer,
        progress: &dyn Fn(ProgressEvent),
    ) -> Result<i32>;

    /// The command line a configure pass would run, for display.
    fn configure_command(&self, request: &ConfigureRequest) -> String;

    /// Build the given targets (empty list builds the default target),
    /// streaming output through `consumer`. Returns the tool's exit code.
    fn build(&self, targets: &[String], consumer: &mut BuildOutputConsumer) -> Result<i32>;

    /// Terminate any in-flight tool process. The driver itself stays
    /// usable; a cancelled build does not tear the session down.
    fn stop(&self);

    /// Build targets discovered by the most recent successful configure.
    fn targets(&self) -> Vec<BuildTarget>;

    /// Release resources held by the session before it is dropped.
    fn shutdown(&self) -> Result<()>;
}
