//! Coxswain - A CMake session driver and diagnostics engine
//!
//! This crate drives CMake on behalf of an interactive client: it owns at
//! most one live session per project, negotiates the richest communication
//! mode the installed tool supports, serializes configure/build access,
//! and turns compiler/linker/CMake output into structured, file-resolved
//! diagnostics.

pub mod diag;
pub mod driver;
pub mod util;

pub use diag::{
    BuildOutputConsumer, CompileOutputConsumer, ConfigureOutputConsumer, RawDiagnostic,
    ResolvedDiagnostic, Severity,
};
pub use driver::{
    BuildTarget, CommunicationMode, ConfigureType, Driver, SessionError, SessionManager,
};
pub use util::config::{ConfigurePreset, Kit, ProjectConfig, ProjectSettings};
