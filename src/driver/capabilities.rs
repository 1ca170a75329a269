//! Tool capability probing and communication-mode negotiation.
//!
//! The richest protocol the installed CMake supports wins unless the user
//! pinned a mode explicitly; a pinned mode the tool cannot honor is
//! downgraded with a warning rather than failing the session.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::util::process::ProcessBuilder;

/// Wire protocol used to talk to the tool, richest to weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicationMode {
    /// File-based API: query/reply JSON under `.cmake/api/v1`
    FileApi,
    /// Long-running server mode
    ServerApi,
    /// Plain text invocation only
    Legacy,
}

impl CommunicationMode {
    /// Get the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationMode::FileApi => "file-api",
            CommunicationMode::ServerApi => "server-api",
            CommunicationMode::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CommunicationMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file-api" => Ok(CommunicationMode::FileApi),
            "server-api" => Ok(CommunicationMode::ServerApi),
            "legacy" => Ok(CommunicationMode::Legacy),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid communication mode.
#[derive(Debug, Clone)]
pub struct ModeParseError(pub String);

impl std::fmt::Display for ModeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid communication mode '{}', valid values: file-api, server-api, legacy",
            self.0
        )
    }
}

impl std::error::Error for ModeParseError {}

/// Versions below this produce a warning but are still driven.
pub fn minimum_supported_version() -> Version {
    Version::new(3, 10, 0)
}

/// What the installed tool can do, as probed from `cmake --version`.
#[derive(Debug, Clone, Default)]
pub struct ToolCapabilities {
    /// Detected version; `None` when the version line was unparsable
    pub version: Option<Version>,
}

impl ToolCapabilities {
    /// Whether a communication mode is supported by this tool.
    pub fn supports(&self, mode: CommunicationMode) -> bool {
        let Some(version) = &self.version else {
            // An unidentifiable tool only gets the plain invocation path.
            return mode == CommunicationMode::Legacy;
        };
        match mode {
            CommunicationMode::Legacy => true,
            CommunicationMode::FileApi => *version >= Version::new(3, 14, 0),
            CommunicationMode::ServerApi => {
                *version >= Version::new(3, 7, 0) && *version < Version::new(3, 20, 0)
            }
        }
    }

    /// The richest supported mode.
    pub fn best_mode(&self) -> CommunicationMode {
        [CommunicationMode::FileApi, CommunicationMode::ServerApi]
            .into_iter()
            .find(|mode| self.supports(*mode))
            .unwrap_or(CommunicationMode::Legacy)
    }

    /// Whether the detected version falls below the supported minimum.
    pub fn below_minimum(&self) -> bool {
        self.version
            .as_ref()
            .map(|v| *v < minimum_supported_version())
            .unwrap_or(false)
    }
}

static VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cmake version (\d+)\.(\d+)\.(\d+)").expect("version pattern"));

/// Parse a version out of `cmake --version` output.
pub fn parse_version_output(text: &str) -> Option<Version> {
    let caps = VERSION_LINE.captures(text)?;
    Some(Version::new(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

/// Probe the tool for its capabilities by running `--version`.
pub fn probe(cmake: &Path) -> Result<ToolCapabilities> {
    let output = ProcessBuilder::new(cmake)
        .arg("--version")
        .exec()
        .with_context(|| format!("failed to run `{} --version`", cmake.display()))?;

    if !output.status.success() {
        bail!("`{} --version` exited with {:?}", cmake.display(), output.status.code());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version_output(&stdout);
    if version.is_none() {
        tracing::warn!(
            "could not parse a version from `{} --version`; assuming legacy mode only",
            cmake.display()
        );
    }

    Ok(ToolCapabilities { version })
}

/// Pick the communication mode for a session.
///
/// An explicit request wins when the tool supports it; otherwise the
/// richest supported mode is used and the downgrade is logged.
pub fn negotiate(
    caps: &ToolCapabilities,
    requested: Option<CommunicationMode>,
) -> CommunicationMode {
    let best = caps.best_mode();
    match requested {
        Some(mode) if caps.supports(mode) => mode,
        Some(mode) => {
            tracing::warn!(
                "communication mode '{}' is not supported by this cmake, using '{}'",
                mode,
                best
            );
            best
        }
        None => best,
    }
}

/// Parse the raw configuration value for the mode override.
///
/// Unrecognized or absent values mean "best supported", logged at parse
/// time so negotiation stays pure.
pub fn parse_mode_setting(raw: Option<&str>) -> Option<CommunicationMode> {
    let raw = raw?;
    match raw.parse::<CommunicationMode>() {
        Ok(mode) => Some(mode),
        Err(e) => {
            tracing::warn!("{}; using best supported mode", e);
            None
        }
    }
}
