//! Project configuration for Coxswain.
//!
//! Configuration lives in `.coxswain/config.toml` inside the project root:
//! a `[settings]` table for session behavior, plus the currently selected
//! `[kit]` and `[preset]` tables. Kit and preset files are produced by the
//! surrounding tooling; loading here is plain deserialization with no
//! schema validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level project configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Session settings
    pub settings: ProjectSettings,

    /// Selected kit, if any
    pub kit: Option<Kit>,

    /// Selected configure preset, if any
    pub preset: Option<ConfigurePreset>,
}

/// Session settings controlling how the driver talks to CMake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Source directory (defaults to the project root)
    pub source_dir: Option<PathBuf>,

    /// Binary directory (defaults to `<source>/build`)
    pub binary_dir: Option<PathBuf>,

    /// Explicit path to the cmake executable
    pub cmake_path: Option<PathBuf>,

    /// Generator override (e.g. "Ninja")
    pub generator: Option<String>,

    /// Communication mode override: "file-api", "server-api" or "legacy".
    /// Validated against tool capability at negotiation time; unrecognized
    /// values fall back to the best supported mode.
    pub communication_mode: Option<String>,

    /// Select the driver inputs from the preset instead of the kit
    pub use_presets: bool,

    /// Extra arguments appended to every configure invocation
    #[serde(default)]
    pub configure_args: Vec<String>,

    /// Extra arguments appended to every build invocation
    #[serde(default)]
    pub build_args: Vec<String>,

    /// Destination to copy `compile_commands.json` to after a successful
    /// configure
    pub copy_compile_commands: Option<PathBuf>,

    /// Vendor parsers to enable when resolving diagnostics; all built-in
    /// parsers are enabled when absent
    pub enabled_output_parsers: Option<Vec<String>>,

    /// User-supplied diagnostic matchers
    #[serde(default)]
    pub custom_diagnostics: Vec<CustomPatternConfig>,
}

/// A user-supplied diagnostic matcher.
///
/// Entries with a missing name or pattern are skipped when the parser set
/// is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPatternConfig {
    /// Name reported as the diagnostic source
    pub name: Option<String>,

    /// Regular expression with named capture groups (`file`, `line`,
    /// `column`, `severity`, `message`)
    pub pattern: Option<String>,
}

/// A toolchain kit: compilers plus generator and cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Kit {
    /// Kit display name
    pub name: String,

    /// Preferred generator for this kit
    pub generator: Option<String>,

    /// Language to compiler path map (keys "C", "CXX")
    #[serde(default)]
    pub compilers: BTreeMap<String, PathBuf>,

    /// Additional cache variables
    #[serde(default)]
    pub cache_variables: BTreeMap<String, String>,
}

impl Kit {
    /// Cache entries this kit contributes to a configure invocation.
    pub fn cache_entries(&self) -> BTreeMap<String, String> {
        let mut entries = self.cache_variables.clone();
        for (lang, path) in &self.compilers {
            entries.insert(
                format!("CMAKE_{}_COMPILER", lang),
                path.display().to_string(),
            );
        }
        entries
    }
}

/// A configure preset: a named bundle of configure inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurePreset {
    /// Preset name
    pub name: String,

    /// Generator for this preset
    pub generator: Option<String>,

    /// Binary directory for this preset
    pub binary_dir: Option<PathBuf>,

    /// Cache variables set by this preset
    #[serde(default)]
    pub cache_variables: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing
    /// or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config: {}", path.display()))
    }
}

/// Get the project config path (`.coxswain/config.toml`).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".coxswain").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = ProjectConfig::load_or_default(&tmp.path().join("config.toml"));
        assert!(config.kit.is_none());
        assert!(!config.settings.use_presets);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [settings]
            generator = "Ninja"
            communication_mode = "File-API"
            enabled_output_parsers = ["gcc", "gnu-ld"]

            [[settings.custom_diagnostics]]
            name = "lint"
            pattern = '^(?P<file>.+?)\|(?P<line>\d+)\|(?P<message>.+)$'

            [kit]
            name = "GCC 13"
            generator = "Unix Makefiles"

            [kit.compilers]
            C = "/usr/bin/gcc-13"
            CXX = "/usr/bin/g++-13"

            [kit.cache_variables]
            CMAKE_BUILD_TYPE = "Debug"
        "#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.settings.generator.as_deref(), Some("Ninja"));
        assert_eq!(config.settings.custom_diagnostics.len(), 1);

        let kit = config.kit.unwrap();
        let entries = kit.cache_entries();
        assert_eq!(entries["CMAKE_C_COMPILER"], "/usr/bin/gcc-13");
        assert_eq!(entries["CMAKE_CXX_COMPILER"], "/usr/bin/g++-13");
        assert_eq!(entries["CMAKE_BUILD_TYPE"], "Debug");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".coxswain/config.toml");

        let mut config = ProjectConfig::default();
        config.settings.generator = Some("Ninja".to_string());
        config.preset = Some(ConfigurePreset {
            name: "default".to_string(),
            ..Default::default()
        });
        config.save(&path).unwrap();

        let loaded = ProjectConfig::load(&path).unwrap();
        assert_eq!(loaded.settings.generator.as_deref(), Some("Ninja"));
        assert_eq!(loaded.preset.unwrap().name, "default");
    }
}
