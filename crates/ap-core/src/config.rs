//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML. Every section defaults
//! sensibly so an empty file is valid; command-line flags override whatever
//! the file provides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Locations searched by [`Config::load_or_default`] when no path is given.
const DEFAULT_PATHS: &[&str] = &["./apkpatch.toml", "~/.config/apkpatch/config.toml"];

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub patch: PatchConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from `path`, or from the first default location
    /// that exists, or fall back to defaults.
    ///
    /// An explicitly given path must exist and parse.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in DEFAULT_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::debug!("Loading config from {}", candidate.display());
                return Self::load(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tools.timeout_secs == 0 {
            warnings.push("tools.timeout_secs is 0; every tool invocation will time out".into());
        }

        let jars = [
            ("tools.apktool_jar", &self.tools.apktool_jar),
            ("tools.uber_apk_signer_jar", &self.tools.uber_apk_signer_jar),
        ];
        for (key, jar) in jars {
            if let Some(path) = jar {
                if !path.exists() {
                    warnings.push(format!("{key} {} does not exist", path.display()));
                }
            }
        }

        warnings
    }
}

/// Paths to external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub java_path: Option<PathBuf>,
    pub apktool_jar: Option<PathBuf>,
    pub uber_apk_signer_jar: Option<PathBuf>,
    /// Framework directory handed to apktool; defaults to a directory inside
    /// the run's temporary workspace.
    pub framework_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    1800
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            java_path: None,
            apktool_jar: None,
            uber_apk_signer_jar: None,
            framework_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Patch run defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Pause after decoding so the operator can edit the decoded tree.
    pub wait: bool,
    /// Keep the temporary workspace after a successful run.
    pub keep_workspace: bool,
    #[serde(default = "default_true")]
    pub zipalign: bool,
    #[serde(default = "default_true")]
    pub debuggable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            wait: false,
            keep_workspace: false,
            zipalign: true,
            debuggable: true,
        }
    }
}
