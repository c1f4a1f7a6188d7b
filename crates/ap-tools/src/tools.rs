//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the tools a
//! patch run needs (a `java` runtime, the apktool jar and the
//! uber-apk-signer jar) and builds `java -jar` invocations for them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ap_core::config::ToolsConfig;
use ap_core::{Error, Result, Toolchain};
use async_trait::async_trait;
use serde::Serialize;

use crate::command::ToolCommand;

pub const JAVA: &str = "java";
pub const APKTOOL: &str = "apktool";
pub const UBER_APK_SIGNER: &str = "uber-apk-signer";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[JAVA, APKTOOL, UBER_APK_SIGNER];

/// Configuration for a single external tool.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "apktool").
    pub name: String,
    /// Resolved path to the executable or jar.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    pub timeout: Duration,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
///
/// Serialized as-is by `apkpatch check-tools --json`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of the version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable or jar.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools from the config, falling back to well-known locations.
    ///
    /// `java` is looked up in `PATH` via [`which::which`] unless the config
    /// supplies an existing path. The jars are taken from the config when the
    /// configured file exists, otherwise `apktool.jar` and
    /// `uber-apk-signer.jar` are searched for in the current directory and
    /// next to the running executable. Tools that are not found are omitted.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let timeout = Duration::from_secs(tools_config.timeout_secs);
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let resolved = match name {
                JAVA => existing(tools_config.java_path.as_deref())
                    .or_else(|| which::which(JAVA).ok()),
                APKTOOL => existing(tools_config.apktool_jar.as_deref())
                    .or_else(|| find_jar("apktool.jar")),
                UBER_APK_SIGNER => existing(tools_config.uber_apk_signer_jar.as_deref())
                    .or_else(|| find_jar("uber-apk-signer.jar")),
                _ => None,
            };

            if let Some(path) = resolved {
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                        timeout,
                    },
                );
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit tool configs.
    pub fn from_tools(configs: impl IntoIterator<Item = ToolConfig>) -> Self {
        Self {
            tools: configs.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or an
    /// [`Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            Error::tool(name, format!("{name} not found; is it installed or configured?"))
        })
    }

    /// A `java -jar <jar>` command for the jar-based tool `name`.
    pub fn java_jar(&self, name: &str) -> Result<ToolCommand> {
        let java = self.require(JAVA)?;
        let jar = self.require(name)?;

        let mut cmd = ToolCommand::new(java.path.clone());
        cmd.timeout(jar.timeout);
        cmd.arg("-jar").arg(jar.path.to_string_lossy());
        Ok(cmd)
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        let java = self.tools.get(JAVA).map(|c| c.path.as_path());

        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(name, &cfg.path, java),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

#[async_trait]
impl Toolchain for ToolRegistry {
    async fn verify(&self) -> Result<String> {
        let mut found = Vec::with_capacity(KNOWN_TOOLS.len());
        for &name in KNOWN_TOOLS {
            let cfg = self.require(name)?;
            found.push(format!("{name}: {}", cfg.path.display()));
        }
        Ok(found.join(", "))
    }
}

fn existing(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|p| p.exists()).map(Path::to_path_buf)
}

fn find_jar(file_name: &str) -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.into_iter()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Run the tool's version command and return the first line it prints.
///
/// `java -version` writes to stderr; the jars print to stdout.
fn detect_version(name: &str, path: &Path, java: Option<&Path>) -> Option<String> {
    let output = match name {
        JAVA => std::process::Command::new(path).arg("-version").output().ok()?,
        _ => std::process::Command::new(java?)
            .arg("-jar")
            .arg(path)
            .arg("--version")
            .output()
            .ok()?,
    };

    if !output.status.success() {
        return None;
    }

    let text = if output.stdout.is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    String::from_utf8_lossy(text)
        .lines()
        .next()
        .map(|s| s.trim().to_string())
}
