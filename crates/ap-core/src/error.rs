//! Unified error type for apkpatch.
//!
//! Every library crate funnels its failures into [`Error`]. The pipeline
//! runner wraps whatever a step returned in [`Error::Step`] so the caller
//! always learns which step aborted the run.

use std::path::Path;

/// Unified error type covering all failure modes in apkpatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (java, apktool, uber-apk-signer) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rewriting a file in the decoded tree failed.
    #[error("Patch error [{target}]: {message}")]
    Patch {
        /// The file or resource being rewritten.
        target: String,
        /// Human-readable error description.
        message: String,
    },

    /// A pipeline step failed and aborted the run.
    #[error("Step failed [{step}]: {source}")]
    Step {
        /// Title of the step that failed.
        step: String,
        /// The error the step's action produced.
        #[source]
        source: Box<Error>,
    },

    /// The operator interrupted the run from the terminal.
    #[error("Interrupted")]
    Interrupted,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Patch`] targeting a file.
    pub fn patch(target: &Path, message: impl Into<String>) -> Self {
        Error::Patch {
            target: target.display().to_string(),
            message: message.into(),
        }
    }

    /// Wrap `source` as the failure of the step titled `step`.
    ///
    /// A failure inside a sub-pipeline is wrapped once per enclosing step, so
    /// the outermost title is the step of the top-level plan that aborted.
    pub fn step(step: impl Into<String>, source: Error) -> Self {
        Error::Step {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Title of the failing step, if this is a step failure.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Error::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_display() {
        let err = Error::tool("apktool", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [apktool]: exit code 1");
    }

    #[test]
    fn patch_display() {
        let err = Error::patch(Path::new("/tmp/AndroidManifest.xml"), "no <application>");
        assert_eq!(
            err.to_string(),
            "Patch error [/tmp/AndroidManifest.xml]: no <application>"
        );
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn step_wraps_source() {
        let err = Error::step("Signing patched APK file", Error::tool("java", "boom"));
        assert_eq!(err.failed_step(), Some("Signing patched APK file"));
        assert_eq!(
            err.to_string(),
            "Step failed [Signing patched APK file]: Tool error [java]: boom"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Tool error [java]: boom"));
    }

    #[test]
    fn nested_step_reports_outer_title() {
        let inner = Error::step("Encoding using AAPT [fallback]", Error::tool("apktool", "x"));
        let outer = Error::step("Encoding patched APK file", inner);
        assert_eq!(outer.failed_step(), Some("Encoding patched APK file"));
        assert!(outer.to_string().contains("[Encoding using AAPT [fallback]]"));
    }

    #[test]
    fn failed_step_none_for_plain_errors() {
        assert_eq!(Error::Interrupted.failed_step(), None);
        assert_eq!(Error::Internal("x".into()).failed_step(), None);
    }
}
