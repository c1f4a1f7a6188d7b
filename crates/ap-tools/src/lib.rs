//! # ap-tools
//!
//! External tool management for apkpatch.
//!
//! This crate provides:
//!
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support that either captures output or streams it line by line.
//! - **Tool discovery** ([`ToolRegistry`]) -- find `java`, the apktool jar
//!   and the uber-apk-signer jar.
//! - **Adapters** ([`Apktool`], [`UberApkSigner`]) -- the decode/encode and
//!   sign operations behind the `ap-core` boundary traits.
//! - **Workspace management** ([`Workspace`], [`Layout`]) -- the locked
//!   temporary directory of a run and the paths inside it.

pub mod adapters;
pub mod command;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use adapters::{Apktool, UberApkSigner};
pub use command::{ToolCommand, ToolOutput};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{Layout, Workspace};
