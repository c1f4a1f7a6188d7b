//! # ap-patch
//!
//! Rewrites applied to an apktool-decoded tree so the rebuilt app accepts a
//! user-installed CA:
//!
//! - [`ManifestRewriter`] points `<application>` at a network security
//!   config and reports whether the APK is part of an app bundle.
//! - [`NetworkConfigWriter`] replaces that config with one trusting user
//!   certificates.
//! - [`PinningPatcher`] neuters `X509TrustManager` implementations in the
//!   smali code.

pub mod manifest;
pub mod netsec;
pub mod pinning;

pub use manifest::{rewrite_manifest, ManifestRewriter, DEFAULT_NSC_NAME};
pub use netsec::{NetworkConfigWriter, PERMISSIVE_CONFIG};
pub use pinning::{patch_smali, PinningPatcher};
