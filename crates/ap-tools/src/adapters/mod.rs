//! Adapters that present the apktool and uber-apk-signer jars behind the
//! [`ap_core::adapters`] boundary traits.

mod apktool;
mod signer;

pub use apktool::Apktool;
pub use signer::UberApkSigner;
