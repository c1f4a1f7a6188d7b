//! ap-core: shared errors, configuration, progress events and the boundary
//! traits for external tools.
//!
//! This crate is the foundational dependency for the other ap-* crates.

pub mod adapters;
pub mod config;
pub mod error;
pub mod events;
pub mod stream;

// Re-export the most commonly used items at the crate root.
pub use adapters::{
    ApkCodec, ApkSigner, CertificatePinningPatcher, ManifestInfo, ManifestPatcher,
    NetworkConfigPatcher, Toolchain,
};
pub use error::{Error, Result};
pub use events::{PipelineEvent, ProgressSink};
pub use stream::LineStream;
