//! Boundary traits for the external collaborators a patch run drives.
//!
//! Decoding and the three rewrite steps are single-result operations;
//! encoding and signing hand back a [`LineStream`] of tool output. Concrete
//! implementations live in `ap-tools` and `ap-patch`; tests substitute fakes.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::LineStream;

/// Facts the manifest rewrite reports back to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    /// Resource name of the network security config (`res/xml/<name>.xml`).
    pub nsc_name: String,
    /// Whether the app is split into multiple APKs (Android App Bundle).
    pub uses_app_bundle: bool,
}

/// Decodes an APK into a working tree and rebuilds it.
#[async_trait]
pub trait ApkCodec: Send + Sync {
    /// Decode `input` into `output_dir`.
    async fn decode(&self, input: &Path, output_dir: &Path) -> Result<()>;

    /// Rebuild `input_dir` into `output_apk`.
    ///
    /// `use_aapt2` selects the fast resource compiler; `false` selects the
    /// slower, more compatible one.
    fn encode(&self, input_dir: &Path, output_apk: &Path, use_aapt2: bool) -> LineStream;
}

/// Signs (and optionally zip-aligns) an APK in place.
pub trait ApkSigner: Send + Sync {
    fn sign(&self, apk: &Path, zipalign: bool) -> LineStream;
}

/// Rewrites `AndroidManifest.xml`.
#[async_trait]
pub trait ManifestPatcher: Send + Sync {
    async fn modify(&self, manifest: &Path) -> Result<ManifestInfo>;
}

/// Rewrites the network security config resource.
#[async_trait]
pub trait NetworkConfigPatcher: Send + Sync {
    async fn modify(&self, config: &Path) -> Result<()>;
}

/// Removes certificate pinning from the decoded code.
#[async_trait]
pub trait CertificatePinningPatcher: Send + Sync {
    /// Patch the tree under `decoded`, reporting progress lines through
    /// `progress`. Returns the number of patched classes.
    async fn disable(&self, decoded: &Path, progress: &(dyn for<'p> Fn(&'p str) + Send + Sync))
        -> Result<usize>;
}

/// Verifies that the external tools a run needs are present.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Returns a one-line summary of the tools found.
    async fn verify(&self) -> Result<String>;
}
