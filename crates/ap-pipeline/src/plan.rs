//! The patch plan: the ordered step list for one APK.

use std::path::PathBuf;
use std::sync::Arc;

use ap_core::{
    ApkCodec, ApkSigner, CertificatePinningPatcher, ManifestPatcher, NetworkConfigPatcher,
    ProgressSink, Result, Toolchain,
};
use ap_tools::Layout;

use crate::actions::{
    CheckTools, Decode, DisablePinning, ModifyManifest, ModifyNetworkConfig, SignAndDeliver,
};
use crate::context::PipelineContext;
use crate::fallback::encode_stage;
use crate::pause::{pause_step, KeySource};
use crate::runner::{PipelineRunner, RunReport};
use crate::step::Step;

pub const CHECK_TOOLS_TITLE: &str = "Checking tools";
pub const DECODE_TITLE: &str = "Decoding APK file";
pub const MANIFEST_TITLE: &str = "Modifying app manifest";
pub const NETWORK_CONFIG_TITLE: &str = "Modifying network security config";
pub const PINNING_TITLE: &str = "Disabling certificate pinning";
pub const SIGN_TITLE: &str = "Signing patched APK file";

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Temporary working directory; see [`Layout`].
    pub tmp_dir: PathBuf,
    /// Pause after patching so the decoded tree can be edited.
    pub wait: bool,
    pub zipalign: bool,
}

impl RunConfig {
    pub fn layout(&self) -> Layout {
        Layout::new(&self.tmp_dir)
    }
}

/// The collaborators a run drives.
#[derive(Clone)]
pub struct Adapters {
    /// Checked first when present.
    pub toolchain: Option<Arc<dyn Toolchain>>,
    pub codec: Arc<dyn ApkCodec>,
    pub signer: Arc<dyn ApkSigner>,
    pub manifest: Arc<dyn ManifestPatcher>,
    pub network_config: Arc<dyn NetworkConfigPatcher>,
    pub pinning: Arc<dyn CertificatePinningPatcher>,
    pub keys: Arc<dyn KeySource>,
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters")
            .field("toolchain", &self.toolchain.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the step list for `config`.
pub fn build_patch_plan(config: &RunConfig, adapters: &Adapters) -> Vec<Step> {
    let layout = config.layout();
    let mut steps = Vec::with_capacity(8);

    if let Some(toolchain) = &adapters.toolchain {
        steps.push(Step::action(
            CHECK_TOOLS_TITLE,
            CheckTools::new(toolchain.clone()),
        ));
    }

    steps.push(Step::action(
        DECODE_TITLE,
        Decode::new(adapters.codec.clone(), config.input.clone(), layout.clone()),
    ));
    steps.push(Step::action(
        MANIFEST_TITLE,
        ModifyManifest::new(adapters.manifest.clone(), layout.clone()),
    ));
    steps.push(Step::action(
        NETWORK_CONFIG_TITLE,
        ModifyNetworkConfig::new(adapters.network_config.clone(), layout.clone()),
    ));
    steps.push(Step::action(
        PINNING_TITLE,
        DisablePinning::new(adapters.pinning.clone(), layout.clone()),
    ));
    steps.push(pause_step(adapters.keys.clone(), config.wait));
    steps.push(encode_stage(adapters.codec.clone(), layout.clone()));
    steps.push(Step::action(
        SIGN_TITLE,
        SignAndDeliver::new(
            adapters.signer.clone(),
            layout,
            config.output.clone(),
            config.zipalign,
        ),
    ));

    steps
}

/// Build the plan for `config` and run it with a fresh context.
pub async fn run_patch(
    config: &RunConfig,
    adapters: &Adapters,
    sink: &ProgressSink,
) -> Result<RunReport> {
    tracing::info!(
        "Patching {} -> {} (workspace {})",
        config.input.display(),
        config.output.display(),
        config.tmp_dir.display()
    );
    PipelineRunner::new(build_patch_plan(config, adapters))
        .run(PipelineContext::default(), sink)
        .await
}
