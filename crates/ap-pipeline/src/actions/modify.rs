//! Actions that rewrite the decoded tree.

use std::sync::Arc;

use ap_core::{CertificatePinningPatcher, Error, ManifestPatcher, NetworkConfigPatcher, Result};
use ap_tools::Layout;
use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::step::{Action, Outcome, StepProgress};

/// Rewrites the manifest and records what it reported in the context.
pub struct ModifyManifest {
    patcher: Arc<dyn ManifestPatcher>,
    layout: Layout,
}

impl ModifyManifest {
    pub fn new(patcher: Arc<dyn ManifestPatcher>, layout: Layout) -> Self {
        Self { patcher, layout }
    }
}

#[async_trait]
impl Action for ModifyManifest {
    async fn run(
        &self,
        ctx: &mut PipelineContext,
        _progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        let info = self.patcher.modify(&self.layout.manifest_path()).await?;
        ctx.uses_app_bundle = info.uses_app_bundle;
        ctx.nsc_name = Some(info.nsc_name);
        Ok(Outcome::Completed)
    }
}

/// Rewrites the network security config the manifest points at.
pub struct ModifyNetworkConfig {
    patcher: Arc<dyn NetworkConfigPatcher>,
    layout: Layout,
}

impl ModifyNetworkConfig {
    pub fn new(patcher: Arc<dyn NetworkConfigPatcher>, layout: Layout) -> Self {
        Self { patcher, layout }
    }
}

#[async_trait]
impl Action for ModifyNetworkConfig {
    async fn run(
        &self,
        ctx: &mut PipelineContext,
        _progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        let name = ctx.nsc_name.as_deref().ok_or_else(|| {
            Error::Internal("network security config name unknown; manifest not modified".into())
        })?;
        self.patcher
            .modify(&self.layout.network_config_path(name))
            .await?;
        Ok(Outcome::Completed)
    }
}

/// Removes certificate pinning from the decoded code.
pub struct DisablePinning {
    patcher: Arc<dyn CertificatePinningPatcher>,
    layout: Layout,
}

impl DisablePinning {
    pub fn new(patcher: Arc<dyn CertificatePinningPatcher>, layout: Layout) -> Self {
        Self { patcher, layout }
    }
}

#[async_trait]
impl Action for DisablePinning {
    async fn run(
        &self,
        _ctx: &mut PipelineContext,
        progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        let patched = self
            .patcher
            .disable(&self.layout.decode_dir(), &|line: &str| progress.line(line))
            .await?;
        Ok(Outcome::Value(format!("{patched} class(es) patched")))
    }
}
