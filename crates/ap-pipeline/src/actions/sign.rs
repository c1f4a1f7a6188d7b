use std::path::PathBuf;
use std::sync::Arc;

use ap_core::{ApkSigner, Error, Result};
use ap_tools::Layout;
use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::step::{Action, Outcome, StepProgress};

/// Signs the rebuilt artifact in place, then moves a copy into the output path.
///
/// The output path is only written once signing has succeeded.
pub struct SignAndDeliver {
    signer: Arc<dyn ApkSigner>,
    layout: Layout,
    output: PathBuf,
    zipalign: bool,
}

impl SignAndDeliver {
    pub fn new(
        signer: Arc<dyn ApkSigner>,
        layout: Layout,
        output: PathBuf,
        zipalign: bool,
    ) -> Self {
        Self {
            signer,
            layout,
            output,
            zipalign,
        }
    }
}

#[async_trait]
impl Action for SignAndDeliver {
    async fn run(
        &self,
        _ctx: &mut PipelineContext,
        progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        progress
            .forward(self.signer.sign(&self.layout.tmp_apk(), self.zipalign))
            .await?;
        let layout = self.layout.clone();
        let output = self.output.clone();
        let written = tokio::task::spawn_blocking(move || layout.deliver(&output))
            .await
            .map_err(|e| Error::Internal(format!("deliver task failed: {e}")))??;
        Ok(Outcome::Value(written.display().to_string()))
    }
}
