use std::path::PathBuf;
use std::sync::Arc;

use ap_core::{ApkCodec, Result};
use ap_tools::Layout;
use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::step::{Action, Outcome, StepProgress};

/// Decodes the input APK into the workspace.
pub struct Decode {
    codec: Arc<dyn ApkCodec>,
    input: PathBuf,
    layout: Layout,
}

impl Decode {
    pub fn new(codec: Arc<dyn ApkCodec>, input: PathBuf, layout: Layout) -> Self {
        Self {
            codec,
            input,
            layout,
        }
    }
}

#[async_trait]
impl Action for Decode {
    async fn run(
        &self,
        _ctx: &mut PipelineContext,
        _progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        self.codec
            .decode(&self.input, &self.layout.decode_dir())
            .await?;
        Ok(Outcome::Completed)
    }
}
