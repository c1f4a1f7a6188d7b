use std::sync::Arc;

use ap_core::{Result, Toolchain};
use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::step::{Action, Outcome, StepProgress};

/// Fails the run early when a required tool is missing.
pub struct CheckTools {
    toolchain: Arc<dyn Toolchain>,
}

impl CheckTools {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self { toolchain }
    }
}

#[async_trait]
impl Action for CheckTools {
    async fn run(
        &self,
        _ctx: &mut PipelineContext,
        progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        let summary = self.toolchain.verify().await?;
        progress.line(&summary);
        Ok(Outcome::Completed)
    }
}
