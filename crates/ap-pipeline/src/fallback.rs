//! The encode stage: rebuild with AAPT2 and fall back to AAPT when that
//! fails.
//!
//! AAPT2 is faster and the default for modern apps, but some decoded
//! resources only rebuild with the legacy AAPT. The stage is a sub-pipeline
//! of two candidates. The primary swallows its own failure, records it as
//! the skip reason and sets [`PipelineContext::fallback_to_aapt`], which is
//! the only thing that lets the fallback run.

use std::path::Path;
use std::sync::Arc;

use ap_core::{ApkCodec, Error, Result};
use ap_tools::Layout;
use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::step::{Action, Outcome, Step, StepProgress};

pub const ENCODE_TITLE: &str = "Encoding patched APK file";
pub const PRIMARY_TITLE: &str = "Encoding using AAPT2";
pub const FALLBACK_TITLE: &str = "Encoding using AAPT [fallback]";

/// Build the encode stage for the run laid out by `layout`.
pub fn encode_stage(codec: Arc<dyn ApkCodec>, layout: Layout) -> Step {
    Step::pipeline(
        ENCODE_TITLE,
        vec![
            Step::action(
                PRIMARY_TITLE,
                PrimaryEncode {
                    codec: codec.clone(),
                    layout: layout.clone(),
                },
            ),
            Step::action(FALLBACK_TITLE, FallbackEncode { codec, layout })
                .skip_if(|ctx| !ctx.fallback_to_aapt),
        ],
    )
}

struct PrimaryEncode {
    codec: Arc<dyn ApkCodec>,
    layout: Layout,
}

#[async_trait]
impl Action for PrimaryEncode {
    async fn run(
        &self,
        ctx: &mut PipelineContext,
        progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        match encode(self.codec.as_ref(), &self.layout, true, progress).await {
            Ok(()) => Ok(Outcome::Completed),
            Err(e) => {
                tracing::warn!("AAPT2 encode failed, falling back to AAPT: {e}");
                ctx.fallback_to_aapt = true;
                Ok(Outcome::Skipped(format!("Failed, falling back to AAPT: {e}")))
            }
        }
    }
}

struct FallbackEncode {
    codec: Arc<dyn ApkCodec>,
    layout: Layout,
}

#[async_trait]
impl Action for FallbackEncode {
    async fn run(
        &self,
        _ctx: &mut PipelineContext,
        progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        encode(self.codec.as_ref(), &self.layout, false, progress).await?;
        Ok(Outcome::Completed)
    }
}

/// Rebuild the decoded tree into the workspace artifact.
///
/// A candidate only counts as successful if the artifact exists afterwards,
/// so a stale file from an earlier attempt is removed first.
async fn encode(
    codec: &dyn ApkCodec,
    layout: &Layout,
    use_aapt2: bool,
    progress: &StepProgress<'_>,
) -> Result<()> {
    let artifact = layout.tmp_apk();
    remove_stale(&artifact).await?;

    progress
        .forward(codec.encode(&layout.decode_dir(), &artifact, use_aapt2))
        .await?;

    if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
        return Err(Error::tool(
            "apktool",
            format!("build finished but {} was not produced", artifact.display()),
        ));
    }
    Ok(())
}

async fn remove_stale(artifact: &Path) -> Result<()> {
    match tokio::fs::remove_file(artifact).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
