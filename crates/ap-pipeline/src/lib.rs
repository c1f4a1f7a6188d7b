//! # ap-pipeline
//!
//! Orchestration of a patch run.
//!
//! This crate provides:
//!
//! - **[`Step`]** -- a titled [`Action`] or nested step list with optional
//!   enablement and skip predicates over the shared [`PipelineContext`].
//! - **[`PipelineRunner`]** -- runs steps in order, forwards progress lines,
//!   stops at the first failure and returns a [`RunReport`].
//! - **[`fallback`]** -- the encode stage that retries with AAPT when AAPT2
//!   fails.
//! - **[`pause`]** -- the interactive "press any key" step, and
//!   [`until_terminated`] to end a run cleanly on SIGTERM or SIGHUP.
//! - **[`build_patch_plan`]** / **[`run_patch`]** -- the full step list for
//!   patching one APK.

pub mod actions;
pub mod context;
pub mod fallback;
pub mod pause;
pub mod plan;
pub mod runner;
pub mod step;

// Re-export key types at the crate root.
pub use context::PipelineContext;
pub use pause::{
    termination_signal, until_terminated, ChannelKeySource, KeySource, TerminalKeySource,
};
pub use plan::{build_patch_plan, run_patch, Adapters, RunConfig};
pub use runner::{PipelineRunner, RunReport, StepRecord, StepStatus};
pub use step::{Action, Outcome, Step, StepBody, StepProgress};
