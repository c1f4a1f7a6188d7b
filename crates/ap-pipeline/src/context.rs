//! State shared by all steps of one run.

/// Mutable record every action receives by `&mut`.
///
/// One context is created per run and handed back in the
/// [`RunReport`](crate::RunReport) when the run succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineContext {
    /// The APK is one part of a split app (Android App Bundle).
    pub uses_app_bundle: bool,
    /// Resource name of the network security config, set by the manifest
    /// step.
    pub nsc_name: Option<String>,
    /// The AAPT2 encode failed; the AAPT candidate must run.
    pub fallback_to_aapt: bool,
}
