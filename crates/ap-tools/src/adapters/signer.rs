//! uber-apk-signer: sign (and zip-align) the rebuilt APK with a debug key.

use std::path::Path;

use ap_core::stream::{self, LineStream};
use ap_core::ApkSigner;

use crate::tools::{ToolRegistry, UBER_APK_SIGNER};

/// [`ApkSigner`] backed by `java -jar uber-apk-signer.jar`.
///
/// The APK is overwritten in place so the caller keeps a single artifact
/// path.
#[derive(Debug, Clone)]
pub struct UberApkSigner {
    tools: ToolRegistry,
}

impl UberApkSigner {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

fn sign_args(apk: &Path, zipalign: bool) -> Vec<String> {
    let mut args = vec![
        "--apks".into(),
        apk.to_string_lossy().into(),
        "--allowResign".into(),
        "--overwrite".into(),
    ];
    if !zipalign {
        args.push("--skipZipAlign".into());
    }
    args
}

impl ApkSigner for UberApkSigner {
    fn sign(&self, apk: &Path, zipalign: bool) -> LineStream {
        tracing::info!("uber-apk-signer: {:?} (zipalign={})", apk, zipalign);
        match self.tools.java_jar(UBER_APK_SIGNER) {
            Ok(mut cmd) => {
                cmd.args(sign_args(apk, zipalign));
                cmd.stream_lines()
            }
            Err(e) => stream::failing(Vec::new(), e),
        }
    }
}
