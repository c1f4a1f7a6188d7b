//! apktool: decode an APK into smali/resources and build it back.

use std::path::{Path, PathBuf};

use ap_core::stream::{self, LineStream};
use ap_core::{ApkCodec, Result};
use async_trait::async_trait;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, APKTOOL};

/// [`ApkCodec`] backed by `java -jar apktool.jar`.
#[derive(Debug, Clone)]
pub struct Apktool {
    tools: ToolRegistry,
    framework_dir: PathBuf,
}

impl Apktool {
    /// `framework_dir` keeps apktool's framework files out of the user's home
    /// directory.
    pub fn new(tools: ToolRegistry, framework_dir: PathBuf) -> Self {
        Self {
            tools,
            framework_dir,
        }
    }

    fn command(&self, args: Vec<String>) -> Result<ToolCommand> {
        let mut cmd = self.tools.java_jar(APKTOOL)?;
        cmd.args(args);
        Ok(cmd)
    }
}

/// Arguments for `apktool decode`.
fn decode_args(input: &Path, output_dir: &Path, framework_dir: &Path) -> Vec<String> {
    vec![
        "decode".into(),
        input.to_string_lossy().into(),
        "--output".into(),
        output_dir.to_string_lossy().into(),
        "--frame-path".into(),
        framework_dir.to_string_lossy().into(),
        "--force".into(),
    ]
}

/// Arguments for `apktool build`.
fn build_args(
    input_dir: &Path,
    output_apk: &Path,
    framework_dir: &Path,
    use_aapt2: bool,
) -> Vec<String> {
    let mut args = vec![
        "build".into(),
        input_dir.to_string_lossy().into(),
        "--output".into(),
        output_apk.to_string_lossy().into(),
        "--frame-path".into(),
        framework_dir.to_string_lossy().into(),
    ];
    if use_aapt2 {
        args.push("--use-aapt2".into());
    }
    args
}

#[async_trait]
impl ApkCodec for Apktool {
    async fn decode(&self, input: &Path, output_dir: &Path) -> Result<()> {
        tracing::info!("apktool decode: {:?} -> {:?}", input, output_dir);
        let cmd = self.command(decode_args(input, output_dir, &self.framework_dir))?;
        cmd.execute().await?;
        Ok(())
    }

    fn encode(&self, input_dir: &Path, output_apk: &Path, use_aapt2: bool) -> LineStream {
        tracing::info!(
            "apktool build: {:?} -> {:?} (aapt2={})",
            input_dir,
            output_apk,
            use_aapt2
        );
        let args = build_args(input_dir, output_apk, &self.framework_dir, use_aapt2);
        match self.command(args) {
            Ok(cmd) => cmd.stream_lines(),
            Err(e) => stream::failing(Vec::new(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn decode_args_include_frame_path() {
        let args = decode_args(
            Path::new("/in/app.apk"),
            Path::new("/ws/decode"),
            Path::new("/ws/framework"),
        );
        assert_eq!(
            args,
            vec![
                "decode",
                "/in/app.apk",
                "--output",
                "/ws/decode",
                "--frame-path",
                "/ws/framework",
                "--force"
            ]
        );
    }

    #[test]
    fn build_args_fast_mode_uses_aapt2() {
        let args = build_args(
            Path::new("/ws/decode"),
            Path::new("/ws/tmp.apk"),
            Path::new("/ws/framework"),
            true,
        );
        assert_eq!(args.first().map(String::as_str), Some("build"));
        assert_eq!(args.last().map(String::as_str), Some("--use-aapt2"));
    }

    #[test]
    fn build_args_compat_mode_omits_aapt2() {
        let args = build_args(
            Path::new("/ws/decode"),
            Path::new("/ws/tmp.apk"),
            Path::new("/ws/framework"),
            false,
        );
        assert!(!args.iter().any(|a| a == "--use-aapt2"));
    }

    #[tokio::test]
    async fn encode_without_tools_is_failing_stream() {
        let apktool = Apktool::new(ToolRegistry::from_tools([]), PathBuf::from("/ws/framework"));
        let items: Vec<_> = apktool
            .encode(Path::new("/ws/decode"), Path::new("/ws/tmp.apk"), true)
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn decode_without_tools_errors() {
        let apktool = Apktool::new(ToolRegistry::from_tools([]), PathBuf::from("/ws/framework"));
        let result = apktool
            .decode(Path::new("/in/app.apk"), Path::new("/ws/decode"))
            .await;
        assert!(result.is_err());
    }
}
