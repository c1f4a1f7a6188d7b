//! End-to-end runs of the patch plan against fake tool adapters.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ap_core::stream::{self, LineStream};
use ap_core::{
    ApkCodec, ApkSigner, CertificatePinningPatcher, Error, ManifestInfo, ManifestPatcher,
    NetworkConfigPatcher, PipelineEvent, ProgressSink, Result, Toolchain,
};
use ap_pipeline::fallback::{ENCODE_TITLE, FALLBACK_TITLE, PRIMARY_TITLE};
use ap_pipeline::pause::{PAUSE_TITLE, PROMPT};
use ap_pipeline::plan::{DECODE_TITLE, SIGN_TITLE};
use ap_pipeline::{run_patch, Adapters, ChannelKeySource, RunConfig, StepStatus};
use async_trait::async_trait;
use tempfile::TempDir;

type Log = Arc<Mutex<Vec<String>>>;

// -- Fake adapters ------------------------------------------------------------

struct FakeCodec {
    aapt2_ok: bool,
    aapt_ok: bool,
    log: Log,
}

#[async_trait]
impl ApkCodec for FakeCodec {
    async fn decode(&self, _input: &Path, output_dir: &Path) -> Result<()> {
        self.log.lock().unwrap().push("decode".into());
        std::fs::create_dir_all(output_dir)?;
        Ok(())
    }

    fn encode(&self, _input_dir: &Path, output_apk: &Path, use_aapt2: bool) -> LineStream {
        self.log
            .lock()
            .unwrap()
            .push(if use_aapt2 { "encode:aapt2" } else { "encode:aapt" }.into());
        if use_aapt2 && !self.aapt2_ok {
            return stream::failing(
                vec!["I: Building resources with aapt2...".to_string()],
                Error::tool("apktool", "brut.androlib.AndrolibException: aapt2 failed"),
            );
        }
        if !use_aapt2 && !self.aapt_ok {
            return stream::failing(
                vec!["I: Building resources...".to_string()],
                Error::tool("apktool", "brut.androlib.AndrolibException: aapt failed"),
            );
        }
        std::fs::write(output_apk, b"unsigned").unwrap();
        stream::completed(vec!["I: Built apk".to_string()])
    }
}

struct FakeSigner {
    ok: bool,
    log: Log,
}

impl ApkSigner for FakeSigner {
    fn sign(&self, apk: &Path, _zipalign: bool) -> LineStream {
        self.log.lock().unwrap().push("sign".into());
        if !self.ok {
            return stream::failing(
                vec!["source:".to_string()],
                Error::tool("java", "could not sign"),
            );
        }
        std::fs::write(apk, b"signed").unwrap();
        stream::completed(vec!["VERIFY".to_string(), "Successfully processed 1 APKs".to_string()])
    }
}

struct FakeManifest {
    log: Log,
}

#[async_trait]
impl ManifestPatcher for FakeManifest {
    async fn modify(&self, _manifest: &Path) -> Result<ManifestInfo> {
        self.log.lock().unwrap().push("manifest".into());
        Ok(ManifestInfo {
            nsc_name: "network_security_config".into(),
            uses_app_bundle: false,
        })
    }
}

struct FakeNetworkConfig {
    log: Log,
    path: Arc<Mutex<Option<PathBuf>>>,
}

#[async_trait]
impl NetworkConfigPatcher for FakeNetworkConfig {
    async fn modify(&self, config: &Path) -> Result<()> {
        self.log.lock().unwrap().push("netsec".into());
        *self.path.lock().unwrap() = Some(config.to_path_buf());
        Ok(())
    }
}

struct FakePinning {
    log: Log,
}

#[async_trait]
impl CertificatePinningPatcher for FakePinning {
    async fn disable(
        &self,
        _decoded: &Path,
        progress: &(dyn for<'p> Fn(&'p str) + Send + Sync),
    ) -> Result<usize> {
        self.log.lock().unwrap().push("pinning".into());
        progress("Scanning Smali files...");
        Ok(0)
    }
}

struct MissingTools;

#[async_trait]
impl Toolchain for MissingTools {
    async fn verify(&self) -> Result<String> {
        Err(Error::tool("uber-apk-signer", "uber-apk-signer not found"))
    }
}

// -- Harness ------------------------------------------------------------------

struct Harness {
    dir: TempDir,
    log: Log,
    nsc_path: Arc<Mutex<Option<PathBuf>>>,
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            log: Arc::new(Mutex::new(Vec::new())),
            nsc_path: Arc::new(Mutex::new(None)),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn config(&self, wait: bool) -> RunConfig {
        RunConfig {
            input: self.dir.path().join("app.apk"),
            output: self.output(),
            tmp_dir: self.dir.path().join("tmp"),
            wait,
            zipalign: true,
        }
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("app-patched.apk")
    }

    fn adapters(&self, aapt2_ok: bool, sign_ok: bool, keys: ChannelKeySource) -> Adapters {
        self.encode_adapters(aapt2_ok, true, sign_ok, keys)
    }

    fn encode_adapters(
        &self,
        aapt2_ok: bool,
        aapt_ok: bool,
        sign_ok: bool,
        keys: ChannelKeySource,
    ) -> Adapters {
        Adapters {
            toolchain: None,
            codec: Arc::new(FakeCodec {
                aapt2_ok,
                aapt_ok,
                log: self.log.clone(),
            }),
            signer: Arc::new(FakeSigner {
                ok: sign_ok,
                log: self.log.clone(),
            }),
            manifest: Arc::new(FakeManifest {
                log: self.log.clone(),
            }),
            network_config: Arc::new(FakeNetworkConfig {
                log: self.log.clone(),
                path: self.nsc_path.clone(),
            }),
            pinning: Arc::new(FakePinning {
                log: self.log.clone(),
            }),
            keys: Arc::new(keys),
        }
    }

    fn sink(&self) -> ProgressSink {
        let events = self.events.clone();
        ProgressSink::new(move |event| events.lock().unwrap().push(event.clone()))
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn progress_lines(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress { line, .. } => Some(line.clone()),
                _ => None,
            })
            .collect()
    }
}

// -- Scenarios ----------------------------------------------------------------

#[tokio::test]
async fn primary_encode_fails_fallback_succeeds() {
    let h = Harness::new();
    let (keys, _tx) = ChannelKeySource::new();
    let report = run_patch(&h.config(false), &h.adapters(false, true, keys), &h.sink())
        .await
        .unwrap();

    assert_eq!(
        h.log(),
        vec![
            "decode",
            "manifest",
            "netsec",
            "pinning",
            "encode:aapt2",
            "encode:aapt",
            "sign"
        ]
    );
    assert!(report.context.fallback_to_aapt);
    assert!(!report.context.uses_app_bundle);
    assert_eq!(
        report.context.nsc_name.as_deref(),
        Some("network_security_config")
    );
    assert!(report.record(PRIMARY_TITLE).unwrap().status.is_skipped());
    assert_eq!(
        report.record(FALLBACK_TITLE).unwrap().status,
        StepStatus::Completed(None)
    );
    assert_eq!(
        h.nsc_path.lock().unwrap().as_deref(),
        Some(
            h.dir
                .path()
                .join("tmp/decode/res/xml/network_security_config.xml")
                .as_path()
        )
    );
    assert_eq!(std::fs::read(h.output()).unwrap(), b"signed");
}

#[tokio::test]
async fn primary_encode_succeeds_fallback_never_runs() {
    let h = Harness::new();
    let (keys, _tx) = ChannelKeySource::new();
    let report = run_patch(&h.config(false), &h.adapters(true, true, keys), &h.sink())
        .await
        .unwrap();

    assert!(!h.log().contains(&"encode:aapt".to_string()));
    assert!(!report.context.fallback_to_aapt);
    assert_eq!(
        report.record(FALLBACK_TITLE).unwrap().status,
        StepStatus::Skipped(None)
    );
    assert!(h.output().exists());
}

#[tokio::test]
async fn sign_failure_is_attributed_and_output_untouched() {
    let h = Harness::new();
    let (keys, _tx) = ChannelKeySource::new();
    let err = run_patch(&h.config(false), &h.adapters(true, false, keys), &h.sink())
        .await
        .unwrap_err();

    assert_eq!(err.failed_step(), Some(SIGN_TITLE));
    assert!(err.to_string().contains("could not sign"));
    assert!(!h.output().exists());
    // No rollback: the unsigned artifact stays in the workspace.
    assert!(h.dir.path().join("tmp/tmp.apk").exists());
}

#[tokio::test]
async fn failed_run_leaves_existing_output_alone() {
    let h = Harness::new();
    std::fs::write(h.output(), b"previous").unwrap();
    let (keys, _tx) = ChannelKeySource::new();
    let err = run_patch(&h.config(false), &h.adapters(true, false, keys), &h.sink())
        .await
        .unwrap_err();

    assert!(err.failed_step().is_some());
    assert_eq!(std::fs::read(h.output()).unwrap(), b"previous");
}

#[tokio::test]
async fn both_encodes_failing_leaves_existing_output_alone() {
    let h = Harness::new();
    std::fs::write(h.output(), b"previous").unwrap();
    let (keys, _tx) = ChannelKeySource::new();
    let adapters = h.encode_adapters(false, false, true, keys);
    let err = run_patch(&h.config(false), &adapters, &h.sink())
        .await
        .unwrap_err();

    assert_eq!(err.failed_step(), Some(ENCODE_TITLE));
    assert!(err.to_string().contains("aapt failed"));
    let log = h.log();
    assert!(log.contains(&"encode:aapt2".to_string()));
    assert!(log.contains(&"encode:aapt".to_string()));
    assert!(!log.contains(&"sign".to_string()));
    assert_eq!(std::fs::read(h.output()).unwrap(), b"previous");
}

#[tokio::test]
async fn missing_tools_abort_before_decode() {
    let h = Harness::new();
    let (keys, _tx) = ChannelKeySource::new();
    let mut adapters = h.adapters(true, true, keys);
    adapters.toolchain = Some(Arc::new(MissingTools));

    let err = run_patch(&h.config(false), &adapters, &h.sink())
        .await
        .unwrap_err();
    assert_eq!(err.failed_step(), Some("Checking tools"));
    assert!(h.log().is_empty());
    assert!(!h.output().exists());
}

// -- Interactive pause ----------------------------------------------------------

#[tokio::test]
async fn pause_disabled_never_prompts() {
    let h = Harness::new();
    let (keys, tx) = ChannelKeySource::new();
    // Reading from a closed source would fail the run.
    drop(tx);
    let report = run_patch(&h.config(false), &h.adapters(true, true, keys), &h.sink())
        .await
        .unwrap();

    assert!(report.record(PAUSE_TITLE).is_none());
    assert!(!h.progress_lines().iter().any(|l| l == PROMPT));
    assert_eq!(report.records.len(), 8);
}

#[tokio::test]
async fn pause_enabled_waits_for_one_key() {
    let h = Harness::new();
    let (keys, tx) = ChannelKeySource::new();
    let config = h.config(true);
    let adapters = h.adapters(true, true, keys);
    let sink = h.sink();

    let run = run_patch(&config, &adapters, &sink);
    tokio::pin!(run);

    let early = tokio::time::timeout(Duration::from_millis(100), &mut run).await;
    assert!(early.is_err(), "run advanced without a keypress");
    assert_eq!(h.log(), vec!["decode", "manifest", "netsec", "pinning"]);
    assert!(h.progress_lines().iter().any(|l| l == PROMPT));

    tx.send(()).await.unwrap();
    let report = run.await.unwrap();

    assert_eq!(report.records.len(), 9);
    assert!(report.record(PAUSE_TITLE).is_some());
    assert!(h.log().contains(&"sign".to_string()));
    assert!(h.output().exists());
}

#[tokio::test]
async fn events_follow_declared_order() {
    let h = Harness::new();
    let (keys, _tx) = ChannelKeySource::new();
    run_patch(&h.config(false), &h.adapters(false, true, keys), &h.sink())
        .await
        .unwrap();

    let started: Vec<String> = h
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StepStarted { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        started,
        vec![
            DECODE_TITLE,
            "Modifying app manifest",
            "Modifying network security config",
            "Disabling certificate pinning",
            ENCODE_TITLE,
            PRIMARY_TITLE,
            FALLBACK_TITLE,
            SIGN_TITLE,
        ]
    );

    let lines = h.progress_lines();
    let aapt2 = lines
        .iter()
        .position(|l| l == "I: Building resources with aapt2...")
        .unwrap();
    let built = lines.iter().position(|l| l == "I: Built apk").unwrap();
    assert!(aapt2 < built);
}
