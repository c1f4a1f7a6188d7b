//! Certificate pinning removal in smali code.
//!
//! Every class that implements `javax.net.ssl.X509TrustManager` is turned
//! into a trust-all manager: the two `check*Trusted` methods return without
//! throwing and `getAcceptedIssuers` returns an empty array.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ap_core::{CertificatePinningPatcher, Error, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use walkdir::WalkDir;

const TRUST_MANAGER: &str = ".implements Ljavax/net/ssl/X509TrustManager;";

static CHECK_TRUSTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?ms)^(\.method public (?:final )?check(?:Client|Server)Trusted",
            r"\(\[Ljava/security/cert/X509Certificate;Ljava/lang/String;\)V)\n.*?^\.end method",
        ),
    )
    .unwrap()
});
static ACCEPTED_ISSUERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?ms)^(\.method public (?:final )?getAcceptedIssuers",
            r"\(\)\[Ljava/security/cert/X509Certificate;)\n.*?^\.end method",
        ),
    )
    .unwrap()
});

/// [`CertificatePinningPatcher`] working on the smali output of apktool.
#[derive(Debug, Clone, Default)]
pub struct PinningPatcher;

impl PinningPatcher {
    pub fn new() -> Self {
        Self
    }
}

/// Rewrite the trust manager methods of one smali class.
///
/// Returns `None` when the class is not a trust manager or nothing changed.
pub fn patch_smali(source: &str) -> Option<String> {
    if !source.contains(TRUST_MANAGER) {
        return None;
    }

    let patched = CHECK_TRUSTED.replace_all(source, |caps: &Captures| {
        format!("{}\n    .locals 0\n\n    return-void\n.end method", &caps[1])
    });
    let patched = ACCEPTED_ISSUERS.replace_all(&patched, |caps: &Captures| {
        format!(
            concat!(
                "{}\n    .locals 1\n\n    const/4 v0, 0x0\n\n",
                "    new-array v0, v0, [Ljava/security/cert/X509Certificate;\n\n",
                "    return-object v0\n.end method",
            ),
            &caps[1]
        )
    });

    (patched != source).then(|| patched.into_owned())
}

/// `smali`, `smali_classes2`, ... directly under the decoded tree.
fn smali_roots(decoded: &Path) -> Result<Vec<PathBuf>> {
    let mut roots: Vec<PathBuf> = std::fs::read_dir(decoded)
        .map_err(|e| Error::patch(decoded, format!("failed to list decoded tree: {e}")))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter(|e| e.file_name().to_string_lossy().starts_with("smali"))
        .map(|e| e.path())
        .collect();
    roots.sort();
    Ok(roots)
}

/// Display name of a smali file: its class path relative to the smali root.
fn class_name(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.with_extension("")
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, ".")
}

#[async_trait]
impl CertificatePinningPatcher for PinningPatcher {
    async fn disable(
        &self,
        decoded: &Path,
        progress: &(dyn for<'p> Fn(&'p str) + Send + Sync),
    ) -> Result<usize> {
        progress("Scanning Smali files...");
        let mut patched = 0;

        for root in smali_roots(decoded)? {
            for entry in WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("smali")
                {
                    continue;
                }

                let source = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::patch(path, format!("failed to read: {e}")))?;
                let Some(rewritten) = patch_smali(&source) else {
                    continue;
                };

                tokio::fs::write(path, rewritten).await?;
                patched += 1;
                progress(&format!("Applied patch in {}", class_name(&root, path)));
            }
        }

        tracing::info!("Disabled certificate pinning in {} class(es)", patched);
        Ok(patched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const TRUST_ALL_CANDIDATE: &str = r#".class public final Lcom/example/PinningTrustManager;
.super Ljava/lang/Object;
.source "PinningTrustManager.java"

# interfaces
.implements Ljavax/net/ssl/X509TrustManager;

# virtual methods
.method public checkClientTrusted([Ljava/security/cert/X509Certificate;Ljava/lang/String;)V
    .locals 2

    new-instance v0, Ljava/security/cert/CertificateException;

    const-string v1, "client"

    invoke-direct {v0, v1}, Ljava/security/cert/CertificateException;-><init>(Ljava/lang/String;)V

    throw v0
.end method

.method public checkServerTrusted([Ljava/security/cert/X509Certificate;Ljava/lang/String;)V
    .locals 1

    invoke-static {p1}, Lcom/example/Pins;->verify([Ljava/security/cert/X509Certificate;)V

    return-void
.end method

.method public getAcceptedIssuers()[Ljava/security/cert/X509Certificate;
    .locals 1

    sget-object v0, Lcom/example/Pins;->ISSUERS:[Ljava/security/cert/X509Certificate;

    return-object v0
.end method
"#;

    const UNRELATED: &str = r#".class public Lcom/example/MainActivity;
.super Landroid/app/Activity;

.method public onCreate(Landroid/os/Bundle;)V
    .locals 0
    return-void
.end method
"#;

    #[test]
    fn trust_manager_methods_are_replaced() {
        let out = patch_smali(TRUST_ALL_CANDIDATE).unwrap();
        assert!(!out.contains("CertificateException"));
        assert!(!out.contains("Pins;->verify"));
        assert!(!out.contains("Pins;->ISSUERS"));
        assert!(out.contains("new-array v0, v0, [Ljava/security/cert/X509Certificate;"));
        assert_eq!(out.matches("return-void").count(), 2);
        assert_eq!(out.matches(".end method").count(), 3);
        assert!(out.contains(".implements Ljavax/net/ssl/X509TrustManager;"));
    }

    #[test]
    fn other_classes_untouched() {
        assert!(patch_smali(UNRELATED).is_none());
    }

    #[test]
    fn already_patched_class_reports_no_change() {
        let once = patch_smali(TRUST_ALL_CANDIDATE).unwrap();
        assert!(patch_smali(&once).is_none());
    }

    #[tokio::test]
    async fn disable_walks_all_smali_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("smali/com/example");
        let second = dir.path().join("smali_classes2/com/other");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::create_dir_all(dir.path().join("res/values")).unwrap();
        std::fs::write(first.join("PinningTrustManager.smali"), TRUST_ALL_CANDIDATE).unwrap();
        std::fs::write(first.join("MainActivity.smali"), UNRELATED).unwrap();
        std::fs::write(second.join("Tm.smali"), TRUST_ALL_CANDIDATE).unwrap();

        let lines = Mutex::new(Vec::new());
        let count = PinningPatcher::new()
            .disable(dir.path(), &|line: &str| {
                lines.lock().unwrap().push(line.to_string())
            })
            .await
            .unwrap();

        assert_eq!(count, 2);
        let lines = lines.into_inner().unwrap();
        assert_eq!(lines[0], "Scanning Smali files...");
        assert_eq!(lines[1], "Applied patch in com.example.PinningTrustManager");
        assert_eq!(lines[2], "Applied patch in com.other.Tm");
        assert_eq!(
            std::fs::read_to_string(first.join("MainActivity.smali")).unwrap(),
            UNRELATED
        );
    }

    #[tokio::test]
    async fn disable_on_missing_tree_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = PinningPatcher::new()
            .disable(&dir.path().join("decode"), &|_: &str| {})
            .await;
        assert!(result.is_err());
    }
}
