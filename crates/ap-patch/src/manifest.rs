//! `AndroidManifest.xml` rewrite.
//!
//! The manifest apktool decodes is plain XML text. Only the opening
//! `<application>` tag is touched, so the rest of the file (comments,
//! formatting, attribute order) survives byte for byte.

use std::path::Path;
use std::sync::LazyLock;

use ap_core::{Error, ManifestInfo, ManifestPatcher, Result};
use async_trait::async_trait;
use regex::Regex;

/// Resource name used when the app does not already ship a network security
/// config.
pub const DEFAULT_NSC_NAME: &str = "nsc_mitm";

static APPLICATION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<application\b[^>]*>").unwrap());
static NSC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:networkSecurityConfig\s*=\s*"@xml/([^"]+)""#).unwrap());
static DEBUGGABLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:debuggable\s*=\s*"[^"]*""#).unwrap());
static SPLIT_REQUIRED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:isSplitRequired\s*=\s*"true""#).unwrap());

/// Marker meta-data Play adds to the base APK of a split app.
const SPLITS_META: &str = "com.android.vending.splits";

/// [`ManifestPatcher`] that points the app at a network security config and
/// optionally marks it debuggable.
#[derive(Debug, Clone)]
pub struct ManifestRewriter {
    debuggable: bool,
}

impl ManifestRewriter {
    pub fn new(debuggable: bool) -> Self {
        Self { debuggable }
    }
}

impl Default for ManifestRewriter {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Result of rewriting the manifest text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenManifest {
    pub xml: String,
    pub info: ManifestInfo,
}

/// Rewrite manifest `xml`; `target` only names the file in errors.
pub fn rewrite_manifest(xml: &str, debuggable: bool, target: &Path) -> Result<RewrittenManifest> {
    let tag = APPLICATION_TAG
        .find(xml)
        .ok_or_else(|| Error::patch(target, "no <application> element"))?;
    let original_tag = tag.as_str();

    let (mut new_tag, nsc_name) = match NSC_ATTR.captures(original_tag) {
        Some(caps) => (original_tag.to_string(), caps[1].to_string()),
        None => (
            insert_attribute(
                original_tag,
                &format!(r#"android:networkSecurityConfig="@xml/{DEFAULT_NSC_NAME}""#),
            ),
            DEFAULT_NSC_NAME.to_string(),
        ),
    };

    if debuggable {
        new_tag = if DEBUGGABLE_ATTR.is_match(&new_tag) {
            DEBUGGABLE_ATTR
                .replace(&new_tag, r#"android:debuggable="true""#)
                .into_owned()
        } else {
            insert_attribute(&new_tag, r#"android:debuggable="true""#)
        };
    }

    let uses_app_bundle = xml.contains(SPLITS_META) || SPLIT_REQUIRED.is_match(xml);

    let mut out = String::with_capacity(xml.len() + 96);
    out.push_str(&xml[..tag.start()]);
    out.push_str(&new_tag);
    out.push_str(&xml[tag.end()..]);

    Ok(RewrittenManifest {
        xml: out,
        info: ManifestInfo {
            nsc_name,
            uses_app_bundle,
        },
    })
}

/// Insert `attr` right after the element name of the opening tag `tag`.
fn insert_attribute(tag: &str, attr: &str) -> String {
    let name_end = "<application".len();
    format!("{} {}{}", &tag[..name_end], attr, &tag[name_end..])
}

#[async_trait]
impl ManifestPatcher for ManifestRewriter {
    async fn modify(&self, manifest: &Path) -> Result<ManifestInfo> {
        let xml = tokio::fs::read_to_string(manifest)
            .await
            .map_err(|e| Error::patch(manifest, format!("failed to read: {e}")))?;

        let rewritten = rewrite_manifest(&xml, self.debuggable, manifest)?;
        tokio::fs::write(manifest, rewritten.xml).await?;

        tracing::debug!(
            "manifest: nsc={} app_bundle={}",
            rewritten.info.nsc_name,
            rewritten.info.uses_app_bundle
        );
        Ok(rewritten.info)
    }
}
