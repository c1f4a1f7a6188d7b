//! Network security config rewrite.

use std::path::Path;

use ap_core::{Error, NetworkConfigPatcher, Result};
use async_trait::async_trait;

/// Config that allows cleartext traffic and trusts user-installed CAs in
/// addition to the system store, for every domain.
pub const PERMISSIVE_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<network-security-config>
    <base-config cleartextTrafficPermitted="true">
        <trust-anchors>
            <certificates src="system" />
            <certificates src="user" />
        </trust-anchors>
    </base-config>
</network-security-config>
"#;

/// [`NetworkConfigPatcher`] that replaces the config with
/// [`PERMISSIVE_CONFIG`].
///
/// Any domain-specific rules or pin sets in the original file are dropped.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfigWriter;

impl NetworkConfigWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NetworkConfigPatcher for NetworkConfigWriter {
    async fn modify(&self, config: &Path) -> Result<()> {
        if let Some(parent) = config.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let existed = tokio::fs::try_exists(config).await.unwrap_or(false);
        tokio::fs::write(config, PERMISSIVE_CONFIG)
            .await
            .map_err(|e| Error::patch(config, format!("failed to write: {e}")))?;

        tracing::debug!(
            "network security config {} {:?}",
            if existed { "replaced" } else { "created" },
            config
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_xml_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("res").join("xml").join("nsc_mitm.xml");

        NetworkConfigWriter::new().modify(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), PERMISSIVE_CONFIG);
    }

    #[tokio::test]
    async fn replaces_existing_pins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network_security_config.xml");
        std::fs::write(
            &path,
            concat!(
                "<network-security-config><domain-config><pin-set/></domain-config>",
                "</network-security-config>",
            ),
        )
        .unwrap();

        NetworkConfigWriter::new().modify(&path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("pin-set"));
        assert!(written.contains(r#"<certificates src="user" />"#));
        assert!(written.contains(r#"cleartextTrafficPermitted="true""#));
    }
}
