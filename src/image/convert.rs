//! Schema-1 to OCI schema-2 manifest conversion
//!
//! Legacy registries only speak schema 1. The conversion synthesizes an
//! OCI image config and manifest purely from the per-layer compatibility
//! JSON the legacy manifest already embeds; no extra endpoints are
//! contacted beyond the layer blobs themselves.

use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::image::manifest::{
    Compatibility, ContainerConfigSchema, Descriptor, HistorySchema, LegacyManifest,
    OciImageManifest,
};
use crate::image::{MEDIA_TYPE_CONFIG, MEDIA_TYPE_LAYER, ROOTFS_TYPE_LAYERS};
use crate::output::OutputManager;

/// Result of a schema-1 conversion: the synthesized config blob plus the
/// schema-2 manifest referencing it.
#[derive(Debug)]
pub struct ConvertedImage {
    pub config_bytes: Vec<u8>,
    pub config_digest: String,
    pub manifest: OciImageManifest,
}

/// Convert a legacy manifest into an OCI config and manifest.
///
/// `layer_sizes` holds the byte length of each fsLayer blob, in fsLayers
/// order, as observed during download. diff_ids keep fsLayers order
/// verbatim (top layer first).
pub fn convert_legacy_manifest(
    ms: &LegacyManifest,
    layer_sizes: &[u64],
    output: &OutputManager,
) -> Result<ConvertedImage> {
    let top = ms.history.first().ok_or_else(|| {
        RegistryError::Validation("schema 1 manifest has no history entries".to_string())
    })?;
    if ms.history.len() != ms.fs_layers.len() {
        return Err(RegistryError::Validation(format!(
            "schema 1 manifest is inconsistent: {} history entries vs {} fsLayers",
            ms.history.len(),
            ms.fs_layers.len()
        )));
    }

    // history[0] carries the canonical image config
    let mut cs: Compatibility = serde_json::from_str(&top.v1_compatibility)?;

    cs.rootfs.fs_type = ROOTFS_TYPE_LAYERS.to_string();
    cs.rootfs.diff_ids = ms.fs_layers.iter().map(|l| l.blob_sum.clone()).collect();
    cs.history = build_history(ms, output);

    // The config blob is content-addressed by the digest of the bytes
    // actually written, not by the id the legacy manifest declared.
    let config_bytes = serde_json::to_vec(&cs)?;
    let config_digest = DigestUtils::compute_digest(&config_bytes);

    let layers = ms
        .fs_layers
        .iter()
        .zip(layer_sizes)
        .map(|(layer, size)| Descriptor {
            media_type: MEDIA_TYPE_LAYER.to_string(),
            digest: layer.blob_sum.clone(),
            size: *size,
        })
        .collect();

    let manifest = OciImageManifest {
        schema_version: 2,
        config: Descriptor {
            media_type: MEDIA_TYPE_CONFIG.to_string(),
            digest: config_digest.clone(),
            size: config_bytes.len() as u64,
        },
        layers,
        annotations: None,
    };

    Ok(ConvertedImage {
        config_bytes,
        config_digest,
        manifest,
    })
}

/// Build one history entry per schema-1 history index, in input order.
///
/// Parse failures here are logged and tolerated: malformed historical
/// metadata must not block the pull of usable layer content.
fn build_history(ms: &LegacyManifest, output: &OutputManager) -> Vec<HistorySchema> {
    ms.history
        .iter()
        .map(|entry| {
            let mut history = HistorySchema::default();

            match serde_json::from_str::<Compatibility>(&entry.v1_compatibility) {
                Ok(comp) => {
                    history.created = comp.created;
                    history.author = comp.author;
                    history.comment = comp.comment;
                }
                Err(e) => output.warning(&format!("skipping malformed history entry: {}", e)),
            }

            match serde_json::from_str::<ContainerConfigSchema>(&entry.v1_compatibility) {
                Ok(cc) => {
                    if let Some(cmd) = cc.container_config.cmd.first() {
                        // "null" placeholders leave created_by empty
                        if !cmd.contains("null") {
                            history.created_by = cmd.clone();
                        }
                    }
                }
                Err(e) => output.warning(&format!("skipping malformed container config: {}", e)),
            }

            history
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::manifest::{FsLayer, V1HistoryEntry};

    fn hex_digest(fill: char) -> String {
        format!("sha256:{}", fill.to_string().repeat(64))
    }

    fn compat_entry(id: &str, created: &str, cmd: &str) -> V1HistoryEntry {
        V1HistoryEntry {
            v1_compatibility: format!(
                r#"{{"id":"{}","created":"{}","container_config":{{"Cmd":["{}"]}}}}"#,
                id, created, cmd
            ),
        }
    }

    fn legacy_manifest(n: usize) -> LegacyManifest {
        let fills = ['a', 'b', 'c', 'd', 'e'];
        LegacyManifest {
            name: "user/component".to_string(),
            tag: "v0.0.1".to_string(),
            architecture: "amd64".to_string(),
            schema_version: 1,
            history: (0..n)
                .map(|i| {
                    compat_entry(
                        &format!("layer-{}", i),
                        &format!("202{}-01-01T00:00:00Z", i),
                        &format!("/bin/sh -c step-{}", i),
                    )
                })
                .collect(),
            fs_layers: (0..n)
                .map(|i| FsLayer {
                    blob_sum: hex_digest(fills[i]),
                })
                .collect(),
        }
    }

    #[test]
    fn test_conversion_preserves_count_and_order() {
        let ms = legacy_manifest(3);
        let sizes = [10, 20, 30];
        let converted =
            convert_legacy_manifest(&ms, &sizes, &OutputManager::new_quiet()).unwrap();

        let config: Compatibility =
            serde_json::from_slice(&converted.config_bytes).unwrap();
        assert_eq!(config.rootfs.fs_type, "layers");
        assert_eq!(config.rootfs.diff_ids.len(), 3);
        assert_eq!(config.history.len(), 3);
        // diff_ids keep fsLayers order verbatim
        assert_eq!(config.rootfs.diff_ids[0], hex_digest('a'));
        assert_eq!(config.rootfs.diff_ids[2], hex_digest('c'));
        // history entries keep input order, index 0 first
        assert_eq!(config.history[0].created, "2020-01-01T00:00:00Z");
        assert_eq!(config.history[0].created_by, "/bin/sh -c step-0");

        assert_eq!(converted.manifest.schema_version, 2);
        assert_eq!(converted.manifest.layers.len(), 3);
        assert_eq!(converted.manifest.layers[1].size, 20);
        assert_eq!(converted.manifest.layers[1].digest, hex_digest('b'));
    }

    #[test]
    fn test_config_digest_matches_written_bytes() {
        let ms = legacy_manifest(2);
        let converted =
            convert_legacy_manifest(&ms, &[1, 2], &OutputManager::new_quiet()).unwrap();
        assert_eq!(
            converted.config_digest,
            DigestUtils::compute_digest(&converted.config_bytes)
        );
        assert_eq!(converted.manifest.config.digest, converted.config_digest);
        assert_eq!(
            converted.manifest.config.size,
            converted.config_bytes.len() as u64
        );
        assert!(DigestUtils::is_valid_digest(&converted.config_digest));
    }

    #[test]
    fn test_null_command_leaves_created_by_empty() {
        let mut ms = legacy_manifest(2);
        ms.history[1] = compat_entry("layer-1", "2021-01-01T00:00:00Z", "(null)");
        let converted =
            convert_legacy_manifest(&ms, &[1, 2], &OutputManager::new_quiet()).unwrap();
        let config: Compatibility = serde_json::from_slice(&converted.config_bytes).unwrap();
        assert!(!config.history[0].created_by.is_empty());
        assert!(config.history[1].created_by.is_empty());
    }

    #[test]
    fn test_malformed_history_entry_is_tolerated() {
        let mut ms = legacy_manifest(3);
        ms.history[1] = V1HistoryEntry {
            v1_compatibility: "not json at all".to_string(),
        };
        let converted =
            convert_legacy_manifest(&ms, &[1, 2, 3], &OutputManager::new_quiet()).unwrap();
        let config: Compatibility = serde_json::from_slice(&converted.config_bytes).unwrap();
        // still three entries, the malformed one defaults to empty
        assert_eq!(config.history.len(), 3);
        assert!(config.history[1].created.is_empty());
        assert!(!config.history[2].created.is_empty());
    }

    #[test]
    fn test_malformed_top_entry_aborts() {
        let mut ms = legacy_manifest(2);
        ms.history[0] = V1HistoryEntry {
            v1_compatibility: "garbage".to_string(),
        };
        assert!(convert_legacy_manifest(&ms, &[1, 2], &OutputManager::new_quiet()).is_err());
    }

    #[test]
    fn test_mismatched_history_and_fslayers_rejected() {
        let mut ms = legacy_manifest(3);
        ms.fs_layers.pop();
        assert!(convert_legacy_manifest(&ms, &[1, 2], &OutputManager::new_quiet()).is_err());
    }
}
