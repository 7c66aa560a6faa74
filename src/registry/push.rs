//! Push pipeline: read an OCI layout, upload its blobs, publish the
//! manifest.
//!
//! Existence is checked per blob (`HEAD`) so content the registry
//! already holds is not re-uploaded; skipped blobs still count toward
//! the outgoing manifest. The manifest itself is assembled fresh from
//! the classified blobs and `PUT` last, after every upload succeeded.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ServiceRequest;
use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::image::manifest::{Descriptor, OciImageManifest};
use crate::image::{MEDIA_TYPE_CONFIG, MEDIA_TYPE_LAYER};
use crate::layout::OciLayout;
use crate::output::OutputManager;
use crate::registry::auth::Scope;
use crate::registry::pull::build_client;
use crate::transfer::{TransferEngine, TransferredBlob};

/// Push the OCI layout under `request.path` to the registry as
/// `<image>:<tag>`.
pub async fn push_to_registry(request: &ServiceRequest, output: &OutputManager) -> Result<()> {
    request.validate()?;

    let layout = OciLayout::new(&request.path);
    let index = layout.read_index()?;
    let entry = index.manifests.first().ok_or_else(|| {
        RegistryError::Validation("index.json carries no manifest entry".to_string())
    })?;

    let manifest_bytes = layout.read_blob(&entry.digest)?;
    let manifest: OciImageManifest = serde_json::from_slice(&manifest_bytes)?;
    output.verbose(&format!(
        "layout manifest {} references {} layer(s)",
        entry.digest,
        manifest.layers.len()
    ));

    let blob_paths = cross_check_blobs(&layout, &manifest, entry, output)?;

    let client = Arc::new(build_client(request, Scope::Push, output).await?);
    let engine = TransferEngine::new(Arc::clone(&client), request.concurrency, output.clone());

    output.info(&format!(
        "uploading {} blob(s) with {} in flight",
        blob_paths.len(),
        request.concurrency
    ));
    let transferred = engine.upload_blobs(&blob_paths).await?;

    let (config, layers) = classify_blobs(&transferred, &manifest.config.digest)?;
    let outgoing = OciImageManifest {
        schema_version: 2,
        config,
        layers,
        annotations: None,
    };

    let body = serde_json::to_vec(&outgoing)?;
    output.info(&format!(
        "publishing manifest for {}:{}",
        request.reference.full_image(),
        request.tag
    ));
    client.put_manifest(&request.tag, body).await?;

    output.success(&format!("pushed {}", request.ref_name()));
    Ok(())
}

/// Verify the blob store against the manifest before any upload: every
/// referenced blob must exist on disk and its bytes must hash to the
/// digest the manifest records; files the manifest does not reference
/// are skipped with a warning.
fn cross_check_blobs(
    layout: &OciLayout,
    manifest: &OciImageManifest,
    index_entry: &crate::image::manifest::IndexEntry,
    output: &OutputManager,
) -> Result<Vec<std::path::PathBuf>> {
    let mut referenced: Vec<&str> = vec![manifest.config.digest.as_str()];
    referenced.extend(manifest.layers.iter().map(|l| l.digest.as_str()));

    let mut missing = Vec::new();
    let mut corrupt = Vec::new();
    let mut paths = Vec::new();
    for digest in &referenced {
        let path = layout.blob_path(digest)?;
        if !path.exists() {
            missing.push(digest.to_string());
        } else if !layout.has_verified_blob(digest)? {
            corrupt.push(digest.to_string());
        } else {
            paths.push(path);
        }
    }
    if !missing.is_empty() {
        return Err(RegistryError::Validation(format!(
            "layout is missing blob(s) referenced by the manifest: {}",
            missing.join(", ")
        )));
    }
    if !corrupt.is_empty() {
        return Err(RegistryError::Validation(format!(
            "layout blob(s) do not hash to their recorded digest: {}",
            corrupt.join(", ")
        )));
    }

    let referenced_hex: HashSet<&str> = referenced
        .iter()
        .filter_map(|d| d.strip_prefix("sha256:"))
        .collect();
    let manifest_hex = DigestUtils::extract_hex_part(&index_entry.digest)?;
    for (name, _) in layout.list_blobs()? {
        if name != manifest_hex && !referenced_hex.contains(name.as_str()) {
            output.warning(&format!("blob {} is not referenced by the manifest, skipping", name));
        }
    }

    Ok(paths)
}

/// Split uploaded blobs into the config descriptor and the layer
/// sequence. Classification is by digest equality with the expected
/// config digest, independent of enumeration order.
fn classify_blobs(
    transferred: &[TransferredBlob],
    config_digest: &str,
) -> Result<(Descriptor, Vec<Descriptor>)> {
    let mut config = None;
    let mut layers = Vec::new();

    for blob in transferred {
        if blob.digest == config_digest {
            config = Some(Descriptor {
                media_type: MEDIA_TYPE_CONFIG.to_string(),
                digest: blob.digest.clone(),
                size: blob.size,
            });
        } else {
            layers.push(Descriptor {
                media_type: MEDIA_TYPE_LAYER.to_string(),
                digest: blob.digest.clone(),
                size: blob.size,
            });
        }
    }

    let config = config.ok_or_else(|| {
        RegistryError::Validation(format!(
            "no uploaded blob matches the config digest {}",
            config_digest
        ))
    })?;
    Ok((config, layers))
}
