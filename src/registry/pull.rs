//! Pull pipeline: fetch a manifest, download its blobs, materialize an
//! OCI layout on disk.
//!
//! The manifest branch is decided by `schemaVersion`: legacy schema-1
//! manifests go through conversion, schema-2 manifests are stored as
//! fetched. Both branches finish through the same layout writer, so the
//! on-disk shape is identical either way.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServiceRequest;
use crate::error::{RegistryError, Result};
use crate::image::convert::convert_legacy_manifest;
use crate::image::manifest::{LegacyManifest, OciImageManifest, SchemaVersionProbe};
use crate::layout::OciLayout;
use crate::output::OutputManager;
use crate::registry::auth::{basic_auth_from_env, CredentialResolver, Scope};
use crate::registry::client::RegistryClient;
use crate::transfer::TransferEngine;

/// Pull `<image>:<tag>` from the registry and save it under
/// `request.path` as an OCI layout.
pub async fn copy_to_disk(request: &ServiceRequest, output: &OutputManager) -> Result<()> {
    request.validate()?;

    let client = Arc::new(build_client(request, Scope::Pull, output).await?);
    let engine = TransferEngine::new(Arc::clone(&client), request.concurrency, output.clone());

    output.info(&format!(
        "fetching manifest for {}:{}",
        request.reference.full_image(),
        request.tag
    ));
    let raw_manifest = client.fetch_manifest(&request.tag).await?;

    // branch before touching the filesystem so an unsupported schema
    // leaves no files behind
    let schema_version = schema_branch(&raw_manifest)?;

    let layout = OciLayout::new(&request.path);
    layout.ensure()?;
    layout.write_raw_manifest(&raw_manifest)?;

    match schema_version {
        1 => pull_legacy(request, &raw_manifest, &engine, &layout, output).await,
        _ => pull_oci(request, &raw_manifest, &engine, &layout, output).await,
    }
}

/// Decode the manifest's schemaVersion and decide the branch. Any value
/// outside {1, 2} is rejected here, before any file is written.
fn schema_branch(raw_manifest: &[u8]) -> Result<u64> {
    let probe: SchemaVersionProbe = serde_json::from_slice(raw_manifest)?;
    match probe.schema_version {
        1 | 2 => Ok(probe.schema_version),
        other => Err(RegistryError::UnsupportedSchema(other)),
    }
}

/// Schema-2 path: download config and layers, store the registry's
/// manifest bytes verbatim as the manifest blob.
async fn pull_oci(
    request: &ServiceRequest,
    raw_manifest: &[u8],
    engine: &TransferEngine,
    layout: &OciLayout,
    output: &OutputManager,
) -> Result<()> {
    let ocim: OciImageManifest = serde_json::from_slice(raw_manifest)?;

    let mut digests: Vec<String> = vec![ocim.config.digest.clone()];
    digests.extend(ocim.layers.iter().map(|l| l.digest.clone()));

    output.info(&format!(
        "downloading {} blob(s) with {} in flight",
        digests.len(),
        request.concurrency
    ));
    engine.download_blobs(&digests, layout).await?;

    let manifest_digest = layout.write_image_manifest(raw_manifest, &request.ref_name())?;
    output.success(&format!(
        "saved {} to {} (manifest {})",
        request.ref_name(),
        request.path,
        manifest_digest
    ));
    Ok(())
}

/// Schema-1 path: download the fsLayer blobs, synthesize an OCI config
/// and manifest from the embedded compatibility JSON, store both.
async fn pull_legacy(
    request: &ServiceRequest,
    raw_manifest: &[u8],
    engine: &TransferEngine,
    layout: &OciLayout,
    output: &OutputManager,
) -> Result<()> {
    let ms: LegacyManifest = serde_json::from_slice(raw_manifest)?;
    output.verbose(&format!(
        "legacy schema 1 manifest: {} layer(s), architecture {}",
        ms.fs_layers.len(),
        ms.architecture
    ));

    let digests: Vec<String> = ms.fs_layers.iter().map(|l| l.blob_sum.clone()).collect();
    output.info(&format!(
        "downloading {} blob(s) with {} in flight",
        digests.len(),
        request.concurrency
    ));
    let transferred = engine.download_blobs(&digests, layout).await?;
    let layer_sizes: Vec<u64> = transferred.iter().map(|b| b.size).collect();

    let converted = convert_legacy_manifest(&ms, &layer_sizes, output)?;
    layout.write_blob(&converted.config_digest, &converted.config_bytes)?;
    output.verbose(&format!(
        "synthesized image config {}",
        converted.config_digest
    ));

    let manifest_bytes = serde_json::to_vec(&converted.manifest)?;
    let manifest_digest = layout.write_image_manifest(&manifest_bytes, &request.ref_name())?;
    output.success(&format!(
        "converted {} to OCI layout at {} (manifest {})",
        request.ref_name(),
        request.path,
        manifest_digest
    ));
    Ok(())
}

/// Resolve credentials for the requested scope and build the
/// repository-scoped client.
pub(crate) async fn build_client(
    request: &ServiceRequest,
    scope: Scope,
    output: &OutputManager,
) -> Result<RegistryClient> {
    let credentials = if request.basic_auth {
        output.verbose("using basic auth credentials from environment");
        basic_auth_from_env()?
    } else {
        CredentialResolver::new(output.clone())
            .resolve(&request.reference, request.tls, scope)
            .await?
    };

    RegistryClient::builder(request.api_base())
        .with_credentials(credentials)
        .with_timeout(Duration::from_secs(request.timeout))
        .build()
}
