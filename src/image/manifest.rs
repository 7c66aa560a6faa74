//! Serde data shapes for registry manifests and the OCI layout
//!
//! Covers both wire formats the registry can answer with: the legacy
//! schema-1 manifest with its embedded per-layer compatibility JSON, and
//! the schema-2 OCI image manifest. Also the `index.json` root object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Minimal probe used to branch on the manifest schema version before
/// committing to a full decode.
#[derive(Debug, Deserialize)]
pub struct SchemaVersionProbe {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u64,
}

/// Blob descriptor: a registry `config`/`layers` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseImageAnnotations {
    #[serde(
        rename = "org.opencontainers.image.base.digest",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub base_digest: String,
    #[serde(
        rename = "org.opencontainers.image.base.name",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub base_name: String,
}

/// Schema-2 OCI image manifest, both the wire format and the shape
/// stored as a manifest blob in the layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciImageManifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u64,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BaseImageAnnotations>,
}

/// Schema-1 `fsLayers` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FsLayer {
    #[serde(rename = "blobSum")]
    pub blob_sum: String,
}

/// Schema-1 `history` entry: escaped JSON carrying the per-layer
/// legacy config.
#[derive(Debug, Clone, Deserialize)]
pub struct V1HistoryEntry {
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: String,
}

/// Legacy schema-1 manifest as returned by older registries. Index 0 of
/// `history`/`fsLayers` describes the top layer; base layers sit at the
/// highest indices.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: u64,
    pub history: Vec<V1HistoryEntry>,
    #[serde(rename = "fsLayers")]
    pub fs_layers: Vec<FsLayer>,
}

/// Container runtime config embedded in a compatibility blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "User", default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(rename = "Env", default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(rename = "Entrypoint", default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(
        rename = "WorkingDir",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub working_dir: String,
    #[serde(rename = "Labels", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type", default)]
    pub fs_type: String,
    #[serde(default)]
    pub diff_ids: Vec<String>,
}

/// One `history` entry of the synthesized image config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySchema {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// Per-layer legacy config parsed out of `v1Compatibility`. After
/// conversion this doubles as the OCI image config that gets written
/// into the blob store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Compatibility {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default)]
    pub config: ContainerConfig,
    #[serde(default)]
    pub rootfs: RootFs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistorySchema>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
}

/// Narrow parse of a compatibility blob extracting just the build
/// command, used to populate `created_by`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerConfigSchema {
    #[serde(default)]
    pub container_config: CommandConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandConfig {
    #[serde(rename = "Cmd", default)]
    pub cmd: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefAnnotations {
    #[serde(rename = "org.opencontainers.image.ref.name", default)]
    pub ref_name: String,
}

/// One `manifests` entry of the layout index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    pub annotations: RefAnnotations,
}

/// OCI layout root object (`index.json`). Exactly one manifest entry is
/// produced per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u64,
    pub manifests: Vec<IndexEntry>,
}

/// Structured error body some registries return on failure.
#[derive(Debug, Deserialize)]
pub struct RegistryErrorBody {
    pub errors: Vec<RegistryErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct RegistryErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
