//! Image manifest data shapes and schema conversion

pub mod convert;
pub mod manifest;

/// OCI image manifest media type, used for Accept/Content-Type
/// negotiation and index entries.
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI image config media type.
pub const MEDIA_TYPE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

/// Gzip-compressed layer media type.
pub const MEDIA_TYPE_LAYER: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// rootfs type the OCI image spec mandates.
pub const ROOTFS_TYPE_LAYERS: &str = "layers";
