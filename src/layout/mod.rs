//! On-disk OCI image layout
//!
//! ```text
//! <path>/manifest.json             raw registry manifest response (pull)
//! <path>/index.json                Index root object
//! <path>/blobs/sha256/<hex>        one file per blob/config/manifest
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::image::manifest::{Index, IndexEntry, RefAnnotations};
use crate::image::MEDIA_TYPE_MANIFEST;

const INDEX_JSON: &str = "index.json";
const MANIFEST_JSON: &str = "manifest.json";
const BLOBS_DIR: &str = "blobs/sha256";

/// Handle to one layout directory. Creation is idempotent; blob files
/// already holding the correct bytes are never rewritten.
#[derive(Debug, Clone)]
pub struct OciLayout {
    root: PathBuf,
}

impl OciLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the layout directory tree, idempotently.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.blobs_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }

    /// Deterministic blob path: `<root>/blobs/sha256/<hex>`.
    pub fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        let hex_part = DigestUtils::extract_hex_part(digest)?;
        Ok(self.blobs_dir().join(hex_part))
    }

    /// True when the blob file exists and its bytes hash to the digest.
    pub fn has_verified_blob(&self, digest: &str) -> Result<bool> {
        let path = self.blob_path(digest)?;
        if !path.exists() {
            return Ok(false);
        }
        let data = fs::read(&path)?;
        Ok(DigestUtils::verify(&data, digest).is_ok())
    }

    /// Write a blob after verifying its bytes against the digest. A
    /// pre-existing file with matching content is left untouched; a
    /// leftover whose bytes no longer hash to the digest is repaired.
    pub fn write_blob(&self, digest: &str, data: &[u8]) -> Result<PathBuf> {
        DigestUtils::verify(data, digest)?;
        let path = self.blob_path(digest)?;
        if path.exists() {
            let existing = fs::read(&path)?;
            if DigestUtils::verify(&existing, digest).is_ok() {
                return Ok(path);
            }
        }
        fs::write(&path, data)?;
        Ok(path)
    }

    pub fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(digest)?;
        Ok(fs::read(path)?)
    }

    /// Persist the raw registry manifest response verbatim, for audit.
    pub fn write_raw_manifest(&self, data: &[u8]) -> Result<()> {
        fs::write(self.root.join(MANIFEST_JSON), data)?;
        Ok(())
    }

    pub fn write_index(&self, index: &Index) -> Result<()> {
        let data = serde_json::to_vec(index)?;
        fs::write(self.root.join(INDEX_JSON), data)?;
        Ok(())
    }

    pub fn read_index(&self) -> Result<Index> {
        let path = self.root.join(INDEX_JSON);
        let data = fs::read(&path).map_err(|e| {
            RegistryError::Validation(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Unified manifest path: store the serialized manifest as a blob
    /// named by its computed digest and point `index.json` at it. Both
    /// pull branches and nothing else produce the on-disk manifest, so
    /// every layout ends up with one canonical shape.
    pub fn write_image_manifest(&self, manifest_bytes: &[u8], ref_name: &str) -> Result<String> {
        let digest = DigestUtils::compute_digest(manifest_bytes);
        self.write_blob(&digest, manifest_bytes)?;

        let index = Index {
            schema_version: 2,
            manifests: vec![IndexEntry {
                media_type: MEDIA_TYPE_MANIFEST.to_string(),
                digest: digest.clone(),
                size: manifest_bytes.len() as u64,
                annotations: RefAnnotations {
                    ref_name: ref_name.to_string(),
                },
            }],
        };
        self.write_index(&index)?;
        Ok(digest)
    }

    /// Enumerate every blob file in the store as (hex name, path).
    pub fn list_blobs(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut blobs = Vec::new();
        for entry in fs::read_dir(self.blobs_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                blobs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        blobs.sort();
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::manifest::{IndexEntry, RefAnnotations};

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path().join("oci"));
        layout.ensure().unwrap();
        layout.ensure().unwrap();
        assert!(dir.path().join("oci/blobs/sha256").is_dir());
    }

    #[test]
    fn test_blob_path_uses_hex_suffix() {
        let layout = OciLayout::new("/tmp/oci");
        let digest = format!("sha256:{}", "a".repeat(64));
        let path = layout.blob_path(&digest).unwrap();
        assert!(path.ends_with(format!("blobs/sha256/{}", "a".repeat(64))));
        assert!(layout.blob_path("sha256:short").is_err());
    }

    #[test]
    fn test_write_blob_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path());
        layout.ensure().unwrap();

        let data = b"layer contents";
        let digest = crate::digest::DigestUtils::compute_digest(data);
        let path = layout.write_blob(&digest, data).unwrap();
        assert_eq!(fs::read(path).unwrap(), data);

        let wrong = format!("sha256:{}", "0".repeat(64));
        assert!(layout.write_blob(&wrong, data).is_err());
    }

    #[test]
    fn test_existing_blob_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path());
        layout.ensure().unwrap();

        let data = b"blob";
        let digest = crate::digest::DigestUtils::compute_digest(data);
        layout.write_blob(&digest, data).unwrap();
        assert!(layout.has_verified_blob(&digest).unwrap());
        // second write with identical content succeeds and leaves the file alone
        layout.write_blob(&digest, data).unwrap();
        assert_eq!(layout.read_blob(&digest).unwrap(), data);
    }

    #[test]
    fn test_write_blob_repairs_corrupt_leftover() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path());
        layout.ensure().unwrap();

        let good = b"real layer bytes";
        let digest = crate::digest::DigestUtils::compute_digest(good);

        // a leftover file at the blob path whose content does not hash
        // to the digest must be replaced, not kept
        let path = layout.blob_path(&digest).unwrap();
        fs::write(&path, b"corrupt garbage").unwrap();
        assert!(!layout.has_verified_blob(&digest).unwrap());

        layout.write_blob(&digest, good).unwrap();
        assert_eq!(fs::read(&path).unwrap(), good);
        assert!(layout.has_verified_blob(&digest).unwrap());
    }

    #[test]
    fn test_index_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path());
        layout.ensure().unwrap();

        let index = Index {
            schema_version: 2,
            manifests: vec![IndexEntry {
                media_type: crate::image::MEDIA_TYPE_MANIFEST.to_string(),
                digest: format!("sha256:{}", "b".repeat(64)),
                size: 7,
                annotations: RefAnnotations {
                    ref_name: "registry.local/app:v1".to_string(),
                },
            }],
        };
        layout.write_index(&index).unwrap();
        let read = layout.read_index().unwrap();
        assert_eq!(read.manifests.len(), 1);
        assert_eq!(read.manifests[0].annotations.ref_name, "registry.local/app:v1");

        // identical content rewrites byte-identically
        let first = fs::read(dir.path().join("index.json")).unwrap();
        layout.write_index(&index).unwrap();
        let second = fs::read(dir.path().join("index.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_image_manifest_unified_shape() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path());
        layout.ensure().unwrap();

        let manifest_bytes = br#"{"schemaVersion":2}"#;
        let digest = layout
            .write_image_manifest(manifest_bytes, "registry.local/app:v1")
            .unwrap();

        // manifest stored as a blob named by its own digest
        assert_eq!(layout.read_blob(&digest).unwrap(), manifest_bytes);

        // index has exactly one entry pointing at it
        let index = layout.read_index().unwrap();
        assert_eq!(index.schema_version, 2);
        assert_eq!(index.manifests.len(), 1);
        assert_eq!(index.manifests[0].digest, digest);
        assert_eq!(index.manifests[0].size, manifest_bytes.len() as u64);
        assert_eq!(
            index.manifests[0].annotations.ref_name,
            "registry.local/app:v1"
        );
    }

    #[test]
    fn test_list_blobs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OciLayout::new(dir.path());
        layout.ensure().unwrap();

        for data in [b"one".as_slice(), b"two".as_slice(), b"three".as_slice()] {
            let digest = crate::digest::DigestUtils::compute_digest(data);
            layout.write_blob(&digest, data).unwrap();
        }
        let blobs = layout.list_blobs().unwrap();
        assert_eq!(blobs.len(), 3);
        let names: Vec<_> = blobs.iter().map(|(name, _)| name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
