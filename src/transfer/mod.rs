//! Concurrent blob transfer engine
//!
//! Every blob is an independently scheduled unit of work, bounded by a
//! semaphore sized to the configured in-flight maximum. The engine waits
//! on the full batch before returning and collects every failure rather
//! than stopping at the first, so the caller sees the complete set.
//! Results come back in input order regardless of completion order.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::digest::DigestUtils;
use crate::error::{BlobFailure, RegistryError, Result};
use crate::layout::OciLayout;
use crate::output::OutputManager;
use crate::registry::client::RegistryClient;

/// Outcome of one blob transfer.
#[derive(Debug, Clone)]
pub struct TransferredBlob {
    pub digest: String,
    pub size: u64,
    /// Transfer was skipped because the content already existed at the
    /// destination (on disk for downloads, on the registry for uploads).
    pub skipped: bool,
}

pub struct TransferEngine {
    client: Arc<RegistryClient>,
    max_in_flight: usize,
    output: OutputManager,
}

impl TransferEngine {
    pub fn new(client: Arc<RegistryClient>, max_in_flight: usize, output: OutputManager) -> Self {
        Self {
            client,
            max_in_flight: max_in_flight.max(1),
            output,
        }
    }

    /// Download every digest into the layout's blob store.
    pub async fn download_blobs(
        &self,
        digests: &[String],
        layout: &OciLayout,
    ) -> Result<Vec<TransferredBlob>> {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));

        let futures = digests.iter().map(|digest| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.map_err(|e| BlobFailure {
                    digest: digest.clone(),
                    reason: format!("transfer slot unavailable: {}", e),
                })?;
                self.download_one(digest, layout)
                    .await
                    .map_err(|e| BlobFailure {
                        digest: digest.clone(),
                        reason: e.to_string(),
                    })
            }
        });

        collect_results(join_all(futures).await)
    }

    async fn download_one(&self, digest: &str, layout: &OciLayout) -> Result<TransferredBlob> {
        if layout.has_verified_blob(digest)? {
            self.output
                .verbose(&format!("blob {} already present, skipping", digest));
            let size = fs::metadata(layout.blob_path(digest)?)?.len();
            return Ok(TransferredBlob {
                digest: digest.to_string(),
                size,
                skipped: true,
            });
        }

        let data = self.client.fetch_blob(digest).await?;
        // write_blob re-hashes the body and fails on mismatch
        layout.write_blob(digest, &data)?;
        self.output.verbose(&format!(
            "wrote blob {} ({})",
            digest,
            self.output.format_size(data.len() as u64)
        ));

        Ok(TransferredBlob {
            digest: digest.to_string(),
            size: data.len() as u64,
            skipped: false,
        })
    }

    /// Upload local blob files, skipping those the registry already has.
    /// Skipped blobs are still reported so the caller can classify them.
    pub async fn upload_blobs(&self, files: &[PathBuf]) -> Result<Vec<TransferredBlob>> {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));

        let futures = files.iter().map(|path| {
            let semaphore = Arc::clone(&semaphore);
            let blob_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            async move {
                let _permit = semaphore.acquire().await.map_err(|e| BlobFailure {
                    digest: blob_name.clone(),
                    reason: format!("transfer slot unavailable: {}", e),
                })?;
                self.upload_one(path).await.map_err(|e| BlobFailure {
                    digest: blob_name,
                    reason: e.to_string(),
                })
            }
        });

        collect_results(join_all(futures).await)
    }

    async fn upload_one(&self, path: &PathBuf) -> Result<TransferredBlob> {
        let data = fs::read(path)?;
        let digest = DigestUtils::compute_digest(&data);
        let size = data.len() as u64;

        if self.client.blob_exists(&digest).await? {
            self.output
                .verbose(&format!("registry already has {}, skipping upload", digest));
            return Ok(TransferredBlob {
                digest,
                size,
                skipped: true,
            });
        }

        let session = self.client.start_blob_upload().await?;
        self.output.detail(&format!(
            "upload session {} at {}",
            session.uuid, session.location
        ));
        self.client
            .complete_blob_upload(&session, &digest, data)
            .await?;
        self.output.verbose(&format!(
            "uploaded blob {} ({})",
            digest,
            self.output.format_size(size)
        ));

        Ok(TransferredBlob {
            digest,
            size,
            skipped: false,
        })
    }
}

/// Aggregate per-blob outcomes: all successes in input order, or one
/// error carrying every failure.
fn collect_results(
    results: Vec<std::result::Result<TransferredBlob, BlobFailure>>,
) -> Result<Vec<TransferredBlob>> {
    let mut transferred = Vec::with_capacity(results.len());
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(blob) => transferred.push(blob),
            Err(failure) => failures.push(failure),
        }
    }

    if failures.is_empty() {
        Ok(transferred)
    } else {
        Err(RegistryError::BlobTransfer(failures))
    }
}
