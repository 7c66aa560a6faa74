//! HTTP client for the registry distribution API
//!
//! One client per repository, pre-configured with the resolved
//! credentials and the canonical `scheme://host/v2/<name>` base URL.
//! Every method attaches the credentials and maps non-success responses
//! to `RegistryError::Protocol`, surfacing the registry's structured
//! error body when it parses.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};

use crate::error::{RegistryError, Result};
use crate::image::manifest::RegistryErrorBody;
use crate::image::MEDIA_TYPE_MANIFEST;
use crate::registry::auth::Credentials;

pub struct RegistryClientBuilder {
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
}

impl RegistryClientBuilder {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            credentials: Credentials::Anonymous,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Per-request timeout, distinct from any outer operation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(RegistryClient {
            client,
            base_url: self.base_url,
            credentials: self.credentials,
        })
    }
}

pub struct RegistryClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl RegistryClient {
    pub fn builder(base_url: String) -> RegistryClientBuilder {
        RegistryClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Anonymous => request,
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Bearer(token) => request.bearer_auth(token),
        }
    }

    /// `GET <base>/manifests/<reference>`, returning the raw body.
    pub async fn fetch_manifest(&self, reference: &str) -> Result<Vec<u8>> {
        let url = format!("{}/manifests/{}", self.base_url, reference);
        let request = self
            .client
            .get(&url)
            .header("Accept", MEDIA_TYPE_MANIFEST);

        let response = self.apply_auth(request).send().await?;
        if response.status().as_u16() != 200 {
            return Err(protocol_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// `PUT <base>/manifests/<reference>` with the serialized manifest.
    pub async fn put_manifest(&self, reference: &str, body: Vec<u8>) -> Result<()> {
        let url = format!("{}/manifests/{}", self.base_url, reference);
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, MEDIA_TYPE_MANIFEST)
            .body(body);

        let response = self.apply_auth(request).send().await?;
        if !response.status().is_success() {
            return Err(protocol_error(response).await);
        }
        Ok(())
    }

    /// `GET <base>/blobs/<digest>`, returning the raw blob bytes.
    pub async fn fetch_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let url = format!("{}/blobs/{}", self.base_url, digest);
        let response = self.apply_auth(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(protocol_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// `HEAD <base>/blobs/<digest>`: 200 means the registry has it.
    pub async fn blob_exists(&self, digest: &str) -> Result<bool> {
        let url = format!("{}/blobs/{}", self.base_url, digest);
        let response = self.apply_auth(self.client.head(&url)).send().await?;
        Ok(response.status().as_u16() == 200)
    }

    /// `POST <base>/blobs/uploads/`, returning the session's Location
    /// and upload UUID.
    pub async fn start_blob_upload(&self) -> Result<UploadSession> {
        let url = format!("{}/blobs/uploads/", self.base_url);
        let response = self.apply_auth(self.client.post(&url)).send().await?;
        if !response.status().is_success() {
            return Err(protocol_error(response).await);
        }

        let uuid = response
            .headers()
            .get("Docker-Upload-UUID")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let location = response
            .headers()
            .get("Location")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| RegistryError::Protocol {
                status: response.status().as_u16(),
                body: "upload session response carried no Location header".to_string(),
            })?;

        // registries may answer with a path-relative location
        let location = if location.starts_with('/') {
            match url::Url::parse(&self.base_url) {
                Ok(base) => format!(
                    "{}://{}{}",
                    base.scheme(),
                    base.authority(),
                    location
                ),
                Err(_) => location.to_string(),
            }
        } else {
            location.to_string()
        };

        Ok(UploadSession { location, uuid })
    }

    /// Complete an upload session: `PUT <location>[?&]digest=<digest>`
    /// with the full blob body.
    pub async fn complete_blob_upload(
        &self,
        session: &UploadSession,
        digest: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        let separator = if session.location.contains('?') { '&' } else { '?' };
        let url = format!("{}{}digest={}", session.location, separator, digest);

        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, data.len())
            .body(data);

        let response = self.apply_auth(request).send().await?;
        if !response.status().is_success() {
            return Err(protocol_error(response).await);
        }
        Ok(())
    }
}

/// An open blob upload session.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub location: String,
    pub uuid: String,
}

async fn protocol_error(response: Response) -> RegistryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<RegistryErrorBody>(&body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join(", "),
        _ => body,
    };
    RegistryError::Protocol { status, body }
}
