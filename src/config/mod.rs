//! Request configuration and image reference parsing

use crate::error::{RegistryError, Result};

/// Parsed `registry/[namespace/]repository` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub namespace: Option<String>,
    pub repository: String,
}

impl ImageReference {
    /// Parse a reference string such as `quay.io/user/component` or
    /// `registry.local/app`. The namespace may itself contain slashes.
    pub fn parse(image: &str) -> Result<Self> {
        let parts: Vec<&str> = image.split('/').collect();
        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(RegistryError::Reference(format!(
                "expected registry/[namespace/]repository, got '{}'",
                image
            )));
        }

        let registry = parts[0].to_string();
        let repository = parts[parts.len() - 1].to_string();
        let namespace = if parts.len() > 2 {
            Some(parts[1..parts.len() - 1].join("/"))
        } else {
            None
        };

        Ok(Self {
            registry,
            namespace,
            repository,
        })
    }

    /// Repository name as the registry scopes it: `[namespace/]repository`.
    pub fn name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.repository),
            None => self.repository.clone(),
        }
    }

    /// Canonical registry API base URL:
    /// `scheme://host/v2/[namespace/]repository`.
    pub fn api_base(&self, tls: bool) -> String {
        let scheme = if tls { "https" } else { "http" };
        format!("{}://{}/v2/{}", scheme, self.registry, self.name())
    }

    /// Registry origin without a repository path, used for auth probes.
    pub fn registry_base(&self, tls: bool) -> String {
        let scheme = if tls { "https" } else { "http" };
        format!("{}://{}", scheme, self.registry)
    }

    /// The `<image>` string a layout's ref.name annotation records.
    pub fn full_image(&self) -> String {
        format!("{}/{}", self.registry, self.name())
    }
}

/// Immutable per-invocation configuration, built once by the CLI layer
/// and passed by reference into the core.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub reference: ImageReference,
    pub tag: String,
    pub path: String,
    pub tls: bool,
    pub basic_auth: bool,
    pub concurrency: usize,
    pub timeout: u64,
}

impl ServiceRequest {
    pub fn new(image: &str, tag: &str, path: &str) -> Result<Self> {
        Ok(Self {
            reference: ImageReference::parse(image)?,
            tag: tag.to_string(),
            path: path.to_string(),
            tls: true,
            basic_auth: false,
            concurrency: 4,
            timeout: 300,
        })
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_basic_auth(mut self, basic_auth: bool) -> Self {
        self.basic_auth = basic_auth;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base(&self) -> String {
        self.reference.api_base(self.tls)
    }

    /// `"<image>:<tag>"`, the ref.name annotation value.
    pub fn ref_name(&self) -> String {
        format!("{}:{}", self.reference.full_image(), self.tag)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tag.is_empty() {
            return Err(RegistryError::Validation("tag cannot be empty".to_string()));
        }
        if self.path.is_empty() {
            return Err(RegistryError::Validation(
                "path cannot be empty".to_string(),
            ));
        }
        if self.timeout == 0 {
            return Err(RegistryError::Validation(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_part_reference() {
        let r = ImageReference::parse("registry.local/app").unwrap();
        assert_eq!(r.registry, "registry.local");
        assert_eq!(r.namespace, None);
        assert_eq!(r.repository, "app");
        assert_eq!(r.api_base(true), "https://registry.local/v2/app");
    }

    #[test]
    fn test_parse_three_part_reference() {
        let r = ImageReference::parse("quay.io/user/component").unwrap();
        assert_eq!(r.registry, "quay.io");
        assert_eq!(r.namespace.as_deref(), Some("user"));
        assert_eq!(r.repository, "component");
        assert_eq!(r.name(), "user/component");
        assert_eq!(r.api_base(true), "https://quay.io/v2/user/component");
    }

    #[test]
    fn test_parse_deep_namespace() {
        let r = ImageReference::parse("registry.io/org/team/app").unwrap();
        assert_eq!(r.namespace.as_deref(), Some("org/team"));
        assert_eq!(r.name(), "org/team/app");
    }

    #[test]
    fn test_parse_rejects_malformed_references() {
        assert!(ImageReference::parse("justaname").is_err());
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("host//app").is_err());
    }

    #[test]
    fn test_tls_flag_selects_scheme() {
        let r = ImageReference::parse("registry.local/app").unwrap();
        assert_eq!(r.api_base(false), "http://registry.local/v2/app");
        assert_eq!(r.registry_base(false), "http://registry.local");
    }

    #[test]
    fn test_ref_name_annotation() {
        let req = ServiceRequest::new("quay.io/user/component", "v0.0.1", "oci").unwrap();
        assert_eq!(req.ref_name(), "quay.io/user/component:v0.0.1");
    }
}
