//! Credential resolution for registry access
//!
//! Two sources, mirroring what registries actually deploy: an explicit
//! basic-auth pair decoded from the `BASIC_AUTH_CREDENTIALS` environment
//! variable, or a bearer token obtained through the registry's
//! `WWW-Authenticate` challenge using credentials discovered in the
//! local Docker config file when one exists.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::config::ImageReference;
use crate::error::{RegistryError, Result};
use crate::output::OutputManager;

/// Environment variable holding base64 of `user:password`.
pub const BASIC_AUTH_ENV: &str = "BASIC_AUTH_CREDENTIALS";

/// Required access scope for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Pull,
    Push,
}

impl Scope {
    fn actions(self) -> &'static str {
        match self {
            Scope::Pull => "pull",
            Scope::Push => "pull,push",
        }
    }
}

/// Resolved credentials, attached to every request the client issues.
#[derive(Debug, Clone)]
pub enum Credentials {
    Anonymous,
    Basic { username: String, password: String },
    Bearer(String),
}

#[derive(Debug, Deserialize)]
struct AuthChallenge {
    realm: String,
    service: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, DockerConfigAuth>,
}

#[derive(Debug, Deserialize)]
struct DockerConfigAuth {
    #[serde(default)]
    auth: Option<String>,
}

/// Decode basic-auth credentials from the environment: base64 of
/// `user:password`, split on the first colon, newline artifacts trimmed.
pub fn basic_auth_from_env() -> Result<Credentials> {
    let encoded = env::var(BASIC_AUTH_ENV)
        .map_err(|_| RegistryError::Auth(format!("{} is not set", BASIC_AUTH_ENV)))?;
    decode_basic_auth(&encoded)
}

fn decode_basic_auth(encoded: &str) -> Result<Credentials> {
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|e| RegistryError::Auth(format!("invalid base64 credentials: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| RegistryError::Auth(format!("credentials are not valid UTF-8: {}", e)))?;

    let (user, password) = decoded.split_once(':').ok_or_else(|| {
        RegistryError::Auth("credentials must decode to user:password".to_string())
    })?;

    Ok(Credentials::Basic {
        username: user.replace('\n', ""),
        password: password.replace('\n', ""),
    })
}

/// Resolves credentials for one repository and scope.
pub struct CredentialResolver {
    client: Client,
    output: OutputManager,
}

impl CredentialResolver {
    pub fn new(output: OutputManager) -> Self {
        Self {
            client: Client::new(),
            output,
        }
    }

    /// Probe the registry and resolve credentials for the given scope.
    ///
    /// A 200 on the version endpoint means no auth is required. A 401
    /// with a Bearer challenge triggers a token fetch, using Docker
    /// config credentials for the host when present and anonymous
    /// access otherwise.
    pub async fn resolve(
        &self,
        reference: &ImageReference,
        tls: bool,
        scope: Scope,
    ) -> Result<Credentials> {
        let probe_url = format!("{}/v2/", reference.registry_base(tls));
        self.output
            .detail(&format!("probing registry at {}", probe_url));

        let response = self.client.get(&probe_url).send().await?;
        let status = response.status();

        if status.is_success() {
            self.output.verbose("registry does not require authentication");
            return Ok(Credentials::Anonymous);
        }

        if status.as_u16() != 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let stored = docker_config_credentials(&reference.registry);

        let challenge = response
            .headers()
            .get("www-authenticate")
            .and_then(|h| h.to_str().ok())
            .and_then(parse_bearer_challenge);

        match challenge {
            Some(challenge) => {
                let token = self
                    .fetch_token(&challenge, reference, scope, stored.as_ref())
                    .await?;
                Ok(Credentials::Bearer(token))
            }
            None => match stored {
                // no token endpoint; fall back to stored basic credentials
                Some((username, password)) => Ok(Credentials::Basic { username, password }),
                None => Err(RegistryError::Auth(format!(
                    "registry {} requires authentication and no credentials were found",
                    reference.registry
                ))),
            },
        }
    }

    async fn fetch_token(
        &self,
        challenge: &AuthChallenge,
        reference: &ImageReference,
        scope: Scope,
        stored: Option<&(String, String)>,
    ) -> Result<String> {
        let url = format!(
            "{}?service={}&scope=repository:{}:{}",
            challenge.realm,
            challenge.service,
            reference.name(),
            scope.actions()
        );
        self.output.detail(&format!("requesting token from {}", url));

        let mut request = self.client.get(&url);
        if let Some((username, password)) = stored {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Auth(format!(
                "token request failed with status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        token_response
            .token
            .or(token_response.access_token)
            .ok_or_else(|| RegistryError::Auth("token response carried no token".to_string()))
    }
}

/// Parse `Bearer realm="...",service="..."`.
fn parse_bearer_challenge(header: &str) -> Option<AuthChallenge> {
    let params_str = header.strip_prefix("Bearer ")?;
    let mut params = HashMap::new();

    for param in params_str.split(',') {
        if let Some((key, value)) = param.trim().split_once('=') {
            params.insert(key.trim(), value.trim().trim_matches('"'));
        }
    }

    Some(AuthChallenge {
        realm: params.get("realm")?.to_string(),
        service: params.get("service").unwrap_or(&"").to_string(),
    })
}

/// Look up stored credentials for a registry host in the Docker config
/// file (`$DOCKER_CONFIG/config.json` or `~/.docker/config.json`).
fn docker_config_credentials(registry: &str) -> Option<(String, String)> {
    let config_path = docker_config_path()?;
    let data = std::fs::read(config_path).ok()?;
    let config: DockerConfigFile = serde_json::from_slice(&data).ok()?;

    let entry = config
        .auths
        .get(registry)
        .or_else(|| config.auths.get(&format!("https://{}", registry)))?;

    let decoded = BASE64.decode(entry.auth.as_deref()?).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn docker_config_path() -> Option<PathBuf> {
    if let Ok(dir) = env::var("DOCKER_CONFIG") {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".docker").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic_auth() {
        // base64 of "user:pass"
        let creds = decode_basic_auth("dXNlcjpwYXNz").unwrap();
        match creds {
            Credentials::Basic { username, password } => {
                assert_eq!(username, "user");
                assert_eq!(password, "pass");
            }
            _ => panic!("expected basic credentials"),
        }
    }

    #[test]
    fn test_decode_basic_auth_trims_newlines() {
        // base64 of "user:pass\n"
        let creds = decode_basic_auth("dXNlcjpwYXNzCg==").unwrap();
        match creds {
            Credentials::Basic { username, password } => {
                assert_eq!(username, "user");
                assert_eq!(password, "pass");
            }
            _ => panic!("expected basic credentials"),
        }
    }

    #[test]
    fn test_decode_basic_auth_rejects_bad_input() {
        assert!(decode_basic_auth("!!!not-base64!!!").is_err());
        // base64 of "nocolon"
        assert!(decode_basic_auth("bm9jb2xvbg==").is_err());
    }

    #[test]
    fn test_password_may_contain_colons() {
        // base64 of "user:pa:ss"
        let creds = decode_basic_auth("dXNlcjpwYTpzcw==").unwrap();
        match creds {
            Credentials::Basic { password, .. } => assert_eq!(password, "pa:ss"),
            _ => panic!("expected basic credentials"),
        }
    }

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = parse_bearer_challenge(
            r#"Bearer realm="https://auth.example.io/token",service="registry.example.io""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.example.io/token");
        assert_eq!(challenge.service, "registry.example.io");
    }

    #[test]
    fn test_parse_non_bearer_challenge() {
        assert!(parse_bearer_challenge(r#"Basic realm="registry""#).is_none());
        assert!(parse_bearer_challenge("Bearer service=only").is_none());
    }

    #[test]
    fn test_scope_actions() {
        assert_eq!(Scope::Pull.actions(), "pull");
        assert_eq!(Scope::Push.actions(), "pull,push");
    }
}
