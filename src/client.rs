//! HTTP client for the Apstra REST API.
//!
//! Wraps `reqwest::Client` with Apstra URL construction, the `AuthToken`
//! session header, and mapping of non-success responses onto
//! [`ProviderError`]. Only the endpoints used by this provider are exposed.

use std::sync::RwLock;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};
use url::Url;

use crate::config::ProviderConfig;
use crate::connectivity_template::policy::Policy;
use crate::error::ProviderError;

/// Header carrying the session token on authenticated requests.
pub const AUTH_TOKEN_HEADER: &str = "AuthToken";

/// Body returned by `POST /api/aaa/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Session token (a JWT).
    pub token: String,
    /// Session id.
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Wire form of a connectivity template import or export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyBundle {
    /// Every node of the template tree, root first.
    pub policies: Vec<Policy>,
}

/// Client for one Apstra server.
pub struct ApstraClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl std::fmt::Debug for ApstraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApstraClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token().is_some())
            .finish()
    }
}

impl ApstraClient {
    /// Build a client from resolved provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(config.tls_validation_disabled);
        if let Some(timeout) = config.api_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_client(http, config.url.clone()))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// A second, unauthenticated client sharing this one's connection pool.
    pub fn new_session(&self) -> Self {
        Self::with_client(self.http.clone(), self.base_url.clone())
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The current session token, if logged in.
    pub fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the session token.
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match self.token() {
            Some(token) => builder.header(AUTH_TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let resp = builder.send().await?;
        let status = resp.status();
        trace!(status = status.as_u16(), "response received");
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message: api_error_message(status, &body),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        debug!("GET {}", url);
        let resp = self.send(self.request(Method::GET, url)).await?;
        Ok(resp.json().await?)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Log in and keep the returned session token for later calls.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginResponse, ProviderError> {
        let url = self.url("/api/aaa/login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let login: LoginResponse = resp.json().await?;
        self.set_token(Some(login.token.clone()));
        debug!("login successful");
        Ok(login)
    }

    /// End the current session. The stored token is cleared on success.
    pub async fn logout(&self) -> Result<(), ProviderError> {
        let url = self.url("/api/aaa/logout")?;
        debug!("logging out at {}", url);
        self.send(self.request(Method::POST, url)).await?;
        self.set_token(None);
        debug!("logout complete");
        Ok(())
    }

    // ── Server info ──────────────────────────────────────────────────

    /// The API version string reported by the server.
    pub async fn api_version(&self) -> Result<String, ProviderError> {
        let resp: VersionResponse = self.get_json(self.url("/api/versions/api")?).await?;
        Ok(resp.version)
    }

    /// Returns `false` when the blueprint does not exist.
    pub async fn blueprint_exists(&self, blueprint_id: &str) -> Result<bool, ProviderError> {
        let url = self.url(&format!("/api/blueprints/{}", blueprint_id))?;
        debug!("GET {}", url);
        match self.send(self.request(Method::GET, url)).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    // ── Connectivity templates ───────────────────────────────────────

    /// Create or replace a connectivity template from its flattened policies.
    pub async fn import_policies(
        &self,
        blueprint_id: &str,
        policies: &[Policy],
    ) -> Result<(), ProviderError> {
        let url = self.url(&format!("/api/blueprints/{}/obj-policy-import", blueprint_id))?;
        debug!(policies = policies.len(), "PUT {}", url);
        self.send(
            self.request(Method::PUT, url)
                .json(&json!({ "policies": policies })),
        )
        .await?;
        Ok(())
    }

    /// Fetch every policy node of the connectivity template rooted at `policy_id`.
    pub async fn export_policies(
        &self,
        blueprint_id: &str,
        policy_id: &str,
    ) -> Result<Vec<Policy>, ProviderError> {
        let mut url = self.url(&format!("/api/blueprints/{}/obj-policy-export", blueprint_id))?;
        url.query_pairs_mut().append_pair("policy_id", policy_id);
        let bundle: PolicyBundle = self.get_json(url).await?;
        Ok(bundle.policies)
    }

    /// Delete a connectivity template and all of its child policies.
    pub async fn delete_connectivity_template(
        &self,
        blueprint_id: &str,
        policy_id: &str,
    ) -> Result<(), ProviderError> {
        let mut url = self.url(&format!(
            "/api/blueprints/{}/endpoint-policies/{}",
            blueprint_id, policy_id
        ))?;
        url.query_pairs_mut().append_pair("delete_recursive", "true");
        debug!("DELETE {}", url);
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

/// Pull a readable message out of an Apstra error body.
///
/// Apstra usually answers `{"errors": ...}`; other bodies are returned as-is.
fn api_error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("errors")
            .or_else(|| v.get("error"))
            .map(|e| match e.as_str() {
                Some(s) => s.to_string(),
                None => e.to_string(),
            })
    });
    match message {
        Some(m) => m,
        None if body.is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        assert_eq!(
            api_error_message(StatusCode::UNPROCESSABLE_ENTITY, r#"{"errors":"bad vlan"}"#),
            "bad vlan"
        );
        assert_eq!(
            api_error_message(StatusCode::BAD_REQUEST, r#"{"errors":{"vlan_id":"too big"}}"#),
            r#"{"vlan_id":"too big"}"#
        );
        assert_eq!(api_error_message(StatusCode::NOT_FOUND, ""), "Not Found");
        assert_eq!(api_error_message(StatusCode::BAD_GATEWAY, "upstream"), "upstream");
    }

    #[test]
    fn test_token_handling() {
        let client = ApstraClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://apstra.example.com").unwrap(),
        );
        assert!(client.token().is_none());
        client.set_token(Some("abc".into()));
        assert_eq!(client.token().as_deref(), Some("abc"));

        let other = client.new_session();
        assert!(other.token().is_none());
        assert_eq!(other.base_url(), client.base_url());
    }
}
