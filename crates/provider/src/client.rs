//! Skribble REST client.

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use sigtrack_core::ProviderVerdict;
use sigtrack_core::config::ProviderConfig;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Status document returned for a signature request (or, on fallback, a document).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status_overall: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl StatusPayload {
    /// Normalized reading of `status_overall`.
    pub fn verdict(&self) -> ProviderVerdict {
        ProviderVerdict::from_overall(self.status_overall.as_deref())
    }
}

/// Operations the reconciler needs from the e-signature provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Current status of a signature request, falling back to the document
    /// endpoint when the id is not a signature request.
    async fn get_status(&self, id: &str) -> ProviderResult<StatusPayload>;

    /// Map a signature request id to the id of its document.
    async fn resolve_document_id(&self, signature_request_id: &str) -> ProviderResult<String>;

    /// Download the signed PDF for a signature request.
    async fn fetch_signed_content(&self, signature_request_id: &str) -> ProviderResult<Bytes>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    #[serde(rename = "api-key")]
    api_key: &'a str,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Skribble API client with a cached access token.
pub struct SkribbleClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    api_key: String,
    token_lifetime: Duration,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for SkribbleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkribbleClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SkribbleClient {
    /// Build a client from configuration. Missing credentials are an error.
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::Config)?;
        let (Some(username), Some(api_key)) = (config.username.clone(), config.api_key.clone())
        else {
            return Err(ProviderError::Config("Missing Skribble credentials".to_string()));
        };

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ProviderError::Config(format!("invalid provider.base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Config(format!(
                "provider.base_url cannot be a base URL: {base_url}"
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        tracing::info!(
            base_url = %base_url,
            environment = %config.environment,
            "configured Skribble client"
        );

        Ok(Self {
            http,
            base_url,
            username,
            api_key,
            token_lifetime: config.token_lifetime(),
            token: Mutex::new(None),
        })
    }

    /// Override how long an access token is reused.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// URL for a path below the base URL. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `from_config` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    fn store_token(&self, token: &str) {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CachedToken {
            token: token.to_string(),
            expires_at: Instant::now() + self.token_lifetime,
        });
    }

    /// Drop the cached token so the next call logs in again.
    pub fn invalidate_token(&self) {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    #[instrument(skip(self), fields(provider = "skribble"))]
    async fn login(&self) -> ProviderResult<String> {
        let response = self
            .http
            .post(self.endpoint(&["v2", "access", "login"]))
            .json(&LoginRequest {
                username: &self.username,
                api_key: &self.api_key,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Login(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Login(format!(
                "login failed with status {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Login(e.to_string()))?;
        let token = body.trim();
        if token.is_empty() {
            return Err(ProviderError::Login("empty access token".to_string()));
        }

        self.store_token(token);
        tracing::debug!("obtained new access token");
        Ok(token.to_string())
    }

    /// Return the cached token, logging in when it is missing or expired.
    ///
    /// Concurrent callers may both log in; the last token stored wins.
    pub async fn access_token(&self) -> ProviderResult<String> {
        match self.cached_token() {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    /// Authenticated GET. A 401 drops the cached token.
    async fn get_authed(&self, url: Url) -> ProviderResult<reqwest::Response> {
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.invalidate_token();
            return Err(ProviderError::Unauthorized);
        }
        Ok(response)
    }

    async fn get_signature_request(&self, id: &str) -> ProviderResult<reqwest::Response> {
        self.get_authed(self.endpoint(&["v2", "signature-requests", id]))
            .await
    }
}

fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ProviderError::Status {
            operation,
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl ProviderClient for SkribbleClient {
    #[instrument(skip(self), fields(provider = "skribble"))]
    async fn get_status(&self, id: &str) -> ProviderResult<StatusPayload> {
        let response = self.get_signature_request(id).await?;
        let response = if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(id, "signature request not found, trying document endpoint");
            self.get_authed(self.endpoint(&["v2", "documents", id]))
                .await?
        } else {
            response
        };

        let payload = ensure_success(response, "status lookup")?
            .json::<StatusPayload>()
            .await?;
        Ok(payload)
    }

    #[instrument(skip(self), fields(provider = "skribble"))]
    async fn resolve_document_id(&self, signature_request_id: &str) -> ProviderResult<String> {
        let response = self.get_signature_request(signature_request_id).await?;
        let payload = ensure_success(response, "signature request lookup")?
            .json::<StatusPayload>()
            .await?;
        payload
            .document_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::MissingMapping(signature_request_id.to_string()))
    }

    #[instrument(skip(self), fields(provider = "skribble"))]
    async fn fetch_signed_content(&self, signature_request_id: &str) -> ProviderResult<Bytes> {
        let document_id = self.resolve_document_id(signature_request_id).await?;
        let response = self
            .get_authed(self.endpoint(&["v2", "documents", &document_id, "content"]))
            .await?;
        let content = ensure_success(response, "document download")?.bytes().await?;
        tracing::debug!(document_id = %document_id, size = content.len(), "downloaded signed content");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            base_url: base_url.to_string(),
            username: Some("api_demo".to_string()),
            api_key: Some("key".to_string()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = SkribbleClient::from_config(&config("https://api.skribble.com/")).unwrap();
        assert_eq!(
            client
                .endpoint(&["v2", "signature-requests", "a/b?c"])
                .as_str(),
            "https://api.skribble.com/v2/signature-requests/a%2Fb%3Fc"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = SkribbleClient::from_config(&config("http://localhost:8080/proxy")).unwrap();
        assert_eq!(
            client.endpoint(&["v2", "access", "login"]).as_str(),
            "http://localhost:8080/proxy/v2/access/login"
        );
    }

    #[test]
    fn missing_credentials_rejected() {
        let mut cfg = config("https://api.skribble.com");
        cfg.api_key = None;
        let err = SkribbleClient::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Missing Skribble credentials"));
    }

    #[test]
    fn payload_verdict() {
        let payload: StatusPayload =
            serde_json::from_str(r#"{"id":"x","status_overall":"signed","extra":1}"#).unwrap();
        assert_eq!(payload.verdict(), ProviderVerdict::Completed);
        assert_eq!(StatusPayload::default().verdict(), ProviderVerdict::from_overall(None));
    }
}
