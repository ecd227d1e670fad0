use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, de::DeserializeOwned};
use sigtrack_core::SigningRequestDraft;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("sigtrack-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    /// Send a request and decode the `{success, data}` envelope.
    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }
        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).context("unexpected response body")?;
        Ok(envelope.data)
    }

    pub async fn list_requests(&self) -> Result<Vec<SignatureRequest>> {
        let url = self.url("/express/api/get-all-documents")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn create_request(&self, draft: &SigningRequestDraft) -> Result<SignatureRequest> {
        let url = self.url("/express/api/signing-request")?;
        self.send_json(self.http.post(url).json(draft)).await
    }

    pub async fn ping(&self) -> Result<bool> {
        let url = self.url("/ping")?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        let pong: PingResponse = response.json().await?;
        Ok(pong.pong)
    }
}

// =============================================================================
// Response types (mirrored from server handlers)
// =============================================================================

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    pong: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub document_id: String,
    pub status: String,
    pub signed_at: Option<String>,
    pub archive_path: Option<String>,
    pub cancellation_document_id: Option<String>,
    pub cancellation_status: Option<String>,
    pub cancellation_archive_path: Option<String>,
    pub created_at: String,
}
