//! Client for the remote round authority (commit/start/reveal/verify).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{GameResult, RoundId},
    protocol::{CommitResponse, RevealResponse, StartRoundRequest, VerifyQuery, VerifyResponse},
};
use tracing::debug;
use url::Url;

use crate::error::AuthorityError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_DIAGNOSTIC_BODY_CHARS: usize = 512;

#[async_trait]
pub trait RoundAuthority: Send + Sync {
    async fn commit(&self) -> Result<CommitResponse, AuthorityError>;
    async fn start(
        &self,
        round_id: &RoundId,
        request: &StartRoundRequest,
    ) -> Result<GameResult, AuthorityError>;
    /// Must be safe to call repeatedly for the same round.
    async fn reveal(&self, round_id: &RoundId) -> Result<RevealResponse, AuthorityError>;
    async fn verify(&self, query: &VerifyQuery) -> Result<VerifyResponse, AuthorityError>;
}

pub struct HttpRoundAuthority {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRoundAuthority {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("falling back to default http client: {err}");
                Client::new()
            });
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `{base}/api/rounds/{round_id}/{action}` with the round id kept as one
    /// percent-encoded segment.
    fn round_url(&self, round_id: &RoundId, action: &str) -> Result<Url, AuthorityError> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            AuthorityError::Transport(format!("invalid base url '{}': {err}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                AuthorityError::Transport(format!("base url '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "rounds", round_id.as_str(), action]);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        call: &'static str,
        request: RequestBuilder,
    ) -> Result<T, AuthorityError> {
        let response = request
            .send()
            .await
            .map_err(|err| AuthorityError::from_reqwest(err, self.timeout))?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));
        let body = response
            .text()
            .await
            .map_err(|err| AuthorityError::from_reqwest(err, self.timeout))?;
        debug!(call, status = status.as_u16(), "authority responded");

        if !status.is_success() {
            return Err(AuthorityError::Status {
                status: status.as_u16(),
                body: truncate_for_diagnostics(&body),
            });
        }

        serde_json::from_str(&body).map_err(|err| {
            let content = if is_json { "json" } else { "non-json" };
            AuthorityError::Decode(format!(
                "{call} returned {content} body that does not match the contract ({err}): {}",
                truncate_for_diagnostics(&body)
            ))
        })
    }
}

fn truncate_for_diagnostics(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_DIAGNOSTIC_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_DIAGNOSTIC_BODY_CHARS).collect();
    cut.push('\u{2026}');
    cut
}

#[async_trait]
impl RoundAuthority for HttpRoundAuthority {
    async fn commit(&self) -> Result<CommitResponse, AuthorityError> {
        let request = self.http.post(self.url("/api/rounds/commit"));
        self.send_json("commit", request).await
    }

    async fn start(
        &self,
        round_id: &RoundId,
        request: &StartRoundRequest,
    ) -> Result<GameResult, AuthorityError> {
        let request = self
            .http
            .post(self.round_url(round_id, "start")?)
            .json(request);
        self.send_json("start", request).await
    }

    async fn reveal(&self, round_id: &RoundId) -> Result<RevealResponse, AuthorityError> {
        let request = self.http.post(self.round_url(round_id, "reveal")?);
        self.send_json("reveal", request).await
    }

    async fn verify(&self, query: &VerifyQuery) -> Result<VerifyResponse, AuthorityError> {
        let request = self.http.get(self.url("/api/verify")).query(query);
        self.send_json("verify", request).await
    }
}

#[cfg(test)]
#[path = "tests/authority_tests.rs"]
mod tests;
