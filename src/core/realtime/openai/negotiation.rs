//! Credential fetch and SDP offer/answer exchange with the Realtime endpoint.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::config::{DEFAULT_TOKEN_URL, OPENAI_REALTIME_URL, OpenAIRealtimeModel};
use crate::core::realtime::base::NegotiationError;

/// Content type of SDP offers and answers.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Short-lived client secret issued by the token endpoint. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    client_secret: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: Option<String>,
}

/// Endpoints used to establish a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationEndpoints {
    pub token_url: String,
    pub realtime_url: String,
    pub model: String,
}

impl Default for NegotiationEndpoints {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            model: OpenAIRealtimeModel::default().as_str().to_string(),
        }
    }
}

/// HTTP side of session establishment.
#[derive(Debug, Clone)]
pub struct Negotiator {
    http: reqwest::Client,
    endpoints: NegotiationEndpoints,
}

impl Negotiator {
    pub fn new(endpoints: NegotiationEndpoints) -> Self {
        Self::with_client(reqwest::Client::new(), endpoints)
    }

    pub fn with_client(http: reqwest::Client, endpoints: NegotiationEndpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn endpoints(&self) -> &NegotiationEndpoints {
        &self.endpoints
    }

    /// `GET <token_url>` and extract `client_secret.value`.
    pub async fn fetch_credential(&self) -> Result<Credential, NegotiationError> {
        debug!(url = %self.endpoints.token_url, "Requesting ephemeral credential");

        let response = self
            .http
            .get(&self.endpoints.token_url)
            .send()
            .await
            .map_err(|e| NegotiationError::CredentialRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NegotiationError::CredentialStatus(status.as_u16()));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| NegotiationError::CredentialRequest(e.to_string()))?;

        body.client_secret
            .and_then(|secret| secret.value)
            .filter(|value| !value.is_empty())
            .map(Credential::new)
            .ok_or(NegotiationError::MissingCredential)
    }

    /// Negotiation URL with the `model` query parameter appended.
    pub fn negotiation_url(&self) -> Result<Url, NegotiationError> {
        let mut url = Url::parse(&self.endpoints.realtime_url).map_err(|e| {
            NegotiationError::Handshake(format!(
                "invalid negotiation URL {}: {e}",
                self.endpoints.realtime_url
            ))
        })?;
        url.query_pairs_mut()
            .append_pair("model", &self.endpoints.model);
        Ok(url)
    }

    /// POST the SDP offer and return the SDP answer.
    pub async fn exchange_sdp(
        &self,
        credential: &Credential,
        offer: String,
    ) -> Result<String, NegotiationError> {
        let url = self.negotiation_url()?;
        debug!(%url, "Posting SDP offer");

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(offer)
            .send()
            .await
            .map_err(|e| NegotiationError::Handshake(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NegotiationError::Handshake(e.to_string()))?;

        if !status.is_success() {
            return Err(NegotiationError::HandshakeStatus {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Err(NegotiationError::Handshake(
                "empty SDP answer".to_string(),
            ));
        }

        info!(model = %self.endpoints.model, "Received SDP answer");
        Ok(body)
    }
}
