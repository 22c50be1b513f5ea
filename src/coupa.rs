use crate::config::{CoupaConfig, INVOICE_READ_SCOPE};
use crate::error::{AuthError, FetchError};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;

/// Opaque bearer credential for the invoice API.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Result of a successful exchange with the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    Granted(BearerToken),
    /// 2xx response without an `access_token`: connected, but nothing usable.
    Missing,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Response of the scan endpoint that made it over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResponse {
    Pdf(Vec<u8>),
    Rejected { status: u16, body: String },
}

/// Anything that can hand out invoice scans by id.
pub trait ScanSource {
    fn retrieve_image_scan(&self, invoice_id: &str) -> Result<ScanResponse, FetchError>;
}

/// Blocking client for the Coupa token and invoice endpoints.
pub struct CoupaClient {
    http: Client,
    config: CoupaConfig,
}

impl CoupaClient {
    pub fn new(config: CoupaConfig) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| AuthError::Client(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// One client-credentials exchange. No retries.
    pub fn acquire_token(&self) -> Result<TokenGrant, AuthError> {
        let url = self.config.token_url();
        tracing::debug!(%url, "requesting access token");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.identifier, Some(&self.config.secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", INVOICE_READ_SCOPE),
            ])
            .send()
            .map_err(|e| AuthError::Transport(FetchError::from(e).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AuthError::Transport(FetchError::from(e).to_string()))?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        match parsed.access_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                tracing::info!(instance = %self.config.instance, "connected to Coupa");
                Ok(TokenGrant::Granted(BearerToken::new(token)))
            }
            None => {
                tracing::warn!("token endpoint answered without an access_token");
                Ok(TokenGrant::Missing)
            }
        }
    }

    /// GET the PDF scan of one invoice. Only 200 counts as a scan.
    pub fn retrieve_image_scan(
        &self,
        token: &BearerToken,
        invoice_id: &str,
    ) -> Result<ScanResponse, FetchError> {
        let url = self.config.scan_url(invoice_id);
        tracing::debug!(%url, "fetching invoice scan");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/json, */*")
            .send()?;

        let status = response.status();
        if status == StatusCode::OK {
            let bytes = response.bytes()?;
            return Ok(ScanResponse::Pdf(bytes.to_vec()));
        }
        let body = response.text().unwrap_or_default();
        Ok(ScanResponse::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    pub fn authorized<'a>(&'a self, token: &'a BearerToken) -> AuthorizedClient<'a> {
        AuthorizedClient {
            client: self,
            token,
        }
    }
}

/// A client paired with the session's token.
pub struct AuthorizedClient<'a> {
    client: &'a CoupaClient,
    token: &'a BearerToken,
}

impl ScanSource for AuthorizedClient<'_> {
    fn retrieve_image_scan(&self, invoice_id: &str) -> Result<ScanResponse, FetchError> {
        self.client.retrieve_image_scan(self.token, invoice_id)
    }
}
