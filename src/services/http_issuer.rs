// src/services/http_issuer.rs
//! HTTP client of a remote zcred issuer.
//!
//! Every call goes through the same funnel:
//! 1. The request body is validated locally (`<ENDPOINT>_BAD_REQ`)
//! 2. The request is sent with an optional bearer token
//! 3. The outcome is classified by [`classify`], including a shape check of
//!    the response body
//!
//! The issuer URI is the base of one credential type, e.g.
//! `https://issuer.example/api/v1/zcred/issuers/passport`.

use crate::config::ClientConfig;
use crate::models::credential::HttpCredential;
use crate::models::issuer::{CanIssue, CanIssueReq, Challenge, ChallengeReq, Info, IssueReq};
use crate::services::exceptions::{classify, classify_transport, Endpoint, ZcredException};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Remote issuer protocol.
#[async_trait]
pub trait Issuer: Send + Sync {
    async fn get_info(&self) -> Result<Info, ZcredException>;

    async fn get_challenge(&self, req: &ChallengeReq) -> Result<Challenge, ZcredException>;

    async fn can_issue(&self, req: &CanIssueReq) -> Result<CanIssue, ZcredException>;

    async fn issue(&self, req: &IssueReq) -> Result<HttpCredential, ZcredException>;

    /// Asks the issuer to append proofs made with its current keys.
    async fn update_proofs(&self, credential: &HttpCredential) -> Result<HttpCredential, ZcredException>;
}

#[derive(Debug, Error)]
pub enum IssuerInitError {
    #[error("invalid issuer URI '{uri}': {source}")]
    Uri {
        uri: String,
        source: url::ParseError,
    },
    #[error("issuer URI '{0}' has no credential type segment")]
    NoCredentialType(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`Issuer`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIssuer {
    uri: Url,
    access_token: Option<String>,
    client: Client,
}

impl HttpIssuer {
    /// Creates a client for the issuer at `issuer_uri`.
    ///
    /// # Arguments
    /// * `issuer_uri` - Issuer base URI, a trailing `/` is added when missing
    /// * `access_token` - Bearer token sent with every request
    /// * `timeout` - Per-request timeout
    pub fn new(
        issuer_uri: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IssuerInitError> {
        let normalized = if issuer_uri.ends_with('/') {
            issuer_uri.to_string()
        } else {
            format!("{}/", issuer_uri)
        };
        let uri = Url::parse(&normalized).map_err(|source| IssuerInitError::Uri {
            uri: issuer_uri.to_string(),
            source,
        })?;
        if uri.path() == "/" {
            return Err(IssuerInitError::NoCredentialType(issuer_uri.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            uri,
            access_token,
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, IssuerInitError> {
        Self::new(
            &config.issuer_uri,
            config.access_token.clone(),
            config.request_timeout(),
        )
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, ZcredException> {
        self.uri
            .join(endpoint.path())
            .map_err(|e| classify_transport(endpoint, e))
    }

    fn bad_request(endpoint: Endpoint, detail: &str) -> ZcredException {
        match endpoint.bad_req() {
            Some(code) => ZcredException::with_message(code, format!("{} {}", endpoint, detail)),
            None => ZcredException::with_message(endpoint.bad_resp(), format!("{} {}", endpoint, detail)),
        }
    }

    async fn send<B, T>(
        &self,
        endpoint: Endpoint,
        body: Option<&B>,
        accept: impl FnOnce(&T) -> bool + Send,
    ) -> Result<T, ZcredException>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint_url(endpoint)?;
        let request = match body {
            Some(body) => self.client.post(url.clone()).json(body),
            None => self.client.get(url.clone()),
        };
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        debug!("{} request to {}", endpoint, url);
        let response = request.send().await.map_err(|e| {
            warn!("{} request to {} failed: {}", endpoint, url, e);
            classify_transport(endpoint, e)
        })?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            ZcredException::with_message(
                endpoint.bad_resp(),
                format!("{} response body could not be read: {}", endpoint, e),
            )
        })?;
        debug!("{} responded with status {}", endpoint, status);

        classify(endpoint, status, &bytes, accept).map_err(|e| {
            warn!("{} request to {} failed: {}", endpoint, url, e);
            e
        })
    }
}

#[async_trait]
impl Issuer for HttpIssuer {
    async fn get_info(&self) -> Result<Info, ZcredException> {
        self.send::<(), Info>(Endpoint::Info, None, |info| info.validate())
            .await
    }

    async fn get_challenge(&self, req: &ChallengeReq) -> Result<Challenge, ZcredException> {
        if !req.validate() {
            return Err(Self::bad_request(Endpoint::Challenge, "request is invalid"));
        }
        self.send(Endpoint::Challenge, Some(req), |challenge: &Challenge| {
            challenge.validate()
        })
        .await
    }

    async fn can_issue(&self, req: &CanIssueReq) -> Result<CanIssue, ZcredException> {
        if req.session_id.is_empty() {
            return Err(Self::bad_request(Endpoint::CanIssue, "session id is empty"));
        }
        self.send(Endpoint::CanIssue, Some(req), |_: &CanIssue| true)
            .await
    }

    async fn issue(&self, req: &IssueReq) -> Result<HttpCredential, ZcredException> {
        if req.session_id.is_empty() || req.signature.is_empty() {
            return Err(Self::bad_request(Endpoint::Issue, "session id and signature are required"));
        }
        self.send(Endpoint::Issue, Some(req), |credential: &HttpCredential| {
            credential.validate()
        })
        .await
    }

    /// The returned credential must keep the attributes and every proof of
    /// `credential` unchanged and add at least one new proof, otherwise the
    /// response is `UPDATE_PROOFS_BAD_RESP`.
    async fn update_proofs(&self, credential: &HttpCredential) -> Result<HttpCredential, ZcredException> {
        if !credential.validate() {
            return Err(Self::bad_request(Endpoint::UpdateProofs, "credential is invalid"));
        }
        self.send(
            Endpoint::UpdateProofs,
            Some(credential),
            |updated: &HttpCredential| {
                updated.validate()
                    && updated.attributes == credential.attributes
                    && updated.extends_proofs_of(credential)
            },
        )
        .await
    }
}
