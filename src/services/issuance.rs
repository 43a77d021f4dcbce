// src/services/issuance.rs
//! Issuance session: challenge -> poll -> sign -> issue.
//!
//! ```text
//! Idle -> Challenged -> Polling* -> Signed -> Issued
//!   \________\____________\_________\______> Failed(code) | Cancelled
//! ```
//!
//! `can-issue` is polled on a fixed interval until it answers `true`. A
//! `false` answer waits and polls again; any error ends the session
//! immediately, nothing is retried. Cancelling the session's token stops
//! every further call and closes the verification surface.

use crate::config::ClientConfig;
use crate::models::credential::HttpCredential;
use crate::models::issuer::{CanIssueReq, Challenge, ChallengeReq, IssueReq};
use crate::services::exceptions::{ErrorCode, SubjectCode, ZcredException};
use crate::services::http_issuer::Issuer;
use crate::wallet::{Signer, SignerError};
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Challenged { session_id: String },
    Polling { session_id: String, attempts: u32 },
    Signed { session_id: String },
    Issued,
    Failed(ErrorCode),
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Issued | SessionState::Failed(_) | SessionState::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Exception(#[from] ZcredException),
    #[error("issuance session cancelled")]
    Cancelled,
    #[error("signer did not answer within {0:?}")]
    SignerTimeout(Duration),
    #[error("can not open verification page {url}: {reason}")]
    Surface { url: String, reason: String },
    #[error("session already ran")]
    AlreadyRan,
}

impl SessionError {
    /// Wire code the failure maps to, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            SessionError::Exception(e) => Some(e.code),
            SessionError::SignerTimeout(_) => Some(ErrorCode::Subject(SubjectCode::Reject)),
            SessionError::Surface { .. } => Some(ErrorCode::Subject(SubjectCode::Reject)),
            SessionError::Cancelled | SessionError::AlreadyRan => None,
        }
    }
}

/// Where an out-of-band verification page (e.g. KYC) is shown.
pub trait VerificationSurface: Send + Sync {
    fn open(&self, url: &Url) -> Result<(), String>;

    fn close(&self);
}

/// Surface for headless clients: logs the URL for the user to visit.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSurface;

impl VerificationSurface for LogSurface {
    fn open(&self, url: &Url) -> Result<(), String> {
        info!("complete verification at {}", url);
        Ok(())
    }

    fn close(&self) {}
}

/// One issuance attempt against one issuer.
pub struct IssuanceSession<'a> {
    issuer: &'a dyn Issuer,
    poll_interval: Duration,
    signer_timeout: Duration,
    cancel: CancellationToken,
    state: SessionState,
}

async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, ZcredException>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        result = fut => result.map_err(SessionError::from),
    }
}

impl<'a> IssuanceSession<'a> {
    pub fn new(issuer: &'a dyn Issuer, config: &ClientConfig) -> Self {
        Self::with_timings(issuer, config.poll_interval(), config.signer_timeout())
    }

    pub fn with_timings(issuer: &'a dyn Issuer, poll_interval: Duration, signer_timeout: Duration) -> Self {
        Self {
            issuer,
            poll_interval,
            signer_timeout,
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
        }
    }

    /// Token that abandons the session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drives the session to a credential.
    ///
    /// # Arguments
    /// * `req` - Challenge request naming the subject and validity window
    /// * `signer` - Signs the challenge message
    /// * `surface` - Shows the verification page when the issuer asks for one
    ///
    /// # Returns
    /// The issued credential, or the error that ended the session. The
    /// state is `Issued`, `Failed` or `Cancelled` afterwards.
    pub async fn run(
        &mut self,
        req: &ChallengeReq,
        signer: &dyn Signer,
        surface: &dyn VerificationSurface,
    ) -> Result<HttpCredential, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyRan);
        }
        let mut opened = false;
        let result = self.drive(req, signer, surface, &mut opened).await;
        if opened {
            surface.close();
        }
        self.state = match &result {
            Ok(_) => SessionState::Issued,
            Err(err) => match err.code() {
                Some(code) => SessionState::Failed(code),
                None => SessionState::Cancelled,
            },
        };
        match &result {
            Ok(_) => info!("credential issued"),
            Err(err) => warn!("issuance session ended: {}", err),
        }
        result
    }

    async fn drive(
        &mut self,
        req: &ChallengeReq,
        signer: &dyn Signer,
        surface: &dyn VerificationSurface,
        opened: &mut bool,
    ) -> Result<HttpCredential, SessionError> {
        let challenge = guarded(&self.cancel, self.issuer.get_challenge(req)).await?;
        let session_id = challenge.session_id.clone();
        debug!("challenge received for session {}", session_id);
        self.state = SessionState::Challenged {
            session_id: session_id.clone(),
        };

        if let Some(url) = challenge.verify_url() {
            surface.open(&url).map_err(|reason| SessionError::Surface {
                url: url.to_string(),
                reason,
            })?;
            *opened = true;
        }

        self.poll(&session_id).await?;
        let signature = self.sign(&challenge, signer).await?;
        self.state = SessionState::Signed {
            session_id: session_id.clone(),
        };

        let issue_req = IssueReq {
            session_id,
            signature,
        };
        guarded(&self.cancel, self.issuer.issue(&issue_req)).await
    }

    async fn poll(&mut self, session_id: &str) -> Result<(), SessionError> {
        let req = CanIssueReq {
            session_id: session_id.to_string(),
        };
        let mut attempts = 0;
        loop {
            attempts += 1;
            self.state = SessionState::Polling {
                session_id: session_id.to_string(),
                attempts,
            };
            let can_issue = guarded(&self.cancel, self.issuer.can_issue(&req)).await?;
            if can_issue.can_issue {
                debug!("session {} can issue after {} polls", session_id, attempts);
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn sign(&self, challenge: &Challenge, signer: &dyn Signer) -> Result<String, SessionError> {
        let signed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            signed = tokio::time::timeout(self.signer_timeout, signer.sign(&challenge.message)) => signed,
        };
        match signed {
            Ok(Ok(signature)) => Ok(signature),
            Ok(Err(SignerError::Rejected(reason))) => Err(ZcredException::with_message(SubjectCode::Reject, reason).into()),
            Ok(Err(err)) => Err(ZcredException::with_message(SubjectCode::Reject, err.to_string()).into()),
            Err(_) => Err(SessionError::SignerTimeout(self.signer_timeout)),
        }
    }
}
