// src/services/exceptions.rs
//! Exception codes and the response classifier.
//!
//! Codes are split by role: issuer codes start at 10000, subject codes at
//! 20000, verifier codes at 30000. They travel as `{ "code": <int>,
//! "message"?: <string> }` and are part of the wire contract, so every
//! remote call funnels its outcome through [`classify`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

macro_rules! exception_codes {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Symbolic name, e.g. `NO_ISSUER`.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} ({})", self.name(), self.code())
            }
        }
    };
}

exception_codes!(
    /// Issuer exception codes.
    IssuerCode {
        /// Issuer unreachable at any endpoint
        NoIssuer = 10000 => "NO_ISSUER",
        /// HTTP 5xx at any endpoint
        IssuerError = 10001 => "ISSUER_ERROR",
        NoAccessToken = 10002 => "NO_ACCESS_TOKEN",
        InvalidAccessToken = 10003 => "INVALID_ACCESS_TOKEN",
        InfoBadResp = 11001 => "INFO_BAD_RESP",
        ChallengeBadReq = 12001 => "CHALLENGE_BAD_REQ",
        ChallengeBadResp = 12002 => "CHALLENGE_BAD_RESP",
        CanIssueBadReq = 13001 => "CAN_ISSUE_BAD_REQ",
        CanIssueBadResp = 13002 => "CAN_ISSUE_BAD_RESP",
        CanIssueNoSession = 13003 => "CAN_ISSUE_NO_SESSION",
        IssueBadReq = 14001 => "ISSUE_BAD_REQ",
        IssueBadResp = 14002 => "ISSUE_BAD_RESP",
        IssueNoSession = 14003 => "ISSUE_NO_SESSION",
        IssueBadSignature = 14004 => "ISSUE_BAD_SIGNATURE",
        UpdateProofsBadReq = 15001 => "UPDATE_PROOFS_BAD_REQ",
        UpdateProofsBadResp = 15002 => "UPDATE_PROOFS_BAD_RESP",
    }
);

exception_codes!(
    /// Subject exception codes.
    SubjectCode {
        /// The subject refused to sign
        Reject = 20000 => "REJECT",
    }
);

exception_codes!(
    /// Verifier exception codes.
    VerifierCode {
        NoVerifier = 30000 => "NO_VERIFIER",
        VerifierError = 30001 => "VERIFIER_ERROR",
        ProposalBadReq = 31001 => "PROPOSAL_BAD_REQ",
        ProposalBadResp = 31002 => "PROPOSAL_BAD_RESP",
        VerifyBadReq = 32001 => "VERIFY_BAD_REQ",
        VerifyBadResp = 32002 => "VERIFY_BAD_RESP",
        VerifyNoSession = 32003 => "VERIFY_NO_SESSION",
        VerifyInvalidSignature = 32004 => "VERIFY_INVALID_SIGNATURE",
        VerifyInvalidProof = 32005 => "VERIFY_INVALID_PROOF",
        /// Everything checked out but the verifier declined to commit
        VerifyNotPassed = 32006 => "VERIFY_NOT_PASSED",
    }
);

/// Any known exception code.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "u32", into = "u32")]
pub enum ErrorCode {
    Issuer(IssuerCode),
    Subject(SubjectCode),
    Verifier(VerifierCode),
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        match self {
            ErrorCode::Issuer(code) => code.code(),
            ErrorCode::Subject(code) => code.code(),
            ErrorCode::Verifier(code) => code.code(),
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        IssuerCode::from_code(code)
            .map(ErrorCode::Issuer)
            .or_else(|| SubjectCode::from_code(code).map(ErrorCode::Subject))
            .or_else(|| VerifierCode::from_code(code).map(ErrorCode::Verifier))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Issuer(code) => fmt::Display::fmt(code, f),
            ErrorCode::Subject(code) => fmt::Display::fmt(code, f),
            ErrorCode::Verifier(code) => fmt::Display::fmt(code, f),
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<u32> for ErrorCode {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        ErrorCode::from_code(code).ok_or_else(|| format!("unknown exception code {}", code))
    }
}

impl From<IssuerCode> for ErrorCode {
    fn from(code: IssuerCode) -> Self {
        ErrorCode::Issuer(code)
    }
}

impl From<SubjectCode> for ErrorCode {
    fn from(code: SubjectCode) -> Self {
        ErrorCode::Subject(code)
    }
}

impl From<VerifierCode> for ErrorCode {
    fn from(code: VerifierCode) -> Self {
        ErrorCode::Verifier(code)
    }
}

/// Exception as it appears on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonException {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JsonException {
    /// Reads a body as an exception: an object with a known `code` and, if
    /// present, a string `message`.
    pub fn parse(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        if object.get("message").is_some_and(|message| !message.is_string()) {
            return None;
        }
        serde_json::from_value(body.clone()).ok()
    }
}

/// Typed protocol failure carrying its wire code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
pub struct ZcredException {
    pub code: ErrorCode,
    pub message: Option<String>,
}

impl ZcredException {
    pub fn new(code: impl Into<ErrorCode>) -> Self {
        Self {
            code: code.into(),
            message: None,
        }
    }

    pub fn with_message(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
        }
    }

    pub fn is_issuer(&self) -> bool {
        matches!(self.code, ErrorCode::Issuer(_))
    }

    pub fn is_subject(&self) -> bool {
        matches!(self.code, ErrorCode::Subject(_))
    }

    pub fn is_verifier(&self) -> bool {
        matches!(self.code, ErrorCode::Verifier(_))
    }

    pub fn to_json(&self) -> JsonException {
        JsonException {
            code: self.code,
            message: self.message.clone(),
        }
    }
}

impl From<JsonException> for ZcredException {
    fn from(json: JsonException) -> Self {
        Self {
            code: json.code,
            message: json.message,
        }
    }
}

/// Remote issuer calls. Each owns its bad-request and bad-response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Info,
    Challenge,
    CanIssue,
    Issue,
    UpdateProofs,
}

impl Endpoint {
    /// Path segment relative to the issuer base URI.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Info => "info",
            Endpoint::Challenge => "challenge",
            Endpoint::CanIssue => "can-issue",
            Endpoint::Issue => "issue",
            Endpoint::UpdateProofs => "update-proofs",
        }
    }

    pub fn bad_resp(self) -> IssuerCode {
        match self {
            Endpoint::Info => IssuerCode::InfoBadResp,
            Endpoint::Challenge => IssuerCode::ChallengeBadResp,
            Endpoint::CanIssue => IssuerCode::CanIssueBadResp,
            Endpoint::Issue => IssuerCode::IssueBadResp,
            Endpoint::UpdateProofs => IssuerCode::UpdateProofsBadResp,
        }
    }

    /// `info` takes no request body, so it has no bad-request code.
    pub fn bad_req(self) -> Option<IssuerCode> {
        match self {
            Endpoint::Info => None,
            Endpoint::Challenge => Some(IssuerCode::ChallengeBadReq),
            Endpoint::CanIssue => Some(IssuerCode::CanIssueBadReq),
            Endpoint::Issue => Some(IssuerCode::IssueBadReq),
            Endpoint::UpdateProofs => Some(IssuerCode::UpdateProofsBadReq),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a request that could not produce a response.
pub fn classify_transport(endpoint: Endpoint, reason: impl fmt::Display) -> ZcredException {
    ZcredException::with_message(
        IssuerCode::NoIssuer,
        format!("{} request failed: {}", endpoint, reason),
    )
}

/// Maps an HTTP response onto a typed value or exception.
///
/// # Arguments
/// * `endpoint` - Endpoint that was called, selects the bad-response code
/// * `status` - HTTP status code
/// * `body` - Raw response body
/// * `accept` - Shape check applied to a successfully decoded body
///
/// # Returns
/// The decoded body on 2xx, otherwise the exception the status and body map to:
/// - 400/401 with an exception body: that exception
/// - 5xx: `ISSUER_ERROR`
/// - anything else, or a body that does not decode: the endpoint's `BAD_RESP`
pub fn classify<T: DeserializeOwned>(
    endpoint: Endpoint,
    status: u16,
    body: &[u8],
    accept: impl FnOnce(&T) -> bool,
) -> Result<T, ZcredException> {
    let bad_resp = |detail: String| {
        ZcredException::with_message(endpoint.bad_resp(), format!("{} {}", endpoint, detail))
    };
    match status {
        200..=299 => {
            let value: T = serde_json::from_slice(body)
                .map_err(|e| bad_resp(format!("response body is invalid: {}", e)))?;
            if accept(&value) {
                Ok(value)
            } else {
                Err(bad_resp("response body failed validation".to_string()))
            }
        }
        400 | 401 => Err(serde_json::from_slice::<Value>(body)
            .ok()
            .as_ref()
            .and_then(JsonException::parse)
            .map(ZcredException::from)
            .unwrap_or_else(|| bad_resp(format!("returned status {} without an exception body", status)))),
        500..=599 => Err(ZcredException::with_message(
            IssuerCode::IssuerError,
            format!("{} returned status {}", endpoint, status),
        )),
        _ => Err(bad_resp(format!("returned unexpected status {}", status))),
    }
}
