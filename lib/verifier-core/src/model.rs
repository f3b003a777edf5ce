//! Externally observable data model: formats, error taxonomy and the result
//! structures returned across the public boundary.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Supported credential encodings. Selecting the wrong format for a given
/// credential fails validation, it never panics.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum CredentialFormat {
    #[strum(serialize = "LDP_VC")]
    #[serde(rename = "LDP_VC")]
    LdpVc,
    #[strum(serialize = "MSO_MDOC")]
    #[serde(rename = "MSO_MDOC")]
    MsoMdoc,
    #[strum(serialize = "SD_JWT")]
    #[serde(rename = "SD_JWT")]
    SdJwt,
}

/// Error taxonomy surfaced via result structs; no internal error type crosses
/// the public boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display, Serialize, Deserialize)]
pub enum ErrorCode {
    EmptyOrMalformedInput,
    MissingRequiredField,
    InvalidFieldValue,
    ContextNotFirst,
    UnsupportedProofType,
    UnsupportedSignatureAlgorithm,
    PublicKeyNotFound,
    PublicKeyTypeUnsupported,
    KeyResolutionFailed,
    SignatureVerificationFailed,
    LikelyTampered,
    CredentialExpired,
    StatusRetrievalFailed,
    StatusVerificationFailed,
    RangeError,
    NetworkTimeout,
    UnknownError,
}

/// Outcome of structural validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatus {
    /// Empty when the credential is structurally valid; `VC is expired` is
    /// attached as a non-fatal message.
    pub message: String,
    pub error_code: Option<ErrorCode>,
}

impl ValidationStatus {
    pub fn valid() -> Self {
        Self {
            message: String::new(),
            error_code: None,
        }
    }

    pub fn expired() -> Self {
        Self {
            message: "VC is expired".to_string(),
            error_code: Some(ErrorCode::CredentialExpired),
        }
    }

    pub fn invalid(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: Some(error_code),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error_code
            .is_none_or(|code| code == ErrorCode::CredentialExpired)
    }
}

/// Outcome of cryptographic verification. `status` is `true` only when the
/// signing input was reconstructed from the untampered credential bytes and
/// the signature verified against the declared verification method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: bool,
    pub message: String,
    pub error_code: Option<ErrorCode>,
}

impl VerificationResult {
    pub fn success() -> Self {
        Self {
            status: true,
            message: String::new(),
            error_code: None,
        }
    }

    pub fn expired() -> Self {
        Self {
            status: true,
            message: "VC is expired".to_string(),
            error_code: Some(ErrorCode::CredentialExpired),
        }
    }

    pub fn failure(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            error_code: Some(error_code),
        }
    }
}

/// One row per matched `credentialStatus` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialStatusResult {
    pub purpose: String,
    pub valid: bool,
    pub error: Option<StatusCheckFailure>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusCheckFailure {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresentationVerificationResult {
    pub proof: VerificationResult,
    /// Same order as the embedded credentials, regardless of completion order.
    pub credentials: Vec<VerificationResult>,
}
