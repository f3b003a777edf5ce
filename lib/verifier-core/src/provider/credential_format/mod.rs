//! Per-format validators and verifiers. Validation is a fail-fast pipeline
//! over the read-only input; verification resolves the signer key,
//! reconstructs the signing input and checks the signature. Both surface
//! every failure as a typed [`CredentialFormatError`].

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::key_resolver::KeyResolutionError;
use super::signature::SignatureError;
use crate::model::{CredentialFormat, ErrorCode};
use crate::provider::http_client;
use crate::util::cbor::CborError;
use crate::util::encoding::EncodingError;
use crate::util::jwt::JwtError;
use crate::util::rdf_canonization::CanonizationError;

pub mod ldp;
pub mod mdoc;
pub mod sd_jwt;

/// Validation verdict: a past expiration date is a non-fatal condition
/// attached to an otherwise successful result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CredentialValidity {
    Valid,
    Expired,
}

#[derive(Debug, Error)]
pub enum CredentialFormatError {
    #[error("Empty or malformed credential: {0}")]
    Malformed(String),
    #[error("Missing required field `{0}`")]
    MissingField(String),
    #[error("Invalid value for field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("First @context entry does not select a supported data model: `{0}`")]
    ContextNotFirst(String),
    #[error("Unsupported proof type `{0}`")]
    UnsupportedProofType(String),
    #[error("Digest mismatch, likely tampered: {0}")]
    Tampered(String),
    #[error("Canonicalization failed: {0}")]
    Canonization(#[from] CanonizationError),
    #[error("Key resolution failed: {0}")]
    KeyResolution(#[from] KeyResolutionError),
    #[error("Signature check failed: {0}")]
    Signature(#[from] SignatureError),
    #[error("Invalid token: {0}")]
    Jwt(#[from] JwtError),
    #[error("Invalid encoding: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Invalid CBOR structure: {0}")]
    Cbor(#[from] CborError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CredentialFormatError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Malformed(_) | Self::Json(_) | Self::Jwt(_) | Self::Encoding(_)
            | Self::Cbor(_) | Self::Canonization(_) => ErrorCode::EmptyOrMalformedInput,
            Self::MissingField(_) => ErrorCode::MissingRequiredField,
            Self::InvalidField { .. } => ErrorCode::InvalidFieldValue,
            Self::ContextNotFirst(_) => ErrorCode::ContextNotFirst,
            Self::UnsupportedProofType(_) => ErrorCode::UnsupportedProofType,
            Self::Tampered(_) => ErrorCode::LikelyTampered,
            Self::KeyResolution(error) => match error {
                KeyResolutionError::KeyNotFound(_) => ErrorCode::PublicKeyNotFound,
                KeyResolutionError::KeyTypeUnsupported(_) => ErrorCode::PublicKeyTypeUnsupported,
                KeyResolutionError::Http(http_client::Error::Timeout(_)) => {
                    ErrorCode::NetworkTimeout
                }
                _ => ErrorCode::KeyResolutionFailed,
            },
            Self::Signature(error) => match error {
                SignatureError::AlgorithmNotSupported(_) => {
                    ErrorCode::UnsupportedSignatureAlgorithm
                }
                _ => ErrorCode::SignatureVerificationFailed,
            },
        }
    }
}

/// The validator/verifier pair for one credential format.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait::async_trait]
pub trait FormatVerifier: Send + Sync {
    /// Structural validation; runs without network calls except where proof
    /// inspection requires decoding.
    async fn validate(&self, credential: &str) -> Result<CredentialValidity, CredentialFormatError>;

    /// Cryptographic verification: key resolution, signing-input
    /// reconstruction and signature check.
    async fn verify(&self, credential: &str) -> Result<(), CredentialFormatError>;
}

pub struct FormatVerifierProvider {
    verifiers: HashMap<CredentialFormat, Arc<dyn FormatVerifier>>,
}

impl FormatVerifierProvider {
    pub fn new(verifiers: HashMap<CredentialFormat, Arc<dyn FormatVerifier>>) -> Self {
        Self { verifiers }
    }

    pub fn get(&self, format: CredentialFormat) -> Option<Arc<dyn FormatVerifier>> {
        self.verifiers.get(&format).cloned()
    }
}
