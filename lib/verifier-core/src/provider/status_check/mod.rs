//! Revocation/suspension status checking against externally hosted status
//! lists. Two distinct strategies exist: the Bitstring Status List algorithm
//! (default) and a simplified query-parameter service. One entry failing
//! never aborts the checks of its siblings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use url::Url;

use super::caching_loader::{CachingLoader, ResolveResult, Resolver, ResolverError};
use super::credential_format::ldp::LdpFormat;
use super::credential_format::FormatVerifier;
use super::http_client::{self, HttpClient};
use crate::model::{CredentialStatusResult, ErrorCode, StatusCheckFailure};

pub mod bitstring;

#[cfg(test)]
mod test;

const STATUS_ENTRY_TYPE: &str = "BitstringStatusListEntry";
const STATUS_LIST_TYPE: &str = "BitstringStatusList";
const DEFAULT_STATUS_PURPOSE: &str = "revocation";

#[derive(Debug, Error)]
pub enum StatusCheckError {
    #[error("Missing required field `{0}`")]
    MissingField(String),
    #[error("Invalid value for field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("Status list retrieval failed: {0}")]
    RetrievalFailed(String),
    #[error("Status list verification failed: {0}")]
    VerificationFailed(String),
    #[error("Status index out of range: {0}")]
    OutOfRange(String),
    #[error("Status list request timed out: {0}")]
    Timeout(String),
}

impl StatusCheckError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField(_) => ErrorCode::MissingRequiredField,
            Self::InvalidField { .. } => ErrorCode::InvalidFieldValue,
            Self::RetrievalFailed(_) => ErrorCode::StatusRetrievalFailed,
            Self::VerificationFailed(_) => ErrorCode::StatusVerificationFailed,
            Self::OutOfRange(_) => ErrorCode::RangeError,
            Self::Timeout(_) => ErrorCode::NetworkTimeout,
        }
    }
}

impl From<http_client::Error> for StatusCheckError {
    fn from(error: http_client::Error) -> Self {
        match error {
            http_client::Error::Timeout(message) => Self::Timeout(message),
            other => Self::RetrievalFailed(other.to_string()),
        }
    }
}

/// One `credentialStatus` entry, as attached to a credential.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListEntry {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub status_purpose: Option<String>,
    pub status_list_credential: String,
    pub status_list_index: serde_json::Value,
}

impl StatusListEntry {
    pub fn purpose(&self) -> &str {
        self.status_purpose.as_deref().unwrap_or(DEFAULT_STATUS_PURPOSE)
    }

    fn index(&self) -> Result<usize, StatusCheckError> {
        let parsed = match &self.status_list_index {
            serde_json::Value::String(index) => index.parse::<usize>().ok(),
            serde_json::Value::Number(index) => index.as_u64().map(|index| index as usize),
            _ => None,
        };

        parsed.ok_or_else(|| StatusCheckError::InvalidField {
            field: "statusListIndex".to_string(),
            reason: "must be a non-negative integer".to_string(),
        })
    }
}

/// A status-checking strategy returns the raw status value for one entry;
/// `0` means the credential is valid for that purpose.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait StatusCheckStrategy: Send + Sync {
    async fn check_entry(&self, entry: &StatusListEntry) -> Result<u64, StatusCheckError>;
}

pub struct StatusCheck {
    strategy: Arc<dyn StatusCheckStrategy>,
}

impl StatusCheck {
    pub fn new(strategy: Arc<dyn StatusCheckStrategy>) -> Self {
        Self { strategy }
    }

    /// Checks every `credentialStatus` entry matching the purpose filter.
    ///
    /// A credential without any `credentialStatus` yields a single failed
    /// result; entries present but all filtered out yield an empty list.
    pub async fn check(
        &self,
        credential: &serde_json::Value,
        purposes: Option<&[String]>,
    ) -> Vec<CredentialStatusResult> {
        let entries = match collect_entries(credential) {
            Ok(entries) => entries,
            Err(error) => return vec![failed_result(String::new(), &error)],
        };

        if entries.is_empty() {
            return vec![failed_result(
                String::new(),
                &StatusCheckError::MissingField("credentialStatus".to_string()),
            )];
        }

        let mut results = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    results.push(failed_result(String::new(), &error));
                    continue;
                }
            };

            if let Some(purposes) = purposes {
                if !purposes.iter().any(|purpose| purpose == entry.purpose()) {
                    continue;
                }
            }

            let purpose = entry.purpose().to_string();
            match self.strategy.check_entry(&entry).await {
                Ok(value) => results.push(CredentialStatusResult {
                    purpose,
                    valid: value == 0,
                    error: None,
                }),
                Err(error) => {
                    tracing::debug!("status check failed for purpose `{purpose}`: {error}");
                    results.push(failed_result(purpose, &error));
                }
            }
        }

        results
    }
}

fn failed_result(purpose: String, error: &StatusCheckError) -> CredentialStatusResult {
    CredentialStatusResult {
        purpose,
        valid: false,
        error: Some(StatusCheckFailure {
            code: error.error_code(),
            message: error.to_string(),
        }),
    }
}

/// `credentialStatus` may be a single object or an array; each entry parses
/// independently so one malformed entry cannot hide its siblings.
fn collect_entries(
    credential: &serde_json::Value,
) -> Result<Vec<Result<StatusListEntry, StatusCheckError>>, StatusCheckError> {
    let status = match credential.get("credentialStatus") {
        Some(status) => status,
        None => return Ok(vec![]),
    };

    let raw_entries: Vec<&serde_json::Value> = match status {
        serde_json::Value::Array(entries) => entries.iter().collect(),
        single @ serde_json::Value::Object(_) => vec![single],
        _ => {
            return Err(StatusCheckError::InvalidField {
                field: "credentialStatus".to_string(),
                reason: "must be an object or an array of objects".to_string(),
            })
        }
    };

    Ok(raw_entries
        .into_iter()
        .map(|raw| {
            serde_json::from_value::<StatusListEntry>(raw.clone()).map_err(|e| {
                StatusCheckError::InvalidField {
                    field: "credentialStatus".to_string(),
                    reason: e.to_string(),
                }
            })
        })
        .collect())
}

/// The full Bitstring Status List algorithm: fetch, nested signature
/// verification through the LDP pipeline, window and purpose checks, then
/// the bit-level read.
pub struct BitstringStatusCheck {
    caching_loader: CachingLoader,
    resolver: Arc<StatusListResolver>,
    ldp_verifier: Arc<LdpFormat>,
}

pub struct StatusListResolver {
    client: Arc<dyn HttpClient>,
}

#[async_trait]
impl Resolver for StatusListResolver {
    async fn do_resolve(&self, url: &str) -> Result<ResolveResult, ResolverError> {
        let response = http_client::get(self.client.clone(), url)
            .send()
            .await?
            .error_for_status()?;

        Ok(ResolveResult {
            media_type: response.header_get("Content-Type").cloned(),
            content: response.body,
        })
    }
}

impl BitstringStatusCheck {
    pub fn new(
        client: Arc<dyn HttpClient>,
        caching_loader: CachingLoader,
        ldp_verifier: Arc<LdpFormat>,
    ) -> Self {
        Self {
            caching_loader,
            resolver: Arc::new(StatusListResolver { client }),
            ldp_verifier,
        }
    }
}

#[async_trait]
impl StatusCheckStrategy for BitstringStatusCheck {
    async fn check_entry(&self, entry: &StatusListEntry) -> Result<u64, StatusCheckError> {
        if entry.r#type != STATUS_ENTRY_TYPE {
            return Err(StatusCheckError::InvalidField {
                field: "credentialStatus.type".to_string(),
                reason: format!("expected `{STATUS_ENTRY_TYPE}`, got `{}`", entry.r#type),
            });
        }

        Url::parse(&entry.status_list_credential).map_err(|e| StatusCheckError::InvalidField {
            field: "statusListCredential".to_string(),
            reason: e.to_string(),
        })?;
        let index = entry.index()?;

        let (content, _) = self
            .caching_loader
            .get(&entry.status_list_credential, &*self.resolver)
            .await
            .map_err(|error| match error {
                ResolverError::Http(http_error) => StatusCheckError::from(http_error),
                other => StatusCheckError::RetrievalFailed(other.to_string()),
            })?;

        let content = String::from_utf8(content)
            .map_err(|e| StatusCheckError::RetrievalFailed(e.to_string()))?;

        // the status list is itself a signed credential
        self.ldp_verifier
            .verify(&content)
            .await
            .map_err(|e| StatusCheckError::VerificationFailed(e.to_string()))?;

        let status_list: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| StatusCheckError::RetrievalFailed(e.to_string()))?;

        check_status_list_window(&status_list)?;

        let subject = status_list_subject(&status_list)?;

        let subject_type = subject.get("type").and_then(|t| t.as_str());
        if subject_type != Some(STATUS_LIST_TYPE) {
            return Err(StatusCheckError::VerificationFailed(format!(
                "status list subject type is `{subject_type:?}`, expected `{STATUS_LIST_TYPE}`"
            )));
        }

        let list_purpose = subject.get("statusPurpose").and_then(|p| p.as_str());
        if list_purpose != Some(entry.purpose()) {
            return Err(StatusCheckError::VerificationFailed(format!(
                "status list purpose `{list_purpose:?}` does not match entry purpose `{}`",
                entry.purpose()
            )));
        }

        let encoded_list = subject
            .get("encodedList")
            .and_then(|list| list.as_str())
            .ok_or_else(|| StatusCheckError::MissingField("encodedList".to_string()))?;

        let status_size = match subject.get("statusSize") {
            None => 1,
            Some(size) => size.as_u64().filter(|size| (1..=8).contains(size)).ok_or_else(
                || StatusCheckError::InvalidField {
                    field: "statusSize".to_string(),
                    reason: "must be an integer between 1 and 8".to_string(),
                },
            )? as usize,
        };

        if status_size > 1 {
            check_status_messages(subject, status_size)?;
        }

        let bits = bitstring::decode_encoded_list(encoded_list)?;
        bitstring::read_status_value(&bits, index, status_size)
    }
}

fn check_status_list_window(status_list: &serde_json::Value) -> Result<(), StatusCheckError> {
    let now = OffsetDateTime::now_utc();

    let parse = |field: &str| -> Result<Option<OffsetDateTime>, StatusCheckError> {
        match status_list.get(field).and_then(|value| value.as_str()) {
            None => Ok(None),
            Some(value) => OffsetDateTime::parse(value, &Rfc3339).map(Some).map_err(|e| {
                StatusCheckError::InvalidField {
                    field: field.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    };

    if let Some(valid_from) = parse("validFrom")? {
        if now < valid_from {
            return Err(StatusCheckError::VerificationFailed(
                "status list credential is not yet valid".to_string(),
            ));
        }
    }
    if let Some(valid_until) = parse("validUntil")? {
        if now >= valid_until {
            return Err(StatusCheckError::VerificationFailed(
                "status list credential has expired".to_string(),
            ));
        }
    }

    Ok(())
}

fn status_list_subject(
    status_list: &serde_json::Value,
) -> Result<&serde_json::Map<String, serde_json::Value>, StatusCheckError> {
    let subject = status_list
        .get("credentialSubject")
        .ok_or_else(|| StatusCheckError::MissingField("credentialSubject".to_string()))?;

    let subject = match subject {
        serde_json::Value::Array(entries) => entries
            .first()
            .ok_or_else(|| StatusCheckError::MissingField("credentialSubject".to_string()))?,
        other => other,
    };

    subject
        .as_object()
        .ok_or_else(|| StatusCheckError::InvalidField {
            field: "credentialSubject".to_string(),
            reason: "must be an object".to_string(),
        })
}

/// `statusMessage` must enumerate every representable value when entries
/// span more than one bit.
fn check_status_messages(
    subject: &serde_json::Map<String, serde_json::Value>,
    status_size: usize,
) -> Result<(), StatusCheckError> {
    let expected = 1usize << status_size;

    let count = match subject.get("statusMessage") {
        Some(serde_json::Value::Array(messages)) => messages.len(),
        Some(serde_json::Value::Object(messages)) => messages.len(),
        Some(_) => {
            return Err(StatusCheckError::InvalidField {
                field: "statusMessage".to_string(),
                reason: "must be an array or an object".to_string(),
            })
        }
        None => return Err(StatusCheckError::MissingField("statusMessage".to_string())),
    };

    if count != expected {
        return Err(StatusCheckError::InvalidField {
            field: "statusMessage".to_string(),
            reason: format!("expected {expected} entries for statusSize {status_size}, got {count}"),
        });
    }

    Ok(())
}

/// Simplified status service: the status of one entry is queried directly
/// with `statusPurpose`/`statusListIndex` parameters and answered as a small
/// JSON document.
pub struct QueryParamStatusCheck {
    client: Arc<dyn HttpClient>,
}

#[derive(Deserialize)]
struct QueryParamStatusResponse {
    status: String,
}

impl QueryParamStatusCheck {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusCheckStrategy for QueryParamStatusCheck {
    async fn check_entry(&self, entry: &StatusListEntry) -> Result<u64, StatusCheckError> {
        let index = entry.index()?;

        let mut url =
            Url::parse(&entry.status_list_credential).map_err(|e| StatusCheckError::InvalidField {
                field: "statusListCredential".to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("statusPurpose", entry.purpose())
            .append_pair("statusListIndex", &index.to_string());

        let response = http_client::get(self.client.clone(), url.as_str())
            .send()
            .await?
            .error_for_status()
            .map_err(|e| StatusCheckError::RetrievalFailed(e.to_string()))?;

        let response: QueryParamStatusResponse = response
            .json()
            .map_err(|e| StatusCheckError::RetrievalFailed(e.to_string()))?;

        match response.status.as_str() {
            "revoked" | "suspended" => Ok(1),
            _ => Ok(0),
        }
    }
}
