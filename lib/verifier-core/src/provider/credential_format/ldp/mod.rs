//! JSON-LD credentials with Linked-Data proofs.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use verifier_crypto::CryptoProvider;

use super::{CredentialFormatError, CredentialValidity, FormatVerifier};
use crate::provider::key_resolver::KeyResolverProvider;
use crate::provider::signature::SignatureVerifierProvider;
use crate::util::encoding::decode_multibase;
use crate::util::jsonld_context::{ContextCache, CREDENTIALS_V1_URL, CREDENTIALS_V2_URL};

pub mod proof;


const TYPE_VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";

const SUPPORTED_PROOF_TYPES: [&str; 6] = [
    "RsaSignature2018",
    "Ed25519Signature2018",
    "Ed25519Signature2020",
    "EcdsaSecp256k1Signature2019",
    "JsonWebSignature2020",
    "DataIntegrityProof",
];

// optional attachments that must carry a `type` when present
const OPTIONAL_TYPED_FIELDS: [&str; 5] = [
    "credentialStatus",
    "evidence",
    "termsOfUse",
    "refreshService",
    "credentialSchema",
];

/// Millisecond-precision UTC timestamps; offsets other than `Z` are invalid.
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,3})?Z$")
        .unwrap_or_else(|_| unreachable!("the pattern is valid"))
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DataModelVersion {
    V1_1,
    V2_0,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Params {
    /// Optional attachments that additionally require an `id`.
    pub fields_requiring_id: Vec<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            fields_requiring_id: vec!["credentialSchema".to_string(), "refreshService".to_string()],
        }
    }
}

pub struct LdpFormat {
    crypto: Arc<dyn CryptoProvider>,
    context_cache: ContextCache,
    key_resolvers: Arc<KeyResolverProvider>,
    signatures: Arc<SignatureVerifierProvider>,
    params: Params,
}

impl LdpFormat {
    pub fn new(
        crypto: Arc<dyn CryptoProvider>,
        context_cache: ContextCache,
        key_resolvers: Arc<KeyResolverProvider>,
        signatures: Arc<SignatureVerifierProvider>,
        params: Params,
    ) -> Self {
        Self {
            crypto,
            context_cache,
            key_resolvers,
            signatures,
            params,
        }
    }

    /// Verifies the holder proof of a presentation and returns the embedded
    /// credentials for independent verification.
    pub async fn verify_presentation_proof(
        &self,
        presentation: &str,
    ) -> Result<Vec<serde_json::Value>, CredentialFormatError> {
        let presentation = parse_object(presentation)?;

        self.verify_proof(&presentation).await?;

        let credentials = match presentation.get("verifiableCredential") {
            Some(serde_json::Value::Array(entries)) => entries.clone(),
            Some(single @ serde_json::Value::Object(_)) => vec![single.clone()],
            Some(_) => {
                return Err(CredentialFormatError::InvalidField {
                    field: "verifiableCredential".to_string(),
                    reason: "expected an object or an array of objects".to_string(),
                })
            }
            None => vec![],
        };

        Ok(credentials)
    }

    async fn verify_proof(
        &self,
        document: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), CredentialFormatError> {
        let proof = first_proof(document)?;

        let proof_type = string_field(proof, "type")
            .ok_or_else(|| CredentialFormatError::MissingField("proof.type".to_string()))?;
        if !SUPPORTED_PROOF_TYPES.contains(&proof_type) {
            return Err(CredentialFormatError::UnsupportedProofType(
                proof_type.to_string(),
            ));
        }

        let verification_method = string_field(proof, "verificationMethod").ok_or_else(|| {
            CredentialFormatError::MissingField("proof.verificationMethod".to_string())
        })?;

        let hasher = self
            .crypto
            .get_hasher("sha-256")
            .map_err(|e| CredentialFormatError::Malformed(e.to_string()))?;
        let canonical_hash =
            proof::canonical_hash(document, proof, &self.context_cache, &*hasher).await?;

        let key = self
            .key_resolvers
            .resolve(verification_method, None)
            .await?;

        match (string_field(proof, "jws"), string_field(proof, "proofValue")) {
            (Some(jws), _) => {
                let detached = proof::parse_detached_jws(jws)?;
                let signing_input = proof::jws_signing_input(&detached.header, &canonical_hash)?;

                self.signatures.verify_jose(
                    &detached.algorithm,
                    &signing_input,
                    &detached.signature,
                    &key,
                )?;
            }
            (None, Some(proof_value)) => {
                let signature = decode_multibase(proof_value)?;
                let algorithm =
                    algorithm_for_proof(proof_type, string_field(proof, "cryptosuite"))?;

                self.signatures
                    .verify_jose(algorithm, &canonical_hash, &signature, &key)?;
            }
            (None, None) => {
                return Err(CredentialFormatError::MissingField(
                    "proof.jws or proof.proofValue".to_string(),
                ))
            }
        }

        Ok(())
    }
}

#[async_trait]
impl FormatVerifier for LdpFormat {
    async fn validate(&self, credential: &str) -> Result<CredentialValidity, CredentialFormatError> {
        let credential = parse_object(credential)?;

        let version = data_model_version(&credential)?;

        for field in ["type", "credentialSubject", "issuer", "proof"] {
            if !credential.contains_key(field) {
                return Err(CredentialFormatError::MissingField(field.to_string()));
            }
        }
        if version == DataModelVersion::V1_1 && !credential.contains_key("issuanceDate") {
            return Err(CredentialFormatError::MissingField(
                "issuanceDate".to_string(),
            ));
        }

        let types = string_values(&credential["type"]);
        if !types.contains(&TYPE_VERIFIABLE_CREDENTIAL) {
            return Err(CredentialFormatError::InvalidField {
                field: "type".to_string(),
                reason: format!("must include `{TYPE_VERIFIABLE_CREDENTIAL}`"),
            });
        }

        let proof = first_proof(&credential)?;
        if string_field(proof, "type").is_none() {
            return Err(CredentialFormatError::MissingField("proof.type".to_string()));
        }

        self.validate_optional_typed_fields(&credential)?;

        let now = OffsetDateTime::now_utc();
        let (issuance_field, expiry_field) = match version {
            DataModelVersion::V1_1 => ("issuanceDate", "expirationDate"),
            DataModelVersion::V2_0 => ("validFrom", "validUntil"),
        };

        if let Some(issuance) = string_field(&credential, issuance_field) {
            let issuance = parse_date(issuance_field, issuance)?;
            if issuance > now {
                return Err(CredentialFormatError::InvalidField {
                    field: issuance_field.to_string(),
                    reason: "must not be in the future".to_string(),
                });
            }
        }

        if let Some(expiry) = string_field(&credential, expiry_field) {
            let expiry = parse_date(expiry_field, expiry)?;
            if now >= expiry {
                return Ok(CredentialValidity::Expired);
            }
        }

        Ok(CredentialValidity::Valid)
    }

    async fn verify(&self, credential: &str) -> Result<(), CredentialFormatError> {
        let credential = parse_object(credential)?;
        self.verify_proof(&credential).await
    }
}

impl LdpFormat {
    fn validate_optional_typed_fields(
        &self,
        credential: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), CredentialFormatError> {
        for field in OPTIONAL_TYPED_FIELDS {
            let Some(value) = credential.get(field) else {
                continue;
            };

            let entries: Vec<&serde_json::Value> = match value {
                serde_json::Value::Array(entries) => entries.iter().collect(),
                single => vec![single],
            };

            for entry in entries {
                let object = entry
                    .as_object()
                    .ok_or_else(|| CredentialFormatError::InvalidField {
                        field: field.to_string(),
                        reason: "entries must be objects".to_string(),
                    })?;

                if !object.contains_key("type") {
                    return Err(CredentialFormatError::MissingField(format!("{field}.type")));
                }
                if self.params.fields_requiring_id.iter().any(|f| f == field)
                    && !object.contains_key("id")
                {
                    return Err(CredentialFormatError::MissingField(format!("{field}.id")));
                }
            }
        }

        Ok(())
    }
}

fn parse_object(
    input: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, CredentialFormatError> {
    if input.trim().is_empty() {
        return Err(CredentialFormatError::Malformed(
            "empty credential".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(input)?;
    match value {
        serde_json::Value::Object(object) => Ok(object),
        _ => Err(CredentialFormatError::Malformed(
            "credential must be a JSON object".to_string(),
        )),
    }
}

fn data_model_version(
    credential: &serde_json::Map<String, serde_json::Value>,
) -> Result<DataModelVersion, CredentialFormatError> {
    let context = credential
        .get("@context")
        .ok_or_else(|| CredentialFormatError::MissingField("@context".to_string()))?;

    let first = match context {
        serde_json::Value::Array(entries) => entries.first().and_then(|entry| entry.as_str()),
        serde_json::Value::String(single) => Some(single.as_str()),
        _ => None,
    };

    match first {
        Some(CREDENTIALS_V1_URL) => Ok(DataModelVersion::V1_1),
        Some(CREDENTIALS_V2_URL) => Ok(DataModelVersion::V2_0),
        Some(other) => Err(CredentialFormatError::ContextNotFirst(other.to_string())),
        None => Err(CredentialFormatError::ContextNotFirst(
            "<missing>".to_string(),
        )),
    }
}

/// The proof attachment; an array of proofs contributes its first entry.
fn first_proof(
    document: &serde_json::Map<String, serde_json::Value>,
) -> Result<&serde_json::Map<String, serde_json::Value>, CredentialFormatError> {
    let proof = document
        .get(proof::PROOF_FIELD)
        .ok_or_else(|| CredentialFormatError::MissingField("proof".to_string()))?;

    let proof = match proof {
        serde_json::Value::Array(entries) => entries
            .first()
            .ok_or_else(|| CredentialFormatError::MissingField("proof".to_string()))?,
        other => other,
    };

    proof
        .as_object()
        .ok_or_else(|| CredentialFormatError::InvalidField {
            field: "proof".to_string(),
            reason: "must be an object".to_string(),
        })
}

fn string_field<'a>(
    object: &'a serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Option<&'a str> {
    object.get(field).and_then(|value| value.as_str())
}

fn string_values(value: &serde_json::Value) -> Vec<&str> {
    match value {
        serde_json::Value::String(single) => vec![single.as_str()],
        serde_json::Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| entry.as_str())
            .collect(),
        _ => vec![],
    }
}

fn parse_date(field: &str, value: &str) -> Result<OffsetDateTime, CredentialFormatError> {
    if !DATE_PATTERN.is_match(value) {
        return Err(CredentialFormatError::InvalidField {
            field: field.to_string(),
            reason: format!("`{value}` is not a millisecond-precision UTC timestamp"),
        });
    }

    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| CredentialFormatError::InvalidField {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn algorithm_for_proof(
    proof_type: &str,
    cryptosuite: Option<&str>,
) -> Result<&'static str, CredentialFormatError> {
    match proof_type {
        "Ed25519Signature2018" | "Ed25519Signature2020" => Ok("EdDSA"),
        "EcdsaSecp256k1Signature2019" => Ok("ES256K"),
        "DataIntegrityProof" => match cryptosuite {
            Some("eddsa-rdfc-2022" | "eddsa-2022") => Ok("EdDSA"),
            Some("ecdsa-rdfc-2019") => Ok("ES256"),
            other => Err(CredentialFormatError::UnsupportedProofType(format!(
                "DataIntegrityProof with cryptosuite {other:?}"
            ))),
        },
        other => Err(CredentialFormatError::UnsupportedProofType(
            other.to_string(),
        )),
    }
}
