//! MSO_MDOC: CBOR mobile documents with a COSE_Sign1 issuer signature. The
//! signer key comes from the leaf X.509 certificate embedded in the COSE
//! unprotected header; per-namespace value digests bind the disclosed items
//! to the signed Mobile Security Object.

use std::sync::Arc;

use async_trait::async_trait;
use coset::iana::EnumI64;
use time::OffsetDateTime;
use verifier_crypto::CryptoProvider;
use x509_parser::prelude::{FromDer, X509Certificate};

use self::model::{Document, MobileSecurityObject, Namespaces, ValidityInfo};
use super::{CredentialFormatError, CredentialValidity, FormatVerifier};
use crate::provider::key_resolver::common::key_from_spki;
use crate::provider::signature::SignatureVerifierProvider;
use crate::util::cbor::unwrap_embedded;
use crate::util::encoding::decode_base64url;

pub mod model;


const X5CHAIN_HEADER_LABEL: i64 = 33;
const ISSUING_COUNTRY_ELEMENT: &str = "issuing_country";

pub struct MdocFormat {
    crypto: Arc<dyn CryptoProvider>,
    signatures: Arc<SignatureVerifierProvider>,
}

impl MdocFormat {
    pub fn new(crypto: Arc<dyn CryptoProvider>, signatures: Arc<SignatureVerifierProvider>) -> Self {
        Self { crypto, signatures }
    }
}

#[async_trait]
impl FormatVerifier for MdocFormat {
    async fn validate(&self, credential: &str) -> Result<CredentialValidity, CredentialFormatError> {
        let document = parse_document(credential)?;
        let mso = extract_mso(&document)?;

        let validity_info = mso
            .validity_info
            .as_ref()
            .ok_or_else(|| CredentialFormatError::MissingField("validityInfo".to_string()))?;

        check_validity_window(validity_info, OffsetDateTime::now_utc())?;

        Ok(CredentialValidity::Valid)
    }

    async fn verify(&self, credential: &str) -> Result<(), CredentialFormatError> {
        let document = parse_document(credential)?;
        let mso = extract_mso(&document)?;

        let issuer_auth = &document.issuer_signed.issuer_auth.0;

        // (1) COSE signature against the leaf certificate key
        let certificate_der = leaf_certificate(issuer_auth)?;
        let (_, certificate) = X509Certificate::from_der(&certificate_der).map_err(|e| {
            CredentialFormatError::Malformed(format!("invalid x5chain certificate: {e}"))
        })?;
        let key = key_from_spki(certificate.public_key())?;

        let algorithm = cose_algorithm(issuer_auth)?;
        let payload = issuer_auth.payload.as_deref().ok_or_else(|| {
            CredentialFormatError::MissingField("issuerAuth payload".to_string())
        })?;
        let signing_input = coset::sig_structure_data(
            coset::SignatureContext::CoseSign1,
            issuer_auth.protected.clone(),
            None,
            &[],
            payload,
        );

        self.signatures
            .verify_cose(algorithm, &signing_input, &issuer_auth.signature, &key)?;

        // (2) per-namespace value digests
        self.check_value_digests(&document, &mso)?;

        // (3) docType consistency
        if mso.doc_type != document.doc_type {
            return Err(CredentialFormatError::InvalidField {
                field: "docType".to_string(),
                reason: format!(
                    "document declares `{}` but the MSO was issued for `{}`",
                    document.doc_type, mso.doc_type
                ),
            });
        }

        // (4) issuing-country consistency with the certificate subject
        if let Some(name_spaces) = &document.issuer_signed.name_spaces {
            check_issuing_country(name_spaces, &certificate)?;
        }

        Ok(())
    }
}

impl MdocFormat {
    fn check_value_digests(
        &self,
        document: &Document,
        mso: &MobileSecurityObject,
    ) -> Result<(), CredentialFormatError> {
        let Some(name_spaces) = &document.issuer_signed.name_spaces else {
            return Ok(());
        };

        let hasher = self
            .crypto
            .get_hasher(mso.digest_algorithm.hasher_name())
            .map_err(|e| CredentialFormatError::Malformed(e.to_string()))?;

        for (namespace, items) in name_spaces {
            let digest_ids = mso.value_digests.get(namespace).ok_or_else(|| {
                CredentialFormatError::Tampered(format!(
                    "namespace `{namespace}` has no digests in the MSO"
                ))
            })?;

            for item in items {
                let digest_id = item.inner().digest_id;
                let expected = digest_ids.get(&digest_id).ok_or_else(|| {
                    CredentialFormatError::Tampered(format!(
                        "no digest for id {digest_id} in namespace `{namespace}`"
                    ))
                })?;

                let computed = hasher
                    .hash(item.bytes())
                    .map_err(|e| CredentialFormatError::Malformed(e.to_string()))?;

                if computed != expected.0 {
                    return Err(CredentialFormatError::Tampered(format!(
                        "digest mismatch for `{}` in namespace `{namespace}`",
                        item.inner().element_identifier
                    )));
                }
            }
        }

        Ok(())
    }
}

fn parse_document(credential: &str) -> Result<Document, CredentialFormatError> {
    if credential.trim().is_empty() {
        return Err(CredentialFormatError::Malformed(
            "empty credential".to_string(),
        ));
    }

    let decoded = decode_base64url(credential.trim())?;

    ciborium::from_reader(decoded.as_slice())
        .map_err(|e| CredentialFormatError::Malformed(format!("invalid mdoc CBOR: {e}")))
}

fn extract_mso(document: &Document) -> Result<MobileSecurityObject, CredentialFormatError> {
    let payload = document
        .issuer_signed
        .issuer_auth
        .0
        .payload
        .as_deref()
        .ok_or_else(|| CredentialFormatError::MissingField("issuerAuth payload".to_string()))?;

    let mut value: ciborium::Value = ciborium::from_reader(payload)
        .map_err(|e| CredentialFormatError::Malformed(format!("invalid MSO payload: {e}")))?;

    // the MSO may arrive double-wrapped: #6.24(bstr .cbor MSO) or a bare bstr
    for _ in 0..2 {
        if matches!(
            value,
            ciborium::Value::Tag(_, _) | ciborium::Value::Bytes(_)
        ) {
            value = unwrap_embedded(value)?;
        } else {
            break;
        }
    }

    value
        .deserialized()
        .map_err(|e| CredentialFormatError::Malformed(format!("invalid MSO structure: {e}")))
}

/// Half-open validity window: valid when `validFrom <= now < validUntil`.
fn check_validity_window(
    validity_info: &ValidityInfo,
    now: OffsetDateTime,
) -> Result<(), CredentialFormatError> {
    let valid_from: OffsetDateTime = validity_info
        .valid_from
        .clone()
        .ok_or_else(|| {
            CredentialFormatError::MissingField("validityInfo.validFrom".to_string())
        })?
        .into();
    let valid_until: OffsetDateTime = validity_info
        .valid_until
        .clone()
        .ok_or_else(|| {
            CredentialFormatError::MissingField("validityInfo.validUntil".to_string())
        })?
        .into();

    if valid_until <= valid_from {
        return Err(CredentialFormatError::InvalidField {
            field: "validityInfo".to_string(),
            reason: "validUntil must be after validFrom".to_string(),
        });
    }
    if now < valid_from {
        return Err(CredentialFormatError::InvalidField {
            field: "validityInfo.validFrom".to_string(),
            reason: "document is not yet valid".to_string(),
        });
    }
    if now >= valid_until {
        return Err(CredentialFormatError::InvalidField {
            field: "validityInfo.validUntil".to_string(),
            reason: "document has expired".to_string(),
        });
    }

    Ok(())
}

/// Leaf certificate from the x5chain unprotected header: either a single
/// certificate byte string or a chain where index 0 is the leaf.
fn leaf_certificate(issuer_auth: &coset::CoseSign1) -> Result<Vec<u8>, CredentialFormatError> {
    let value = issuer_auth
        .unprotected
        .rest
        .iter()
        .find(|(label, _)| *label == coset::Label::Int(X5CHAIN_HEADER_LABEL))
        .map(|(_, value)| value)
        .ok_or_else(|| {
            CredentialFormatError::MissingField("issuerAuth x5chain header".to_string())
        })?;

    match value {
        ciborium::Value::Bytes(certificate) => Ok(certificate.clone()),
        ciborium::Value::Array(chain) => chain
            .first()
            .and_then(|leaf| leaf.as_bytes().cloned())
            .ok_or_else(|| CredentialFormatError::InvalidField {
                field: "x5chain".to_string(),
                reason: "chain must contain at least one certificate".to_string(),
            }),
        _ => Err(CredentialFormatError::InvalidField {
            field: "x5chain".to_string(),
            reason: "expected bytes or an array of certificates".to_string(),
        }),
    }
}

fn cose_algorithm(issuer_auth: &coset::CoseSign1) -> Result<i64, CredentialFormatError> {
    match &issuer_auth.protected.header.alg {
        Some(coset::RegisteredLabelWithPrivate::Assigned(algorithm)) => Ok(algorithm.to_i64()),
        Some(coset::RegisteredLabelWithPrivate::PrivateUse(value)) => Ok(*value),
        Some(coset::RegisteredLabelWithPrivate::Text(name)) => Err(
            CredentialFormatError::Malformed(format!("unsupported text alg header `{name}`")),
        ),
        None => Err(CredentialFormatError::MissingField(
            "issuerAuth protected alg header".to_string(),
        )),
    }
}

fn check_issuing_country(
    name_spaces: &Namespaces,
    certificate: &X509Certificate,
) -> Result<(), CredentialFormatError> {
    let declared = name_spaces.values().flatten().find_map(|item| {
        (item.inner().element_identifier == ISSUING_COUNTRY_ELEMENT)
            .then(|| item.inner().element_value.as_text())
            .flatten()
    });

    let Some(declared) = declared else {
        return Ok(());
    };

    let certificate_country = certificate
        .subject()
        .iter_country()
        .next()
        .and_then(|attribute| attribute.as_str().ok());

    if certificate_country != Some(declared) {
        return Err(CredentialFormatError::InvalidField {
            field: ISSUING_COUNTRY_ELEMENT.to_string(),
            reason: format!(
                "document declares `{declared}` but the certificate subject country is {certificate_country:?}"
            ),
        });
    }

    Ok(())
}
