//! Selective-Disclosure JWTs: `<jwt>~<disclosure>~…~[<kb-jwt>]`. The issuer
//! JWT is a compact JWS whose `header.payload` ASCII bytes are the signing
//! input; disclosures are bound to the payload through `_sd` digests.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::{CredentialFormatError, CredentialValidity, FormatVerifier};
use crate::provider::key_resolver::KeyResolverProvider;
use crate::provider::signature::SignatureVerifierProvider;
use crate::util::encoding::decode_base64url;
use crate::util::jwt::{self, DecomposedJwt};


const SUPPORTED_TYP: [&str; 2] = ["vc+sd-jwt", "dc+sd-jwt"];

// digest sizes per supported `_sd_alg`
const SD_ALG_DIGEST_SIZES: [(&str, usize); 3] =
    [("sha-256", 32), ("sha-384", 48), ("sha-512", 64)];

const DEFAULT_SD_ALG: &str = "sha-256";

pub struct SdJwtFormat {
    key_resolvers: Arc<KeyResolverProvider>,
    signatures: Arc<SignatureVerifierProvider>,
}

struct DecomposedSdJwt<'a> {
    issuer_jwt: DecomposedJwt,
    disclosures: Vec<&'a str>,
    key_binding_jwt: Option<&'a str>,
}

impl SdJwtFormat {
    pub fn new(
        key_resolvers: Arc<KeyResolverProvider>,
        signatures: Arc<SignatureVerifierProvider>,
    ) -> Self {
        Self {
            key_resolvers,
            signatures,
        }
    }
}

#[async_trait]
impl FormatVerifier for SdJwtFormat {
    async fn validate(&self, credential: &str) -> Result<CredentialValidity, CredentialFormatError> {
        let decomposed = decompose_sd_jwt(credential)?;

        validate_issuer_header(&decomposed.issuer_jwt)?;
        validate_vct(&decomposed.issuer_jwt)?;
        validate_disclosures(&decomposed)?;

        if let Some(key_binding_jwt) = decomposed.key_binding_jwt {
            validate_key_binding_jwt(key_binding_jwt)?;
        }

        Ok(CredentialValidity::Valid)
    }

    async fn verify(&self, credential: &str) -> Result<(), CredentialFormatError> {
        let decomposed = decompose_sd_jwt(credential)?;
        let issuer_jwt = &decomposed.issuer_jwt;

        let algorithm = issuer_jwt
            .header
            .alg
            .as_deref()
            .ok_or_else(|| CredentialFormatError::MissingField("header.alg".to_string()))?;

        let key_reference = key_reference(issuer_jwt)?;
        let key = self.key_resolvers.resolve(&key_reference, None).await?;

        self.signatures.verify_jose(
            algorithm,
            issuer_jwt.signed_part.as_bytes(),
            &issuer_jwt.signature,
            &key,
        )?;

        Ok(())
    }
}

/// Signer-key reference: a resolvable `kid` wins over the payload issuer.
fn key_reference(issuer_jwt: &DecomposedJwt) -> Result<String, CredentialFormatError> {
    if let Some(kid) = &issuer_jwt.header.kid {
        if kid.starts_with("did:") || kid.starts_with("http://") || kid.starts_with("https://") {
            return Ok(kid.clone());
        }
    }

    issuer_jwt
        .payload
        .get("iss")
        .and_then(|issuer| issuer.as_str())
        .map(str::to_string)
        .ok_or_else(|| CredentialFormatError::MissingField("iss".to_string()))
}

fn decompose_sd_jwt(credential: &str) -> Result<DecomposedSdJwt<'_>, CredentialFormatError> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(CredentialFormatError::Malformed(
            "empty credential".to_string(),
        ));
    }

    let mut segments: Vec<&str> = credential.split('~').collect();

    // a trailing `~` means no key-binding JWT
    let key_binding_jwt = match segments.last() {
        Some(&"") => {
            segments.pop();
            None
        }
        Some(last) if segments.len() > 1 => {
            let key_binding = *last;
            segments.pop();
            Some(key_binding)
        }
        _ => None,
    };

    let issuer_jwt = jwt::decompose(segments[0])?;
    let disclosures = segments[1..].to_vec();

    if disclosures.iter().any(|disclosure| disclosure.is_empty()) {
        return Err(CredentialFormatError::Malformed(
            "empty disclosure segment".to_string(),
        ));
    }

    Ok(DecomposedSdJwt {
        issuer_jwt,
        disclosures,
        key_binding_jwt,
    })
}

fn validate_issuer_header(issuer_jwt: &DecomposedJwt) -> Result<(), CredentialFormatError> {
    match issuer_jwt.header.alg.as_deref() {
        None => return Err(CredentialFormatError::MissingField("header.alg".to_string())),
        Some("none") => {
            return Err(CredentialFormatError::InvalidField {
                field: "header.alg".to_string(),
                reason: "`none` is not acceptable for a signed credential".to_string(),
            })
        }
        Some(_) => {}
    }

    match issuer_jwt.header.typ.as_deref() {
        None => Err(CredentialFormatError::MissingField("header.typ".to_string())),
        Some(typ) if SUPPORTED_TYP.contains(&typ) => Ok(()),
        Some(typ) => Err(CredentialFormatError::InvalidField {
            field: "header.typ".to_string(),
            reason: format!("`{typ}` is not an SD-JWT credential type"),
        }),
    }
}

fn validate_vct(issuer_jwt: &DecomposedJwt) -> Result<(), CredentialFormatError> {
    let vct = issuer_jwt
        .payload
        .get("vct")
        .and_then(|vct| vct.as_str())
        .ok_or_else(|| CredentialFormatError::MissingField("vct".to_string()))?;

    if vct.trim().is_empty() {
        return Err(CredentialFormatError::InvalidField {
            field: "vct".to_string(),
            reason: "must not be blank".to_string(),
        });
    }

    if vct.contains(':') && Url::parse(vct).is_err() {
        return Err(CredentialFormatError::InvalidField {
            field: "vct".to_string(),
            reason: format!("`{vct}` is not a valid URI"),
        });
    }

    Ok(())
}

fn validate_disclosures(decomposed: &DecomposedSdJwt) -> Result<(), CredentialFormatError> {
    if decomposed.disclosures.is_empty() {
        return Ok(());
    }

    let payload = &decomposed.issuer_jwt.payload;

    let sd_digests = payload
        .get("_sd")
        .and_then(|sd| sd.as_array())
        .ok_or_else(|| CredentialFormatError::MissingField("_sd".to_string()))?;

    if sd_digests.len() != decomposed.disclosures.len() {
        return Err(CredentialFormatError::InvalidField {
            field: "_sd".to_string(),
            reason: format!(
                "{} digests do not match {} disclosures",
                sd_digests.len(),
                decomposed.disclosures.len()
            ),
        });
    }

    let sd_alg = payload
        .get("_sd_alg")
        .and_then(|alg| alg.as_str())
        .unwrap_or(DEFAULT_SD_ALG);
    let digest_size = SD_ALG_DIGEST_SIZES
        .iter()
        .find(|(name, _)| *name == sd_alg)
        .map(|(_, size)| *size)
        .ok_or_else(|| CredentialFormatError::InvalidField {
            field: "_sd_alg".to_string(),
            reason: format!("unsupported digest algorithm `{sd_alg}`"),
        })?;

    for digest in sd_digests {
        let digest = digest
            .as_str()
            .ok_or_else(|| CredentialFormatError::InvalidField {
                field: "_sd".to_string(),
                reason: "digests must be strings".to_string(),
            })?;

        if decode_base64url(digest)?.len() != digest_size {
            return Err(CredentialFormatError::InvalidField {
                field: "_sd".to_string(),
                reason: format!("digest length does not match `{sd_alg}`"),
            });
        }
    }

    for disclosure in &decomposed.disclosures {
        validate_disclosure(disclosure)?;
    }

    Ok(())
}

fn validate_disclosure(disclosure: &str) -> Result<(), CredentialFormatError> {
    let decoded = decode_base64url(disclosure)?;
    let value: serde_json::Value = serde_json::from_slice(&decoded)?;

    let entries = value
        .as_array()
        .ok_or_else(|| CredentialFormatError::InvalidField {
            field: "disclosure".to_string(),
            reason: "must decode to a JSON array".to_string(),
        })?;

    match entries.len() {
        // [salt, value]: an array-element disclosure
        2 => Ok(()),
        // [salt, claim name, value]
        3 => {
            let claim_name = entries[1].as_str().ok_or_else(|| {
                CredentialFormatError::InvalidField {
                    field: "disclosure".to_string(),
                    reason: "claim name must be a string".to_string(),
                }
            })?;

            if claim_name.starts_with('_') {
                return Err(CredentialFormatError::InvalidField {
                    field: "disclosure".to_string(),
                    reason: format!("claim name `{claim_name}` must not start with `_`"),
                });
            }
            Ok(())
        }
        other => Err(CredentialFormatError::InvalidField {
            field: "disclosure".to_string(),
            reason: format!("expected 2 or 3 elements, got {other}"),
        }),
    }
}

fn validate_key_binding_jwt(key_binding_jwt: &str) -> Result<(), CredentialFormatError> {
    let decomposed = jwt::decompose(key_binding_jwt)?;

    for field in ["aud", "nonce"] {
        if decomposed.payload.get(field).is_none() {
            return Err(CredentialFormatError::MissingField(format!(
                "key-binding JWT {field}"
            )));
        }
    }

    let cnf = decomposed
        .payload
        .get("cnf")
        .and_then(|cnf| cnf.as_object())
        .ok_or_else(|| {
            CredentialFormatError::MissingField("key-binding JWT cnf".to_string())
        })?;

    match (cnf.contains_key("jwk"), cnf.contains_key("kid")) {
        (true, false) | (false, true) => Ok(()),
        (true, true) => Err(CredentialFormatError::InvalidField {
            field: "cnf".to_string(),
            reason: "jwk and kid are mutually exclusive".to_string(),
        }),
        (false, false) => Err(CredentialFormatError::MissingField(
            "key-binding JWT cnf.jwk or cnf.kid".to_string(),
        )),
    }
}
