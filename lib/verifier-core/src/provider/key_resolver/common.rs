//! DID-document model and key-material extraction shared by the resolvers.
//! The supported material encodings, in preference order: `publicKeyJwk`,
//! `publicKeyHex`, `publicKeyPem`, `publicKeyMultibase`.

use ct_codecs::{Base64, Decoder};
use serde::Deserialize;
use verifier_crypto::signer::es256::ES256Signer;
use verifier_crypto::signer::es256k::ES256KSigner;
use verifier_crypto::signer::rsa::spki_from_components;

use super::{KeyResolutionError, ResolvedPublicKey};
use crate::util::encoding::{decode_base64url, decode_hex, decode_multibase};

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_SECP256K1: &str = "1.3.132.0.10";

// multicodec prefixes from the did:key registry
pub const MULTICODEC_ED25519: [u8; 2] = [0xed, 0x01];
pub const MULTICODEC_SECP256K1: [u8; 2] = [0xe7, 0x01];
pub const MULTICODEC_P256: [u8; 2] = [0x80, 0x24];

#[derive(Clone, Debug, Deserialize)]
pub struct DidDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default, rename = "assertionMethod")]
    pub assertion_method: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub r#type: Option<String>,
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default, rename = "publicKeyJwk")]
    pub public_key_jwk: Option<PublicKeyJwk>,
    #[serde(default, rename = "publicKeyHex")]
    pub public_key_hex: Option<String>,
    #[serde(default, rename = "publicKeyPem")]
    pub public_key_pem: Option<String>,
    #[serde(default, rename = "publicKeyMultibase")]
    pub public_key_multibase: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// Selects the verification method whose `id` equals `target`.
pub fn select_verification_method<'a>(
    document: &'a DidDocument,
    target: &str,
) -> Result<&'a VerificationMethod, KeyResolutionError> {
    document
        .verification_method
        .iter()
        .find(|method| method.id == target)
        .ok_or_else(|| KeyResolutionError::KeyNotFound(target.to_string()))
}

pub fn key_from_verification_method(
    method: &VerificationMethod,
) -> Result<ResolvedPublicKey, KeyResolutionError> {
    if let Some(jwk) = &method.public_key_jwk {
        return key_from_jwk(jwk);
    }
    if let Some(hex_value) = &method.public_key_hex {
        return key_from_hex(hex_value);
    }
    if let Some(pem) = &method.public_key_pem {
        return key_from_pem(pem);
    }
    if let Some(multibase) = &method.public_key_multibase {
        return key_from_multibase(multibase);
    }

    Err(KeyResolutionError::KeyNotFound(format!(
        "verification method `{}` carries no key material",
        method.id
    )))
}

pub fn key_from_jwk(jwk: &PublicKeyJwk) -> Result<ResolvedPublicKey, KeyResolutionError> {
    let decode = |field: &Option<String>, name: &str| {
        field
            .as_deref()
            .ok_or_else(|| KeyResolutionError::KeyNotFound(format!("missing JWK field `{name}`")))
            .and_then(|value| Ok(decode_base64url(value)?))
    };

    match (jwk.kty.as_str(), jwk.crv.as_deref()) {
        ("OKP", Some("Ed25519")) => {
            let x = decode(&jwk.x, "x")?;
            if x.len() != 32 {
                return Err(KeyResolutionError::KeyTypeUnsupported(
                    "Ed25519 key must be exactly 32 bytes".to_string(),
                ));
            }
            Ok(ResolvedPublicKey::Ed25519 { raw: x })
        }
        ("EC", Some("P-256")) => {
            let sec1 = ES256Signer::public_key_from_coordinates(
                &decode(&jwk.x, "x")?,
                &decode(&jwk.y, "y")?,
            )
            .map_err(|e| KeyResolutionError::ResolutionFailed(e.to_string()))?;
            Ok(ResolvedPublicKey::EcP256 { sec1 })
        }
        ("EC", Some("secp256k1")) => {
            let sec1 = ES256KSigner::public_key_from_coordinates(
                &decode(&jwk.x, "x")?,
                &decode(&jwk.y, "y")?,
            )
            .map_err(|e| KeyResolutionError::ResolutionFailed(e.to_string()))?;
            Ok(ResolvedPublicKey::EcSecp256k1 { sec1 })
        }
        ("RSA", _) => {
            let spki_der = spki_from_components(&decode(&jwk.n, "n")?, &decode(&jwk.e, "e")?)
                .map_err(|e| KeyResolutionError::ResolutionFailed(e.to_string()))?;
            Ok(ResolvedPublicKey::Rsa { spki_der })
        }
        (kty, crv) => Err(KeyResolutionError::KeyTypeUnsupported(format!(
            "kty `{kty}`, crv `{crv:?}`"
        ))),
    }
}

/// Hex-encoded keys appear only for secp256k1 in the wild; anything that is
/// not a SEC1 point is rejected as ambiguous.
pub fn key_from_hex(hex_value: &str) -> Result<ResolvedPublicKey, KeyResolutionError> {
    let bytes = decode_hex(hex_value)?;

    match (bytes.len(), bytes.first()) {
        (65, Some(0x04)) | (33, Some(0x02 | 0x03)) => {
            Ok(ResolvedPublicKey::EcSecp256k1 { sec1: bytes })
        }
        _ => Err(KeyResolutionError::KeyTypeUnsupported(
            "publicKeyHex is not a SEC1 secp256k1 point".to_string(),
        )),
    }
}

pub fn key_from_pem(pem: &str) -> Result<ResolvedPublicKey, KeyResolutionError> {
    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();

    let der = Base64::decode_to_vec(body.trim(), None)
        .map_err(|e| KeyResolutionError::ResolutionFailed(format!("invalid PEM body: {e}")))?;

    key_from_spki_der(&der)
}

pub fn key_from_multibase(multibase: &str) -> Result<ResolvedPublicKey, KeyResolutionError> {
    let decoded = decode_multibase(multibase)?;

    if decoded.len() < 2 {
        return Err(KeyResolutionError::ResolutionFailed(
            "multibase value too short".to_string(),
        ));
    }

    let (prefix, key) = decoded.split_at(2);
    if prefix == MULTICODEC_ED25519.as_slice() {
        if key.len() != 32 {
            return Err(KeyResolutionError::KeyTypeUnsupported(
                "Ed25519 key must be exactly 32 bytes".to_string(),
            ));
        }
        Ok(ResolvedPublicKey::Ed25519 { raw: key.to_vec() })
    } else if prefix == MULTICODEC_SECP256K1.as_slice() {
        Ok(ResolvedPublicKey::EcSecp256k1 {
            sec1: key.to_vec(),
        })
    } else if prefix == MULTICODEC_P256.as_slice() {
        Ok(ResolvedPublicKey::EcP256 { sec1: key.to_vec() })
    } else {
        Err(KeyResolutionError::KeyTypeUnsupported(format!(
            "multicodec prefix {prefix:02x?}"
        )))
    }
}

/// Classifies a DER SubjectPublicKeyInfo by its algorithm identifier.
pub fn key_from_spki_der(der: &[u8]) -> Result<ResolvedPublicKey, KeyResolutionError> {
    use x509_parser::prelude::*;

    let (_, spki) = SubjectPublicKeyInfo::from_der(der)
        .map_err(|e| KeyResolutionError::ResolutionFailed(format!("invalid SPKI: {e}")))?;

    key_from_spki(&spki)
}

pub fn key_from_spki(
    spki: &x509_parser::x509::SubjectPublicKeyInfo,
) -> Result<ResolvedPublicKey, KeyResolutionError> {
    let algorithm = spki.algorithm.algorithm.to_id_string();
    let key_bytes = spki.subject_public_key.data.as_ref();

    match algorithm.as_str() {
        OID_RSA_ENCRYPTION => Ok(ResolvedPublicKey::Rsa {
            spki_der: spki.raw.to_vec(),
        }),
        OID_ED25519 => {
            if key_bytes.len() != 32 {
                return Err(KeyResolutionError::KeyTypeUnsupported(
                    "Ed25519 key must be exactly 32 bytes".to_string(),
                ));
            }
            Ok(ResolvedPublicKey::Ed25519 {
                raw: key_bytes.to_vec(),
            })
        }
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|parameters| parameters.as_oid().ok())
                .map(|oid| oid.to_id_string())
                .ok_or_else(|| {
                    KeyResolutionError::KeyTypeUnsupported("EC key without named curve".to_string())
                })?;

            match curve.as_str() {
                OID_CURVE_P256 => Ok(ResolvedPublicKey::EcP256 {
                    sec1: key_bytes.to_vec(),
                }),
                OID_CURVE_SECP256K1 => Ok(ResolvedPublicKey::EcSecp256k1 {
                    sec1: key_bytes.to_vec(),
                }),
                other => Err(KeyResolutionError::KeyTypeUnsupported(format!(
                    "EC curve `{other}`"
                ))),
            }
        }
        other => Err(KeyResolutionError::KeyTypeUnsupported(format!(
            "SPKI algorithm `{other}`"
        ))),
    }
}
