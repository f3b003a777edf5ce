//! Compact-JWT decomposition. Only parsing and signing-input reconstruction
//! live here; signature checking is done by the caller against the
//! signature-verifier registry.

use serde::Deserialize;
use thiserror::Error;

use super::encoding::{decode_base64url, EncodingError};

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum JwtError {
    #[error("Malformed token: `{0}`")]
    MalformedToken(String),
    #[error("Encoding error: `{0}`")]
    Encoding(#[from] EncodingError),
    #[error("Invalid JSON segment: `{0}`")]
    InvalidJson(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct JwtHeader {
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

#[derive(Debug)]
pub struct DecomposedJwt {
    pub header: JwtHeader,
    pub payload: serde_json::Value,
    pub signature: Vec<u8>,
    /// `<b64url header>.<b64url payload>` exactly as received; its ASCII
    /// bytes are the JWS signing input.
    pub signed_part: String,
}

pub fn decompose(token: &str) -> Result<DecomposedJwt, JwtError> {
    let mut parts = token.splitn(3, '.');

    let (Some(header), Some(payload), Some(signature)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    if signature.contains('.') {
        return Err(JwtError::MalformedToken(
            "too many token segments".to_string(),
        ));
    }

    let header_decoded = decode_base64url(header)?;
    let header: JwtHeader = serde_json::from_slice(&header_decoded)
        .map_err(|e| JwtError::InvalidJson(e.to_string()))?;

    let payload_decoded = decode_base64url(payload)?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_decoded)
        .map_err(|e| JwtError::InvalidJson(e.to_string()))?;

    let signed_part_len = token.len() - signature.len() - 1;
    let signed_part = token[..signed_part_len].to_string();

    Ok(DecomposedJwt {
        header,
        payload,
        signature: decode_base64url(signature)?,
        signed_part,
    })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::util::encoding::encode_base64url;

    fn build_token(header: &serde_json::Value, payload: &serde_json::Value) -> String {
        format!(
            "{}.{}.{}",
            encode_base64url(header.to_string()).unwrap(),
            encode_base64url(payload.to_string()).unwrap(),
            encode_base64url(b"signature").unwrap(),
        )
    }

    #[test]
    fn test_decompose_round_trip() {
        let token = build_token(
            &json!({"alg": "ES256", "typ": "vc+sd-jwt", "kid": "did:jwk:abc#0"}),
            &json!({"iss": "did:web:issuer.example.com", "vct": "https://example.com/identity"}),
        );

        let decomposed = decompose(&token).unwrap();
        assert_eq!(decomposed.header.alg.as_deref(), Some("ES256"));
        assert_eq!(decomposed.header.typ.as_deref(), Some("vc+sd-jwt"));
        assert_eq!(
            decomposed.payload["iss"].as_str(),
            Some("did:web:issuer.example.com")
        );
        assert_eq!(decomposed.signature, b"signature");
        assert_eq!(
            decomposed.signed_part,
            token.rsplit_once('.').unwrap().0.to_string()
        );
    }

    #[test]
    fn test_decompose_rejects_two_segments() {
        assert!(matches!(
            decompose("part1.part2"),
            Err(JwtError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_decompose_rejects_four_segments() {
        assert!(matches!(
            decompose("a.b.c.d"),
            Err(JwtError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_decompose_rejects_invalid_header_json() {
        let token = format!(
            "{}.{}.{}",
            encode_base64url("not-json").unwrap(),
            encode_base64url("{}").unwrap(),
            encode_base64url(b"sig").unwrap(),
        );
        assert!(matches!(decompose(&token), Err(JwtError::InvalidJson(_))));
    }
}
