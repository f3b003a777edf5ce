use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum EncodingError {
    #[error("Invalid base64url: `{0}`")]
    InvalidBase64(String),
    #[error("Invalid multibase value: `{0}`")]
    InvalidMultibase(String),
    #[error("Invalid hex: `{0}`")]
    InvalidHex(String),
}

pub fn decode_base64url(input: &str) -> Result<Vec<u8>, EncodingError> {
    Base64UrlSafeNoPadding::decode_to_vec(input, None)
        .map_err(|e| EncodingError::InvalidBase64(e.to_string()))
}

pub fn encode_base64url(input: impl AsRef<[u8]>) -> Result<String, EncodingError> {
    Base64UrlSafeNoPadding::encode_to_string(input)
        .map_err(|e| EncodingError::InvalidBase64(e.to_string()))
}

pub fn decode_hex(input: &str) -> Result<Vec<u8>, EncodingError> {
    hex::decode(input).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

/// Decodes a multibase string; `z` (base58btc) and `u` (base64url) prefixes
/// are the ones appearing in proof values and encoded status lists.
pub fn decode_multibase(input: &str) -> Result<Vec<u8>, EncodingError> {
    let mut chars = input.chars();
    match chars.next() {
        Some('z') => bs58::decode(chars.as_str())
            .into_vec()
            .map_err(|e| EncodingError::InvalidMultibase(e.to_string())),
        Some('u') => decode_base64url(chars.as_str()),
        Some(prefix) => Err(EncodingError::InvalidMultibase(format!(
            "unsupported multibase prefix `{prefix}`"
        ))),
        None => Err(EncodingError::InvalidMultibase("empty value".to_string())),
    }
}
