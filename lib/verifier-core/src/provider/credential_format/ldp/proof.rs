//! Signing-input reconstruction for Linked-Data proofs.
//!
//! The credential splits into the *document* (everything except `proof`) and
//! the *proof document* (the proof with its signature value stripped and the
//! credential `@context` inherited). Both are independently canonicalized
//! and SHA-256 hashed; the 64-byte canonical hash is
//! `hash(canonical-proof) || hash(canonical-document)`.

use verifier_crypto::Hasher;

use super::super::CredentialFormatError;
use crate::util::encoding::{decode_base64url, encode_base64url};
use crate::util::jsonld_context::ContextCache;
use crate::util::rdf_canonization::{json_ld_processor_options, rdf_canonize};

pub const PROOF_FIELD: &str = "proof";

// stripped from the proof document before canonicalization
const SIGNATURE_VALUE_FIELDS: [&str; 2] = ["jws", "proofValue"];

pub async fn canonical_hash(
    credential: &serde_json::Map<String, serde_json::Value>,
    proof: &serde_json::Map<String, serde_json::Value>,
    context_cache: &ContextCache,
    hasher: &dyn Hasher,
) -> Result<Vec<u8>, CredentialFormatError> {
    let mut document = credential.clone();
    document.remove(PROOF_FIELD);

    let mut proof_document = proof.clone();
    for field in SIGNATURE_VALUE_FIELDS {
        proof_document.remove(field);
    }
    if !proof_document.contains_key("@context") {
        if let Some(context) = credential.get("@context") {
            proof_document.insert("@context".to_string(), context.clone());
        }
    }

    let canonical_document =
        rdf_canonize(&document, context_cache, json_ld_processor_options()).await?;
    let canonical_proof =
        rdf_canonize(&proof_document, context_cache, json_ld_processor_options()).await?;

    let mut hash = hasher
        .hash(canonical_proof.as_bytes())
        .map_err(|e| CredentialFormatError::Malformed(e.to_string()))?;
    hash.extend(
        hasher
            .hash(canonical_document.as_bytes())
            .map_err(|e| CredentialFormatError::Malformed(e.to_string()))?,
    );

    Ok(hash)
}

pub struct DetachedJws {
    pub algorithm: String,
    pub header: serde_json::Value,
    pub signature: Vec<u8>,
}

/// Parses a detached compact JWS (`<header>..<signature>`, no payload
/// segment).
pub fn parse_detached_jws(jws: &str) -> Result<DetachedJws, CredentialFormatError> {
    let segments: Vec<&str> = jws.split('.').collect();

    let [header, payload, signature] = segments.as_slice() else {
        return Err(CredentialFormatError::InvalidField {
            field: "proof.jws".to_string(),
            reason: "expected three dot-separated segments".to_string(),
        });
    };

    if !payload.is_empty() {
        return Err(CredentialFormatError::InvalidField {
            field: "proof.jws".to_string(),
            reason: "detached JWS must not carry a payload segment".to_string(),
        });
    }

    let header: serde_json::Value = serde_json::from_slice(&decode_base64url(header)?)?;

    let algorithm = header
        .get("alg")
        .and_then(|alg| alg.as_str())
        .ok_or_else(|| CredentialFormatError::MissingField("proof.jws header alg".to_string()))?
        .to_string();

    Ok(DetachedJws {
        algorithm,
        header,
        signature: decode_base64url(signature)?,
    })
}

/// `base64url(protected header) || '.' || canonical-hash`. The header is
/// re-encoded from the parsed object, the received header string is never
/// reused, so trailing smuggled bytes cannot survive the round trip.
pub fn jws_signing_input(
    header: &serde_json::Value,
    canonical_hash: &[u8],
) -> Result<Vec<u8>, CredentialFormatError> {
    let header_json = serde_json::to_string(header)?;
    let header_b64 = encode_base64url(header_json)?;

    let mut input = Vec::with_capacity(header_b64.len() + 1 + canonical_hash.len());
    input.extend_from_slice(header_b64.as_bytes());
    input.push(b'.');
    input.extend_from_slice(canonical_hash);

    Ok(input)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_detached_jws() {
        let header = encode_base64url(json!({"alg": "PS256", "b64": false}).to_string()).unwrap();
        let signature = encode_base64url([1u8, 2, 3]).unwrap();
        let jws = format!("{header}..{signature}");

        let parsed = parse_detached_jws(&jws).unwrap();
        assert_eq!(parsed.algorithm, "PS256");
        assert_eq!(parsed.signature, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_detached_jws_rejects_attached_payload() {
        let header = encode_base64url(json!({"alg": "PS256"}).to_string()).unwrap();
        let jws = format!("{header}.cGF5bG9hZA.c2ln");

        assert!(matches!(
            parse_detached_jws(&jws),
            Err(CredentialFormatError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_parse_detached_jws_requires_alg() {
        let header = encode_base64url(json!({"b64": false}).to_string()).unwrap();
        let jws = format!("{header}..c2ln");

        assert!(matches!(
            parse_detached_jws(&jws),
            Err(CredentialFormatError::MissingField(_))
        ));
    }

    #[test]
    fn test_signing_input_layout() {
        let header = json!({"alg": "PS256", "b64": false, "crit": ["b64"]});
        let hash = [0xAAu8; 64];

        let input = jws_signing_input(&header, &hash).unwrap();

        let dot = input.iter().position(|b| *b == b'.').unwrap();
        let header_part = std::str::from_utf8(&input[..dot]).unwrap();
        assert_eq!(
            decode_base64url(header_part).unwrap(),
            header.to_string().into_bytes()
        );
        assert_eq!(&input[dot + 1..], hash);
    }

    #[test]
    fn test_signing_input_is_rebuilt_from_parsed_header() {
        // smuggled whitespace in the received header segment does not
        // survive re-encoding
        let received = encode_base64url("{\"alg\": \"PS256\"}").unwrap();
        let jws = format!("{received}..c2ln");
        let parsed = parse_detached_jws(&jws).unwrap();

        let input = jws_signing_input(&parsed.header, &[0u8; 64]).unwrap();
        let dot = input.iter().position(|b| *b == b'.').unwrap();
        let reencoded = std::str::from_utf8(&input[..dot]).unwrap();

        assert_ne!(reencoded, received);
        assert_eq!(
            decode_base64url(reencoded).unwrap(),
            b"{\"alg\":\"PS256\"}".to_vec()
        );
    }
}
