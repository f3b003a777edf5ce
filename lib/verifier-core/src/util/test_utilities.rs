//! Shared fixtures for unit tests: an Ed25519 did:key issuer and a
//! data-integrity signing helper matching the verification pipeline.

use std::sync::Arc;

use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use verifier_crypto::signer::eddsa::{EDDSASigner, KeyPair};
use verifier_crypto::{CryptoProvider, CryptoProviderImpl, Signer};

use crate::provider::caching_loader::CachingLoader;
use crate::provider::credential_format::ldp::proof::canonical_hash;
use crate::provider::http_client::reqwest_client::ReqwestClient;
use crate::provider::key_resolver::common::MULTICODEC_ED25519;
use crate::util::jsonld_context::ContextCache;

pub struct TestIssuer {
    pub key_pair: KeyPair,
    pub did: String,
}

pub fn eddsa_issuer() -> TestIssuer {
    let key_pair = EDDSASigner::generate_key_pair();
    let did = did_key_from_public(&key_pair.public);

    TestIssuer { key_pair, did }
}

pub fn did_key_from_public(public_key: &[u8]) -> String {
    let payload = [&MULTICODEC_ED25519[..], public_key].concat();
    format!("did:key:z{}", bs58::encode(payload).into_string())
}

pub fn timestamp(offset: Duration) -> String {
    (OffsetDateTime::now_utc() + offset)
        .replace_millisecond(0)
        .unwrap()
        .format(&Rfc3339)
        .unwrap()
}

pub fn offline_context_cache() -> ContextCache {
    ContextCache::new(
        CachingLoader::default(),
        Arc::new(ReqwestClient::default()),
    )
}

/// Attaches an `eddsa-rdfc-2022` data-integrity proof signed by `issuer`.
pub async fn sign_data_integrity(
    document: &mut serde_json::Value,
    issuer: &TestIssuer,
    proof_purpose: &str,
) {
    let mut proof = json!({
        "type": "DataIntegrityProof",
        "cryptosuite": "eddsa-rdfc-2022",
        "created": timestamp(Duration::hours(-1)),
        "proofPurpose": proof_purpose,
        "verificationMethod": issuer.did,
    });

    let hasher = CryptoProviderImpl::default().get_hasher("sha-256").unwrap();
    let hash = canonical_hash(
        document.as_object().unwrap(),
        proof.as_object().unwrap(),
        &offline_context_cache(),
        &*hasher,
    )
    .await
    .unwrap();

    let signature = EDDSASigner {}
        .sign(&hash, &issuer.key_pair.public, &issuer.key_pair.private)
        .unwrap();

    proof.as_object_mut().unwrap().insert(
        "proofValue".to_string(),
        json!(format!("z{}", bs58::encode(signature).into_string())),
    );
    document
        .as_object_mut()
        .unwrap()
        .insert("proof".to_string(), proof);
}

pub fn unsigned_v2_credential(issuer: &str) -> serde_json::Value {
    json!({
        "@context": ["https://www.w3.org/ns/credentials/v2"],
        "type": ["VerifiableCredential"],
        "issuer": issuer,
        "validFrom": timestamp(Duration::hours(-1)),
        "credentialSubject": {
            "id": "did:example:holder",
            "name": "Example Holder"
        }
    })
}
