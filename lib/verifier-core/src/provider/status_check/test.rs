use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use time::Duration;
use verifier_crypto::CryptoProviderImpl;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::provider::credential_format::ldp::{LdpFormat, Params};
use crate::provider::http_client::reqwest_client::ReqwestClient;
use crate::provider::key_resolver::key::KeyDidResolver;
use crate::provider::key_resolver::{KeyResolver, KeyResolverProvider};
use crate::provider::signature::SignatureVerifierProvider;
use crate::util::encoding::encode_base64url;
use crate::util::jsonld_context::ContextCache;
use crate::util::test_utilities::{eddsa_issuer, sign_data_integrity, timestamp, TestIssuer};

fn ldp_verifier() -> Arc<LdpFormat> {
    let crypto = Arc::new(CryptoProviderImpl::default());
    let client = Arc::new(ReqwestClient::default());
    let resolvers: HashMap<String, Arc<dyn KeyResolver>> =
        HashMap::from_iter([("key".to_string(), Arc::new(KeyDidResolver {}) as _)]);

    Arc::new(LdpFormat::new(
        crypto.clone(),
        ContextCache::new(CachingLoader::default(), client),
        Arc::new(KeyResolverProvider::new(resolvers, None)),
        Arc::new(SignatureVerifierProvider::new(crypto)),
        Params::default(),
    ))
}

fn bitstring_checker(ldp: Arc<LdpFormat>) -> StatusCheck {
    StatusCheck::new(Arc::new(BitstringStatusCheck::new(
        Arc::new(ReqwestClient::default()),
        CachingLoader::default(),
        ldp,
    )))
}

fn encode_list(bits: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bits).unwrap();
    format!("u{}", encode_base64url(encoder.finish().unwrap()).unwrap())
}

/// Builds and signs a Bitstring Status List credential.
async fn signed_status_list(
    issuer: &TestIssuer,
    list_url: &str,
    mut subject_extras: serde_json::Map<String, serde_json::Value>,
    encoded_list: &str,
) -> String {
    let mut subject = serde_json::Map::from_iter([
        ("id".to_string(), json!(format!("{list_url}#list"))),
        ("type".to_string(), json!("BitstringStatusList")),
        ("statusPurpose".to_string(), json!("revocation")),
        ("encodedList".to_string(), json!(encoded_list)),
    ]);
    subject.append(&mut subject_extras);

    let mut credential = json!({
        "@context": ["https://www.w3.org/ns/credentials/v2"],
        "id": list_url,
        "type": ["VerifiableCredential", "BitstringStatusListCredential"],
        "issuer": issuer.did,
        "validFrom": timestamp(Duration::hours(-1)),
        "credentialSubject": subject,
    });

    sign_data_integrity(&mut credential, issuer, "assertionMethod").await;

    credential.to_string()
}

async fn serve_status_list(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/status/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/json"),
        )
        .mount(server)
        .await;
}

fn credential_with_entry(list_url: &str, index: usize) -> serde_json::Value {
    json!({
        "credentialStatus": {
            "type": "BitstringStatusListEntry",
            "statusPurpose": "revocation",
            "statusListCredential": list_url,
            "statusListIndex": index.to_string(),
        }
    })
}

#[tokio::test]
async fn test_bitstring_valid_and_revoked_entries() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    // index 0 clear, index 1 set
    let body = signed_status_list(
        &issuer,
        &list_url,
        serde_json::Map::new(),
        &encode_list(&[0b0100_0000]),
    )
    .await;
    serve_status_list(&server, body).await;

    let checker = bitstring_checker(ldp_verifier());

    let results = checker
        .check(&credential_with_entry(&list_url, 0), None)
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].purpose, "revocation");
    assert!(results[0].valid);
    assert!(results[0].error.is_none());

    let results = checker
        .check(&credential_with_entry(&list_url, 1), None)
        .await;
    assert!(!results[0].valid);
    assert!(results[0].error.is_none());
}

#[tokio::test]
async fn test_purpose_filter_skips_non_matching_entries() {
    let checker = bitstring_checker(ldp_verifier());

    let results = checker
        .check(
            &credential_with_entry("https://status.example/status/1", 0),
            Some(&["suspension".to_string()]),
        )
        .await;

    // entries exist but none match: distinct from "no credentialStatus"
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_missing_credential_status_is_reported() {
    let checker = bitstring_checker(ldp_verifier());

    let results = checker.check(&json!({"id": "urn:uuid:123"}), None).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].valid);
    assert_eq!(
        results[0].error.as_ref().unwrap().code,
        ErrorCode::MissingRequiredField
    );
}

#[tokio::test]
async fn test_out_of_range_index() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    let body = signed_status_list(
        &issuer,
        &list_url,
        serde_json::Map::new(),
        &encode_list(&[0u8; 4]),
    )
    .await;
    serve_status_list(&server, body).await;

    let checker = bitstring_checker(ldp_verifier());
    let results = checker
        .check(&credential_with_entry(&list_url, 4096), None)
        .await;

    assert!(!results[0].valid);
    assert_eq!(results[0].error.as_ref().unwrap().code, ErrorCode::RangeError);
}

#[tokio::test]
async fn test_one_entry_failure_does_not_abort_siblings() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    let body = signed_status_list(
        &issuer,
        &list_url,
        serde_json::Map::new(),
        &encode_list(&[0u8]),
    )
    .await;
    serve_status_list(&server, body).await;

    let credential = json!({
        "credentialStatus": [
            {
                "type": "SomethingElse",
                "statusPurpose": "revocation",
                "statusListCredential": list_url,
                "statusListIndex": "0",
            },
            {
                "type": "BitstringStatusListEntry",
                "statusPurpose": "revocation",
                "statusListCredential": list_url,
                "statusListIndex": "0",
            },
        ]
    });

    let checker = bitstring_checker(ldp_verifier());
    let results = checker.check(&credential, None).await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].valid);
    assert_eq!(
        results[0].error.as_ref().unwrap().code,
        ErrorCode::InvalidFieldValue
    );
    assert!(results[1].valid);
}

#[tokio::test]
async fn test_purpose_mismatch_with_status_list() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    // list declares "revocation" but the entry asks for "suspension"
    let body = signed_status_list(
        &issuer,
        &list_url,
        serde_json::Map::new(),
        &encode_list(&[0u8]),
    )
    .await;
    serve_status_list(&server, body).await;

    let credential = json!({
        "credentialStatus": {
            "type": "BitstringStatusListEntry",
            "statusPurpose": "suspension",
            "statusListCredential": list_url,
            "statusListIndex": "0",
        }
    });

    let checker = bitstring_checker(ldp_verifier());
    let results = checker.check(&credential, None).await;

    assert!(!results[0].valid);
    assert_eq!(
        results[0].error.as_ref().unwrap().code,
        ErrorCode::StatusVerificationFailed
    );
}

#[tokio::test]
async fn test_tampered_status_list_fails_verification() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    let body = signed_status_list(
        &issuer,
        &list_url,
        serde_json::Map::new(),
        &encode_list(&[0u8]),
    )
    .await;
    let tampered = body.replace(
        &encode_list(&[0u8]),
        &encode_list(&[0b1000_0000]),
    );
    assert_ne!(body, tampered);
    serve_status_list(&server, tampered).await;

    let checker = bitstring_checker(ldp_verifier());
    let results = checker
        .check(&credential_with_entry(&list_url, 0), None)
        .await;

    assert!(!results[0].valid);
    assert_eq!(
        results[0].error.as_ref().unwrap().code,
        ErrorCode::StatusVerificationFailed
    );
}

#[tokio::test]
async fn test_multi_bit_status_with_message_map() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    // two-bit entries: index 1 carries value 0b01
    let extras = serde_json::Map::from_iter([
        ("statusSize".to_string(), json!(2)),
        (
            "statusMessage".to_string(),
            json!([
                {"status": "0x0", "message": "valid"},
                {"status": "0x1", "message": "revoked"},
                {"status": "0x2", "message": "suspended"},
                {"status": "0x3", "message": "unknown"},
            ]),
        ),
    ]);
    let body = signed_status_list(&issuer, &list_url, extras, &encode_list(&[0b0001_0000])).await;
    serve_status_list(&server, body).await;

    let checker = bitstring_checker(ldp_verifier());

    let results = checker
        .check(&credential_with_entry(&list_url, 0), None)
        .await;
    assert!(results[0].valid);

    let results = checker
        .check(&credential_with_entry(&list_url, 1), None)
        .await;
    assert!(!results[0].valid);
    assert!(results[0].error.is_none());
}

#[tokio::test]
async fn test_multi_bit_status_requires_complete_message_map() {
    let server = MockServer::start().await;
    let list_url = format!("{}/status/1", server.uri());

    let issuer = eddsa_issuer();
    let extras = serde_json::Map::from_iter([
        ("statusSize".to_string(), json!(2)),
        (
            "statusMessage".to_string(),
            json!([{"status": "0x0", "message": "valid"}]),
        ),
    ]);
    let body = signed_status_list(&issuer, &list_url, extras, &encode_list(&[0u8])).await;
    serve_status_list(&server, body).await;

    let checker = bitstring_checker(ldp_verifier());
    let results = checker
        .check(&credential_with_entry(&list_url, 0), None)
        .await;

    assert!(!results[0].valid);
    assert_eq!(
        results[0].error.as_ref().unwrap().code,
        ErrorCode::InvalidFieldValue
    );
}

#[tokio::test]
async fn test_query_param_strategy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .and(query_param("statusPurpose", "revocation"))
        .and(query_param("statusListIndex", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "revoked"})))
        .mount(&server)
        .await;

    let checker = StatusCheck::new(Arc::new(QueryParamStatusCheck::new(Arc::new(
        ReqwestClient::default(),
    ))));

    let credential = json!({
        "credentialStatus": {
            "type": "BitstringStatusListEntry",
            "statusPurpose": "revocation",
            "statusListCredential": format!("{}/status", server.uri()),
            "statusListIndex": 42,
        }
    });

    let results = checker.check(&credential, None).await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].valid);
    assert!(results[0].error.is_none());
}

#[tokio::test]
async fn test_network_failure_is_isolated_per_entry() {
    let checker = bitstring_checker(ldp_verifier());

    // nothing listens on this port
    let credential = json!({
        "credentialStatus": {
            "type": "BitstringStatusListEntry",
            "statusPurpose": "revocation",
            "statusListCredential": "https://127.0.0.1:9/status/1",
            "statusListIndex": "0",
        }
    });

    let results = checker.check(&credential, None).await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].valid);
    assert!(results[0].error.is_some());
}
