use std::sync::Arc;

use verifier_crypto::signer::eddsa::EDDSASigner;
use verifier_crypto::signer::es256k::ES256KSigner;
use verifier_crypto::{CryptoProviderImpl, Signer};

use super::*;

fn provider() -> SignatureVerifierProvider {
    SignatureVerifierProvider::new(Arc::new(CryptoProviderImpl::default()))
}

#[test]
fn test_eddsa_verification() {
    let key_pair = EDDSASigner::generate_key_pair();
    let signature = EDDSASigner {}
        .sign(b"input", &key_pair.public, &key_pair.private)
        .unwrap();

    let key = ResolvedPublicKey::Ed25519 {
        raw: key_pair.public.clone(),
    };

    provider()
        .verify_jose("EdDSA", b"input", &signature, &key)
        .unwrap();

    assert!(matches!(
        provider().verify_jose("EdDSA", b"other", &signature, &key),
        Err(SignatureError::Signer(SignerError::InvalidSignature))
    ));
}

#[test]
fn test_es256k_signature_must_be_64_bytes() {
    let key_pair = ES256KSigner::generate_key_pair();
    let key = ResolvedPublicKey::EcSecp256k1 {
        sec1: key_pair.public,
    };

    let result = provider().verify_jose("ES256K", b"input", &[0u8; 65], &key);
    assert!(matches!(
        result,
        Err(SignatureError::Signer(
            SignerError::InvalidSignatureLength { .. }
        ))
    ));
}

#[test]
fn test_unknown_algorithm_is_rejected() {
    let key = ResolvedPublicKey::Ed25519 { raw: vec![0u8; 32] };

    assert!(matches!(
        provider().verify_jose("HS256", b"input", &[0u8; 32], &key),
        Err(SignatureError::AlgorithmNotSupported(_))
    ));
    assert!(matches!(
        provider().verify_jose("none", b"input", &[], &key),
        Err(SignatureError::AlgorithmNotSupported(_))
    ));
}

#[test]
fn test_key_algorithm_mismatch() {
    let key = ResolvedPublicKey::Ed25519 { raw: vec![0u8; 32] };

    assert!(matches!(
        provider().verify_jose("RS256", b"input", &[0u8; 256], &key),
        Err(SignatureError::KeyAlgorithmMismatch(_))
    ));
}

#[test]
fn test_registry_delegates_to_the_registered_signer() {
    use std::collections::HashMap;

    use verifier_crypto::{CryptoProviderImpl, MockSigner};

    let mut signer = MockSigner::default();
    signer
        .expect_verify()
        .withf(|input, signature, public_key| {
            input == b"input".as_slice()
                && signature == b"signature".as_slice()
                && public_key == [7u8; 32].as_slice()
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let crypto = CryptoProviderImpl::new(
        HashMap::new(),
        HashMap::from_iter([(
            "Ed25519".to_string(),
            Arc::new(signer) as Arc<dyn verifier_crypto::Signer>,
        )]),
    );

    let provider = SignatureVerifierProvider::new(Arc::new(crypto));
    let key = ResolvedPublicKey::Ed25519 { raw: vec![7u8; 32] };

    provider
        .verify_jose("EdDSA", b"input", b"signature", &key)
        .unwrap();
}

#[test]
fn test_cose_alg_mapping() {
    assert_eq!(jose_name_from_cose(-7), Some("ES256"));
    assert_eq!(jose_name_from_cose(-8), Some("EdDSA"));
    assert_eq!(jose_name_from_cose(-37), Some("PS256"));
    assert_eq!(jose_name_from_cose(-47), Some("ES256K"));
    assert_eq!(jose_name_from_cose(-257), Some("RS256"));
    assert_eq!(jose_name_from_cose(0), None);
}

#[test]
fn test_cose_verification_dispatch() {
    let key_pair = EDDSASigner::generate_key_pair();
    let signature = EDDSASigner {}
        .sign(b"to-be-signed", &key_pair.public, &key_pair.private)
        .unwrap();

    let key = ResolvedPublicKey::Ed25519 {
        raw: key_pair.public,
    };

    provider()
        .verify_cose(-8, b"to-be-signed", &signature, &key)
        .unwrap();

    assert!(matches!(
        provider().verify_cose(-1000, b"to-be-signed", &signature, &key),
        Err(SignatureError::AlgorithmNotSupported(_))
    ));
}
