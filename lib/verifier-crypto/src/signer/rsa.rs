use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer as _, Verifier as _};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;

use crate::{Signer, SignerError};

/// RSASSA-PKCS1-v1_5 with SHA-256 (JOSE `RS256`).
pub struct RS256Signer {}

/// RSASSA-PSS with SHA-256, MGF1-SHA-256 and a 32-byte salt (JOSE `PS256`).
pub struct PS256Signer {}

pub struct KeyPair {
    pub public: Vec<u8>,
    pub private: SecretSlice<u8>,
}

/// Test-support key generation; 2048-bit modulus.
pub fn generate_key_pair() -> Result<KeyPair, SignerError> {
    use rsa::pkcs8::EncodePrivateKey;

    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)
        .map_err(|e| SignerError::CouldNotSign(e.to_string()))?;

    let public = RsaPublicKey::from(&private)
        .to_public_key_der()
        .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?
        .as_bytes()
        .to_vec();
    let private = private
        .to_pkcs8_der()
        .map_err(|_| SignerError::CouldNotExtractKeyPair)?
        .as_bytes()
        .to_vec();

    Ok(KeyPair {
        public,
        private: private.into(),
    })
}

/// Encodes raw JWK `n`/`e` components as a SubjectPublicKeyInfo document.
pub fn spki_from_components(modulus: &[u8], exponent: &[u8]) -> Result<Vec<u8>, SignerError> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from_bytes_be(exponent),
    )
    .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;

    Ok(key
        .to_public_key_der()
        .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?
        .as_bytes()
        .to_vec())
}

fn parse_public_key(public_key: &[u8]) -> Result<RsaPublicKey, SignerError> {
    // SubjectPublicKeyInfo, with a PKCS#1 fallback
    RsaPublicKey::from_public_key_der(public_key)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(public_key))
        .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))
}

fn parse_private_key(
    private_key: &SecretSlice<u8>,
    public_key: &[u8],
) -> Result<RsaPrivateKey, SignerError> {
    let key = RsaPrivateKey::from_pkcs8_der(private_key.expose_secret())
        .map_err(|_| SignerError::CouldNotExtractKeyPair)?;

    if RsaPublicKey::from(&key) != parse_public_key(public_key)? {
        return Err(SignerError::CouldNotExtractKeyPair);
    }

    Ok(key)
}

impl Signer for RS256Signer {
    fn sign(
        &self,
        input: &[u8],
        public_key: &[u8],
        private_key: &SecretSlice<u8>,
    ) -> Result<Vec<u8>, SignerError> {
        let key = parse_private_key(private_key, public_key)?;
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key);
        Ok(signing_key.sign(input).to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), SignerError> {
        let key = parse_public_key(public_key)?;
        let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key);

        let signature = rsa::pkcs1v15::Signature::try_from(signature)
            .map_err(|e| SignerError::CouldNotVerify(e.to_string()))?;

        verifying_key
            .verify(input, &signature)
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(())
    }
}

impl Signer for PS256Signer {
    fn sign(
        &self,
        input: &[u8],
        public_key: &[u8],
        private_key: &SecretSlice<u8>,
    ) -> Result<Vec<u8>, SignerError> {
        let key = parse_private_key(private_key, public_key)?;
        let signing_key = rsa::pss::BlindedSigningKey::<Sha256>::new(key);
        Ok(signing_key
            .sign_with_rng(&mut rand::thread_rng(), input)
            .to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), SignerError> {
        let key = parse_public_key(public_key)?;
        let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new(key);

        let signature = rsa::pss::Signature::try_from(signature)
            .map_err(|e| SignerError::CouldNotVerify(e.to_string()))?;

        verifying_key
            .verify(input, &signature)
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rsa::traits::PublicKeyParts;

    use super::*;

    #[test]
    fn test_rs256_sign_and_verify() {
        let key_pair = generate_key_pair().unwrap();
        let signer = RS256Signer {};

        let signature = signer
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();

        signer
            .verify(b"message", &signature, &key_pair.public)
            .unwrap();

        assert_eq!(
            signer.verify(b"tampered", &signature, &key_pair.public),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_ps256_sign_and_verify() {
        let key_pair = generate_key_pair().unwrap();
        let signer = PS256Signer {};

        let signature = signer
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();

        signer
            .verify(b"message", &signature, &key_pair.public)
            .unwrap();
    }

    #[test]
    fn test_ps256_signature_is_not_valid_rs256() {
        let key_pair = generate_key_pair().unwrap();

        let signature = PS256Signer {}
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();

        assert_eq!(
            RS256Signer {}.verify(b"message", &signature, &key_pair.public),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_spki_from_components_round_trip() {
        let key_pair = generate_key_pair().unwrap();
        let key = parse_public_key(&key_pair.public).unwrap();

        let rebuilt = spki_from_components(
            &key.n().to_bytes_be(),
            &key.e().to_bytes_be(),
        )
        .unwrap();

        assert_eq!(rebuilt, key_pair.public);
    }
}
