use k256::ecdsa::signature::{Signer as _, Verifier as _};
use secrecy::{ExposeSecret, SecretSlice};

use crate::{Signer, SignerError};

/// ECDSA over secp256k1. JWS `ES256K` signatures are the raw 64-byte
/// `R || S` concatenation; anything of a different length is rejected
/// before touching the curve implementation.
pub struct ES256KSigner {}

pub struct KeyPair {
    pub public: Vec<u8>,
    pub private: SecretSlice<u8>,
}

const SIGNATURE_LEN: usize = 64;

impl ES256KSigner {
    pub fn generate_key_pair() -> KeyPair {
        let signing_key = k256::ecdsa::SigningKey::random(&mut rand::thread_rng());

        KeyPair {
            public: signing_key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            private: signing_key.to_bytes().to_vec().into(),
        }
    }

    pub fn public_key_from_coordinates(x: &[u8], y: &[u8]) -> Result<Vec<u8>, SignerError> {
        if x.len() != 32 || y.len() != 32 {
            return Err(SignerError::CouldNotExtractPublicKey(
                "Invalid secp256k1 coordinate length".to_string(),
            ));
        }

        let mut point = Vec::with_capacity(65);
        point.push(0x04);
        point.extend_from_slice(x);
        point.extend_from_slice(y);

        let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
            .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;
        Ok(key.to_encoded_point(false).as_bytes().to_vec())
    }
}

impl Signer for ES256KSigner {
    fn sign(
        &self,
        input: &[u8],
        public_key: &[u8],
        private_key: &SecretSlice<u8>,
    ) -> Result<Vec<u8>, SignerError> {
        let signing_key = k256::ecdsa::SigningKey::from_slice(private_key.expose_secret())
            .map_err(|_| SignerError::CouldNotExtractKeyPair)?;

        if signing_key.verifying_key().to_encoded_point(false).as_bytes() != public_key {
            return Err(SignerError::CouldNotExtractKeyPair);
        }

        let signature: k256::ecdsa::Signature = signing_key.sign(input);
        Ok(signature.to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), SignerError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(SignerError::InvalidSignatureLength {
                expected: SIGNATURE_LEN,
                got: signature.len(),
            });
        }

        let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;

        let signature = k256::ecdsa::Signature::from_slice(signature)
            .map_err(|e| SignerError::CouldNotVerify(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);

        key.verify(input, &signature)
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key_pair = ES256KSigner::generate_key_pair();
        let signer = ES256KSigner {};

        let signature = signer
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();
        assert_eq!(signature.len(), 64);

        signer
            .verify(b"message", &signature, &key_pair.public)
            .unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_signature_length() {
        let key_pair = ES256KSigner::generate_key_pair();
        let signer = ES256KSigner {};

        assert_eq!(
            signer.verify(b"message", &[0u8; 70], &key_pair.public),
            Err(SignerError::InvalidSignatureLength {
                expected: 64,
                got: 70
            })
        );
    }
}
