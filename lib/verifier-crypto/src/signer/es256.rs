use p256::ecdsa::signature::{Signer as _, Verifier as _};
use secrecy::{ExposeSecret, SecretSlice};

use crate::{Signer, SignerError};

pub struct ES256Signer {}

pub struct KeyPair {
    pub public: Vec<u8>,
    pub private: SecretSlice<u8>,
}

impl ES256Signer {
    pub fn generate_key_pair() -> KeyPair {
        let signing_key = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());

        KeyPair {
            public: signing_key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            private: signing_key.to_bytes().to_vec().into(),
        }
    }

    /// Builds an uncompressed SEC1 point from raw JWK coordinates.
    pub fn public_key_from_coordinates(x: &[u8], y: &[u8]) -> Result<Vec<u8>, SignerError> {
        if x.len() != 32 || y.len() != 32 {
            return Err(SignerError::CouldNotExtractPublicKey(
                "Invalid P-256 coordinate length".to_string(),
            ));
        }

        let mut point = Vec::with_capacity(65);
        point.push(0x04);
        point.extend_from_slice(x);
        point.extend_from_slice(y);

        // round-trip through the curve implementation to reject off-curve points
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
            .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;
        Ok(key.to_encoded_point(false).as_bytes().to_vec())
    }
}

impl Signer for ES256Signer {
    fn sign(
        &self,
        input: &[u8],
        public_key: &[u8],
        private_key: &SecretSlice<u8>,
    ) -> Result<Vec<u8>, SignerError> {
        let signing_key = p256::ecdsa::SigningKey::from_slice(private_key.expose_secret())
            .map_err(|_| SignerError::CouldNotExtractKeyPair)?;

        if signing_key.verifying_key().to_encoded_point(false).as_bytes() != public_key {
            return Err(SignerError::CouldNotExtractKeyPair);
        }

        let signature: p256::ecdsa::Signature = signing_key.sign(input);
        Ok(signature.to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), SignerError> {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;

        let signature = p256::ecdsa::Signature::from_slice(signature)
            .map_err(|e| SignerError::CouldNotVerify(e.to_string()))?;

        key.verify(input, &signature)
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(())
    }
}
