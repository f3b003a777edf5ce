use secrecy::{ExposeSecret, SecretSlice};

use crate::{Signer, SignerError};

pub struct EDDSASigner {}

pub struct KeyPair {
    pub public: Vec<u8>,
    pub private: SecretSlice<u8>,
}

impl EDDSASigner {
    pub fn check_public_key(public_key: &[u8]) -> Result<Vec<u8>, SignerError> {
        let key = ed25519_compact::PublicKey::from_slice(public_key)
            .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;
        Ok(key.to_vec())
    }

    pub fn public_key_from_der(public_key_der: &[u8]) -> Result<Vec<u8>, SignerError> {
        let pk = ed25519_compact::PublicKey::from_der(public_key_der)
            .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))?;
        Ok(pk.to_vec())
    }

    pub fn generate_key_pair() -> KeyPair {
        let key_pair = ed25519_compact::KeyPair::generate();

        KeyPair {
            public: key_pair.pk.to_vec(),
            private: key_pair.sk.to_vec().into(),
        }
    }

    fn parse_public_key(public_key: &[u8]) -> Result<ed25519_compact::PublicKey, SignerError> {
        // raw 32 bytes or a DER SubjectPublicKeyInfo
        if public_key.len() == ed25519_compact::PublicKey::BYTES {
            ed25519_compact::PublicKey::from_slice(public_key)
        } else {
            ed25519_compact::PublicKey::from_der(public_key)
        }
        .map_err(|e| SignerError::CouldNotExtractPublicKey(e.to_string()))
    }
}

impl Signer for EDDSASigner {
    fn sign(
        &self,
        input: &[u8],
        public_key: &[u8],
        private_key: &SecretSlice<u8>,
    ) -> Result<Vec<u8>, SignerError> {
        let secret_key = ed25519_compact::SecretKey::from_slice(private_key.expose_secret())
            .map_err(|_| SignerError::CouldNotExtractKeyPair)?;

        if secret_key.public_key().as_slice() != public_key {
            return Err(SignerError::CouldNotExtractKeyPair);
        }

        Ok(secret_key.sign(input, None).to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), SignerError> {
        let public_key = Self::parse_public_key(public_key)?;

        let signature = ed25519_compact::Signature::from_slice(signature)
            .map_err(|e| SignerError::CouldNotVerify(e.to_string()))?;

        public_key
            .verify(input, &signature)
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key_pair = EDDSASigner::generate_key_pair();
        let signer = EDDSASigner {};

        let signature = signer
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();

        signer
            .verify(b"message", &signature, &key_pair.public)
            .unwrap();
    }

    #[test]
    fn test_verify_fails_on_tampered_input() {
        let key_pair = EDDSASigner::generate_key_pair();
        let signer = EDDSASigner {};

        let signature = signer
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();

        assert_eq!(
            signer.verify(b"massage", &signature, &key_pair.public),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_verify_accepts_der_public_key() {
        let key_pair = EDDSASigner::generate_key_pair();
        let signer = EDDSASigner {};

        let signature = signer
            .sign(b"message", &key_pair.public, &key_pair.private)
            .unwrap();

        let mut spki = hex::decode("302a300506032b6570032100").unwrap();
        spki.extend_from_slice(&key_pair.public);

        signer.verify(b"message", &signature, &spki).unwrap();
    }
}
