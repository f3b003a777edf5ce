//! Cryptographic primitives for credential verification: hashing and
//! signature checking behind trait objects, so callers can be wired with
//! mocks in tests.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretSlice;
use thiserror::Error;

pub mod hasher;
pub mod signer;

pub use hasher::Hasher;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum SignerError {
    #[error("Could not extract key pair")]
    CouldNotExtractKeyPair,
    #[error("Could not extract public key: `{0}`")]
    CouldNotExtractPublicKey(String),
    #[error("Could not verify: `{0}`")]
    CouldNotVerify(String),
    #[error("Could not sign: `{0}`")]
    CouldNotSign(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid signature length: expected `{expected}`, got `{got}`")]
    InvalidSignatureLength { expected: usize, got: usize },
    #[error("Missing algorithm: `{0}`")]
    MissingAlgorithm(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum HasherError {
    #[error("Could not hash: `{0}`")]
    CouldNotHash(String),
    #[error("Missing hasher: `{0}`")]
    MissingHasher(String),
}

/// Signature primitive over raw key material. The expected public-key
/// encoding is documented per implementation (raw point, SEC1 or DER).
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait Signer: Send + Sync {
    fn sign(
        &self,
        input: &[u8],
        public_key: &[u8],
        private_key: &SecretSlice<u8>,
    ) -> Result<Vec<u8>, SignerError>;

    fn verify(&self, input: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), SignerError>;
}

/// Registry of hashers and signers keyed by algorithm name.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait CryptoProvider: Send + Sync {
    fn get_hasher(&self, algorithm: &str) -> Result<Arc<dyn Hasher>, HasherError>;
    fn get_signer(&self, algorithm: &str) -> Result<Arc<dyn Signer>, SignerError>;
}

pub struct CryptoProviderImpl {
    hashers: HashMap<String, Arc<dyn Hasher>>,
    signers: HashMap<String, Arc<dyn Signer>>,
}

impl CryptoProviderImpl {
    pub fn new(
        hashers: HashMap<String, Arc<dyn Hasher>>,
        signers: HashMap<String, Arc<dyn Signer>>,
    ) -> Self {
        Self { hashers, signers }
    }
}

impl Default for CryptoProviderImpl {
    fn default() -> Self {
        let hashers: HashMap<String, Arc<dyn Hasher>> = HashMap::from_iter([
            (
                "sha-256".to_string(),
                Arc::new(hasher::sha2::Sha256Hasher {}) as Arc<dyn Hasher>,
            ),
            (
                "sha-384".to_string(),
                Arc::new(hasher::sha2::Sha384Hasher {}) as Arc<dyn Hasher>,
            ),
            (
                "sha-512".to_string(),
                Arc::new(hasher::sha2::Sha512Hasher {}) as Arc<dyn Hasher>,
            ),
        ]);

        let signers: HashMap<String, Arc<dyn Signer>> = HashMap::from_iter([
            (
                "Ed25519".to_string(),
                Arc::new(signer::eddsa::EDDSASigner {}) as Arc<dyn Signer>,
            ),
            (
                "ES256".to_string(),
                Arc::new(signer::es256::ES256Signer {}) as Arc<dyn Signer>,
            ),
            (
                "ES256K".to_string(),
                Arc::new(signer::es256k::ES256KSigner {}) as Arc<dyn Signer>,
            ),
            (
                "RS256".to_string(),
                Arc::new(signer::rsa::RS256Signer {}) as Arc<dyn Signer>,
            ),
            (
                "PS256".to_string(),
                Arc::new(signer::rsa::PS256Signer {}) as Arc<dyn Signer>,
            ),
        ]);

        Self { hashers, signers }
    }
}

impl CryptoProvider for CryptoProviderImpl {
    fn get_hasher(&self, algorithm: &str) -> Result<Arc<dyn Hasher>, HasherError> {
        self.hashers
            .get(algorithm)
            .cloned()
            .ok_or(HasherError::MissingHasher(algorithm.to_string()))
    }

    fn get_signer(&self, algorithm: &str) -> Result<Arc<dyn Signer>, SignerError> {
        self.signers
            .get(algorithm)
            .cloned()
            .ok_or(SignerError::MissingAlgorithm(algorithm.to_string()))
    }
}
