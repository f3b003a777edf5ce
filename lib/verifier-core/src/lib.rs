//! Verification core for digitally-signed Verifiable Credentials.
//!
//! Supports three credential encodings: JSON-LD credentials with Linked-Data
//! proofs (`LDP_VC`), CBOR mobile documents with COSE signatures (`MSO_MDOC`)
//! and Selective-Disclosure JWTs (`SD_JWT`). For each format the pipeline
//! structurally validates the credential, resolves the signer key,
//! reconstructs the exact signed bytes, checks the signature and optionally
//! checks revocation/suspension status against a hosted status list.

pub mod model;
pub mod provider;
pub mod service;
pub mod util;

pub use model::{
    CredentialFormat, CredentialStatusResult, ErrorCode, PresentationVerificationResult,
    ValidationStatus, VerificationResult,
};
pub use service::verification::VerificationService;
