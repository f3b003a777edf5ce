//! Public verification boundary. Every entry point returns a structured
//! result; internal failures are translated into the error taxonomy and
//! never surface as raw errors.

use std::collections::HashMap;
use std::sync::Arc;

use verifier_crypto::{CryptoProvider, CryptoProviderImpl};

use crate::model::{
    CredentialFormat, CredentialStatusResult, ErrorCode, PresentationVerificationResult,
    StatusCheckFailure, ValidationStatus, VerificationResult,
};
use crate::provider::caching_loader::CachingLoader;
use crate::provider::credential_format::ldp::LdpFormat;
use crate::provider::credential_format::mdoc::MdocFormat;
use crate::provider::credential_format::sd_jwt::SdJwtFormat;
use crate::provider::credential_format::{
    ldp, CredentialValidity, FormatVerifier, FormatVerifierProvider,
};
use crate::provider::http_client::reqwest_client::ReqwestClient;
use crate::provider::http_client::HttpClient;
use crate::provider::key_resolver::https::HttpsKeyResolver;
use crate::provider::key_resolver::jwk::JwkDidResolver;
use crate::provider::key_resolver::key::KeyDidResolver;
use crate::provider::key_resolver::web::WebDidResolver;
use crate::provider::key_resolver::{KeyResolver, KeyResolverProvider};
use crate::provider::signature::SignatureVerifierProvider;
use crate::provider::status_check::{BitstringStatusCheck, StatusCheck, StatusCheckStrategy};
use crate::util::jsonld_context::ContextCache;
use crate::util::jwt;


pub struct VerificationService {
    formats: FormatVerifierProvider,
    ldp: Arc<LdpFormat>,
    status_check: StatusCheck,
}

impl VerificationService {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(CryptoProviderImpl::default());

        let context_cache = ContextCache::new(CachingLoader::default(), client.clone());

        let resolvers: HashMap<String, Arc<dyn KeyResolver>> = HashMap::from_iter([
            (
                "web".to_string(),
                Arc::new(WebDidResolver::new(client.clone(), CachingLoader::default()))
                    as Arc<dyn KeyResolver>,
            ),
            ("key".to_string(), Arc::new(KeyDidResolver {}) as _),
            ("jwk".to_string(), Arc::new(JwkDidResolver {}) as _),
        ]);
        let key_resolvers = Arc::new(KeyResolverProvider::new(
            resolvers,
            Some(Arc::new(HttpsKeyResolver::new(client.clone()))),
        ));

        let signatures = Arc::new(SignatureVerifierProvider::new(crypto.clone()));

        let ldp = Arc::new(LdpFormat::new(
            crypto.clone(),
            context_cache,
            key_resolvers.clone(),
            signatures.clone(),
            ldp::Params::default(),
        ));
        let mdoc = Arc::new(MdocFormat::new(crypto.clone(), signatures.clone()));
        let sd_jwt = Arc::new(SdJwtFormat::new(key_resolvers, signatures));

        let formats = FormatVerifierProvider::new(HashMap::from_iter([
            (
                CredentialFormat::LdpVc,
                ldp.clone() as Arc<dyn FormatVerifier>,
            ),
            (CredentialFormat::MsoMdoc, mdoc as _),
            (CredentialFormat::SdJwt, sd_jwt as _),
        ]));

        let status_check = StatusCheck::new(Arc::new(BitstringStatusCheck::new(
            client,
            CachingLoader::default(),
            ldp.clone(),
        )));

        Self {
            formats,
            ldp,
            status_check,
        }
    }

    /// Swaps the status-checking strategy (e.g. for the simplified
    /// query-parameter status service).
    pub fn with_status_strategy(mut self, strategy: Arc<dyn StatusCheckStrategy>) -> Self {
        self.status_check = StatusCheck::new(strategy);
        self
    }

    pub async fn validate(&self, credential: &str, format: CredentialFormat) -> ValidationStatus {
        let Some(verifier) = self.formats.get(format) else {
            return ValidationStatus::invalid(
                ErrorCode::UnknownError,
                format!("no validator registered for format {format}"),
            );
        };

        match verifier.validate(credential).await {
            Ok(CredentialValidity::Valid) => ValidationStatus::valid(),
            Ok(CredentialValidity::Expired) => ValidationStatus::expired(),
            Err(error) => ValidationStatus::invalid(error.error_code(), error.to_string()),
        }
    }

    /// Structural validation first (fails fast without touching the
    /// network), then key resolution and signature verification. A past
    /// expiration downgrades the message, not the status.
    pub async fn verify(&self, credential: &str, format: CredentialFormat) -> VerificationResult {
        let Some(verifier) = self.formats.get(format) else {
            return VerificationResult::failure(
                ErrorCode::UnknownError,
                format!("no verifier registered for format {format}"),
            );
        };

        let validity = match verifier.validate(credential).await {
            Ok(validity) => validity,
            Err(error) => {
                return VerificationResult::failure(error.error_code(), error.to_string())
            }
        };

        if let Err(error) = verifier.verify(credential).await {
            return VerificationResult::failure(error.error_code(), error.to_string());
        }

        match validity {
            CredentialValidity::Valid => VerificationResult::success(),
            CredentialValidity::Expired => VerificationResult::expired(),
        }
    }

    /// Verifies the presentation holder proof, then each embedded credential
    /// independently; the per-credential results keep the input order.
    pub async fn verify_presentation(&self, presentation: &str) -> PresentationVerificationResult {
        let credentials = match self.ldp.verify_presentation_proof(presentation).await {
            Ok(credentials) => credentials,
            Err(error) => {
                return PresentationVerificationResult {
                    proof: VerificationResult::failure(error.error_code(), error.to_string()),
                    credentials: vec![],
                }
            }
        };

        let credential_strings: Vec<String> =
            credentials.iter().map(|credential| credential.to_string()).collect();
        let checks = credential_strings
            .iter()
            .map(|credential| self.verify(credential, CredentialFormat::LdpVc));
        let credentials = futures::future::join_all(checks).await;

        PresentationVerificationResult {
            proof: VerificationResult::success(),
            credentials,
        }
    }

    /// Checks revocation/suspension status for every `credentialStatus`
    /// entry matching the purpose filter; one entry failing never aborts
    /// its siblings.
    pub async fn check_status(
        &self,
        credential: &str,
        format: CredentialFormat,
        purposes: Option<&[String]>,
    ) -> Vec<CredentialStatusResult> {
        let document = match status_document(credential, format) {
            Ok(document) => document,
            Err(message) => {
                return vec![CredentialStatusResult {
                    purpose: String::new(),
                    valid: false,
                    error: Some(StatusCheckFailure {
                        code: ErrorCode::EmptyOrMalformedInput,
                        message,
                    }),
                }]
            }
        };

        self.status_check.check(&document, purposes).await
    }
}

impl Default for VerificationService {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestClient::default()))
    }
}

/// The JSON document carrying `credentialStatus` entries: the credential
/// itself for LDP, the issuer-JWT payload for SD-JWT. Mobile documents do
/// not carry status list entries.
fn status_document(
    credential: &str,
    format: CredentialFormat,
) -> Result<serde_json::Value, String> {
    match format {
        CredentialFormat::LdpVc => {
            serde_json::from_str(credential).map_err(|e| format!("invalid credential JSON: {e}"))
        }
        CredentialFormat::SdJwt => {
            let token = credential.split('~').next().unwrap_or(credential);
            let decomposed = jwt::decompose(token).map_err(|e| e.to_string())?;
            Ok(decomposed.payload)
        }
        CredentialFormat::MsoMdoc => Err(format!(
            "status list entries are not available for format {format}"
        )),
    }
}
