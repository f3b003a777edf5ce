//! URDNA2015 (RDFC-1.0) canonicalization of JSON-LD documents: the document
//! is expanded to an RDF dataset and normalized into a deterministic
//! N-Quads string. Any expansion error is fatal for the caller; there is no
//! partial canonicalization.

use std::collections::HashSet;
use std::string::FromUtf8Error;

use json_ld::{rdf_types, Loader};
use serde::Serialize;
use sophia_api::quad::Spog;
use sophia_api::term::{Term, TermKind};
use sophia_api::MownStr;
use sophia_c14n::rdfc10;

#[derive(Debug, thiserror::Error)]
pub enum CanonizationError {
    #[error("Document is not a valid JSON: {0}")]
    DocumentParsing(#[from] json_syntax::SerializeError),
    #[error("Document expansion failed: {0}")]
    DocumentExpansion(#[from] json_ld::ToRdfError),
    #[error("c14n normalization failed: {0}")]
    C14nNormalization(#[from] sophia_c14n::C14nError<std::convert::Infallible>),
    #[error("Normalized document contains non UTF-8 characters: {0}")]
    NonUtf8Document(#[from] FromUtf8Error),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct TermAdapter(rdf_types::Term);

impl Term for TermAdapter {
    type BorrowTerm<'x> = &'x Self;

    fn kind(&self) -> TermKind {
        match self.0 {
            rdf_types::Term::Id(rdf_types::Id::Blank(_)) => TermKind::BlankNode,
            rdf_types::Term::Id(rdf_types::Id::Iri(_)) => TermKind::Iri,
            rdf_types::Term::Literal(_) => TermKind::Literal,
        }
    }

    fn borrow_term(&self) -> Self::BorrowTerm<'_> {
        self
    }

    fn iri(&self) -> Option<sophia_api::term::IriRef<MownStr<'_>>> {
        match &self.0 {
            rdf_types::Term::Id(rdf_types::Id::Iri(iri)) => {
                sophia_api::term::IriRef::new(MownStr::from(iri.as_str())).ok()
            }
            _ => None,
        }
    }

    fn bnode_id(&self) -> Option<sophia_api::term::BnodeId<MownStr<'_>>> {
        match &self.0 {
            rdf_types::Term::Id(rdf_types::Id::Blank(bnode_id)) => {
                sophia_api::term::BnodeId::new(MownStr::from(&bnode_id[2..])).ok()
            }
            _ => None,
        }
    }

    fn lexical_form(&self) -> Option<MownStr<'_>> {
        match &self.0 {
            rdf_types::Term::Literal(lit) => Some(MownStr::from(lit.as_value().as_str())),
            _ => None,
        }
    }

    fn datatype(&self) -> Option<sophia_api::term::IriRef<MownStr<'_>>> {
        match &self.0 {
            rdf_types::Term::Literal(lit) => match lit.as_type() {
                rdf_types::LiteralType::Any(iri) => {
                    sophia_api::term::IriRef::new(MownStr::from(iri.as_str())).ok()
                }
                rdf_types::LiteralType::LangString(_) => sophia_api::ns::rdf::langString.iri(),
            },
            _ => None,
        }
    }

    fn language_tag(&self) -> Option<sophia_api::term::LanguageTag<MownStr<'_>>> {
        match &self.0 {
            rdf_types::Term::Literal(lit) => match lit.as_type() {
                rdf_types::LiteralType::LangString(tag) => {
                    let tag = MownStr::from(tag.as_str());
                    sophia_api::term::LanguageTag::new(tag).ok()
                }
                rdf_types::LiteralType::Any(_) => None,
            },
            _ => None,
        }
    }
}

pub async fn rdf_canonize(
    document: impl Serialize,
    loader: &impl Loader,
    options: json_ld::Options,
) -> Result<String, CanonizationError> {
    let generator = rdf_types::generator::Blank::new();
    let document = json_syntax::to_value(document)?;

    let document = json_ld::RemoteDocument::new(None, None, document);
    let mut rdf =
        json_ld::JsonLdProcessor::to_rdf_using(&document, generator, loader, options).await?;

    let quads: HashSet<Spog<TermAdapter>> = rdf
        .cloned_quads()
        .map(|quad| {
            let (subject, predicate, object, maybe_graph) = quad.into_parts();
            (
                [subject.into_term(), predicate.into_term(), object].map(TermAdapter),
                maybe_graph.map(|graph| TermAdapter(graph.into_term())),
            )
        })
        .collect();

    let mut buf = Vec::<u8>::new();
    rdfc10::normalize(&quads, &mut buf)?;

    Ok(String::from_utf8(buf)?)
}

/// Expansion options: invalid or undefined terms are rejected, never
/// silently dropped. A dropped term would canonicalize to a different
/// dataset than the one that was signed.
pub fn json_ld_processor_options() -> json_ld::Options {
    json_ld::Options {
        expansion_policy: json_ld::expansion::Policy {
            invalid: json_ld::expansion::Action::Reject,
            allow_undefined: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::str::FromStr;

    use json_ld::{IriBuf, RemoteDocument};
    use serde_json::json;

    use super::*;
    use crate::util::jsonld_context::{CONTEXT_CREDENTIALS_V2, CREDENTIALS_V2_URL};

    fn offline_loader() -> HashMap<IriBuf, RemoteDocument> {
        let mut loader: HashMap<IriBuf, RemoteDocument> = HashMap::new();
        loader.insert(
            IriBuf::from_str(CREDENTIALS_V2_URL).unwrap(),
            RemoteDocument::new(
                None,
                None,
                json_syntax::Value::from_str(CONTEXT_CREDENTIALS_V2).unwrap(),
            ),
        );
        loader
    }

    #[tokio::test]
    async fn test_canonize_proof_document() {
        let proof = json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
            "type": "DataIntegrityProof",
            "cryptosuite": "eddsa-rdfc-2022",
            "created": "2023-02-24T23:36:38Z",
            "verificationMethod": "https://vc.example/issuers/5678#key-1",
            "proofPurpose": "assertionMethod"
        });

        let canonical = rdf_canonize(&proof, &offline_loader(), json_ld_processor_options())
            .await
            .unwrap();

        assert_eq!(
            canonical,
            "_:c14n0 <http://purl.org/dc/terms/created> \"2023-02-24T23:36:38Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime> .\n\
             _:c14n0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <https://w3id.org/security#DataIntegrityProof> .\n\
             _:c14n0 <https://w3id.org/security#cryptosuite> \"eddsa-rdfc-2022\"^^<https://w3id.org/security#cryptosuiteString> .\n\
             _:c14n0 <https://w3id.org/security#proofPurpose> <https://w3id.org/security#assertionMethod> .\n\
             _:c14n0 <https://w3id.org/security#verificationMethod> <https://vc.example/issuers/5678#key-1> .\n"
        );
    }

    #[tokio::test]
    async fn test_canonization_is_deterministic() {
        let credential = json!({
            "@context": ["https://www.w3.org/ns/credentials/v2"],
            "type": ["VerifiableCredential"],
            "issuer": "did:web:issuer.example.com",
            "validFrom": "2024-01-01T00:00:00.000Z",
            "credentialSubject": {
                "id": "did:example:holder",
                "name": "Example Holder"
            }
        });

        let first = rdf_canonize(&credential, &offline_loader(), json_ld_processor_options())
            .await
            .unwrap();
        let second = rdf_canonize(&credential, &offline_loader(), json_ld_processor_options())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert!(first.contains("<https://www.w3.org/2018/credentials#VerifiableCredential>"));
    }
}
