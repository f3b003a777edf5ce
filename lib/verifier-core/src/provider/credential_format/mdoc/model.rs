//! CBOR data model for ISO mdoc issuer-signed documents.

use anyhow::anyhow;
use ciborium::tag::Required;
use coset::AsCborValue;
use indexmap::IndexMap;
use serde::de::{self, DeserializeOwned};
use serde::{ser, Deserialize, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub type Namespace = String;
pub type Namespaces = IndexMap<Namespace, Vec<EmbeddedCbor<IssuerSignedItem>>>;

pub type ValueDigests = IndexMap<Namespace, DigestIds>;
pub type DigestIds = IndexMap<u64, Bstr>;

pub type DataElementIdentifier = String;
pub type DataElementValue = ciborium::Value;

const EMBEDDED_CBOR_TAG: u64 = 24;
const DATE_TIME_CBOR_TAG: u64 = 0;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub doc_type: String,
    pub issuer_signed: IssuerSigned,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSigned {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_spaces: Option<Namespaces>,
    pub issuer_auth: IssuerAuth,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSignedItem {
    #[serde(rename = "digestID")]
    pub digest_id: u64,
    pub random: Bstr,
    pub element_identifier: DataElementIdentifier,
    pub element_value: DataElementValue,
}

/// COSE_Sign1 carrying the Mobile Security Object.
#[derive(Debug, PartialEq)]
pub struct IssuerAuth(pub coset::CoseSign1);

impl From<coset::CoseSign1> for IssuerAuth {
    fn from(cose_sign1: coset::CoseSign1) -> Self {
        Self(cose_sign1)
    }
}

impl Serialize for IssuerAuth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0
            .clone()
            .to_cbor_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IssuerAuth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let value = ciborium::Value::deserialize(deserializer)?;

        coset::CoseSign1::from_cbor_value(value)
            .map(IssuerAuth)
            .map_err(de::Error::custom)
    }
}

// payload of the IssuerAuth CoseSign1
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MobileSecurityObject {
    pub version: MobileSecurityObjectVersion,
    pub digest_algorithm: DigestAlgorithm,
    pub value_digests: ValueDigests,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_key_info: Option<ciborium::Value>,
    pub doc_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_info: Option<ValidityInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum MobileSecurityObjectVersion {
    #[serde(rename = "1.0")]
    V1_0,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl DigestAlgorithm {
    pub fn hasher_name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidityInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_update: Option<DateTime>,
}

/// CBOR date-time: tag 0 around an RFC 3339 string without fractional
/// seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct DateTime(pub OffsetDateTime);

impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0
            .replace_microsecond(0)
            // SAFETY: 0 is a valid microsecond
            .unwrap()
            .format(&Rfc3339)
            .map(ciborium::tag::Required::<String, DATE_TIME_CBOR_TAG>)
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let datetime =
            ciborium::tag::Required::<String, DATE_TIME_CBOR_TAG>::deserialize(deserializer)?;

        OffsetDateTime::parse(&datetime.0, &Rfc3339)
            .map(DateTime)
            .map_err(de::Error::custom)
    }
}

impl From<DateTime> for OffsetDateTime {
    fn from(value: DateTime) -> Self {
        value.0
    }
}

// ciborium cannot tell whether a Vec<u8> is Value::Bytes or an array of
// integers, hence the explicit byte-string wrapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ciborium::Value", into = "ciborium::Value")]
pub struct Bstr(pub Vec<u8>);

impl From<Bstr> for ciborium::Value {
    fn from(Bstr(value): Bstr) -> Self {
        Self::Bytes(value)
    }
}

impl TryFrom<ciborium::Value> for Bstr {
    type Error = anyhow::Error;

    fn try_from(value: ciborium::Value) -> Result<Self, Self::Error> {
        Ok(Self(
            value.into_bytes().map_err(|_| anyhow!("Value not bytes"))?,
        ))
    }
}

/// Embedded CBOR (`#6.24(bstr .cbor T)`). The encoded form is kept next to
/// the decoded value so digests can be recomputed over the exact bytes that
/// were signed.
#[derive(Debug, PartialEq, Clone)]
pub struct EmbeddedCbor<T> {
    inner: T,
    original_bytes: Vec<u8>,
}

impl<T> EmbeddedCbor<T> {
    pub fn new(inner: T) -> Result<Self, ciborium::ser::Error<std::io::Error>>
    where
        T: Serialize,
    {
        let mut t: Vec<u8> = Vec::with_capacity(128);
        ciborium::into_writer(&inner, &mut t)?;

        let tagged_value = Required::<_, EMBEDDED_CBOR_TAG>(Bstr(t));

        let mut original_bytes: Vec<u8> = Vec::with_capacity(128);
        ciborium::into_writer(&tagged_value, &mut original_bytes)?;

        Ok(Self {
            original_bytes,
            inner,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.original_bytes.as_slice()
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Serialize> Serialize for EmbeddedCbor<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let Required::<Bstr, EMBEDDED_CBOR_TAG>(bstr) =
            ciborium::from_reader(self.original_bytes.as_slice()).map_err(ser::Error::custom)?;

        Required::<_, EMBEDDED_CBOR_TAG>(bstr).serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for EmbeddedCbor<T>
where
    T: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let Required(Bstr(embedded_cbor)) =
            Required::<_, EMBEDDED_CBOR_TAG>::deserialize(deserializer)?;

        let inner: T =
            ciborium::from_reader(embedded_cbor.as_slice()).map_err(de::Error::custom)?;

        let tagged_value = Required::<_, EMBEDDED_CBOR_TAG>(Bstr(embedded_cbor));

        let mut original_bytes: Vec<u8> = Vec::with_capacity(128);
        ciborium::into_writer(&tagged_value, &mut original_bytes).map_err(de::Error::custom)?;

        Ok(Self {
            inner,
            original_bytes,
        })
    }
}
