//! Typed accessors over [`ciborium::Value`]. Every "wrong major type" case
//! funnels into the single [`CborError::UnexpectedType`] path instead of
//! scattered casts at the call sites.

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum CborError {
    #[error("Missing key `{0}`")]
    MissingKey(String),
    #[error("Unexpected CBOR type, expected `{expected}`")]
    UnexpectedType { expected: &'static str },
    #[error("Deserialization failed: `{0}`")]
    Deserialization(String),
}

pub fn map_get<'a>(value: &'a ciborium::Value, key: &str) -> Option<&'a ciborium::Value> {
    value.as_map()?.iter().find_map(|(entry_key, entry_value)| {
        entry_key
            .as_text()
            .is_some_and(|text| text == key)
            .then_some(entry_value)
    })
}

pub fn require_map_get<'a>(
    value: &'a ciborium::Value,
    key: &str,
) -> Result<&'a ciborium::Value, CborError> {
    map_get(value, key).ok_or_else(|| CborError::MissingKey(key.to_string()))
}

pub fn as_bytes(value: &ciborium::Value) -> Result<&[u8], CborError> {
    value
        .as_bytes()
        .map(Vec::as_slice)
        .ok_or(CborError::UnexpectedType { expected: "bytes" })
}

pub fn as_text(value: &ciborium::Value) -> Result<&str, CborError> {
    value
        .as_text()
        .ok_or(CborError::UnexpectedType { expected: "text" })
}

pub fn as_array(value: &ciborium::Value) -> Result<&[ciborium::Value], CborError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or(CborError::UnexpectedType { expected: "array" })
}

pub fn as_u64(value: &ciborium::Value) -> Result<u64, CborError> {
    value
        .as_integer()
        .and_then(|integer| u64::try_from(integer).ok())
        .ok_or(CborError::UnexpectedType {
            expected: "unsigned integer",
        })
}

/// Unwraps an optional embedded-CBOR layer: `#6.24(bstr .cbor T)` or the
/// bare value itself.
pub fn unwrap_embedded(value: ciborium::Value) -> Result<ciborium::Value, CborError> {
    match value {
        ciborium::Value::Tag(24, inner) => {
            let bytes = inner
                .as_bytes()
                .ok_or(CborError::UnexpectedType { expected: "bytes" })?;
            ciborium::from_reader(bytes.as_slice())
                .map_err(|e| CborError::Deserialization(e.to_string()))
        }
        ciborium::Value::Bytes(bytes) => ciborium::from_reader(bytes.as_slice())
            .map_err(|e| CborError::Deserialization(e.to_string())),
        other => Ok(other),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_map() -> ciborium::Value {
        ciborium::Value::Map(vec![
            (
                ciborium::Value::Text("docType".to_string()),
                ciborium::Value::Text("org.iso.18013.5.1.mDL".to_string()),
            ),
            (
                ciborium::Value::Text("digestID".to_string()),
                ciborium::Value::Integer(7.into()),
            ),
        ])
    }

    #[test]
    fn test_map_get_by_text_key() {
        let map = sample_map();
        assert_eq!(
            as_text(map_get(&map, "docType").unwrap()).unwrap(),
            "org.iso.18013.5.1.mDL"
        );
        assert!(map_get(&map, "missing").is_none());
    }

    #[test]
    fn test_require_map_get_missing_key() {
        assert_eq!(
            require_map_get(&sample_map(), "issuerAuth").unwrap_err(),
            CborError::MissingKey("issuerAuth".to_string())
        );
    }

    #[test]
    fn test_as_u64_rejects_text() {
        let map = sample_map();
        assert_eq!(as_u64(map_get(&map, "digestID").unwrap()).unwrap(), 7);
        assert_eq!(
            as_u64(map_get(&map, "docType").unwrap()).unwrap_err(),
            CborError::UnexpectedType {
                expected: "unsigned integer"
            }
        );
    }

    #[test]
    fn test_unwrap_embedded_tag_24() {
        let mut inner = Vec::new();
        ciborium::into_writer(&ciborium::Value::Text("payload".into()), &mut inner).unwrap();
        let wrapped = ciborium::Value::Tag(24, Box::new(ciborium::Value::Bytes(inner)));

        let unwrapped = unwrap_embedded(wrapped).unwrap();
        assert_eq!(as_text(&unwrapped).unwrap(), "payload");
    }
}
