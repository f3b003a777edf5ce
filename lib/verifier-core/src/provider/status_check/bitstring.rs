//! Bit-level decoding of a Bitstring Status List: the `encodedList` value is
//! GZIP-compressed and Base64URL-encoded, optionally carrying the `u`
//! multibase prefix. Status values span `statusSize` bits, read
//! most-significant-bit first.

use std::io::Read;

use flate2::read::GzDecoder;

use super::StatusCheckError;
use crate::util::encoding::decode_base64url;

pub fn decode_encoded_list(encoded: &str) -> Result<Vec<u8>, StatusCheckError> {
    let encoded = encoded.strip_prefix('u').unwrap_or(encoded);

    let compressed = decode_base64url(encoded).map_err(|e| StatusCheckError::InvalidField {
        field: "encodedList".to_string(),
        reason: e.to_string(),
    })?;

    let mut bits = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut bits)
        .map_err(|e| StatusCheckError::InvalidField {
            field: "encodedList".to_string(),
            reason: format!("not a valid GZIP stream: {e}"),
        })?;

    Ok(bits)
}

pub fn read_status_value(
    bits: &[u8],
    index: usize,
    status_size: usize,
) -> Result<u64, StatusCheckError> {
    let total_bits = bits.len() * 8;
    let bit_position = index
        .checked_mul(status_size)
        .ok_or_else(|| StatusCheckError::OutOfRange("status index overflows".to_string()))?;

    if bit_position >= total_bits || bit_position + status_size > total_bits {
        return Err(StatusCheckError::OutOfRange(format!(
            "bit position {bit_position} exceeds the {total_bits}-bit status list"
        )));
    }

    let mut value = 0u64;
    for offset in 0..status_size {
        let position = bit_position + offset;
        let bit = (bits[position / 8] >> (7 - (position % 8))) & 1;
        value = (value << 1) | u64::from(bit);
    }

    Ok(value)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::util::encoding::encode_base64url;

    pub(crate) fn encode_list(bits: &[u8]) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bits).unwrap();
        let compressed = encoder.finish().unwrap();
        format!("u{}", encode_base64url(compressed).unwrap())
    }

    #[test]
    fn test_round_trip_with_multibase_prefix() {
        let bits = vec![0b1010_0000, 0x00, 0xFF];
        let decoded = decode_encoded_list(&encode_list(&bits)).unwrap();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn test_round_trip_without_prefix() {
        let bits = vec![0b0100_0000];
        let encoded = encode_list(&bits);
        let decoded = decode_encoded_list(&encoded[1..]).unwrap();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn test_invalid_gzip_is_rejected() {
        let encoded = encode_base64url(b"not gzip at all").unwrap();
        assert!(matches!(
            decode_encoded_list(&encoded),
            Err(StatusCheckError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_single_bit_reads() {
        let bits = [0b1010_0000];
        assert_eq!(read_status_value(&bits, 0, 1).unwrap(), 1);
        assert_eq!(read_status_value(&bits, 1, 1).unwrap(), 0);
        assert_eq!(read_status_value(&bits, 2, 1).unwrap(), 1);
        assert_eq!(read_status_value(&bits, 7, 1).unwrap(), 0);
    }

    #[test]
    fn test_multi_bit_reads_msb_first() {
        // two-bit entries: 01 10 11 00
        let bits = [0b0110_1100];
        assert_eq!(read_status_value(&bits, 0, 2).unwrap(), 0b01);
        assert_eq!(read_status_value(&bits, 1, 2).unwrap(), 0b10);
        assert_eq!(read_status_value(&bits, 2, 2).unwrap(), 0b11);
        assert_eq!(read_status_value(&bits, 3, 2).unwrap(), 0b00);
    }

    #[test]
    fn test_out_of_range_is_an_error_not_a_panic() {
        let bits = [0u8; 2];
        assert!(matches!(
            read_status_value(&bits, 16, 1),
            Err(StatusCheckError::OutOfRange(_))
        ));
        assert!(matches!(
            read_status_value(&bits, usize::MAX, 8),
            Err(StatusCheckError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_span_must_fit_entirely() {
        let bits = [0u8; 1];
        assert_eq!(read_status_value(&bits, 3, 2).unwrap(), 0);
        assert!(read_status_value(&bits, 4, 2).is_err());
    }
}
