//! Uppercase hex text <-> raw bytes.

use super::error::{CardError, Result};

/// Two uppercase hex digits per byte, no separators.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decodes pairs of hex digits; either case is accepted.
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| CardError::invalid(format!("`{}` is not a hex string: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(bytes_to_hex(&[]), "");
        assert_eq!(hex_to_bytes("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn encodes_uppercase_without_separators() {
        assert_eq!(bytes_to_hex(&[0x00, 0xA4, 0x0f, 0xff]), "00A40FFF");
    }

    #[test]
    fn decodes_either_case() {
        assert_eq!(hex_to_bytes("f222333222").unwrap(), vec![0xF2, 0x22, 0x33, 0x32, 0x22]);
        assert_eq!(hex_to_bytes("F2AB").unwrap(), hex_to_bytes("f2ab").unwrap());
    }

    #[test]
    fn round_trip() {
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(hex_to_bytes(&bytes_to_hex(&all)).unwrap(), all);
        assert_eq!(hex_to_bytes(&bytes_to_hex(&[0x90])).unwrap(), vec![0x90]);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(hex_to_bytes("ABC"), Err(CardError::InvalidFormat(_))));
        assert!(matches!(hex_to_bytes("ZZ"), Err(CardError::InvalidFormat(_))));
        assert!(matches!(hex_to_bytes("90 00"), Err(CardError::InvalidFormat(_))));
    }
}
