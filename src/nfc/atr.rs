//! Technology detection from the ATR a PC/SC reader synthesizes for contactless cards.
//!
//! Storage cards (no ISO 14443-4) carry the PC/SC registered application
//! provider `A0 00 00 03 06` in the historical bytes, followed by the
//! standard byte and a two byte card name. Everything else that looks like a
//! contactless ATR speaks ISO-DEP.

use super::card_trait::Technology;

const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

const NAME_ULTRALIGHT: [u8; 2] = [0x00, 0x03];
const NAME_ULTRALIGHT_C: [u8; 2] = [0x00, 0x3A];

/// Technologies the card behind `atr` exposes, in no particular order.
pub fn technologies(atr: &[u8]) -> Vec<Technology> {
    if let Some(pos) = atr.windows(PCSC_RID.len()).position(|w| w == PCSC_RID) {
        // RID, standard byte, card name
        let name = atr.get(pos + PCSC_RID.len() + 1..pos + PCSC_RID.len() + 3);
        return match name {
            Some(n) if n == NAME_ULTRALIGHT || n == NAME_ULTRALIGHT_C => vec![Technology::MifareUltralight],
            _ => Vec::new(),
        };
    }

    // TS=3B, T0=8x (TD1 present), TD1=80, TD2=01
    if atr.len() >= 4 && atr[0] == 0x3B && atr[1] & 0xF0 == 0x80 && atr[2] == 0x80 && atr[3] == 0x01 {
        return vec![Technology::IsoDep];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfc::hex_codec::hex_to_bytes;

    #[test]
    fn ultralight_storage_card() {
        let atr = hex_to_bytes("3B8F8001804F0CA0000003060300030000000068").unwrap();
        assert_eq!(technologies(&atr), vec![Technology::MifareUltralight]);
    }

    #[test]
    fn classic_storage_card_is_not_supported() {
        let atr = hex_to_bytes("3B8F8001804F0CA000000306030001000000006A").unwrap();
        assert!(technologies(&atr).is_empty());
    }

    #[test]
    fn iso14443_4_card() {
        let atr = hex_to_bytes("3B8180018080").unwrap();
        assert_eq!(technologies(&atr), vec![Technology::IsoDep]);
    }

    #[test]
    fn contact_card_and_garbage() {
        assert!(technologies(&hex_to_bytes("3B6E00000031C0").unwrap()).is_empty());
        assert!(technologies(&[]).is_empty());
        // RID cut short before the card name
        assert!(technologies(&hex_to_bytes("3B8F8001804F0CA00000030603").unwrap()).is_empty());
    }
}
