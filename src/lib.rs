//! Loyalty card protocol over NFC: SELECT-AID over ISO-DEP and fixed
//! records in MIFARE Ultralight pages.

pub mod nfc;

#[cfg(feature = "pcsc")]
pub mod commands;
