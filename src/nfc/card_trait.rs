use std::fmt;
use std::ops::{Deref, DerefMut};

use anyhow::Result;
use log::warn;
use serde::Serialize;

/// Size of one MIFARE Ultralight page.
pub const PAGE_SIZE: usize = 4;

/// Pages returned by one Ultralight READ command.
pub const PAGES_PER_READ: usize = 4;

/// Opening and releasing the link to a tag.
///
/// Both PC/SC and test tags implement this, so the protocol code does not
/// care what carries the bytes.
pub trait TagConnection {
    fn connect(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// ISO 14443-4 transport carrying ISO 7816-4 APDUs.
pub trait IsoDep: TagConnection {
    /// Sends a command APDU and returns the raw response, status word included.
    fn transceive(&mut self, apdu: &[u8]) -> Result<Vec<u8>>;
}

/// Paged memory of a MIFARE Ultralight (or NTAG) tag.
pub trait MifareUltralight: TagConnection {
    /// Reads four consecutive pages starting at `page`.
    fn read_pages(&mut self, page: u8) -> Result<[u8; PAGE_SIZE * PAGES_PER_READ]>;

    fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> Result<()>;
}

/// A discovered tag and the technologies it exposes.
pub trait NfcTag {
    fn mifare_ultralight(&mut self) -> Option<&mut dyn MifareUltralight>;
    fn iso_dep(&mut self) -> Option<&mut dyn IsoDep>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    MifareUltralight,
    IsoDep,
    Unsupported,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Technology::MifareUltralight => "MIFARE Ultralight",
            Technology::IsoDep => "ISO-DEP",
            Technology::Unsupported => "no supported technology",
        })
    }
}

/// An open connection; closes the tag when dropped.
///
/// Call [`Connection::release`] on the success path so a failing close is
/// reported. When the guard is dropped on an error path the close error is
/// only logged and the original error is the one the caller sees.
pub struct Connection<'a, T: TagConnection + ?Sized> {
    tag: &'a mut T,
    open: bool,
}

impl<'a, T: TagConnection + ?Sized> Connection<'a, T> {
    pub fn open(tag: &'a mut T) -> Result<Self> {
        if let Err(err) = tag.connect() {
            // a half-open link still has to be torn down
            if let Err(close_err) = tag.close() {
                warn!("closing tag after failed connect: {:#}", close_err);
            }
            return Err(err);
        }
        Ok(Connection { tag, open: true })
    }

    pub fn release(mut self) -> Result<()> {
        self.open = false;
        self.tag.close()
    }
}

impl<T: TagConnection + ?Sized> Deref for Connection<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.tag
    }
}

impl<T: TagConnection + ?Sized> DerefMut for Connection<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.tag
    }
}

impl<T: TagConnection + ?Sized> Drop for Connection<'_, T> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.tag.close() {
                warn!("error closing tag: {:#}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfc::test_tag::MemoryTag;

    #[test]
    fn release_closes_once() {
        let mut tag = MemoryTag::ultralight();
        let conn = Connection::open(&mut tag).unwrap();
        conn.release().unwrap();
        assert_eq!(tag.connects, 1);
        assert_eq!(tag.closes, 1);
    }

    #[test]
    fn drop_closes_on_early_exit() {
        let mut tag = MemoryTag::ultralight();
        {
            let _conn = Connection::open(&mut tag).unwrap();
        }
        assert_eq!(tag.closes, 1);
    }

    #[test]
    fn failed_connect_still_closes() {
        let mut tag = MemoryTag::ultralight();
        tag.fail_connect = true;
        assert!(Connection::open(&mut tag).is_err());
        assert_eq!(tag.closes, 1);
    }

    #[test]
    fn release_reports_close_error() {
        let mut tag = MemoryTag::ultralight();
        tag.fail_close = true;
        let conn = Connection::open(&mut tag).unwrap();
        assert!(conn.release().is_err());
        assert_eq!(tag.closes, 1);
    }

    #[test]
    fn technology_names() {
        assert_eq!(Technology::MifareUltralight.to_string(), "MIFARE Ultralight");
        assert_eq!(Technology::IsoDep.to_string(), "ISO-DEP");
        assert_eq!(serde_json::to_string(&Technology::IsoDep).unwrap(), "\"iso_dep\"");
    }
}
