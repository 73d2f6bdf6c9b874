//! In-memory tag used by the unit tests.

use anyhow::{anyhow, bail, Result};

use super::card_trait::{IsoDep, MifareUltralight, NfcTag, TagConnection, PAGES_PER_READ, PAGE_SIZE};
use super::emulation::CardService;

/// MIFARE Ultralight: 16 pages of 4 bytes.
pub const ULTRALIGHT_PAGES: usize = 16;

pub enum IsoDepBehavior {
    /// Replies with the same bytes to every command.
    Fixed(Vec<u8>),
    /// Routes commands to an emulated card application.
    Emulated(CardService),
}

pub struct MemoryTag {
    pub pages: Option<Vec<[u8; PAGE_SIZE]>>,
    pub iso_dep: Option<IsoDepBehavior>,
    pub connected: bool,
    pub connects: usize,
    pub closes: usize,
    pub written: Vec<u8>,
    pub sent: Vec<Vec<u8>>,
    pub fail_connect: bool,
    pub fail_close: bool,
    pub fail_transceive: bool,
    pub fail_write_at: Option<u8>,
}

impl MemoryTag {
    fn empty() -> Self {
        MemoryTag {
            pages: None,
            iso_dep: None,
            connected: false,
            connects: 0,
            closes: 0,
            written: Vec::new(),
            sent: Vec::new(),
            fail_connect: false,
            fail_close: false,
            fail_transceive: false,
            fail_write_at: None,
        }
    }

    pub fn ultralight() -> Self {
        MemoryTag {
            pages: Some(vec![[0u8; PAGE_SIZE]; ULTRALIGHT_PAGES]),
            ..Self::empty()
        }
    }

    pub fn with_iso_dep(behavior: IsoDepBehavior) -> Self {
        MemoryTag {
            iso_dep: Some(behavior),
            ..Self::empty()
        }
    }

    pub fn responding(response: &[u8]) -> Self {
        Self::with_iso_dep(IsoDepBehavior::Fixed(response.to_vec()))
    }

    pub fn unsupported() -> Self {
        Self::empty()
    }

    /// Exposes both technologies, like a dual interface tag.
    pub fn dual(behavior: IsoDepBehavior) -> Self {
        MemoryTag {
            iso_dep: Some(behavior),
            ..Self::ultralight()
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            bail!("tag is not connected");
        }
        Ok(())
    }
}

impl TagConnection for MemoryTag {
    fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        if self.fail_connect {
            bail!("tag was lost");
        }
        if self.connected {
            bail!("tag is already connected");
        }
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closes += 1;
        self.connected = false;
        if self.fail_close {
            bail!("close failed");
        }
        Ok(())
    }
}

impl IsoDep for MemoryTag {
    fn transceive(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        self.sent.push(apdu.to_vec());
        if self.fail_transceive {
            bail!("transceive failed");
        }
        match &self.iso_dep {
            Some(IsoDepBehavior::Fixed(response)) => Ok(response.clone()),
            Some(IsoDepBehavior::Emulated(service)) => Ok(service.process_command_apdu(apdu)),
            None => Err(anyhow!("tag has no ISO-DEP interface")),
        }
    }
}

impl MifareUltralight for MemoryTag {
    fn read_pages(&mut self, page: u8) -> Result<[u8; PAGE_SIZE * PAGES_PER_READ]> {
        self.ensure_connected()?;
        let pages = self.pages.as_ref().ok_or_else(|| anyhow!("tag has no pages"))?;
        let start = page as usize;
        if start >= pages.len() {
            bail!("page {} is out of range", page);
        }
        let mut out = [0u8; PAGE_SIZE * PAGES_PER_READ];
        for i in 0..PAGES_PER_READ {
            // READ rolls over past the last page
            let p = pages[(start + i) % pages.len()];
            out[i * PAGE_SIZE..(i + 1) * PAGE_SIZE].copy_from_slice(&p);
        }
        Ok(out)
    }

    fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> Result<()> {
        self.ensure_connected()?;
        if self.fail_write_at == Some(page) {
            bail!("write to page {} failed", page);
        }
        let pages = self.pages.as_mut().ok_or_else(|| anyhow!("tag has no pages"))?;
        let slot = pages
            .get_mut(page as usize)
            .ok_or_else(|| anyhow!("page {} is out of range", page))?;
        *slot = *data;
        self.written.push(page);
        Ok(())
    }
}

impl NfcTag for MemoryTag {
    fn mifare_ultralight(&mut self) -> Option<&mut dyn MifareUltralight> {
        if self.pages.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn iso_dep(&mut self) -> Option<&mut dyn IsoDep> {
        if self.iso_dep.is_some() {
            Some(self)
        } else {
            None
        }
    }
}
