use std::ffi::{CStr, CString};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use pcsc::{Card, Context as PcscContext, Disposition, Protocols, ReaderState, Scope, ShareMode, State, MAX_BUFFER_SIZE};

use super::apdu::ApduResponse;
use super::atr;
use super::card_trait::{IsoDep, MifareUltralight, NfcTag, TagConnection, Technology, PAGES_PER_READ, PAGE_SIZE};
use super::hex_codec::bytes_to_hex;

/// PC/SC access to the attached contactless readers.
pub struct NfcReader {
    ctx: PcscContext,
}

impl NfcReader {
    pub fn new() -> Result<Self> {
        let ctx = PcscContext::establish(Scope::User).context("could not connect to the PC/SC service")?;
        Ok(NfcReader { ctx })
    }

    pub fn list_readers(&self) -> Result<Vec<String>> {
        let mut buffer = [0u8; 2048];
        let readers = self.ctx.list_readers(&mut buffer).context("could not list readers")?;
        Ok(readers.map(|r| r.to_string_lossy().into_owned()).collect())
    }

    /// Blocks until a card is present on `reader` (or the first reader) or `timeout` passes.
    pub fn wait_for_card(&self, reader: Option<&str>, timeout: Duration) -> Result<PcscTag> {
        let name = self.pick_reader(reader)?;
        info!("waiting up to {:?} for a tag on {:?}", timeout, name);

        let mut states = vec![ReaderState::new(name.clone(), State::UNAWARE)];
        self.ctx
            .get_status_change(Duration::ZERO, &mut states)
            .context("could not query reader state")?;
        if !states[0].event_state().contains(State::PRESENT) {
            states[0].sync_current_state();
            match self.ctx.get_status_change(timeout, &mut states) {
                Ok(()) => {}
                Err(pcsc::Error::Timeout) => bail!("no tag presented within {:?}", timeout),
                Err(err) => return Err(err).context("error waiting for a tag"),
            }
            if !states[0].event_state().contains(State::PRESENT) {
                bail!("reader {:?} reports no tag", name);
            }
        }

        let atr = states[0].atr().to_vec();
        debug!("ATR: {}", bytes_to_hex(&atr));
        Ok(PcscTag {
            ctx: self.ctx.clone(),
            reader: name,
            technologies: atr::technologies(&atr),
            atr,
            card: None,
        })
    }

    fn pick_reader(&self, wanted: Option<&str>) -> Result<CString> {
        let mut buffer = [0u8; 2048];
        let mut readers = self.ctx.list_readers(&mut buffer).context("could not list readers")?;
        let found: Option<&CStr> = match wanted {
            Some(wanted) => readers.find(|r| r.to_string_lossy() == wanted),
            None => readers.next(),
        };
        match (found, wanted) {
            (Some(reader), _) => Ok(reader.to_owned()),
            (None, Some(wanted)) => Err(anyhow!("reader {:?} is not attached", wanted)),
            (None, None) => Err(anyhow!("no NFC reader attached")),
        }
    }
}

/// A tag sitting on a PC/SC reader.
///
/// Ultralight pages go through the reader's storage card pseudo-APDUs
/// (READ BINARY / UPDATE BINARY with CLA `FF`); ISO-DEP APDUs pass through
/// unchanged.
pub struct PcscTag {
    ctx: PcscContext,
    reader: CString,
    atr: Vec<u8>,
    technologies: Vec<Technology>,
    card: Option<Card>,
}

impl PcscTag {
    pub fn reader_name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    fn card(&self) -> Result<&Card> {
        self.card.as_ref().ok_or_else(|| anyhow!("tag is not connected"))
    }

    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = [0u8; MAX_BUFFER_SIZE];
        debug!("-> {}", bytes_to_hex(command));
        let response = self
            .card()?
            .transmit(command, &mut buffer)
            .context("could not communicate with the tag")?;
        debug!("<- {}", bytes_to_hex(response));
        Ok(response.to_vec())
    }

    /// Sends a reader pseudo-APDU and insists on `90 00`.
    fn storage_command(&self, command: &[u8]) -> Result<Vec<u8>> {
        let response = ApduResponse::parse(&self.transmit(command)?)?;
        if !response.status.is_success() {
            bail!(
                "reader refused command {}: SW1=0x{:02X}, SW2=0x{:02X}",
                bytes_to_hex(command),
                response.status.sw1(),
                response.status.sw2()
            );
        }
        Ok(response.payload)
    }
}

impl TagConnection for PcscTag {
    fn connect(&mut self) -> Result<()> {
        if self.card.is_some() {
            bail!("tag is already connected");
        }
        let card = self
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
            .context("could not connect to the tag, is it still on the reader?")?;
        self.card = Some(card);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.card.take() {
            Some(card) => card
                .disconnect(Disposition::LeaveCard)
                .map_err(|(_, err)| anyhow!(err).context("could not disconnect from the tag")),
            None => Ok(()),
        }
    }
}

impl IsoDep for PcscTag {
    fn transceive(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        self.transmit(apdu)
    }
}

impl MifareUltralight for PcscTag {
    fn read_pages(&mut self, page: u8) -> Result<[u8; PAGE_SIZE * PAGES_PER_READ]> {
        // READ BINARY: FF B0 00 [page] 10
        let data = self.storage_command(&[0xFF, 0xB0, 0x00, page, (PAGE_SIZE * PAGES_PER_READ) as u8])?;
        let mut pages = [0u8; PAGE_SIZE * PAGES_PER_READ];
        if data.len() != pages.len() {
            bail!("read of page {} returned {} bytes instead of {}", page, data.len(), pages.len());
        }
        pages.copy_from_slice(&data);
        Ok(pages)
    }

    fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> Result<()> {
        // UPDATE BINARY: FF D6 00 [page] 04 [data]
        let mut command = vec![0xFF, 0xD6, 0x00, page, PAGE_SIZE as u8];
        command.extend_from_slice(data);
        self.storage_command(&command)?;
        Ok(())
    }
}

impl NfcTag for PcscTag {
    fn mifare_ultralight(&mut self) -> Option<&mut dyn MifareUltralight> {
        if self.technologies.contains(&Technology::MifareUltralight) {
            Some(self)
        } else {
            None
        }
    }

    fn iso_dep(&mut self) -> Option<&mut dyn IsoDep> {
        if self.technologies.contains(&Technology::IsoDep) {
            Some(self)
        } else {
            None
        }
    }
}

impl Drop for PcscTag {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("{:#}", err);
        }
    }
}
