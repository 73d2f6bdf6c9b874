use log::{debug, info};

use super::apdu::{build_select_apdu, ApduResponse, ApplicationId};
use super::card_trait::{Connection, IsoDep, MifareUltralight, NfcTag, Technology, PAGES_PER_READ, PAGE_SIZE};
use super::error::{CardError, Result};
use super::hex_codec::bytes_to_hex;

/// First user page; pages 0-3 hold the UID, lock bytes and OTP area.
pub const RECORD_PAGE_OFFSET: u8 = 4;

/// Pages taken by one record.
pub const RECORD_PAGES: u8 = 4;

/// Length in characters of a card record.
pub const RECORD_LEN: usize = RECORD_PAGES as usize * PAGE_SIZE;

/// Which technology to talk to. MIFARE Ultralight wins when a tag exposes both.
pub fn detect_technology<T: NfcTag + ?Sized>(tag: &mut T) -> Technology {
    if tag.mifare_ultralight().is_some() {
        Technology::MifareUltralight
    } else if tag.iso_dep().is_some() {
        Technology::IsoDep
    } else {
        Technology::Unsupported
    }
}

/// SELECTs `aid` over ISO-DEP and returns the payload that came back with `90 00`.
pub fn select_and_transceive<T: IsoDep + ?Sized>(tag: &mut T, aid: &ApplicationId) -> Result<Vec<u8>> {
    let mut conn = Connection::open(tag)?;

    info!("requesting remote AID: {}", aid);
    let command = build_select_apdu(aid).to_bytes();
    debug!("sending: {}", bytes_to_hex(&command));

    let response = conn.transceive(&command)?;
    debug!("received: {}", bytes_to_hex(&response));

    let payload = ApduResponse::parse(&response)?.into_payload()?;
    conn.release()?;
    Ok(payload)
}

/// Writes `text` four characters per page starting at `page_offset`.
///
/// Pages are written in order and never rolled back. If the link fails part
/// way the error is [`CardError::PartialWrite`] with the number of pages that
/// did reach the tag.
pub fn write_fixed_record<T: MifareUltralight + ?Sized>(tag: &mut T, page_offset: u8, text: &str) -> Result<()> {
    if !text.is_ascii() {
        return Err(CardError::invalid(format!("record `{}` is not ASCII", text)));
    }
    if text.len() % PAGE_SIZE != 0 {
        return Err(CardError::invalid(format!(
            "record length {} is not a multiple of the {} byte page size",
            text.len(),
            PAGE_SIZE
        )));
    }
    let pages = text.len() / PAGE_SIZE;
    check_page_range(page_offset, pages)?;
    if pages == 0 {
        return Ok(());
    }

    let mut conn = Connection::open(tag)?;
    for (i, chunk) in text.as_bytes().chunks_exact(PAGE_SIZE).enumerate() {
        let page = page_offset + i as u8;
        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(chunk);

        debug!("writing page {}: {}", page, bytes_to_hex(&data));
        conn.write_page(page, &data).map_err(|source| match i {
            0 => CardError::CardCommunication(source),
            written => CardError::PartialWrite { written, source },
        })?;
    }
    conn.release()?;

    info!("wrote {} page(s) from page {}", pages, page_offset);
    Ok(())
}

/// Reads `page_count` pages from `page_offset` as ASCII. Padding is left in place.
pub fn read_fixed_record<T: MifareUltralight + ?Sized>(tag: &mut T, page_offset: u8, page_count: u8) -> Result<String> {
    let wanted = page_count as usize * PAGE_SIZE;
    check_page_range(page_offset, page_count as usize)?;
    if wanted == 0 {
        return Ok(String::new());
    }

    let mut conn = Connection::open(tag)?;
    let mut bytes = Vec::with_capacity(wanted + PAGE_SIZE * PAGES_PER_READ);
    let mut page = page_offset as usize;
    while bytes.len() < wanted {
        let chunk = conn.read_pages(page as u8)?;
        debug!("read pages {}..{}: {}", page, page + PAGES_PER_READ, bytes_to_hex(&chunk));
        bytes.extend_from_slice(&chunk);
        page += PAGES_PER_READ;
    }
    bytes.truncate(wanted);
    conn.release()?;

    Ok(decode_ascii(&bytes))
}

/// ASCII bytes as text; anything above 0x7F becomes U+FFFD.
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// Right-pads `name` with spaces to `len` characters.
pub fn pad_record(name: &str, len: usize) -> Result<String> {
    if !name.is_ascii() {
        return Err(CardError::invalid(format!("name `{}` is not ASCII", name)));
    }
    if name.len() > len {
        return Err(CardError::invalid(format!("name `{}` is longer than {} characters", name, len)));
    }
    Ok(format!("{:<width$}", name, width = len))
}

fn check_page_range(page_offset: u8, pages: usize) -> Result<()> {
    if pages > 0 && page_offset as usize + pages - 1 > u8::MAX as usize {
        return Err(CardError::invalid(format!(
            "{} page(s) from page {} run past the last addressable page",
            pages, page_offset
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardConfig {
    pub aid: ApplicationId,
    pub page_offset: u8,
    pub page_count: u8,
}

impl Default for CardConfig {
    fn default() -> Self {
        CardConfig {
            aid: ApplicationId::default(),
            page_offset: RECORD_PAGE_OFFSET,
            page_count: RECORD_PAGES,
        }
    }
}

/// The loyalty card operations bound to one configuration.
///
/// Holds no per-tag state, so one value can serve any number of threads as
/// long as each call gets its own tag.
#[derive(Debug, Clone, Default)]
pub struct CardProtocol {
    config: CardConfig,
}

impl CardProtocol {
    pub fn new(config: CardConfig) -> Self {
        CardProtocol { config }
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    pub fn record_len(&self) -> usize {
        self.config.page_count as usize * PAGE_SIZE
    }

    /// Stores `name`, space padded, on a MIFARE Ultralight tag. Returns the record written.
    pub fn write_card<T: NfcTag + ?Sized>(&self, tag: &mut T, name: &str) -> Result<String> {
        let record = pad_record(name, self.record_len())?;
        let ultralight = tag
            .mifare_ultralight()
            .ok_or(CardError::Unsupported(Technology::MifareUltralight))?;
        write_fixed_record(ultralight, self.config.page_offset, &record)?;
        Ok(record)
    }

    /// SELECTs the configured AID over ISO-DEP and returns the raw payload.
    pub fn select<T: NfcTag + ?Sized>(&self, tag: &mut T) -> Result<Vec<u8>> {
        let iso_dep = tag.iso_dep().ok_or(CardError::Unsupported(Technology::IsoDep))?;
        select_and_transceive(iso_dep, &self.config.aid)
    }

    /// Reads the card holder's identifier with whichever technology the tag offers, trimmed.
    pub fn read_card<T: NfcTag + ?Sized>(&self, tag: &mut T) -> Result<String> {
        let text = match detect_technology(tag) {
            Technology::MifareUltralight => {
                let ultralight = tag
                    .mifare_ultralight()
                    .ok_or(CardError::Unsupported(Technology::MifareUltralight))?;
                read_fixed_record(ultralight, self.config.page_offset, self.config.page_count)?
            }
            Technology::IsoDep => decode_ascii(&self.select(tag)?),
            Technology::Unsupported => return Err(CardError::UnknownTag),
        };
        Ok(text.trim().to_string())
    }
}
