use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use serde::Serialize;

use crate::nfc::protocol::decode_ascii;
use crate::nfc::{
    bytes_to_hex, detect_technology, hex_to_bytes, ndef, read_fixed_record, CardError,
    CardProtocol, NfcReader, NfcTag, PcscTag, Technology,
};

#[derive(Debug, Serialize)]
pub struct TagInfo {
    pub reader: String,
    pub atr: String,
    pub technology: Technology,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_offset: Option<u8>,
}

impl TagInfo {
    fn new(tag: &mut PcscTag) -> Self {
        TagInfo {
            reader: tag.reader_name(),
            atr: bytes_to_hex(tag.atr()),
            technology: detect_technology(tag),
            text: None,
            payload: None,
            page_offset: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BeamInfo {
    pub amount: f32,
    pub record_type: String,
    pub payload: String,
}

pub fn list_readers() -> Result<Vec<String>> {
    NfcReader::new()?.list_readers()
}

/// One reader, one configuration; every call waits for a fresh tag.
pub struct Session {
    reader: NfcReader,
    reader_name: Option<String>,
    timeout: Duration,
    protocol: CardProtocol,
}

impl Session {
    pub fn new(reader_name: Option<String>, timeout: Duration, protocol: CardProtocol) -> Result<Self> {
        Ok(Session {
            reader: NfcReader::new()?,
            reader_name,
            timeout,
            protocol,
        })
    }

    fn wait_for_card(&self) -> Result<PcscTag> {
        self.reader
            .wait_for_card(self.reader_name.as_deref(), self.timeout)
            .context("no tag detected, make sure the tag is on the reader")
    }

    pub fn detect(&self) -> Result<TagInfo> {
        let mut tag = self.wait_for_card()?;
        Ok(TagInfo::new(&mut tag))
    }

    /// SELECTs the configured AID.
    pub fn select(&self) -> Result<TagInfo> {
        let mut tag = self.wait_for_card()?;
        let mut info = TagInfo::new(&mut tag);

        let payload = self
            .protocol
            .select(&mut tag)
            .with_context(|| format!("SELECT {} failed", self.protocol.config().aid))?;

        info.text = Some(decode_ascii(&payload));
        info.payload = Some(bytes_to_hex(&payload));
        Ok(info)
    }

    /// Registers `name` on the tag and reads it back to make sure it stuck.
    pub fn write_card(&self, name: &str) -> Result<TagInfo> {
        let mut tag = self.wait_for_card()?;
        let mut info = TagInfo::new(&mut tag);

        let record = self.protocol.write_card(&mut tag, name).context("write failed")?;
        let read_back = self.protocol.read_card(&mut tag).context("could not read the record back")?;
        if read_back != record.trim() {
            bail!("write did not stick: wrote {:?}, read {:?}", record.trim(), read_back);
        }
        info!("{} registered", read_back);

        info.text = Some(record);
        info.page_offset = Some(self.protocol.config().page_offset);
        Ok(info)
    }

    /// Raw record, padding included.
    pub fn read_record(&self, page_count: Option<u8>) -> Result<TagInfo> {
        let config = self.protocol.config();
        let mut tag = self.wait_for_card()?;
        let mut info = TagInfo::new(&mut tag);

        let ultralight = tag
            .mifare_ultralight()
            .ok_or(CardError::Unsupported(Technology::MifareUltralight))?;
        let text = read_fixed_record(
            ultralight,
            config.page_offset,
            page_count.unwrap_or(config.page_count),
        )?;

        info.payload = Some(bytes_to_hex(text.as_bytes()));
        info.text = Some(text);
        info.page_offset = Some(config.page_offset);
        Ok(info)
    }

    pub fn read_card(&self) -> Result<TagInfo> {
        let mut tag = self.wait_for_card()?;
        let mut info = TagInfo::new(&mut tag);
        info.text = Some(self.protocol.read_card(&mut tag)?);
        Ok(info)
    }
}

/// Decodes a Beam NDEF message given as hex.
pub fn beam_decode(message_hex: &str) -> Result<BeamInfo> {
    let message = hex_to_bytes(message_hex)?;
    let record = ndef::first_record(&message)?;
    Ok(BeamInfo {
        amount: ndef::beam_amount(&message)?,
        record_type: String::from_utf8_lossy(&record.record_type).into_owned(),
        payload: bytes_to_hex(&record.payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_decode_reports_amount() {
        let message = bytes_to_hex(&ndef::beam_record(4.5).to_bytes().unwrap());
        let info = beam_decode(&message).unwrap();
        assert_eq!(info.amount, 4.5);
        assert_eq!(info.record_type, ndef::BEAM_MIME_TYPE);
        assert_eq!(info.payload, "4090000000000000");
    }

    #[test]
    fn beam_decode_rejects_bad_hex() {
        assert!(beam_decode("D2X").is_err());
    }
}
