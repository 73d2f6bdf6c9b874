//! NDEF record framing and the Beam payment payload.

use log::debug;

use super::error::{CardError, Result};

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const TNF_MIME_MEDIA: u8 = 0x02;

/// MIME type of the record carrying a transferred amount.
pub const BEAM_MIME_TYPE: &str = "application/com.example.android.beam";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: u8,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl NdefRecord {
    pub fn mime(mime_type: &str, payload: Vec<u8>) -> Self {
        NdefRecord {
            tnf: TNF_MIME_MEDIA,
            record_type: mime_type.as_bytes().to_vec(),
            id: Vec::new(),
            payload,
        }
    }

    /// Encodes the record as a message of its own (MB and ME set).
    ///
    /// The short form is used whenever the payload fits in one length byte.
    /// Type and id lengths are single bytes, so either one past 255 bytes is
    /// `InvalidFormat`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let type_len = u8::try_from(self.record_type.len())
            .map_err(|_| CardError::invalid(format!("NDEF type of {} bytes exceeds 255", self.record_type.len())))?;
        let id_len = u8::try_from(self.id.len())
            .map_err(|_| CardError::invalid(format!("NDEF id of {} bytes exceeds 255", self.id.len())))?;
        let payload_len = u32::try_from(self.payload.len())
            .map_err(|_| CardError::invalid(format!("NDEF payload of {} bytes is too long", self.payload.len())))?;

        let short = self.payload.len() <= u8::MAX as usize;
        let mut header = FLAG_MB | FLAG_ME | (self.tnf & TNF_MASK);
        if short {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        let mut record = vec![header, type_len];
        if short {
            record.push(payload_len as u8);
        } else {
            record.extend_from_slice(&payload_len.to_be_bytes());
        }
        if !self.id.is_empty() {
            record.push(id_len);
        }
        record.extend_from_slice(&self.record_type);
        record.extend_from_slice(&self.id);
        record.extend_from_slice(&self.payload);
        Ok(record)
    }

    /// Parses one record at the start of `bytes`, returning it and the bytes consumed.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = Cursor { bytes, pos: 0 };

        let header = cursor.byte()?;
        if header & FLAG_CF != 0 {
            return Err(CardError::invalid("chunked NDEF records are not supported"));
        }
        let type_len = cursor.byte()? as usize;
        let payload_len = if header & FLAG_SR != 0 {
            cursor.byte()? as usize
        } else {
            let raw = cursor.take(4)?;
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
        };
        let id_len = if header & FLAG_IL != 0 { cursor.byte()? as usize } else { 0 };

        let record = NdefRecord {
            tnf: header & TNF_MASK,
            record_type: cursor.take(type_len)?.to_vec(),
            id: cursor.take(id_len)?.to_vec(),
            payload: cursor.take(payload_len)?.to_vec(),
        };
        Ok((record, cursor.pos))
    }

    pub fn is_mime(&self, mime_type: &str) -> bool {
        self.tnf == TNF_MIME_MEDIA && self.record_type.eq_ignore_ascii_case(mime_type.as_bytes())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CardError::invalid(format!("NDEF record truncated at byte {}", self.bytes.len())))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

/// The first record of an NDEF message; the rest (e.g. an Android application record) is ignored.
pub fn first_record(message: &[u8]) -> Result<NdefRecord> {
    let (record, used) = NdefRecord::parse(message)?;
    debug!("first NDEF record uses {} of {} bytes", used, message.len());
    Ok(record)
}

/// IEEE 754 single, big endian, in the first four of eight bytes.
pub fn encode_amount(amount: f32) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&amount.to_be_bytes());
    bytes
}

pub fn decode_amount(payload: &[u8]) -> Result<f32> {
    match payload.get(..4) {
        Some(b) => Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(CardError::invalid(format!(
            "amount payload of {} bytes is shorter than 4",
            payload.len()
        ))),
    }
}

pub fn beam_record(amount: f32) -> NdefRecord {
    NdefRecord::mime(BEAM_MIME_TYPE, encode_amount(amount).to_vec())
}

/// Extracts the amount from a received Beam message.
pub fn beam_amount(message: &[u8]) -> Result<f32> {
    let record = first_record(message)?;
    if !record.is_mime(BEAM_MIME_TYPE) {
        return Err(CardError::invalid(format!(
            "first record is not {} (TNF {}, type `{}`)",
            BEAM_MIME_TYPE,
            record.tnf,
            String::from_utf8_lossy(&record.record_type)
        )));
    }
    decode_amount(&record.payload)
}
