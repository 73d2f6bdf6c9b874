use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::{CardError, Result};
use super::hex_codec::{bytes_to_hex, hex_to_bytes};

/// AID answered by the loyalty card application.
pub const DEFAULT_AID: &str = "F222333222";

// SELECT header: [CLA | INS | P1 | P2]
// CLA=00 interindustry, INS=A4 SELECT, P1=04 select by DF name, P2=00 first or only occurrence
pub const SELECT_APDU_HEADER: [u8; 4] = [0x00, 0xA4, 0x04, 0x00];

/// Longest data field a short APDU can carry (one byte Lc).
pub const MAX_SHORT_DATA: usize = 255;

/// Application identifier, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationId(Vec<u8>);

impl ApplicationId {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > MAX_SHORT_DATA {
            return Err(CardError::invalid(format!(
                "AID of {} bytes does not fit a one byte length field",
                bytes.len()
            )));
        }
        Ok(ApplicationId(bytes))
    }

    /// Parses the conventional hex form, e.g. `F222333222`.
    pub fn from_hex(text: &str) -> Result<Self> {
        Self::new(hex_to_bytes(text)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes, never in hex characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        ApplicationId(vec![0xF2, 0x22, 0x33, 0x32, 0x22])
    }
}

impl FromStr for ApplicationId {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bytes_to_hex(&self.0))
    }
}

/// Short command APDU: `CLA INS P1 P2 Lc data`.
///
/// Lc is never stored; it is computed from `data` when serializing, so it
/// always matches the data length. It is written even when `data` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    pub class: u8,
    pub instruction: u8,
    pub p1: u8,
    pub p2: u8,
    data: Vec<u8>,
}

impl Apdu {
    pub fn new(header: [u8; 4], data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_SHORT_DATA {
            return Err(CardError::invalid(format!(
                "command data of {} bytes exceeds {} bytes",
                data.len(),
                MAX_SHORT_DATA
            )));
        }
        let [class, instruction, p1, p2] = header;
        Ok(Apdu {
            class,
            instruction,
            p1,
            p2,
            data,
        })
    }

    pub fn header(&self) -> [u8; 4] {
        [self.class, self.instruction, self.p1, self.p2]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(5 + self.data.len());
        bytes.extend_from_slice(&self.header());
        bytes.push(self.data.len() as u8);
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

/// Builds `00 A4 04 00 <Lc> <AID>`.
pub fn build_select_apdu(aid: &ApplicationId) -> Apdu {
    // ApplicationId already enforces the 255 byte bound.
    Apdu {
        class: SELECT_APDU_HEADER[0],
        instruction: SELECT_APDU_HEADER[1],
        p1: SELECT_APDU_HEADER[2],
        p2: SELECT_APDU_HEADER[3],
        data: aid.as_bytes().to_vec(),
    }
}

/// Trailing SW1 SW2 of every response APDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StatusWord(pub [u8; 2]);

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord([0x90, 0x00]);
    pub const WRONG_LENGTH: StatusWord = StatusWord([0x67, 0x00]);
    pub const FILE_NOT_FOUND: StatusWord = StatusWord([0x6A, 0x82]);
    pub const INS_NOT_SUPPORTED: StatusWord = StatusWord([0x6D, 0x00]);

    pub fn sw1(&self) -> u8 {
        self.0[0]
    }

    pub fn sw2(&self) -> u8 {
        self.0[1]
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.0[0], self.0[1])
    }
}

/// A response split into payload and status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub payload: Vec<u8>,
    pub status: StatusWord,
}

impl ApduResponse {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < 2 {
            return Err(CardError::ProtocolViolation(buffer.len()));
        }
        let (payload, sw) = buffer.split_at(buffer.len() - 2);
        Ok(ApduResponse {
            payload: payload.to_vec(),
            status: StatusWord([sw[0], sw[1]]),
        })
    }

    /// The payload when the status word is exactly `90 00`.
    pub fn into_payload(self) -> Result<Vec<u8>> {
        if self.status.is_success() {
            Ok(self.payload)
        } else {
            Err(CardError::Rejected(self.status))
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.payload.clone();
        bytes.extend_from_slice(&self.status.0);
        bytes
    }
}
