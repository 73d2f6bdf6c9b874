pub mod apdu;
pub mod atr;
pub mod card_trait;
pub mod emulation;
pub mod error;
pub mod hex_codec;
pub mod ndef;
pub mod protocol;

#[cfg(feature = "pcsc")]
pub mod reader;

#[cfg(test)]
pub(crate) mod test_tag;

pub use apdu::{build_select_apdu, Apdu, ApduResponse, ApplicationId, StatusWord, DEFAULT_AID};
pub use card_trait::{Connection, IsoDep, MifareUltralight, NfcTag, TagConnection, Technology, PAGE_SIZE};
pub use emulation::CardService;
pub use error::{CardError, Result};
pub use hex_codec::{bytes_to_hex, hex_to_bytes};
pub use protocol::{
    detect_technology, read_fixed_record, select_and_transceive, write_fixed_record, CardConfig, CardProtocol,
};

#[cfg(feature = "pcsc")]
pub use reader::{NfcReader, PcscTag};
