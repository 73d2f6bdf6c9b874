//! Card side of the exchange: a host-emulated loyalty card answering SELECT.

use log::{debug, info};

use super::apdu::{build_select_apdu, ApduResponse, ApplicationId, StatusWord, SELECT_APDU_HEADER};
use super::hex_codec::bytes_to_hex;

pub struct CardService {
    select_command: Vec<u8>,
    account: String,
}

impl CardService {
    /// `account` is returned in ASCII after a successful SELECT.
    pub fn new(aid: &ApplicationId, account: impl Into<String>) -> Self {
        CardService {
            select_command: build_select_apdu(aid).to_bytes(),
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn process_command_apdu(&self, command: &[u8]) -> Vec<u8> {
        debug!("received APDU: {}", bytes_to_hex(command));

        if command == self.select_command.as_slice() {
            info!("application selected, sending account number {}", self.account);
            return ApduResponse {
                payload: self.account.as_bytes().to_vec(),
                status: StatusWord::SUCCESS,
            }
            .to_bytes();
        }

        let status = if command.len() < SELECT_APDU_HEADER.len() {
            StatusWord::WRONG_LENGTH
        } else if command[..SELECT_APDU_HEADER.len()] == SELECT_APDU_HEADER {
            StatusWord::FILE_NOT_FOUND
        } else {
            StatusWord::INS_NOT_SUPPORTED
        };
        status.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CardService {
        CardService::new(&ApplicationId::default(), "ACCT-0042")
    }

    #[test]
    fn answers_select_with_account() {
        let command = build_select_apdu(&ApplicationId::default()).to_bytes();
        let mut expected = b"ACCT-0042".to_vec();
        expected.extend_from_slice(&[0x90, 0x00]);
        assert_eq!(service().process_command_apdu(&command), expected);
    }

    #[test]
    fn other_aid_is_not_found() {
        let other = ApplicationId::from_hex("A0000000041010").unwrap();
        let command = build_select_apdu(&other).to_bytes();
        assert_eq!(service().process_command_apdu(&command), vec![0x6A, 0x82]);
    }

    #[test]
    fn unknown_instruction_and_short_frame() {
        assert_eq!(service().process_command_apdu(&[0x00, 0xB0, 0x00, 0x00]), vec![0x6D, 0x00]);
        assert_eq!(service().process_command_apdu(&[0x00, 0xA4]), vec![0x67, 0x00]);
    }
}
