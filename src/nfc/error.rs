use thiserror::Error;

use super::apdu::StatusWord;
use super::card_trait::Technology;

/// Errors raised by the card protocol layer.
///
/// Transport failures keep the transport's own `anyhow::Error` so the reader
/// specific context (PC/SC error codes, reader names) is not lost.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("card communication error: {0}")]
    CardCommunication(#[from] anyhow::Error),

    #[error("write interrupted after {written} page(s): {source}")]
    PartialWrite {
        written: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("card rejected the command with status {0}")]
    Rejected(StatusWord),

    #[error("response of {0} byte(s) is too short to carry a status word")]
    ProtocolViolation(usize),

    #[error("tag does not expose {0}")]
    Unsupported(Technology),

    #[error("tag exposes neither MIFARE Ultralight nor ISO-DEP")]
    UnknownTag,
}

impl CardError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CardError::InvalidFormat(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
