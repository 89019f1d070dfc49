// MIT License - Copyright (c) 2021 TJForc
// Error types

/// All errors that can occur in the alarmdecoder-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed panel message: {reason}")]
    MalformedMessage { reason: String },

    #[error("Access code required to {action}")]
    CodeRequired { action: &'static str },

    #[error("Zone {zone} has no bypass switch")]
    UnknownZone { zone: u32 },

    #[error("Keypad address {address} is not configured")]
    UnknownKeypad { address: u8 },

    #[error("Channel closed")]
    ChannelClosed,
}

impl BridgeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        BridgeError::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Whether this error comes from the transport and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Io(_) | BridgeError::ChannelClosed)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
