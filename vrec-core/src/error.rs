//! Error types for protocol parsing

use thiserror::Error;

/// Errors that can occur when parsing the RFB handshake.
///
/// The container codec itself never fails (truncation is tolerated by
/// design); these errors come from the handshake walk and are soft for
/// the conversion as a whole: the caller logs them and falls back to
/// the default pixel format at stream offset 0.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Stream is too short to contain required data
    #[error("Stream too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Server offered zero security types and supplied a reason
    #[error("Server refused connection: {0}")]
    SecurityFailure(String),

    /// SecurityResult word was nonzero
    #[error("Security handshake failed with status {0}")]
    SecurityResult(u32),

    /// Invalid UTF-8 in string field
    #[error("Invalid string encoding")]
    InvalidString,
}
