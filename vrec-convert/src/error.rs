//! Fatal conversion errors.
//!
//! Only the conditions that abort a conversion live here. Handshake
//! failures, unsupported rectangle encodings and truncated container
//! tails are soft: they are logged and the conversion proceeds with
//! best-effort output (see `convert`).

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors that abort a conversion and mark the recording failed
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The capture contains no messages at all
    #[error("Recording is empty")]
    EmptyRecording,

    /// The capture contains no server-direction messages to replay
    #[error("Recording contains no server-direction messages")]
    NoServerMessages,

    /// The encoder process could not be started
    #[error("Failed to start encoder: {0}")]
    EncoderSpawn(#[source] io::Error),

    /// Writing a raw frame into the encoder pipe failed
    #[error("Failed to write frame to encoder: {0}")]
    EncoderWrite(#[source] io::Error),

    /// The encoder exited with a nonzero status
    #[error("Encoder exited with {status}: {stderr}")]
    EncoderExit { status: ExitStatus, stderr: String },

    /// Reading the capture or finalizing the output file failed
    #[error(transparent)]
    Io(#[from] io::Error),
}
