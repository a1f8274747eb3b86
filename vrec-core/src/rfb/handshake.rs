//! RFB handshake parser.
//!
//! Walks the beginning of the concatenated server-direction stream to
//! find where the handshake ends and which pixel format the session
//! negotiated. Layout consumed, in order:
//!
//! ```text
//! ProtocolVersion   12 bytes, skipped
//! SecurityTypes     count:1, then count type bytes
//! (challenge)       16 bytes, only when VNC auth (type 2) is offered
//! SecurityResult    4 bytes BE, nonzero = failure
//! ServerInit        width:2, height:2, PixelFormat:16,
//!                   nameLength:4, name:nameLength
//! ```
//!
//! Every failure here is soft for the conversion: the caller logs it
//! and resumes message parsing from offset 0 with the default pixel
//! format instead of aborting.

use super::{PixelFormat, PIXEL_FORMAT_LEN, PROTOCOL_VERSION_LEN, SECURITY_VNC_AUTH,
    VNC_AUTH_CHALLENGE_LEN};
use crate::error::DecodeError;

/// Parse the handshake at the start of `stream`.
///
/// Returns the byte offset immediately after ServerInit and the
/// negotiated pixel format.
pub fn parse_handshake(stream: &[u8]) -> Result<(usize, PixelFormat), DecodeError> {
    let mut pos = 0;

    // ProtocolVersion, e.g. "RFB 003.008\n". Content is irrelevant.
    take(stream, &mut pos, PROTOCOL_VERSION_LEN)?;

    // SecurityTypes: count, then one byte per offered type.
    let count = take(stream, &mut pos, 1)?[0] as usize;
    if count == 0 {
        // Zero types means the server refused the connection and
        // appended a length-prefixed reason string.
        let reason = read_string(stream, &mut pos)?;
        return Err(DecodeError::SecurityFailure(reason));
    }
    let types = take(stream, &mut pos, count)?;

    // VNC authentication inserts a 16-byte challenge into the
    // server-direction stream before the result word.
    if types.contains(&SECURITY_VNC_AUTH) {
        take(stream, &mut pos, VNC_AUTH_CHALLENGE_LEN)?;
    }

    // SecurityResult: zero on success.
    let result_bytes = take(stream, &mut pos, 4)?;
    let result = u32::from_be_bytes([
        result_bytes[0],
        result_bytes[1],
        result_bytes[2],
        result_bytes[3],
    ]);
    if result != 0 {
        return Err(DecodeError::SecurityResult(result));
    }

    // ServerInit: dimensions, pixel format, desktop name.
    take(stream, &mut pos, 4)?; // width + height, superseded by the capture header
    let format_bytes = take(stream, &mut pos, PIXEL_FORMAT_LEN)?;
    let mut format_array = [0u8; PIXEL_FORMAT_LEN];
    format_array.copy_from_slice(format_bytes);
    let format = PixelFormat::from_bytes(&format_array);

    let name_len_bytes = take(stream, &mut pos, 4)?;
    let name_len = u32::from_be_bytes([
        name_len_bytes[0],
        name_len_bytes[1],
        name_len_bytes[2],
        name_len_bytes[3],
    ]) as usize;
    take(stream, &mut pos, name_len)?;

    Ok((pos, format))
}

/// Consume `len` bytes at `*pos`, advancing the position
fn take<'a>(stream: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], DecodeError> {
    let end = pos.checked_add(len).ok_or(DecodeError::TooShort {
        expected: usize::MAX,
        actual: stream.len(),
    })?;
    if end > stream.len() {
        return Err(DecodeError::TooShort {
            expected: end,
            actual: stream.len(),
        });
    }
    let slice = &stream[*pos..end];
    *pos = end;
    Ok(slice)
}

/// Read a u32-length-prefixed UTF-8 string
fn read_string(stream: &[u8], pos: &mut usize) -> Result<String, DecodeError> {
    let len_bytes = take(stream, pos, 4)?;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    let bytes = take(stream, pos, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidString)
}
