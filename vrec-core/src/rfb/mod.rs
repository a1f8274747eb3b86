//! RFB (remote framebuffer) protocol definitions.
//!
//! Only the subset of the protocol needed to replay a captured
//! server-direction stream is modeled here: the handshake layout, the
//! four server message types, and the rectangle encodings the
//! reconstructor understands. Everything else is represented by
//! explicit `Unknown`/`Unsupported` arms so the graceful-degradation
//! paths are visible at the dispatch sites.

pub mod framebuffer;
pub mod handshake;

// =============================================================================
// Constants
// =============================================================================

/// Length of the ProtocolVersion message ("RFB 003.008\n")
pub const PROTOCOL_VERSION_LEN: usize = 12;

/// Security type: no authentication
pub const SECURITY_NONE: u8 = 1;

/// Security type: VNC challenge-response authentication
pub const SECURITY_VNC_AUTH: u8 = 2;

/// Length of the VNC authentication challenge
pub const VNC_AUTH_CHALLENGE_LEN: usize = 16;

/// ServerInit pixel format block length
pub const PIXEL_FORMAT_LEN: usize = 16;

// =============================================================================
// Pixel format
// =============================================================================

/// Pixel format negotiated in ServerInit. Immutable after capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_colour: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl Default for PixelFormat {
    /// The format virtually all guacd-captured sessions use: 32bpp
    /// true-colour with 8-bit channels at shifts 16/8/0.
    fn default() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            true_colour: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }
}

impl PixelFormat {
    /// Parse the 16-byte PIXEL_FORMAT block from ServerInit
    pub fn from_bytes(bytes: &[u8; PIXEL_FORMAT_LEN]) -> Self {
        Self {
            bits_per_pixel: bytes[0],
            depth: bytes[1],
            big_endian: bytes[2] != 0,
            true_colour: bytes[3] != 0,
            red_max: u16::from_be_bytes([bytes[4], bytes[5]]),
            green_max: u16::from_be_bytes([bytes[6], bytes[7]]),
            blue_max: u16::from_be_bytes([bytes[8], bytes[9]]),
            red_shift: bytes[10],
            green_shift: bytes[11],
            blue_shift: bytes[12],
            // bytes 13..16 are padding
        }
    }

    /// Bytes per pixel on the wire (bits rounded up to whole bytes)
    pub fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel as usize).div_ceil(8)
    }
}

// =============================================================================
// Server message types
// =============================================================================

/// Server-to-client message types driving the reconstructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessageType {
    FramebufferUpdate,
    SetColourMapEntries,
    Bell,
    ServerCutText,
    /// Anything else ends the usable stream (not a conversion error)
    Unknown(u8),
}

impl ServerMessageType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => ServerMessageType::FramebufferUpdate,
            1 => ServerMessageType::SetColourMapEntries,
            2 => ServerMessageType::Bell,
            3 => ServerMessageType::ServerCutText,
            other => ServerMessageType::Unknown(other),
        }
    }
}

// =============================================================================
// Rectangle encodings
// =============================================================================

/// Rectangle encodings recognized by the reconstructor.
///
/// Pixel codecs we do not implement (Tight, ZRLE, Hextile, CopyRect,
/// ...) land in `Unsupported`: their byte length cannot be determined
/// without the codec, so decoding of the current update stops there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Uncompressed pixel data
    Raw,
    /// Pseudo-encoding: framebuffer resize
    DesktopSize,
    /// Pseudo-encoding: resize plus per-screen metadata block
    ExtendedDesktopSize,
    /// Pseudo-encoding: no more rectangles in this update
    LastRect,
    /// Any codec we cannot measure, pixel or pseudo
    Unsupported(i32),
}

impl Encoding {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Encoding::Raw,
            -223 => Encoding::DesktopSize,
            -224 => Encoding::LastRect,
            -308 => Encoding::ExtendedDesktopSize,
            other => Encoding::Unsupported(other),
        }
    }
}
