//! # vrec-core
//!
//! Platform-independent decoding library for VREC session captures.
//!
//! A `.vrec` file stores the interleaved, timestamped client/server
//! wire traffic of a recorded remote-desktop (VNC/RFB) session. This
//! crate decodes that container, replays the server-direction RFB
//! stream through a framebuffer state machine, and maps stream byte
//! offsets back to capture timestamps so a caller can re-pace the
//! reconstructed frames.
//!
//! ## File Format
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Header (12 bytes)        │  magic "VREC", version, width, height
//! ├──────────────────────────┤     (optional; absent in old captures)
//! │ Record 0                 │  direction + timestamp + payload
//! │ Record 1                 │
//! │ ...                      │
//! └──────────────────────────┘
//! ```
//!
//! All multi-byte container fields are big-endian. A file cut short
//! mid-record is not an error: the fully formed records before the cut
//! are returned and the tail is dropped, so captures from abruptly
//! terminated sessions remain readable.
//!
//! ## Key Components
//!
//! - [`container`] - capture container codec ([`container::decode`],
//!   [`container::VrecWriter`])
//! - [`rfb`] - RFB protocol definitions, handshake parser and
//!   framebuffer reconstructor
//! - [`timeline`] - byte-offset to timestamp index
//!
//! No I/O, no async, no logging: pure `&[u8]` → `Result<T>` functions
//! and owned state machines. The caller decides what is fatal and what
//! is logged.

pub mod container;
pub mod error;
pub mod rfb;
pub mod timeline;

pub use container::{decode, Direction, RecordedMessage, VrecHeader, VrecWriter};
pub use error::DecodeError;
pub use rfb::framebuffer::{Framebuffer, Step};
pub use rfb::handshake::parse_handshake;
pub use rfb::PixelFormat;
pub use timeline::TimelineIndex;
