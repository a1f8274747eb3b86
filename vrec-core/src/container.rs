//! VREC capture container codec.
//!
//! Binary format for recorded remote-desktop session traffic. The
//! container is append-only while a session is being captured, so the
//! decoder must tolerate a missing trailing record when a session was
//! terminated mid-write.

use std::io::{self, Write};

use crate::timeline::TimelineIndex;

/// Magic bytes for the VREC file header
pub const VREC_MAGIC: [u8; 4] = *b"VREC";

/// Current format version
pub const VREC_VERSION: u16 = 1;

/// Header size in bytes (fixed)
pub const HEADER_SIZE: usize = 12;

/// Fixed per-record header size: direction + timestamp + length
pub const RECORD_HEADER_SIZE: usize = 9;

/// Framebuffer width assumed for headerless (pre-v1) captures
pub const DEFAULT_WIDTH: u16 = 1024;

/// Framebuffer height assumed for headerless (pre-v1) captures
pub const DEFAULT_HEIGHT: u16 = 768;

/// Direction of a captured wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Server-to-client traffic (the replayable RFB stream)
    Server,
    /// Client-to-server traffic (kept for audit, ignored on replay)
    Client,
}

impl Direction {
    /// Parse a direction byte. Unknown values map to `Client` so they
    /// are discarded downstream instead of polluting the server stream.
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Direction::Server,
            _ => Direction::Client,
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Direction::Server => 0,
            Direction::Client => 1,
        }
    }
}

/// File header (12 bytes fixed size)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct VrecHeader {
    /// Initial framebuffer width in pixels
    pub width: u16,
    /// Initial framebuffer height in pixels
    pub height: u16,
}

impl Default for VrecHeader {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// One captured wire message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    /// Which side of the connection sent the payload
    pub direction: Direction,
    /// Capture time in milliseconds since the start of the recording
    pub timestamp_ms: u32,
    /// Raw wire bytes
    pub payload: Vec<u8>,
}

/// Decode a capture file into its header and recorded messages.
///
/// If the first [`HEADER_SIZE`] bytes carry the VREC magic and a known
/// version, the declared width/height become the header; otherwise a
/// default 1024x768 header is used and records are parsed from offset
/// 0, which keeps captures from older format versions readable.
///
/// Truncation is not an error: records are parsed until the remaining
/// bytes cannot hold a full record, and the incomplete tail is
/// silently dropped. Decoding identical bytes always yields identical
/// results.
pub fn decode(bytes: &[u8]) -> (VrecHeader, Vec<RecordedMessage>) {
    let (header, mut pos) = parse_header(bytes);

    let mut messages = Vec::new();
    while bytes.len() - pos >= RECORD_HEADER_SIZE {
        let direction = Direction::from_byte(bytes[pos]);
        let timestamp_ms = u32::from_be_bytes([
            bytes[pos + 1],
            bytes[pos + 2],
            bytes[pos + 3],
            bytes[pos + 4],
        ]);
        let length = u32::from_be_bytes([
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
            bytes[pos + 8],
        ]) as usize;

        // Declared payload length must fit in the remaining bytes,
        // otherwise the record was cut off mid-write and we stop here.
        if bytes.len() - pos - RECORD_HEADER_SIZE < length {
            break;
        }

        let start = pos + RECORD_HEADER_SIZE;
        messages.push(RecordedMessage {
            direction,
            timestamp_ms,
            payload: bytes[start..start + length].to_vec(),
        });
        pos = start + length;
    }

    (header, messages)
}

fn parse_header(bytes: &[u8]) -> (VrecHeader, usize) {
    if bytes.len() >= HEADER_SIZE
        && bytes[0..4] == VREC_MAGIC
        && u16::from_be_bytes([bytes[4], bytes[5]]) == VREC_VERSION
    {
        let header = VrecHeader {
            width: u16::from_be_bytes([bytes[6], bytes[7]]),
            height: u16::from_be_bytes([bytes[8], bytes[9]]),
        };
        (header, HEADER_SIZE)
    } else {
        (VrecHeader::default(), 0)
    }
}

/// Concatenate the server-direction payloads into one contiguous
/// stream, building the timeline index in the same pass: for every
/// server message, the cumulative byte offset before its payload is
/// recorded against its capture timestamp.
pub fn server_stream(messages: &[RecordedMessage]) -> (Vec<u8>, TimelineIndex) {
    let mut stream = Vec::new();
    let mut timeline = TimelineIndex::new();

    for message in messages {
        if message.direction == Direction::Server {
            timeline.push(stream.len(), message.timestamp_ms);
            stream.extend_from_slice(&message.payload);
        }
    }

    (stream, timeline)
}

/// Writer for creating VREC capture files.
///
/// Used by the capture side of the system while a session is live; the
/// decoder above is its inverse.
pub struct VrecWriter<W: Write> {
    writer: W,
    message_count: u64,
}

impl<W: Write> VrecWriter<W> {
    /// Create a new writer, emitting the 12-byte header immediately
    pub fn new(mut writer: W, width: u16, height: u16) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&VREC_MAGIC);
        buf[4..6].copy_from_slice(&VREC_VERSION.to_be_bytes());
        buf[6..8].copy_from_slice(&width.to_be_bytes());
        buf[8..10].copy_from_slice(&height.to_be_bytes());
        // Remaining 2 bytes are reserved (already zeroed)
        writer.write_all(&buf)?;

        Ok(Self {
            writer,
            message_count: 0,
        })
    }

    /// Append one captured wire message
    pub fn write_message(
        &mut self,
        direction: Direction,
        timestamp_ms: u32,
        payload: &[u8],
    ) -> io::Result<()> {
        self.writer.write_all(&[direction.as_byte()])?;
        self.writer.write_all(&timestamp_ms.to_be_bytes())?;
        self.writer.write_all(&(payload.len() as u32).to_be_bytes())?;
        self.writer.write_all(payload)?;
        self.message_count += 1;
        Ok(())
    }

    /// Number of messages written so far
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_messages() -> Vec<(Direction, u32, Vec<u8>)> {
        vec![
            (Direction::Server, 0, vec![1, 2, 3]),
            (Direction::Client, 10, vec![4]),
            (Direction::Server, 250, vec![5, 6, 7, 8, 9]),
            (Direction::Server, 900, vec![]),
        ]
    }

    fn encode_sample(width: u16, height: u16) -> Vec<u8> {
        let mut writer = VrecWriter::new(Vec::new(), width, height).unwrap();
        for (direction, ts, payload) in sample_messages() {
            writer.write_message(direction, ts, &payload).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let bytes = encode_sample(800, 600);
        let (header, messages) = decode(&bytes);

        assert_eq!(header.width, 800);
        assert_eq!(header.height, 600);
        assert_eq!(messages.len(), 4);
        for (message, (direction, ts, payload)) in messages.iter().zip(sample_messages()) {
            assert_eq!(message.direction, direction);
            assert_eq!(message.timestamp_ms, ts);
            assert_eq!(message.payload, payload);
        }
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = encode_sample(800, 600);
        assert_eq!(decode(&bytes), decode(&bytes));
    }

    #[test]
    fn test_headerless_capture_gets_default_header() {
        // Old captures start directly with records.
        let mut bytes = Vec::new();
        bytes.push(0u8); // server
        bytes.extend_from_slice(&123u32.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xaa, 0xbb]);

        let (header, messages) = decode(&bytes);
        assert_eq!(header, VrecHeader::default());
        assert_eq!(header.width, 1024);
        assert_eq!(header.height, 768);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].timestamp_ms, 123);
        assert_eq!(messages[0].payload, vec![0xaa, 0xbb]);
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let bytes = encode_sample(800, 600);

        // Cut into the last record's header, then into its payload.
        for cut in [bytes.len() - 1, bytes.len() - 5] {
            let (_, messages) = decode(&bytes[..cut]);
            assert_eq!(messages.len(), 3, "cut at {}", cut);
            assert_eq!(messages[2].payload, vec![5, 6, 7, 8, 9]);
        }
    }

    #[test]
    fn test_empty_input() {
        let (header, messages) = decode(&[]);
        assert_eq!(header, VrecHeader::default());
        assert!(messages.is_empty());
    }

    #[test]
    fn test_bad_magic_falls_back_to_headerless() {
        let mut bytes = b"NOPE".to_vec();
        bytes.extend_from_slice(&[0u8; 20]);
        let (header, messages) = decode(&bytes);
        assert_eq!(header, VrecHeader::default());
        // The garbage parses as one record with direction byte b'N'.
        assert!(!messages.is_empty());
        assert_eq!(messages[0].direction, Direction::Client);
    }

    #[test]
    fn test_unknown_direction_byte_maps_to_client() {
        assert_eq!(Direction::from_byte(0), Direction::Server);
        assert_eq!(Direction::from_byte(1), Direction::Client);
        assert_eq!(Direction::from_byte(7), Direction::Client);
    }

    #[test]
    fn test_server_stream_concatenation_and_timeline() {
        let bytes = encode_sample(800, 600);
        let (_, messages) = decode(&bytes);
        let (stream, timeline) = server_stream(&messages);

        // Client payloads are discarded.
        assert_eq!(stream, vec![1, 2, 3, 5, 6, 7, 8, 9]);
        assert_eq!(timeline.lookup(0), 0);
        assert_eq!(timeline.lookup(2), 0);
        assert_eq!(timeline.lookup(3), 250);
        assert_eq!(timeline.lookup(7), 250);
        // Offset 8 is the empty message's breakpoint.
        assert_eq!(timeline.lookup(8), 900);
        assert_eq!(timeline.lookup(1000), 900);
    }
}
