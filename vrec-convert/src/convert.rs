//! Conversion orchestrator and frame pacer.
//!
//! Turns the irregular, protocol-driven screen updates of a captured
//! session into a fixed-rate video with correct wall-clock duration:
//! decode the container, discard client traffic, concatenate the
//! server stream while building the timeline, locate the handshake
//! end, then interleave timestamp lookups, frame emission and message
//! decoding until the stream runs out.
//!
//! Soft failures (handshake parse errors, unsupported encodings,
//! truncated tails) are logged and degrade the output; fatal failures
//! (empty capture, no server traffic, encoder trouble) abort with an
//! error.

use std::fs;
use std::path::Path;

use log::{info, warn};

use vrec_core::container;
use vrec_core::rfb::handshake::parse_handshake;
use vrec_core::rfb::PixelFormat;
use vrec_core::{Framebuffer, Step};

use crate::encoder::{FfmpegEncoder, VideoEncoder};
use crate::error::ConvertError;

/// Fixed output frame rate
pub const FRAME_RATE: u32 = 10;

/// Milliseconds between emitted frames
pub const FRAME_INTERVAL_MS: u64 = 1000 / FRAME_RATE as u64;

/// Result of a completed conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSummary {
    /// Encoded video width (after even-dimension padding)
    pub width: u16,
    /// Encoded video height (after even-dimension padding)
    pub height: u16,
    /// Frames written to the encoder
    pub frames: u64,
    /// Capture duration in milliseconds
    pub duration_ms: u32,
}

/// Emits framebuffer snapshots at the fixed output rate.
///
/// The encoder's frame size is locked at spawn time, so every emitted
/// frame is padded (or clipped, after a mid-stream resize) to the
/// `out_width` x `out_height` the encoder was created with. Padding is
/// zero bytes; odd capture dimensions are rounded up to even values
/// because 4:2:0 chroma subsampling needs them.
struct FramePacer {
    out_width: u16,
    out_height: u16,
    next_emit_ms: u64,
    frames: u64,
    scratch: Vec<u8>,
}

impl FramePacer {
    fn new(out_width: u16, out_height: u16) -> Self {
        Self {
            out_width,
            out_height,
            next_emit_ms: 0,
            frames: 0,
            scratch: vec![0; out_width as usize * out_height as usize * 4],
        }
    }

    /// Emit every frame whose presentation time has arrived
    fn emit_due(
        &mut self,
        current_ts: u32,
        fb: &Framebuffer,
        enc: &mut dyn VideoEncoder,
    ) -> Result<(), ConvertError> {
        while self.next_emit_ms <= current_ts as u64 {
            self.emit(fb, enc)?;
            self.next_emit_ms += FRAME_INTERVAL_MS;
        }
        Ok(())
    }

    /// Emit one snapshot of the framebuffer
    fn emit(&mut self, fb: &Framebuffer, enc: &mut dyn VideoEncoder) -> Result<(), ConvertError> {
        if fb.width() == self.out_width && fb.height() == self.out_height {
            enc.write_frame(fb.pixels())?;
        } else {
            self.scratch.fill(0);
            let copy_width = fb.width().min(self.out_width) as usize * 4;
            let copy_rows = fb.height().min(self.out_height) as usize;
            let src_stride = fb.width() as usize * 4;
            let dst_stride = self.out_width as usize * 4;
            for row in 0..copy_rows {
                let src = &fb.pixels()[row * src_stride..row * src_stride + copy_width];
                self.scratch[row * dst_stride..row * dst_stride + copy_width]
                    .copy_from_slice(src);
            }
            enc.write_frame(&self.scratch)?;
        }
        self.frames += 1;
        Ok(())
    }
}

/// Round up to the nearest even dimension
fn pad_even(dim: u16) -> u16 {
    dim.saturating_add(dim & 1) & !1
}

/// Convert a decoded capture into video frames on `enc`.
///
/// The encoder is created by `make_encoder` once the output dimensions
/// are known; tests pass a factory returning a fake.
pub fn convert_recording<F>(
    bytes: &[u8],
    make_encoder: F,
) -> Result<ConversionSummary, ConvertError>
where
    F: FnOnce(u16, u16) -> Result<Box<dyn VideoEncoder>, ConvertError>,
{
    let (header, messages) = container::decode(bytes);
    if messages.is_empty() {
        return Err(ConvertError::EmptyRecording);
    }
    if !messages
        .iter()
        .any(|m| m.direction == container::Direction::Server)
    {
        return Err(ConvertError::NoServerMessages);
    }

    let (stream, timeline) = container::server_stream(&messages);

    // Handshake failures are soft: fall back to the default pixel
    // format and replay the stream from the start.
    let (mut pos, format) = match parse_handshake(&stream) {
        Ok((offset, format)) => (offset, format),
        Err(e) => {
            warn!("Handshake parse failed, using defaults: {}", e);
            (0, PixelFormat::default())
        }
    };

    let mut fb = Framebuffer::new(header.width, header.height, format);
    let out_width = pad_even(header.width);
    let out_height = pad_even(header.height);
    let mut enc = make_encoder(out_width, out_height)?;
    let mut pacer = FramePacer::new(out_width, out_height);

    while pos < stream.len() {
        let current_ts = timeline.lookup(pos);
        pacer.emit_due(current_ts, &fb, enc.as_mut())?;

        match fb.apply_message(&stream, pos) {
            Step::Advance(next) if next > pos => pos = next,
            // Unknown message, unsupported encoding or truncation:
            // end of the usable stream, never an error.
            _ => break,
        }
    }

    // Guarantee non-empty output even for degenerate captures, and a
    // closing frame when the stream was fully consumed.
    if pacer.frames == 0 || pos >= stream.len() {
        pacer.emit(&fb, enc.as_mut())?;
    }

    enc.finish()?;

    Ok(ConversionSummary {
        width: out_width,
        height: out_height,
        frames: pacer.frames,
        duration_ms: timeline.duration_ms(),
    })
}

/// Convert in-memory capture bytes into an MP4 at `output` via ffmpeg
pub fn convert_data(bytes: &[u8], output: &Path) -> Result<ConversionSummary, ConvertError> {
    let summary = convert_recording(bytes, |width, height| {
        Ok(Box::new(FfmpegEncoder::spawn(
            width, height, FRAME_RATE, output,
        )?))
    })?;
    info!(
        "Converted recording: {}x{}, {} frames, {} ms -> {}",
        summary.width,
        summary.height,
        summary.frames,
        summary.duration_ms,
        output.display()
    );
    Ok(summary)
}

/// Convert a capture file into an MP4 at `output`
pub fn convert_file(input: &Path, output: &Path) -> Result<ConversionSummary, ConvertError> {
    let bytes = fs::read(input)?;
    convert_data(&bytes, output)
}
