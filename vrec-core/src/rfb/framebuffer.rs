//! Framebuffer reconstructor.
//!
//! A byte-stream-driven state machine that applies server-direction
//! RFB messages to an in-memory BGRA8 pixel buffer. Exactly one
//! reconstructor owns the buffer for the lifetime of one conversion.
//!
//! Known fidelity limit, kept deliberately: the first unrecognized
//! top-level message byte, and the first rectangle using a codec we
//! cannot measure (Tight, ZRLE, Hextile, CopyRect, ...), permanently
//! end decoding of the stream. Captures relying on such codecs come
//! out as truncated but valid videos; regions encoded that way simply
//! never update. Neither case is an error.

use super::{Encoding, PixelFormat, ServerMessageType};

/// Outcome of applying one message at a stream offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Message consumed; continue at this offset
    Advance(usize),
    /// End of the usable stream (unknown message, truncation)
    Halt,
}

/// In-memory pixel grid reconstructed from decoded rectangles.
///
/// Pixels are stored as BGRA8, the exact layout handed to the video
/// encoder. All writes are clipped to the current dimensions.
pub struct Framebuffer {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
    format: PixelFormat,
}

impl Framebuffer {
    /// Create a zeroed framebuffer
    pub fn new(width: u16, height: u16, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            format,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Raw BGRA8 pixel data, row-major, `width * height * 4` bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reallocate to new dimensions, discarding all prior content
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * 4];
    }

    /// Apply the message at `pos` in the concatenated server stream.
    ///
    /// Dispatch is driven purely by the 1-byte message type at the
    /// current offset. Declared lengths that exceed the available
    /// bytes halt the machine without error.
    pub fn apply_message(&mut self, stream: &[u8], pos: usize) -> Step {
        let Some(&type_byte) = stream.get(pos) else {
            return Step::Halt;
        };

        match ServerMessageType::from_byte(type_byte) {
            ServerMessageType::FramebufferUpdate => self.apply_update(stream, pos),
            ServerMessageType::SetColourMapEntries => {
                // type + pad + first-colour:2 + num-colours:2, then
                // 6 bytes per colour. Palette content is irrelevant to
                // a true-colour framebuffer.
                let Some(header) = stream.get(pos..pos + 6) else {
                    return Step::Halt;
                };
                let num_colours = u16::from_be_bytes([header[4], header[5]]) as usize;
                skip(stream, pos, 6 + num_colours * 6)
            }
            ServerMessageType::Bell => Step::Advance(pos + 1),
            ServerMessageType::ServerCutText => {
                // type + pad:3 + length:4, then the text itself.
                let Some(header) = stream.get(pos..pos + 8) else {
                    return Step::Halt;
                };
                let text_len =
                    u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
                skip(stream, pos, 8 + text_len)
            }
            ServerMessageType::Unknown(_) => Step::Halt,
        }
    }

    /// FramebufferUpdate: `type + pad + num_rects:2`, then rectangles.
    fn apply_update(&mut self, stream: &[u8], pos: usize) -> Step {
        let Some(header) = stream.get(pos..pos + 4) else {
            return Step::Halt;
        };
        let num_rects = u16::from_be_bytes([header[2], header[3]]);

        let mut p = pos + 4;
        for _ in 0..num_rects {
            let Some(rect) = stream.get(p..p + 12) else {
                return Step::Halt;
            };
            let x = u16::from_be_bytes([rect[0], rect[1]]);
            let y = u16::from_be_bytes([rect[2], rect[3]]);
            let w = u16::from_be_bytes([rect[4], rect[5]]);
            let h = u16::from_be_bytes([rect[6], rect[7]]);
            let encoding =
                i32::from_be_bytes([rect[8], rect[9], rect[10], rect[11]]);

            match Encoding::from_i32(encoding) {
                Encoding::Raw => {
                    let need = w as usize * h as usize * self.format.bytes_per_pixel();
                    let Some(data) = stream.get(p + 12..p + 12 + need) else {
                        return Step::Halt;
                    };
                    self.blit_raw(x, y, w, h, data);
                    p += 12 + need;
                }
                Encoding::DesktopSize => {
                    self.resize(w, h);
                    p += 12;
                }
                Encoding::ExtendedDesktopSize => {
                    // Trailing metadata block: screen count, 3 bytes
                    // padding, 16 bytes per screen. Content is unused
                    // but must be consumed to keep the stream aligned.
                    let Some(&num_screens) = stream.get(p + 12) else {
                        return Step::Halt;
                    };
                    let block = 4 + num_screens as usize * 16;
                    if p + 12 + block > stream.len() {
                        return Step::Halt;
                    }
                    self.resize(w, h);
                    p += 12 + block;
                }
                Encoding::LastRect => {
                    // No more rectangles in this update.
                    return Step::Advance(p + 12);
                }
                Encoding::Unsupported(_) => {
                    // Byte length is unknowable without the codec:
                    // stop decoding this update and hand the offset of
                    // the rectangle header back to the outer loop.
                    return Step::Advance(p);
                }
            }
        }

        Step::Advance(p)
    }

    /// Write one Raw rectangle into the framebuffer, clipped silently
    /// to `[0,width) x [0,height)`. Bytes of clipped pixels are still
    /// consumed by the caller; only the writes are suppressed.
    fn blit_raw(&mut self, x: u16, y: u16, w: u16, h: u16, data: &[u8]) {
        let bpp = self.format.bytes_per_pixel();
        let mut offset = 0;

        for row in 0..h {
            for col in 0..w {
                let pixel = read_pixel_le(&data[offset..offset + bpp]);
                offset += bpp;

                let fx = x as usize + col as usize;
                let fy = y as usize + row as usize;
                if fx >= self.width as usize || fy >= self.height as usize {
                    continue;
                }

                let idx = (fy * self.width as usize + fx) * 4;
                self.pixels[idx] = channel(pixel, self.format.blue_shift, self.format.blue_max);
                self.pixels[idx + 1] =
                    channel(pixel, self.format.green_shift, self.format.green_max);
                self.pixels[idx + 2] = channel(pixel, self.format.red_shift, self.format.red_max);
                self.pixels[idx + 3] = 255;
            }
        }
    }
}

/// Skip `len` bytes from `pos`, halting when the stream is shorter
fn skip(stream: &[u8], pos: usize, len: usize) -> Step {
    match pos.checked_add(len) {
        Some(end) if end <= stream.len() => Step::Advance(end),
        _ => Step::Halt,
    }
}

/// Assemble a pixel word from little-endian wire bytes
fn read_pixel_le(bytes: &[u8]) -> u32 {
    let mut pixel = 0u32;
    for (i, &b) in bytes.iter().enumerate().take(4) {
        pixel |= (b as u32) << (8 * i);
    }
    pixel
}

/// Extract one colour channel from a pixel word
fn channel(pixel: u32, shift: u8, max: u16) -> u8 {
    ((pixel >> shift) & max as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(width: u16, height: u16) -> Framebuffer {
        Framebuffer::new(width, height, PixelFormat::default())
    }

    fn rect_header(x: u16, y: u16, w: u16, h: u16, encoding: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&x.to_be_bytes());
        buf.extend_from_slice(&y.to_be_bytes());
        buf.extend_from_slice(&w.to_be_bytes());
        buf.extend_from_slice(&h.to_be_bytes());
        buf.extend_from_slice(&encoding.to_be_bytes());
        buf
    }

    fn update(rects: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = vec![0u8, 0];
        buf.extend_from_slice(&(rects.len() as u16).to_be_bytes());
        for rect in rects {
            buf.extend_from_slice(rect);
        }
        buf
    }

    /// Raw rectangle filled with one 32-bit pixel value
    fn raw_rect(x: u16, y: u16, w: u16, h: u16, pixel: u32) -> Vec<u8> {
        let mut buf = rect_header(x, y, w, h, 0);
        for _ in 0..(w as usize * h as usize) {
            buf.extend_from_slice(&pixel.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_raw_rect_pixel_placement() {
        // 0x00FF0000 with shifts 16/8/0 is pure red.
        let mut fb = fb(4, 4);
        let stream = update(&[raw_rect(1, 2, 2, 1, 0x00FF_0000)]);

        assert_eq!(fb.apply_message(&stream, 0), Step::Advance(stream.len()));

        for (px, expected) in [
            ((1usize, 2usize), [0u8, 0, 255, 255]),
            ((2, 2), [0, 0, 255, 255]),
            ((0, 2), [0, 0, 0, 0]),
            ((1, 1), [0, 0, 0, 0]),
        ] {
            let idx = (px.1 * 4 + px.0) * 4;
            assert_eq!(&fb.pixels()[idx..idx + 4], &expected, "pixel {:?}", px);
        }
    }

    #[test]
    fn test_raw_rect_clipped_to_bounds() {
        // 3x3 rectangle at (2,2) on a 4x4 buffer: only the 2x2
        // overlap lands, and the full payload is still consumed.
        let mut fb = fb(4, 4);
        let bell_after = {
            let mut s = update(&[raw_rect(2, 2, 3, 3, 0x0000_FF00)]);
            s.push(2); // Bell
            s
        };

        let step = fb.apply_message(&bell_after, 0);
        assert_eq!(step, Step::Advance(bell_after.len() - 1));

        let idx = (3 * 4 + 3) * 4;
        assert_eq!(&fb.pixels()[idx..idx + 4], &[0, 255, 0, 255]);
        // Offset tracking stayed aligned: the next byte is the Bell.
        assert_eq!(
            fb.apply_message(&bell_after, bell_after.len() - 1),
            Step::Advance(bell_after.len())
        );
    }

    #[test]
    fn test_desktop_size_resizes_and_zeroes() {
        let mut fb = fb(4, 4);
        let fill = update(&[raw_rect(0, 0, 4, 4, 0x00FF_FFFF)]);
        fb.apply_message(&fill, 0);
        assert!(fb.pixels().iter().any(|&b| b != 0));

        let resize = update(&[rect_header(0, 0, 8, 6, -223)]);
        assert_eq!(fb.apply_message(&resize, 0), Step::Advance(resize.len()));
        assert_eq!(fb.width(), 8);
        assert_eq!(fb.height(), 6);
        assert_eq!(fb.pixels().len(), 8 * 6 * 4);
        assert!(fb.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_extended_desktop_size_consumes_screen_block() {
        let mut fb = fb(4, 4);
        let mut rect = rect_header(0, 0, 10, 10, -308);
        rect.push(2); // two screens
        rect.extend_from_slice(&[0u8; 3]); // padding
        rect.extend_from_slice(&[0u8; 32]); // screen descriptors
        let mut stream = update(&[rect]);
        stream.push(2); // Bell right behind the block

        let step = fb.apply_message(&stream, 0);
        assert_eq!(step, Step::Advance(stream.len() - 1));
        assert_eq!(fb.width(), 10);
        assert_eq!(
            fb.apply_message(&stream, stream.len() - 1),
            Step::Advance(stream.len())
        );
    }

    #[test]
    fn test_last_rect_stops_rectangle_processing() {
        // LastRect ends the update immediately; the trailing garbage
        // bytes must never be touched.
        let mut fb = fb(4, 4);
        let mut stream = update(&[rect_header(0, 0, 0, 0, -224)]);
        stream.extend_from_slice(&[0xff; 12]);

        assert_eq!(fb.apply_message(&stream, 0), Step::Advance(4 + 12));
    }

    #[test]
    fn test_unsupported_encoding_halts_update_only() {
        // Tight-encoded rectangle: stop the update at the rectangle
        // header, leaving the offset exactly there for the outer loop.
        let mut fb = fb(4, 4);
        let stream = update(&[
            raw_rect(0, 0, 1, 1, 0x00FF_0000),
            rect_header(1, 0, 1, 1, 7),
        ]);

        let first_rect_len = 12 + 4;
        assert_eq!(
            fb.apply_message(&stream, 0),
            Step::Advance(4 + first_rect_len)
        );
        // The raw rectangle before it still landed.
        assert_eq!(&fb.pixels()[0..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn test_colour_map_bell_and_cut_text_lengths() {
        let mut fb = fb(2, 2);

        let mut colour_map = vec![1u8, 0];
        colour_map.extend_from_slice(&0u16.to_be_bytes());
        colour_map.extend_from_slice(&3u16.to_be_bytes());
        colour_map.extend_from_slice(&[0u8; 18]);
        assert_eq!(
            fb.apply_message(&colour_map, 0),
            Step::Advance(colour_map.len())
        );

        assert_eq!(fb.apply_message(&[2u8], 0), Step::Advance(1));

        let mut cut_text = vec![3u8, 0, 0, 0];
        cut_text.extend_from_slice(&5u32.to_be_bytes());
        cut_text.extend_from_slice(b"hello");
        assert_eq!(fb.apply_message(&cut_text, 0), Step::Advance(cut_text.len()));
    }

    #[test]
    fn test_unknown_message_type_halts() {
        let mut fb = fb(2, 2);
        assert_eq!(fb.apply_message(&[42u8, 0, 0], 0), Step::Halt);
    }

    #[test]
    fn test_truncated_messages_halt_without_panic() {
        let mut fb = fb(4, 4);

        // Raw rectangle whose declared pixels exceed the stream.
        let mut short_update = update(&[rect_header(0, 0, 4, 4, 0)]);
        short_update.extend_from_slice(&[0u8; 7]);
        assert_eq!(fb.apply_message(&short_update, 0), Step::Halt);

        // Cut text whose declared length exceeds the stream.
        let mut cut_text = vec![3u8, 0, 0, 0];
        cut_text.extend_from_slice(&100u32.to_be_bytes());
        cut_text.extend_from_slice(b"short");
        assert_eq!(fb.apply_message(&cut_text, 0), Step::Halt);

        // Update truncated inside a rectangle header.
        let stub = vec![0u8, 0, 0, 2, 0, 0];
        assert_eq!(fb.apply_message(&stub, 0), Step::Halt);

        // Empty stream.
        assert_eq!(fb.apply_message(&[], 0), Step::Halt);
    }
}
