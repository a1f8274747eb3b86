//! Video encoder bridge.
//!
//! Raw BGRA frames are pushed through a blocking pipe into an external
//! ffmpeg process. The blocking writes give natural backpressure: a
//! slow encoder throttles the decode loop with no in-memory frame
//! queue. The [`VideoEncoder`] trait is the seam for tests, which
//! substitute a fake that records written frames.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use log::{debug, warn};

use crate::error::ConvertError;

/// How much captured encoder stderr to attach to an error
const STDERR_TAIL_BYTES: usize = 4096;

/// Sink for fixed-rate raw BGRA8 video frames
pub trait VideoEncoder {
    /// Write one raw frame, exactly `width * height * 4` bytes
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), ConvertError>;

    /// Close the input pipe and wait for the encoder to finalize the
    /// output file. Must be called exactly once.
    fn finish(&mut self) -> Result<(), ConvertError>;
}

/// ffmpeg invocation: raw BGRA on stdin, H.264/yuv420p MP4 out, CRF 23
/// fast preset, moov atom up front for streaming playback.
fn ffmpeg_args(width: u16, height: u16, fps: u32, output: &Path) -> Vec<std::ffi::OsString> {
    let video_size = format!("{}x{}", width, height);
    let framerate = fps.to_string();
    let mut args: Vec<std::ffi::OsString> = vec![
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "bgra".into(),
        "-video_size".into(),
        video_size.into(),
        "-framerate".into(),
        framerate.into(),
        "-i".into(),
        "-".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "fast".into(),
        "-crf".into(),
        "23".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-y".into(),
    ];
    args.push(output.as_os_str().to_owned());
    args
}

/// Encoder backed by a spawned ffmpeg subprocess
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    finished: bool,
}

impl FfmpegEncoder {
    /// Spawn ffmpeg for a `width`x`height` BGRA stream at `fps`,
    /// writing an MP4 to `output`. Dimensions must be even (the
    /// caller pads odd framebuffers before this point).
    pub fn spawn(
        width: u16,
        height: u16,
        fps: u32,
        output: &Path,
    ) -> Result<Self, ConvertError> {
        let args = ffmpeg_args(width, height, fps, output);
        debug!("Starting ffmpeg with args {:?}", args);

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ConvertError::EncoderSpawn)?;

        let stdin = child.stdin.take();
        // Drain stderr concurrently so ffmpeg never blocks on a full
        // stderr pipe; keep the text for diagnostics.
        let stderr = child.stderr.take();
        let stderr_task = stderr.map(|mut pipe| {
            std::thread::spawn(move || {
                let mut output = String::new();
                if let Err(e) = pipe.read_to_string(&mut output) {
                    warn!("Failed to read encoder stderr: {}", e);
                }
                output
            })
        });

        Ok(Self {
            child,
            stdin,
            stderr_task,
            finished: false,
        })
    }

    fn collect_stderr(&mut self) -> String {
        let text = self
            .stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default();
        let tail_start = text.len().saturating_sub(STDERR_TAIL_BYTES);
        text[tail_start..].to_string()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), ConvertError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ConvertError::EncoderWrite(std::io::Error::other("pipe closed")))?;
        stdin.write_all(frame).map_err(ConvertError::EncoderWrite)
    }

    fn finish(&mut self) -> Result<(), ConvertError> {
        // Closing stdin signals end-of-stream; ffmpeg then writes the
        // container trailer and exits.
        drop(self.stdin.take());
        let status = self.child.wait()?;
        self.finished = true;

        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(ConvertError::EncoderExit { status, stderr });
        }
        debug!("Encoder finished: {}", status);
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Abandoned mid-conversion (error path): don't leave an
        // ffmpeg process waiting on a pipe nobody writes to.
        if !self.finished {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ffmpeg_args_contract() {
        let out = PathBuf::from("/tmp/out.mp4");
        let args = ffmpeg_args(100, 80, 10, &out);
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        for pair in [
            ["-f", "rawvideo"],
            ["-pixel_format", "bgra"],
            ["-video_size", "100x80"],
            ["-framerate", "10"],
            ["-c:v", "libx264"],
            ["-preset", "fast"],
            ["-crf", "23"],
            ["-pix_fmt", "yuv420p"],
            ["-movflags", "+faststart"],
        ] {
            let idx = args
                .iter()
                .position(|a| a == pair[0])
                .unwrap_or_else(|| panic!("missing {}", pair[0]));
            assert_eq!(args[idx + 1], pair[1]);
        }
        // Reads raw video from stdin, overwrites the target path.
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"-".to_string()));
        assert!(args.contains(&"-y".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }
}
