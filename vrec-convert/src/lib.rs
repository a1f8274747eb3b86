//! # vrec-convert
//!
//! Converts VREC session captures into standard MP4 video.
//!
//! This crate sits on top of [`vrec_core`] (container codec, RFB
//! replay, timeline) and adds everything that touches the outside
//! world: the fixed-rate frame pacer, the ffmpeg encoder bridge, the
//! blob/metadata store interfaces the surrounding session system
//! plugs into, a background conversion service, and a CLI binary.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    vrec-convert                     │
//! │  ┌────────────┐  ┌─────────────┐  ┌──────────────┐  │
//! │  │ CLI        │  │ Conversion  │  │ Blob / meta  │  │
//! │  │ (clap)     │  │ service     │  │ stores       │  │
//! │  └─────┬──────┘  └──────┬──────┘  └──────────────┘  │
//! │        │                │                           │
//! │        ▼                ▼                           │
//! │  ┌─────────────────────────────────────────────────┐│
//! │  │ convert: decode -> pace -> encode               ││
//! │  │   frames piped into an ffmpeg subprocess        ││
//! │  └─────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Each conversion is single-threaded and owns its framebuffer,
//! timeline and encoder process; concurrent conversions of different
//! recordings are inherently safe.

use clap::Parser;
use std::path::PathBuf;

pub mod config;
pub mod convert;
pub mod encoder;
pub mod error;
pub mod service;
pub mod storage;

pub use convert::{convert_data, convert_file, ConversionSummary, FRAME_RATE};
pub use encoder::{FfmpegEncoder, VideoEncoder};
pub use error::ConvertError;
pub use service::ConversionService;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(name = "vrec-convert", version, about = "Convert a VREC session capture to MP4 video")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Input capture file (.vrec)
    pub input: PathBuf,

    /// Output video file (.mp4)
    pub output: PathBuf,
}
