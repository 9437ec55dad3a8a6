//! MediaShrink Capture Engine
//!
//! Re-encodes video and extracts audio by playing the source through a host
//! media element and recording the live signal it produces. Output size is
//! controlled by handing the encoder a bitrate derived from the byte target
//! and the play length.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │            VideoTranscoder / AudioExtractor       │
//! │  ┌───────────┐   ┌─────────────┐   ┌───────────┐ │
//! │  │ Media     │──▶│ Audio graph │──▶│ Encoder   │ │
//! │  │ element   │   │ (optional)  │   │ (chunks)  │ │
//! │  └─────┬─────┘   └─────────────┘   └─────┬─────┘ │
//! │        │ time updates / ended            │ data  │
//! │        ▼                                 ▼       │
//! │  ┌─────────────────────────────────────────────┐ │
//! │  │   CaptureSession (ordered chunk buffer)     │ │
//! │  └─────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Hosts plug in through [`mediashrink_platform_core::CaptureHost`]. The
//! [`sim`] host is deterministic and always available; the GStreamer host is
//! behind the `gstreamer` feature.

pub mod bitrate;
pub mod extractor;
pub mod formats;
mod playback;
pub mod resources;
pub mod session;
pub mod sim;
pub mod transcoder;

#[cfg(feature = "gstreamer")]
pub mod backend;

pub use bitrate::*;
pub use extractor::*;
pub use formats::*;
pub use session::*;
pub use transcoder::*;
