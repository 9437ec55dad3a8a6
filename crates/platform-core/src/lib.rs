//! MediaShrink platform core contracts.
//!
//! The re-encoding engines never talk to a codec, a media player, or an
//! audio stack directly. They drive the capability traits defined here, and
//! each host (the `image` crate, GStreamer, the deterministic simulator)
//! provides an implementation.

pub mod bitmap;
pub mod capture;
pub mod signal;

pub use bitmap::*;
pub use capture::*;
pub use signal::*;
