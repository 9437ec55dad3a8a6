//! Output format negotiation.

use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::mime_essence;

/// Single format used for audio extraction.
pub const AUDIO_FORMAT: &str = "audio/webm";

/// A format the host accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFormat {
    /// Full mime handed to the encoder, codecs parameter included.
    pub mime: String,
    /// Container mime of the produced artifact.
    pub container: String,
}

impl SelectedFormat {
    pub fn new(mime: impl Into<String>) -> Self {
        let mime = mime.into();
        let container = mime_essence(&mime);
        Self { mime, container }
    }
}

/// Pick the first entry of `preference` the host can record.
pub fn select_format<F>(preference: &[String], is_supported: F) -> ShrinkResult<SelectedFormat>
where
    F: Fn(&str) -> bool,
{
    match preference.iter().find(|mime| is_supported(mime)) {
        Some(mime) => {
            tracing::info!(format = %mime, "Selected recording format");
            Ok(SelectedFormat::new(mime.as_str()))
        }
        None => Err(ShrinkError::unsupported(format!(
            "no supported recording format among [{}]",
            preference.join(", ")
        ))),
    }
}
