//! Mime type helpers.
//!
//! Mime strings are compared on their essence (`type/subtype`), ignoring
//! parameters such as `codecs=vp9` and letter case.

use serde::{Deserialize, Serialize};

/// Broad media family of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime_essence(mime);
        if essence.starts_with("image/") {
            Self::Image
        } else if essence.starts_with("video/") {
            Self::Video
        } else if essence.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Other
        }
    }
}

/// `type/subtype` part of a mime string, lowercased, parameters dropped.
pub fn mime_essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Output mime for a lossy re-encode of an image.
///
/// PNG, WebP (written lossless), GIF and BMP have no quality dial worth
/// searching, so they are re-encoded as JPEG.
pub fn lossy_output_mime(source_mime: &str) -> String {
    match mime_essence(source_mime).as_str() {
        "image/png" | "image/webp" | "image/gif" | "image/bmp" | "" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

/// Guess a mime type from a file extension.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}

/// Preferred file extension for a mime type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime_essence(mime).as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" => "mp4",
        "audio/mp4" => "m4a",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn essence_drops_codec_parameters() {
        assert_eq!(mime_essence("video/webm; codecs=vp9"), "video/webm");
        assert_eq!(mime_essence("Image/JPEG"), "image/jpeg");
    }

    #[test]
    fn formats_without_a_quality_dial_become_jpeg() {
        assert_eq!(lossy_output_mime("image/png"), "image/jpeg");
        assert_eq!(lossy_output_mime("image/webp"), "image/jpeg");
        assert_eq!(lossy_output_mime("image/gif"), "image/jpeg");
        assert_eq!(lossy_output_mime("image/jpeg"), "image/jpeg");
    }

    #[test]
    fn kind_follows_top_level_type() {
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("audio/webm"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("text/plain"), MediaKind::Other);
    }
}
