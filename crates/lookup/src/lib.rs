//! MediaShrink link lookup.
//!
//! Resolves a share link from a short-video platform into its metadata and
//! direct, watermark-free download links. The engines never call this; it
//! backs the `lookup` command.

pub mod tikwm;

pub use tikwm::TikwmLookup;

use mediashrink_common::error::{ShrinkError, ShrinkResult};
use serde::{Deserialize, Serialize};

/// Host fragment every accepted link must contain.
pub const ACCEPTED_HOST: &str = "tiktok.com";

/// Uploader of a looked-up video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub nickname: String,
    pub avatar: String,
}

/// What a lookup returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMetadata {
    pub title: String,
    /// Thumbnail URL.
    pub cover: String,
    pub author: Author,
    /// Watermark-free video URL.
    pub play: String,
    /// Audio track URL.
    pub music: String,
}

/// A remote metadata service.
#[async_trait::async_trait]
pub trait LinkLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, url: &str) -> ShrinkResult<VideoMetadata>;
}

/// Reject links that cannot belong to the supported platform.
pub fn validate_link(url: &str) -> ShrinkResult<()> {
    if url.contains(ACCEPTED_HOST) {
        Ok(())
    } else {
        Err(ShrinkError::lookup(format!(
            "not a {ACCEPTED_HOST} link: {url}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_platform_links_pass() {
        assert!(validate_link("https://www.tiktok.com/@user/video/123").is_ok());
        assert!(validate_link("https://vm.tiktok.com/ZMabc/").is_ok());
        assert!(validate_link("https://youtube.com/watch?v=1").is_err());
    }

    #[test]
    fn metadata_tolerates_missing_fields() {
        let meta: VideoMetadata = serde_json::from_str(r#"{ "title": "clip" }"#).unwrap();
        assert_eq!(meta.title, "clip");
        assert!(meta.play.is_empty());
        assert!(meta.author.nickname.is_empty());
    }
}
