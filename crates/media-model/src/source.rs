//! Source media and compression targets.

use std::path::{Path, PathBuf};

use mediashrink_common::error::{ShrinkError, ShrinkResult};
use serde::{Deserialize, Serialize};

use crate::mime::{mime_from_extension, MediaKind};

/// Pixel dimensions of visual media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// An input file as handed to an engine.
///
/// Engines only ever borrow this; it is never mutated once loaded.
#[derive(Debug, Clone)]
pub struct SourceMedia {
    /// Display name (usually the file name).
    pub name: String,

    /// Where the bytes came from, when loaded from disk.
    pub path: Option<PathBuf>,

    /// Declared mime type.
    pub mime: String,

    /// Raw encoded bytes.
    pub bytes: Vec<u8>,

    /// Pixel dimensions, once decoded or inspected.
    pub dimensions: Option<Dimensions>,

    /// Play length in seconds; only known after metadata load.
    pub duration_secs: Option<f64>,
}

impl SourceMedia {
    /// Wrap in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            path: None,
            mime: mime.into(),
            bytes,
            dimensions: None,
            duration_secs: None,
        }
    }

    /// Read a file and guess its mime type from the extension.
    pub fn from_path(path: &Path) -> ShrinkResult<Self> {
        if !path.exists() {
            return Err(ShrinkError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path)?;
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_from_extension)
            .unwrap_or("application/octet-stream");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());

        tracing::debug!(name = %name, mime, size = bytes.len(), "Loaded source media");

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            mime: mime.to_string(),
            bytes,
            dimensions: None,
            duration_secs: None,
        })
    }

    /// Original byte size.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some(Dimensions { width, height });
        self
    }
}

/// The caller's byte budget for one output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompressionTarget(u64);

impl CompressionTarget {
    /// A target of `bytes`. Zero is rejected; any positive value is accepted.
    pub fn new(bytes: u64) -> ShrinkResult<Self> {
        if bytes == 0 {
            return Err(ShrinkError::invalid_target("target size must be positive"));
        }
        Ok(Self(bytes))
    }

    pub fn from_kb(kb: u64) -> ShrinkResult<Self> {
        Self::new(kb.saturating_mul(1024))
    }

    pub fn from_mb(mb: f64) -> ShrinkResult<Self> {
        if !mb.is_finite() || mb <= 0.0 {
            return Err(ShrinkError::invalid_target(format!(
                "target size must be positive, got {mb} MB"
            )));
        }
        Self::new((mb * 1024.0 * 1024.0) as u64)
    }

    pub fn bytes(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_target_is_rejected() {
        assert!(CompressionTarget::new(0).is_err());
        assert!(CompressionTarget::from_mb(0.0).is_err());
        assert!(CompressionTarget::from_mb(f64::NAN).is_err());
        assert_eq!(CompressionTarget::new(1).unwrap().bytes(), 1);
    }

    #[test]
    fn targets_use_binary_units() {
        assert_eq!(CompressionTarget::from_kb(200).unwrap().bytes(), 204_800);
        assert_eq!(CompressionTarget::from_mb(4.0).unwrap().bytes(), 4_194_304);
        assert_eq!(CompressionTarget::from_mb(0.5).unwrap().bytes(), 524_288);
    }

    #[test]
    fn stem_strips_only_last_extension() {
        let media = SourceMedia::from_bytes("clip.final.mp4", "video/mp4", vec![]);
        assert_eq!(media.stem(), "clip.final");
        let media = SourceMedia::from_bytes(".hidden", "video/mp4", vec![]);
        assert_eq!(media.stem(), ".hidden");
    }
}
