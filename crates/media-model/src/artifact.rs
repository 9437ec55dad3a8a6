//! Encoded output artifacts.

use serde::{Deserialize, Serialize};

/// The encoded output of one engine call.
///
/// Immutable once built; ownership moves to the caller, who decides whether
/// to keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    bytes: Vec<u8>,
    mime: String,
}

impl EncodedArtifact {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Concatenate chunks in the order given.
    pub fn from_chunks<I, C>(chunks: I, mime: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut bytes = Vec::new();
        for chunk in chunks {
            bytes.extend_from_slice(chunk.as_ref());
        }
        Self::new(bytes, mime)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            mime: self.mime.clone(),
            size: self.size(),
        }
    }
}

/// Serializable description of an artifact, without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub mime: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_concatenate_in_given_order() {
        let artifact = EncodedArtifact::from_chunks(
            [b"AA".to_vec(), b"B".to_vec(), b"CCC".to_vec()],
            "video/webm",
        );
        assert_eq!(artifact.bytes(), b"AABCCC");
        assert_eq!(artifact.size(), 6);
        assert_eq!(artifact.mime(), "video/webm");
    }

    #[test]
    fn empty_chunk_list_yields_empty_artifact() {
        let artifact = EncodedArtifact::from_chunks(Vec::<Vec<u8>>::new(), "audio/webm");
        assert_eq!(artifact.size(), 0);
    }
}
