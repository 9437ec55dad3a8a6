//! Capture session state and chunk buffering.

use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::EncodedArtifact;
use serde::{Deserialize, Serialize};

/// State of a capture session.
///
/// Transitions only move forward:
/// `Idle -> Preparing -> Capturing -> Finalizing -> Done`, and any
/// non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session created but not started.
    Idle,
    /// Acquiring the signal, audio graph, and encoder.
    Preparing,
    /// Playback and encoding are running.
    Capturing,
    /// Playback ended; waiting for the encoder to flush.
    Finalizing,
    /// Artifact produced.
    Done,
    /// Terminal failure; buffered chunks were discarded.
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One capture run: ordered chunk buffer plus lifecycle.
#[derive(Debug)]
pub struct CaptureSession {
    label: &'static str,
    state: SessionState,
    chunks: Vec<Vec<u8>>,
    buffered_bytes: u64,
    failure: Option<String>,
}

impl CaptureSession {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: SessionState::Idle,
            chunks: Vec::new(),
            buffered_bytes: 0,
            failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.buffered_bytes
    }

    /// Reason recorded by [`CaptureSession::fail`].
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn transition(&mut self, from: &[SessionState], to: SessionState) -> ShrinkResult<()> {
        if !from.contains(&self.state) {
            return Err(ShrinkError::invalid_state(format!(
                "{} session cannot move from {:?} to {:?}",
                self.label, self.state, to
            )));
        }
        tracing::debug!(session = self.label, from = ?self.state, to = ?to, "Session transition");
        self.state = to;
        Ok(())
    }

    pub fn prepare(&mut self) -> ShrinkResult<()> {
        self.transition(&[SessionState::Idle], SessionState::Preparing)
    }

    pub fn begin_capture(&mut self) -> ShrinkResult<()> {
        self.transition(&[SessionState::Preparing], SessionState::Capturing)
    }

    /// Append an encoder payload. Empty payloads are skipped.
    ///
    /// Returns whether the chunk was kept.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> ShrinkResult<bool> {
        if !matches!(
            self.state,
            SessionState::Capturing | SessionState::Finalizing
        ) {
            return Err(ShrinkError::invalid_state(format!(
                "{} session cannot accept data while {:?}",
                self.label, self.state
            )));
        }
        if chunk.is_empty() {
            return Ok(false);
        }
        self.buffered_bytes += chunk.len() as u64;
        self.chunks.push(chunk);
        Ok(true)
    }

    pub fn finalize(&mut self) -> ShrinkResult<()> {
        self.transition(&[SessionState::Capturing], SessionState::Finalizing)
    }

    /// Concatenate every buffered chunk, in arrival order.
    pub fn complete(&mut self, mime: &str) -> ShrinkResult<EncodedArtifact> {
        self.transition(&[SessionState::Finalizing], SessionState::Done)?;
        let chunks = std::mem::take(&mut self.chunks);
        self.buffered_bytes = 0;
        let artifact = EncodedArtifact::from_chunks(chunks, mime);
        tracing::info!(
            session = self.label,
            size = artifact.size(),
            mime = %artifact.mime(),
            "Capture session complete"
        );
        Ok(artifact)
    }

    /// Move to `Failed` and drop everything buffered. No-op once terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let reason = reason.into();
        tracing::warn!(
            session = self.label,
            state = ?self.state,
            discarded_chunks = self.chunks.len(),
            reason = %reason,
            "Capture session failed"
        );
        self.state = SessionState::Failed;
        self.chunks.clear();
        self.buffered_bytes = 0;
        self.failure = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn capturing() -> CaptureSession {
        let mut session = CaptureSession::new("test");
        session.prepare().unwrap();
        session.begin_capture().unwrap();
        session
    }

    #[test]
    fn test_chunks_concatenate_in_arrival_order() {
        let mut session = capturing();
        session.push_chunk(b"AA".to_vec()).unwrap();
        session.push_chunk(b"B".to_vec()).unwrap();
        session.finalize().unwrap();
        session.push_chunk(b"CCC".to_vec()).unwrap();
        let artifact = session.complete("video/webm").unwrap();
        assert_eq!(artifact.bytes(), b"AABCCC");
        assert_eq!(session.state(), SessionState::Done);
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let mut session = capturing();
        assert!(!session.push_chunk(Vec::new()).unwrap());
        assert!(session.push_chunk(vec![1]).unwrap());
        assert_eq!(session.chunk_count(), 1);
        assert_eq!(session.buffered_bytes(), 1);
    }

    #[test]
    fn test_out_of_order_transitions_are_rejected() {
        let mut session = CaptureSession::new("test");
        assert!(matches!(
            session.begin_capture(),
            Err(ShrinkError::InvalidState { .. })
        ));
        assert!(session.push_chunk(vec![1]).is_err());
        session.prepare().unwrap();
        assert!(session.prepare().is_err());
        assert!(session.complete("video/webm").is_err());
    }

    #[test]
    fn test_failure_discards_buffered_chunks() {
        let mut session = capturing();
        session.push_chunk(vec![1, 2, 3]).unwrap();
        session.fail("encoder exploded");
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.chunk_count(), 0);
        assert_eq!(session.failure(), Some("encoder exploded"));
        assert!(session.push_chunk(vec![4]).is_err());
        assert!(session.finalize().is_err());
    }

    #[test]
    fn test_fail_after_done_keeps_done() {
        let mut session = capturing();
        session.finalize().unwrap();
        session.complete("audio/webm").unwrap();
        session.fail("late");
        assert_eq!(session.state(), SessionState::Done);
        assert!(session.failure().is_none());
    }

    proptest! {
        #[test]
        fn artifact_is_concatenation_of_chunks(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..24)
        ) {
            let mut session = capturing();
            for chunk in &chunks {
                session.push_chunk(chunk.clone()).unwrap();
            }
            session.finalize().unwrap();
            let artifact = session.complete("video/webm").unwrap();

            let expected: Vec<u8> = chunks.concat();
            prop_assert_eq!(artifact.bytes(), expected.as_slice());
        }
    }
}
