//! Live track-bearing signals.

use serde::{Deserialize, Serialize};

/// Kind of a live media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single live track inside a signal.
pub trait MediaTrack: Send {
    fn kind(&self) -> TrackKind;

    /// Host-specific identifier, for logging.
    fn label(&self) -> String;

    /// Stop producing data and release the underlying source.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// A set of live tracks that can be bound to an incremental encoder.
#[derive(Debug)]
pub struct MediaSignal<T> {
    tracks: Vec<T>,
}

impl<T> Default for MediaSignal<T> {
    fn default() -> Self {
        Self { tracks: Vec::new() }
    }
}

impl<T: MediaTrack> MediaSignal<T> {
    pub fn new(tracks: Vec<T>) -> Self {
        Self { tracks }
    }

    /// A signal made of one video track and one audio track.
    pub fn combine(video: T, audio: T) -> Self {
        Self {
            tracks: vec![video, audio],
        }
    }

    pub fn tracks(&self) -> &[T] {
        &self.tracks
    }

    pub fn has(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind() == kind)
    }

    pub fn count(&self, kind: TrackKind) -> usize {
        self.tracks.iter().filter(|t| t.kind() == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Remove and return the first track of `kind`.
    pub fn take_first(&mut self, kind: TrackKind) -> Option<T> {
        let index = self.tracks.iter().position(|t| t.kind() == kind)?;
        Some(self.tracks.remove(index))
    }

    pub fn push(&mut self, track: T) {
        self.tracks.push(track);
    }

    /// Stop every track that is still live.
    pub fn stop_all(&mut self) {
        for track in self.tracks.iter_mut().filter(|t| t.is_live()) {
            track.stop();
        }
    }
}
