//! Scoped ownership of capture resources.

use mediashrink_platform_core::{AudioGraph, MediaSignal, MediaTrack};

/// Owns the audio graph and every signal acquired for one capture.
///
/// Dropping the guard closes the graph and stops every live track, so each
/// exit path of a capture releases the same resources exactly once.
pub struct CaptureResources<G: AudioGraph, T: MediaTrack> {
    graph: Option<G>,
    active: Option<MediaSignal<T>>,
    spare: Vec<MediaSignal<T>>,
    released: bool,
}

impl<G: AudioGraph, T: MediaTrack> Default for CaptureResources<G, T> {
    fn default() -> Self {
        Self {
            graph: None,
            active: None,
            spare: Vec::new(),
            released: false,
        }
    }
}

impl<G: AudioGraph, T: MediaTrack> CaptureResources<G, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_graph(&mut self, graph: G) {
        if let Some(mut old) = self.graph.replace(graph) {
            old.close();
        }
    }

    pub fn graph_mut(&mut self) -> Option<&mut G> {
        self.graph.as_mut()
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    /// Set the signal the encoder will be bound to.
    pub fn set_active(&mut self, signal: MediaSignal<T>) {
        if let Some(previous) = self.active.replace(signal) {
            self.spare.push(previous);
        }
    }

    pub fn active(&self) -> Option<&MediaSignal<T>> {
        self.active.as_ref()
    }

    /// Keep a signal alive until release without encoding it.
    pub fn keep(&mut self, signal: MediaSignal<T>) {
        if !signal.is_empty() {
            self.spare.push(signal);
        }
    }

    /// Close the graph and stop all tracks. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut stopped = 0;
        for signal in self.active.iter_mut().chain(self.spare.iter_mut()) {
            stopped += signal.tracks().iter().filter(|t| t.is_live()).count();
            signal.stop_all();
        }
        if let Some(graph) = self.graph.as_mut() {
            if !graph.is_closed() {
                graph.close();
            }
        }
        tracing::debug!(tracks_stopped = stopped, "Capture resources released");
    }
}

impl<G: AudioGraph, T: MediaTrack> Drop for CaptureResources<G, T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediashrink_platform_core::TrackKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        tracks_stopped: AtomicUsize,
        graphs_closed: AtomicUsize,
    }

    struct Track(Arc<Counters>, bool);

    impl MediaTrack for Track {
        fn kind(&self) -> TrackKind {
            TrackKind::Audio
        }
        fn label(&self) -> String {
            "t".into()
        }
        fn stop(&mut self) {
            self.1 = false;
            self.0.tracks_stopped.fetch_add(1, Ordering::SeqCst);
        }
        fn is_live(&self) -> bool {
            self.1
        }
    }

    struct Graph(Arc<Counters>, bool);

    impl AudioGraph for Graph {
        fn disconnect(&mut self) {}
        fn close(&mut self) {
            self.1 = true;
            self.0.graphs_closed.fetch_add(1, Ordering::SeqCst);
        }
        fn is_closed(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn drop_releases_everything_once() {
        let counters = Arc::new(Counters::default());
        {
            let mut guard = CaptureResources::new();
            guard.set_graph(Graph(counters.clone(), false));
            guard.set_active(MediaSignal::new(vec![
                Track(counters.clone(), true),
                Track(counters.clone(), true),
            ]));
            guard.keep(MediaSignal::new(vec![Track(counters.clone(), true)]));
            guard.release();
        }
        assert_eq!(counters.tracks_stopped.load(Ordering::SeqCst), 3);
        assert_eq!(counters.graphs_closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replaced_active_signal_is_still_stopped() {
        let counters = Arc::new(Counters::default());
        {
            let mut guard: CaptureResources<Graph, Track> = CaptureResources::new();
            guard.set_active(MediaSignal::new(vec![Track(counters.clone(), true)]));
            guard.set_active(MediaSignal::new(vec![Track(counters.clone(), true)]));
        }
        assert_eq!(counters.tracks_stopped.load(Ordering::SeqCst), 2);
    }
}
