//! Deterministic simulated capture host.
//!
//! Playback runs on a virtual clock that advances one tick per element event,
//! and the encoder emits exactly `bitrate * media_time / 8` bytes. Nothing
//! sleeps, so a fifteen minute "capture" finishes instantly. Failure
//! injection knobs on [`SimOptions`] reproduce the host quirks the engines
//! must survive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_platform_core::{
    AudioGraph, CaptureHost, EncoderEvent, EncoderOptions, EncoderState, IncrementalEncoder,
    MediaElement, MediaSignal, MediaTrack, PlaybackEvent, TrackKind,
};

/// EBML magic, so simulated output starts like a WebM file.
const HEADER_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Failure injection and encoder behaviour for [`SimHost`].
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Whether elements can produce a live signal.
    pub capture_supported: bool,

    /// Whether audio graphs can be created.
    pub audio_graph_supported: bool,

    /// Formats `is_type_supported` accepts. Whitespace and case are ignored.
    pub supported_formats: Vec<String>,

    /// Emit an encoder error after this many data chunks.
    pub encoder_error_after_chunks: Option<usize>,

    /// Report `Stopped` on its own after this many data chunks, without
    /// waiting for a stop request.
    pub encoder_stop_after_chunks: Option<usize>,

    /// Never report `Stopped` once a stop was requested.
    pub encoder_ignores_stop: bool,

    /// Emit an empty data payload before every real chunk.
    pub emit_empty_chunks: bool,

    /// Bitrate used when the caller does not request one.
    pub default_video_bitrate_bps: u64,

    /// Bitrate used for audio-only signals without a requested bitrate.
    pub default_audio_bitrate_bps: u64,

    /// Container header prepended to the first chunk.
    pub header_bytes: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            capture_supported: true,
            audio_graph_supported: true,
            supported_formats: vec![
                "video/webm; codecs=vp9".to_string(),
                "video/webm; codecs=vp8".to_string(),
                "video/webm".to_string(),
                "audio/webm".to_string(),
            ],
            encoder_error_after_chunks: None,
            encoder_stop_after_chunks: None,
            encoder_ignores_stop: false,
            emit_empty_chunks: false,
            default_video_bitrate_bps: 2_500_000,
            default_audio_bitrate_bps: 128_000,
            header_bytes: 1024,
        }
    }
}

#[derive(Debug, Default)]
struct SimCounters {
    tracks_created: AtomicUsize,
    tracks_stopped: AtomicUsize,
    graphs_created: AtomicUsize,
    graphs_closed: AtomicUsize,
    encoders_created: AtomicUsize,
}

/// Resource accounting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimStats {
    pub tracks_created: usize,
    pub tracks_stopped: usize,
    pub graphs_created: usize,
    pub graphs_closed: usize,
    pub encoders_created: usize,
}

impl SimStats {
    pub fn live_tracks(&self) -> usize {
        self.tracks_created - self.tracks_stopped
    }

    pub fn open_graphs(&self) -> usize {
        self.graphs_created - self.graphs_closed
    }
}

#[derive(Debug, Default)]
struct Timeline {
    position: f64,
    playing: bool,
}

fn lock(timeline: &Mutex<Timeline>) -> MutexGuard<'_, Timeline> {
    timeline.lock().unwrap_or_else(PoisonError::into_inner)
}

fn normalize_mime(mime: &str) -> String {
    mime.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Simulated host.
#[derive(Debug, Clone, Default)]
pub struct SimHost {
    options: SimOptions,
    counters: Arc<SimCounters>,
}

impl SimHost {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            counters: Arc::new(SimCounters::default()),
        }
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            tracks_created: self.counters.tracks_created.load(Ordering::SeqCst),
            tracks_stopped: self.counters.tracks_stopped.load(Ordering::SeqCst),
            graphs_created: self.counters.graphs_created.load(Ordering::SeqCst),
            graphs_closed: self.counters.graphs_closed.load(Ordering::SeqCst),
            encoders_created: self.counters.encoders_created.load(Ordering::SeqCst),
        }
    }

    fn track(&self, kind: TrackKind, element: &SimElement) -> SimTrack {
        let id = self.counters.tracks_created.fetch_add(1, Ordering::SeqCst);
        SimTrack {
            kind,
            id,
            live: true,
            timeline: element.timeline.clone(),
            counters: self.counters.clone(),
        }
    }
}

/// A simulated media element.
#[derive(Debug)]
pub struct SimElement {
    name: String,
    length_secs: f64,
    duration_known: bool,
    tick_secs: f64,
    has_audio: bool,
    error_at_secs: Option<f64>,
    timeline: Arc<Mutex<Timeline>>,
    muted: bool,
    volume: f64,
    tapped: bool,
    ended: bool,
    failed: bool,
}

impl SimElement {
    /// An element playing `length_secs` of media with an audio track.
    pub fn new(name: impl Into<String>, length_secs: f64) -> Self {
        Self {
            name: name.into(),
            length_secs: length_secs.max(0.0),
            duration_known: true,
            tick_secs: 0.25,
            has_audio: true,
            error_at_secs: None,
            timeline: Arc::new(Mutex::new(Timeline::default())),
            muted: true,
            volume: 1.0,
            tapped: false,
            ended: false,
            failed: false,
        }
    }

    /// Report no duration, as if metadata never loaded.
    pub fn with_unknown_duration(mut self) -> Self {
        self.duration_known = false;
        self
    }

    pub fn with_tick(mut self, tick_secs: f64) -> Self {
        if tick_secs.is_finite() && tick_secs > 0.0 {
            self.tick_secs = tick_secs;
        }
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    /// Fail playback once the clock reaches `secs`.
    pub fn with_error_at(mut self, secs: f64) -> Self {
        self.error_at_secs = Some(secs);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the element's audio was routed into a graph.
    pub fn is_tapped(&self) -> bool {
        self.tapped
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.timeline).playing
    }

    fn advance(&mut self) -> Option<PlaybackEvent> {
        let mut timeline = lock(&self.timeline);
        if !timeline.playing {
            return None;
        }
        if let Some(at) = self.error_at_secs {
            if timeline.position >= at {
                timeline.playing = false;
                self.failed = true;
                return Some(PlaybackEvent::Error {
                    message: format!("simulated decode error at {at:.2}s"),
                });
            }
        }
        if timeline.position >= self.length_secs {
            timeline.playing = false;
            self.ended = true;
            return Some(PlaybackEvent::Ended);
        }
        timeline.position = (timeline.position + self.tick_secs).min(self.length_secs);
        Some(PlaybackEvent::TimeUpdate {
            current_secs: timeline.position,
        })
    }
}

#[async_trait::async_trait]
impl MediaElement for SimElement {
    fn duration_secs(&self) -> Option<f64> {
        self.duration_known.then_some(self.length_secs)
    }

    fn current_time_secs(&self) -> f64 {
        lock(&self.timeline).position
    }

    fn seek_to_start(&mut self) -> ShrinkResult<()> {
        lock(&self.timeline).position = 0.0;
        self.ended = false;
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    async fn play(&mut self) -> ShrinkResult<()> {
        if self.failed {
            return Err(ShrinkError::capture(format!(
                "{} cannot play after a playback error",
                self.name
            )));
        }
        let mut timeline = lock(&self.timeline);
        if self.ended {
            timeline.position = 0.0;
            self.ended = false;
        }
        timeline.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        lock(&self.timeline).playing = false;
    }

    async fn next_event(&mut self) -> PlaybackEvent {
        match self.advance() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// A simulated live track.
#[derive(Debug)]
pub struct SimTrack {
    kind: TrackKind,
    id: usize,
    live: bool,
    timeline: Arc<Mutex<Timeline>>,
    counters: Arc<SimCounters>,
}

impl MediaTrack for SimTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        format!("sim-{:?}-{}", self.kind, self.id).to_lowercase()
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.counters.tracks_stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// A simulated audio graph.
#[derive(Debug)]
pub struct SimGraph {
    connected: bool,
    closed: bool,
    counters: Arc<SimCounters>,
}

impl SimGraph {
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl AudioGraph for SimGraph {
    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.connected = false;
            self.counters.graphs_closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Constant-bitrate encoder over the element's virtual clock.
#[derive(Debug)]
pub struct SimEncoder {
    timeline: Arc<Mutex<Timeline>>,
    bits_per_second: u64,
    state: EncoderState,
    encoded_until: f64,
    emitted_bytes: u64,
    chunks: usize,
    header_pending: usize,
    error_after: Option<usize>,
    stop_after: Option<usize>,
    ignores_stop: bool,
    emit_empty: bool,
    empty_sent: bool,
}

impl SimEncoder {
    pub fn bits_per_second(&self) -> u64 {
        self.bits_per_second
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        if self.state == EncoderState::Inactive {
            return None;
        }
        if self.error_after.is_some_and(|limit| self.chunks >= limit) {
            self.state = EncoderState::Inactive;
            return Some(EncoderEvent::Error {
                message: format!("simulated encoder failure after {} chunks", self.chunks),
            });
        }
        if self.state == EncoderState::Recording
            && self.stop_after.is_some_and(|limit| self.chunks >= limit)
        {
            self.state = EncoderState::Inactive;
            return Some(EncoderEvent::Stopped);
        }

        let position = lock(&self.timeline).position;
        if position > self.encoded_until || self.header_pending > 0 {
            if self.emit_empty && !self.empty_sent {
                self.empty_sent = true;
                return Some(EncoderEvent::Data(Vec::new()));
            }
            self.empty_sent = false;
            self.encoded_until = self.encoded_until.max(position);

            let total = (self.bits_per_second as f64 * self.encoded_until / 8.0).floor() as u64;
            let body = total.saturating_sub(self.emitted_bytes);
            self.emitted_bytes = total;

            let fill = (self.chunks % 251) as u8 + 1;
            let mut chunk = Vec::with_capacity(self.header_pending + body as usize);
            if self.header_pending > 0 {
                let mut header = vec![0u8; self.header_pending];
                let magic = HEADER_MAGIC.len().min(header.len());
                header[..magic].copy_from_slice(&HEADER_MAGIC[..magic]);
                chunk.extend_from_slice(&header);
                self.header_pending = 0;
            }
            chunk.resize(chunk.len() + body as usize, fill);
            self.chunks += 1;
            return Some(EncoderEvent::Data(chunk));
        }

        if self.state == EncoderState::Stopping && !self.ignores_stop {
            self.state = EncoderState::Inactive;
            return Some(EncoderEvent::Stopped);
        }
        None
    }
}

#[async_trait::async_trait]
impl IncrementalEncoder for SimEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self) -> ShrinkResult<()> {
        if self.state != EncoderState::Inactive {
            return Err(ShrinkError::invalid_state("encoder already started"));
        }
        self.encoded_until = lock(&self.timeline).position;
        self.emitted_bytes = (self.bits_per_second as f64 * self.encoded_until / 8.0) as u64;
        self.state = EncoderState::Recording;
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == EncoderState::Recording {
            self.state = EncoderState::Stopping;
        }
    }

    async fn next_event(&mut self) -> EncoderEvent {
        match self.poll_event() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

impl CaptureHost for SimHost {
    type Element = SimElement;
    type Track = SimTrack;
    type Graph = SimGraph;
    type Encoder = SimEncoder;

    fn name(&self) -> &str {
        "simulated"
    }

    fn capture_stream(&self, element: &mut SimElement) -> ShrinkResult<MediaSignal<SimTrack>> {
        if !self.options.capture_supported {
            return Err(ShrinkError::unsupported("capture not supported"));
        }
        let mut signal = MediaSignal::new(vec![self.track(TrackKind::Video, element)]);
        if element.has_audio && !element.tapped {
            signal.push(self.track(TrackKind::Audio, element));
        }
        Ok(signal)
    }

    fn create_audio_graph(&self) -> ShrinkResult<SimGraph> {
        if !self.options.audio_graph_supported {
            return Err(ShrinkError::unsupported("audio graph not available"));
        }
        self.counters.graphs_created.fetch_add(1, Ordering::SeqCst);
        Ok(SimGraph {
            connected: false,
            closed: false,
            counters: self.counters.clone(),
        })
    }

    fn route_element_audio(
        &self,
        graph: &mut SimGraph,
        element: &mut SimElement,
    ) -> ShrinkResult<MediaSignal<SimTrack>> {
        if graph.closed {
            return Err(ShrinkError::invalid_state("audio graph already closed"));
        }
        if element.tapped {
            return Err(ShrinkError::capture(format!(
                "{} is already routed into an audio graph",
                element.name
            )));
        }
        if !element.has_audio {
            return Err(ShrinkError::unsupported(format!(
                "{} has no audio track",
                element.name
            )));
        }
        element.tapped = true;
        graph.connected = true;
        Ok(MediaSignal::new(vec![self.track(TrackKind::Audio, element)]))
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        let wanted = normalize_mime(mime);
        self.options
            .supported_formats
            .iter()
            .any(|m| normalize_mime(m) == wanted)
    }

    fn create_encoder(
        &self,
        signal: &MediaSignal<SimTrack>,
        options: &EncoderOptions,
    ) -> ShrinkResult<SimEncoder> {
        if !self.is_type_supported(&options.mime) {
            return Err(ShrinkError::unsupported(format!(
                "cannot record {}",
                options.mime
            )));
        }
        let Some(first) = signal.tracks().first() else {
            return Err(ShrinkError::unsupported("cannot encode an empty signal"));
        };
        let default_bitrate = if signal.has(TrackKind::Video) {
            self.options.default_video_bitrate_bps
        } else {
            self.options.default_audio_bitrate_bps
        };
        self.counters.encoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(SimEncoder {
            timeline: first.timeline.clone(),
            bits_per_second: options.bits_per_second.unwrap_or(default_bitrate),
            state: EncoderState::Inactive,
            encoded_until: 0.0,
            emitted_bytes: 0,
            chunks: 0,
            header_pending: self.options.header_bytes,
            error_after: self.options.encoder_error_after_chunks,
            stop_after: self.options.encoder_stop_after_chunks,
            ignores_stop: self.options.encoder_ignores_stop,
            emit_empty: self.options.emit_empty_chunks,
            empty_sent: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn element_ticks_to_the_end_then_reports_ended() {
        let mut element = SimElement::new("clip", 1.0).with_tick(0.5);
        element.play().await.unwrap();
        assert_eq!(
            element.next_event().await,
            PlaybackEvent::TimeUpdate { current_secs: 0.5 }
        );
        assert_eq!(
            element.next_event().await,
            PlaybackEvent::TimeUpdate { current_secs: 1.0 }
        );
        assert_eq!(element.next_event().await, PlaybackEvent::Ended);
        assert!(!element.is_playing());
    }

    #[test]
    fn type_support_ignores_spacing() {
        let host = SimHost::default();
        assert!(host.is_type_supported("video/webm;codecs=vp9"));
        assert!(host.is_type_supported("VIDEO/WEBM; codecs=vp8"));
        assert!(!host.is_type_supported("video/mp4"));
    }

    #[test]
    fn element_can_only_be_routed_once() {
        let host = SimHost::default();
        let mut element = SimElement::new("clip", 1.0);
        let mut graph = host.create_audio_graph().unwrap();
        host.route_element_audio(&mut graph, &mut element).unwrap();
        let mut second = host.create_audio_graph().unwrap();
        assert!(host.route_element_audio(&mut second, &mut element).is_err());
    }

    #[tokio::test]
    async fn encoder_emits_header_then_constant_bitrate_body() {
        let host = SimHost::new(SimOptions {
            header_bytes: 4,
            ..SimOptions::default()
        });
        let mut element = SimElement::new("clip", 1.0).with_tick(1.0);
        let signal = host.capture_stream(&mut element).unwrap();
        let mut encoder = host
            .create_encoder(
                &signal,
                &EncoderOptions {
                    mime: "video/webm".into(),
                    bits_per_second: Some(8_000),
                },
            )
            .unwrap();
        encoder.start().unwrap();
        match encoder.next_event().await {
            EncoderEvent::Data(chunk) => assert_eq!(chunk, HEADER_MAGIC.to_vec()),
            other => panic!("unexpected {other:?}"),
        }
        element.play().await.unwrap();
        element.next_event().await;
        match encoder.next_event().await {
            EncoderEvent::Data(chunk) => assert_eq!(chunk.len(), 1_000),
            other => panic!("unexpected {other:?}"),
        }
        encoder.stop();
        assert_eq!(encoder.next_event().await, EncoderEvent::Stopped);
    }
}
