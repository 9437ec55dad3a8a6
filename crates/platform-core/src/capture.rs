//! Playback element, incremental encoder, and audio routing contracts.

use mediashrink_common::error::ShrinkResult;

use crate::signal::{MediaSignal, MediaTrack};

/// Lifecycle notifications from a playing media element.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback position advanced.
    TimeUpdate { current_secs: f64 },
    /// Playback reached the end of the media.
    Ended,
    /// The element failed and will not produce further events.
    Error { message: String },
}

/// A media player bound to one source file.
///
/// `next_event` must be cancel-safe: dropping its future before completion
/// must not lose an event.
#[async_trait::async_trait]
pub trait MediaElement: Send {
    /// Play length, once metadata has loaded.
    fn duration_secs(&self) -> Option<f64>;

    fn current_time_secs(&self) -> f64;

    fn seek_to_start(&mut self) -> ShrinkResult<()>;

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    /// Output volume in `[0.0, 1.0]`.
    fn set_volume(&mut self, volume: f64);

    fn volume(&self) -> f64;

    async fn play(&mut self) -> ShrinkResult<()>;

    fn pause(&mut self);

    /// Wait for the next lifecycle event. After `Ended` or `Error` this
    /// never resolves again until playback restarts.
    async fn next_event(&mut self) -> PlaybackEvent;
}

/// Notifications from an incremental encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A chunk of encoded output, in time order.
    Data(Vec<u8>),
    /// The encoder flushed everything and stopped. Terminal.
    Stopped,
    /// The encoder failed. Terminal.
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Inactive,
    Recording,
    Stopping,
}

/// Parameters an encoder is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Output format, possibly with a `codecs=` parameter.
    pub mime: String,
    /// Target bitrate; `None` keeps the host's default quality.
    pub bits_per_second: Option<u64>,
}

/// Encodes a live signal into time-ordered chunks.
#[async_trait::async_trait]
pub trait IncrementalEncoder: Send {
    fn state(&self) -> EncoderState;

    fn start(&mut self) -> ShrinkResult<()>;

    /// Request a stop. Buffered data is still delivered before `Stopped`.
    fn stop(&mut self);

    /// Wait for the next event. Must be cancel-safe.
    async fn next_event(&mut self) -> EncoderEvent;
}

/// An audio processing graph that can tap a media element.
pub trait AudioGraph: Send {
    /// Disconnect the element source from the destination.
    fn disconnect(&mut self);

    /// Release the graph. A closed graph is never reused.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Live capture and audio routing provided by a host environment.
pub trait CaptureHost: Send + Sync {
    type Element: MediaElement;
    type Track: MediaTrack;
    type Graph: AudioGraph;
    type Encoder: IncrementalEncoder;

    /// Host name, for logging.
    fn name(&self) -> &str;

    /// Obtain a live signal carrying whatever the element is playing.
    fn capture_stream(
        &self,
        element: &mut Self::Element,
    ) -> ShrinkResult<MediaSignal<Self::Track>>;

    fn create_audio_graph(&self) -> ShrinkResult<Self::Graph>;

    /// Route the element's audio through `graph` into a fresh destination
    /// stream and return that stream. The destination is never connected to
    /// an audible output.
    fn route_element_audio(
        &self,
        graph: &mut Self::Graph,
        element: &mut Self::Element,
    ) -> ShrinkResult<MediaSignal<Self::Track>>;

    fn is_type_supported(&self, mime: &str) -> bool;

    fn create_encoder(
        &self,
        signal: &MediaSignal<Self::Track>,
        options: &EncoderOptions,
    ) -> ShrinkResult<Self::Encoder>;
}
