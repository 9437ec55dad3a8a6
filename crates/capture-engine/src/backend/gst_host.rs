//! GStreamer capture host.
//!
//! The media element is a `filesrc ! decodebin` pipeline. Binding an encoder
//! to a signal builds the encoder and muxer branches into that same pipeline
//! and terminates it in an `appsink`, whose samples become encoder chunks.
//! Bus EOS is reported as playback end.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::mime_essence;
use mediashrink_platform_core::{
    AudioGraph, CaptureHost, EncoderEvent, EncoderOptions, EncoderState, IncrementalEncoder,
    MediaElement, MediaSignal, MediaTrack, PlaybackEvent, TrackKind,
};
use tokio::sync::mpsc;

const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Tuning for [`GstHost`].
#[derive(Debug, Clone)]
pub struct GstHostOptions {
    /// Play at wall-clock speed, like a browser element. When false the
    /// pipeline runs as fast as decoding allows.
    pub realtime: bool,

    /// Opus bitrate for the audio branch.
    pub audio_bitrate_bps: u32,
}

impl Default for GstHostOptions {
    fn default() -> Self {
        Self {
            realtime: true,
            audio_bitrate_bps: 96_000,
        }
    }
}

/// Encoder and muxer elements for one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatRecipe {
    video_encoder: Option<&'static str>,
    audio_encoder: &'static str,
    muxer: &'static str,
}

impl FormatRecipe {
    fn for_mime(mime: &str) -> Option<Self> {
        let normalized: String = mime
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let webm = |video| FormatRecipe {
            video_encoder: video,
            audio_encoder: "opusenc",
            muxer: "webmmux",
        };
        match normalized.as_str() {
            "video/webm;codecs=vp9" => Some(webm(Some("vp9enc"))),
            "video/webm;codecs=vp8" | "video/webm" => Some(webm(Some("vp8enc"))),
            "video/mp4" => Some(FormatRecipe {
                video_encoder: Some("x264enc"),
                audio_encoder: "avenc_aac",
                muxer: "mp4mux",
            }),
            "audio/webm" => Some(webm(None)),
            // WebM cannot carry H.264.
            _ => None,
        }
    }

    fn elements(&self) -> impl Iterator<Item = &'static str> {
        self.video_encoder
            .into_iter()
            .chain([self.audio_encoder, self.muxer])
    }

    fn video_fragment(&self, bits_per_second: Option<u64>) -> Option<String> {
        let encoder = self.video_encoder?;
        let fragment = match (encoder, bits_per_second) {
            ("x264enc", Some(bps)) => format!(
                "x264enc tune=zerolatency speed-preset=veryfast bitrate={}",
                (bps / 1000).max(1)
            ),
            ("x264enc", None) => "x264enc tune=zerolatency speed-preset=veryfast".to_string(),
            (vpx, Some(bps)) => {
                format!("{vpx} deadline=1 cpu-used=8 end-usage=cbr target-bitrate={bps}")
            }
            (vpx, None) => format!("{vpx} deadline=1 cpu-used=8"),
        };
        Some(fragment)
    }

    fn muxer_fragment(&self) -> String {
        match self.muxer {
            "mp4mux" => "mp4mux name=mux fragment-duration=1000 streamable=true".to_string(),
            other => format!("{other} name=mux streamable=true"),
        }
    }
}

/// Inspected properties of a source file.
#[derive(Debug, Clone, Default)]
struct SourceInfo {
    duration_secs: Option<f64>,
    has_video: bool,
    has_audio: bool,
}

enum BusEvent {
    Eos,
    Error(String),
}

enum SinkEvent {
    Data(Vec<u8>),
    Eos,
}

/// A built pipeline waiting for `play`.
struct PendingPipeline {
    pipeline: gst::Pipeline,
    bus_rx: mpsc::UnboundedReceiver<BusEvent>,
}

struct ElementShared {
    path: PathBuf,
    info: SourceInfo,
    pending: Mutex<Option<PendingPipeline>>,
}

impl ElementShared {
    fn pending(&self) -> MutexGuard<'_, Option<PendingPipeline>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// GStreamer-backed capture host.
#[derive(Debug, Clone, Default)]
pub struct GstHost {
    options: GstHostOptions,
}

impl GstHost {
    pub fn new(options: GstHostOptions) -> ShrinkResult<Self> {
        init_gstreamer()?;
        Ok(Self { options })
    }

    /// Open `path` as a media element. Blocks while the file is inspected.
    pub fn open(&self, path: &Path) -> ShrinkResult<GstMediaElement> {
        if !path.exists() {
            return Err(ShrinkError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let info = inspect(path)?;
        tracing::info!(
            path = %path.display(),
            duration_secs = ?info.duration_secs,
            has_video = info.has_video,
            has_audio = info.has_audio,
            "Inspected media source"
        );
        Ok(GstMediaElement {
            shared: Arc::new(ElementShared {
                path: path.to_path_buf(),
                info,
                pending: Mutex::new(None),
            }),
            running: None,
            muted: true,
            volume: 1.0,
        })
    }

    fn track(&self, kind: TrackKind, element: &GstMediaElement) -> GstTrack {
        GstTrack {
            kind,
            live: true,
            shared: element.shared.clone(),
        }
    }

    fn build_pipeline(
        &self,
        shared: &ElementShared,
        signal: &MediaSignal<GstTrack>,
        recipe: FormatRecipe,
        options: &EncoderOptions,
    ) -> ShrinkResult<String> {
        let path = escape_path(&shared.path);
        let sync = if self.options.realtime { "true" } else { "false" };
        let mut launch = format!(
            "filesrc location=\"{path}\" ! decodebin name=dec {} ! appsink name=sink emit-signals=true sync={sync}",
            recipe.muxer_fragment()
        );

        let want_video = signal.has(TrackKind::Video) && shared.info.has_video;
        match recipe.video_fragment(options.bits_per_second) {
            Some(encoder) if want_video => {
                launch.push_str(&format!(
                    " dec. ! queue ! videoconvert ! {encoder} ! queue ! mux."
                ));
            }
            _ if shared.info.has_video => {
                launch.push_str(" dec. ! videoconvert ! fakesink sync=false");
            }
            _ => {}
        }

        if signal.has(TrackKind::Audio) && shared.info.has_audio {
            let encoder = match recipe.audio_encoder {
                "opusenc" => format!("opusenc bitrate={}", self.options.audio_bitrate_bps),
                other => other.to_string(),
            };
            launch.push_str(&format!(
                " dec. ! queue ! audioconvert ! audioresample ! {encoder} ! queue ! mux."
            ));
        } else if shared.info.has_audio {
            launch.push_str(" dec. ! audioconvert ! fakesink sync=false");
        }
        Ok(launch)
    }
}

impl CaptureHost for GstHost {
    type Element = GstMediaElement;
    type Track = GstTrack;
    type Graph = GstGraph;
    type Encoder = GstEncoder;

    fn name(&self) -> &str {
        "gstreamer"
    }

    fn capture_stream(
        &self,
        element: &mut GstMediaElement,
    ) -> ShrinkResult<MediaSignal<GstTrack>> {
        let info = &element.shared.info;
        if !info.has_video && !info.has_audio {
            return Err(ShrinkError::unsupported(
                "capture not supported: source has no decodable streams",
            ));
        }
        let mut signal = MediaSignal::default();
        if info.has_video {
            signal.push(self.track(TrackKind::Video, element));
        }
        if info.has_audio {
            signal.push(self.track(TrackKind::Audio, element));
        }
        Ok(signal)
    }

    fn create_audio_graph(&self) -> ShrinkResult<GstGraph> {
        if !element_available("audioconvert") || !element_available("audioresample") {
            return Err(ShrinkError::unsupported(
                "audio graph needs the audioconvert and audioresample elements",
            ));
        }
        Ok(GstGraph {
            connected: false,
            closed: false,
        })
    }

    fn route_element_audio(
        &self,
        graph: &mut GstGraph,
        element: &mut GstMediaElement,
    ) -> ShrinkResult<MediaSignal<GstTrack>> {
        if graph.closed {
            return Err(ShrinkError::invalid_state("audio graph already closed"));
        }
        if !element.shared.info.has_audio {
            return Err(ShrinkError::unsupported(format!(
                "{} has no audio stream",
                element.shared.path.display()
            )));
        }
        graph.connected = true;
        Ok(MediaSignal::new(vec![self.track(TrackKind::Audio, element)]))
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        if init_gstreamer().is_err() {
            return false;
        }
        let Some(recipe) = FormatRecipe::for_mime(mime) else {
            return false;
        };
        let is_audio_only = mime_essence(mime).starts_with("audio/");
        recipe
            .elements()
            .filter(|name| !(is_audio_only && Some(*name) == recipe.video_encoder))
            .all(element_available)
    }

    fn create_encoder(
        &self,
        signal: &MediaSignal<GstTrack>,
        options: &EncoderOptions,
    ) -> ShrinkResult<GstEncoder> {
        let recipe = FormatRecipe::for_mime(&options.mime)
            .filter(|_| self.is_type_supported(&options.mime))
            .ok_or_else(|| ShrinkError::unsupported(format!("cannot record {}", options.mime)))?;
        let shared = signal
            .tracks()
            .first()
            .map(|t| t.shared.clone())
            .ok_or_else(|| ShrinkError::unsupported("cannot encode an empty signal"))?;

        let launch = self.build_pipeline(&shared, signal, recipe, options)?;
        tracing::debug!(launch = %launch, "Building capture pipeline");

        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| ShrinkError::capture(format!("Failed to build pipeline: {e}")))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| ShrinkError::capture("Launch string did not produce a pipeline"))?;

        let bus = pipeline
            .bus()
            .ok_or_else(|| ShrinkError::capture("Pipeline has no bus"))?;
        let (bus_tx, bus_rx) = mpsc::unbounded_channel();
        bus.set_sync_handler(move |_, msg| {
            match msg.view() {
                gst::MessageView::Eos(_) => {
                    let _ = bus_tx.send(BusEvent::Eos);
                }
                gst::MessageView::Error(e) => {
                    let _ = bus_tx.send(BusEvent::Error(e.error().to_string()));
                }
                _ => {}
            }
            gst::BusSyncReply::Drop
        });

        let sink = pipeline
            .by_name("sink")
            .ok_or_else(|| ShrinkError::capture("Pipeline has no appsink"))?;
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        let data_tx = sink_tx.clone();
        sink.connect("new-sample", false, move |values| {
            let appsink = values.first()?.get::<gst::Element>().ok()?;
            let sample = appsink.emit_by_name::<Option<gst::Sample>>("pull-sample", &[]);
            if let Some(buffer) = sample.as_ref().and_then(|s| s.buffer()) {
                if let Ok(map) = buffer.map_readable() {
                    let _ = data_tx.send(SinkEvent::Data(map.as_slice().to_vec()));
                }
            }
            Some(gst::FlowReturn::Ok.to_value())
        });
        sink.connect("eos", false, move |_| {
            let _ = sink_tx.send(SinkEvent::Eos);
            None
        });

        *shared.pending() = Some(PendingPipeline {
            pipeline: pipeline.clone(),
            bus_rx,
        });

        Ok(GstEncoder {
            pipeline,
            sink_rx,
            state: EncoderState::Inactive,
            eos_seen: false,
        })
    }
}

struct RunningPipeline {
    pipeline: gst::Pipeline,
    bus_rx: mpsc::UnboundedReceiver<BusEvent>,
    ticker: tokio::time::Interval,
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to shut down playback pipeline");
        }
    }
}

/// A source file played through a GStreamer pipeline.
pub struct GstMediaElement {
    shared: Arc<ElementShared>,
    running: Option<RunningPipeline>,
    muted: bool,
    volume: f64,
}

impl GstMediaElement {
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn has_audio(&self) -> bool {
        self.shared.info.has_audio
    }

    pub fn has_video(&self) -> bool {
        self.shared.info.has_video
    }
}

#[async_trait::async_trait]
impl MediaElement for GstMediaElement {
    fn duration_secs(&self) -> Option<f64> {
        self.shared.info.duration_secs
    }

    fn current_time_secs(&self) -> f64 {
        self.running
            .as_ref()
            .and_then(|r| r.pipeline.query_position::<gst::ClockTime>())
            .map(clock_secs)
            .unwrap_or(0.0)
    }

    fn seek_to_start(&mut self) -> ShrinkResult<()> {
        let Some(running) = &self.running else {
            return Ok(());
        };
        running
            .pipeline
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::ZERO,
            )
            .map_err(|e| ShrinkError::capture(format!("Failed to rewind: {e}")))
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    // Nothing here is audible; volume is tracked for callers only.
    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    async fn play(&mut self) -> ShrinkResult<()> {
        if self.running.is_none() {
            let pending = self
                .shared
                .pending()
                .take()
                .ok_or_else(|| ShrinkError::invalid_state("no encoder is bound to this element"))?;
            let mut ticker = tokio::time::interval(TIME_UPDATE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            self.running = Some(RunningPipeline {
                pipeline: pending.pipeline,
                bus_rx: pending.bus_rx,
                ticker,
            });
        }
        let Some(running) = &self.running else {
            return Err(ShrinkError::invalid_state("pipeline vanished before play"));
        };

        running.pipeline.set_state(gst::State::Playing).map_err(|e| {
            ShrinkError::capture(format!("Failed to start playback pipeline: {e:?}"))
        })?;

        // State changes are async; wait so the source is open before we return.
        let pipeline = running.pipeline.clone();
        let waited = tokio::task::spawn_blocking(move || {
            pipeline.state(gst::ClockTime::from_seconds(10))
        })
        .await
        .map_err(|e| ShrinkError::capture(format!("State wait task failed: {e}")))?;
        match waited {
            (Ok(_), gst::State::Playing, _) => Ok(()),
            (Ok(_), state, _) => {
                tracing::warn!(?state, "Pipeline did not reach Playing state within timeout");
                Ok(())
            }
            (Err(e), _, _) => Err(ShrinkError::capture(format!(
                "Pipeline failed to reach Playing state: {e:?}"
            ))),
        }
    }

    fn pause(&mut self) {
        if let Some(running) = &self.running {
            if let Err(e) = running.pipeline.set_state(gst::State::Paused) {
                tracing::warn!(error = ?e, "Failed to pause playback pipeline");
            }
        }
    }

    async fn next_event(&mut self) -> PlaybackEvent {
        let event = {
            let Some(running) = self.running.as_mut() else {
                return std::future::pending().await;
            };
            loop {
                tokio::select! {
                    msg = running.bus_rx.recv() => match msg {
                        Some(BusEvent::Eos) => break PlaybackEvent::Ended,
                        Some(BusEvent::Error(message)) => break PlaybackEvent::Error { message },
                        None => return std::future::pending().await,
                    },
                    _ = running.ticker.tick() => {
                        if let Some(position) = running.pipeline.query_position::<gst::ClockTime>() {
                            break PlaybackEvent::TimeUpdate {
                                current_secs: clock_secs(position),
                            };
                        }
                    }
                }
            }
        };
        if !matches!(event, PlaybackEvent::TimeUpdate { .. }) {
            // Dropping the pipeline moves it to Null.
            self.running = None;
        }
        event
    }
}

/// A decoded stream of a [`GstMediaElement`].
pub struct GstTrack {
    kind: TrackKind,
    live: bool,
    shared: Arc<ElementShared>,
}

impl MediaTrack for GstTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        format!("{:?}:{}", self.kind, self.shared.path.display())
    }

    fn stop(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Marks that the element's audio is converted in its own pipeline branch
/// instead of being played to an output device.
#[derive(Debug)]
pub struct GstGraph {
    connected: bool,
    closed: bool,
}

impl AudioGraph for GstGraph {
    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn close(&mut self) {
        self.connected = false;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Encoder branch of a capture pipeline, read through its appsink.
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    sink_rx: mpsc::UnboundedReceiver<SinkEvent>,
    state: EncoderState,
    eos_seen: bool,
}

#[async_trait::async_trait]
impl IncrementalEncoder for GstEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self) -> ShrinkResult<()> {
        if self.state != EncoderState::Inactive {
            return Err(ShrinkError::invalid_state("encoder already started"));
        }
        self.state = EncoderState::Recording;
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != EncoderState::Recording {
            return;
        }
        self.state = EncoderState::Stopping;
        if !self.eos_seen && !self.pipeline.send_event(gst::event::Eos::new()) {
            tracing::warn!("Failed to send EOS event; output may be truncated");
        }
    }

    async fn next_event(&mut self) -> EncoderEvent {
        loop {
            if self.state == EncoderState::Inactive {
                return std::future::pending().await;
            }
            if self.eos_seen && self.state == EncoderState::Stopping {
                self.state = EncoderState::Inactive;
                return EncoderEvent::Stopped;
            }
            match self.sink_rx.recv().await {
                Some(SinkEvent::Data(bytes)) => return EncoderEvent::Data(bytes),
                Some(SinkEvent::Eos) => {
                    tracing::debug!("Appsink reached EOS");
                    self.eos_seen = true;
                }
                None if self.state == EncoderState::Stopping => {
                    self.state = EncoderState::Inactive;
                    return EncoderEvent::Stopped;
                }
                None => {
                    self.state = EncoderState::Inactive;
                    return EncoderEvent::Error {
                        message: "appsink closed unexpectedly".to_string(),
                    };
                }
            }
        }
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Discover duration and stream kinds by prerolling a decode-only pipeline.
fn inspect(path: &Path) -> ShrinkResult<SourceInfo> {
    init_gstreamer()?;
    let launch = format!(
        "filesrc location=\"{}\" ! decodebin name=dec",
        escape_path(path)
    );
    let pipeline = gst::parse::launch(&launch)
        .map_err(|e| ShrinkError::decode(format!("Failed to build inspection pipeline: {e}")))?
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| ShrinkError::decode("Launch string did not produce a pipeline"))?;
    let decoder = pipeline
        .by_name("dec")
        .ok_or_else(|| ShrinkError::decode("Inspection pipeline has no decoder"))?;

    let kinds: Arc<Mutex<Vec<TrackKind>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = kinds.clone();
    let weak = pipeline.downgrade();
    decoder.connect_pad_added(move |_, pad| {
        let Some(pipeline) = weak.upgrade() else {
            return;
        };
        let media = pad
            .current_caps()
            .and_then(|caps| caps.structure(0).map(|s| s.name().to_string()))
            .unwrap_or_default();
        let kind = if media.starts_with("video/") {
            Some(TrackKind::Video)
        } else if media.starts_with("audio/") {
            Some(TrackKind::Audio)
        } else {
            None
        };
        if let Some(kind) = kind {
            seen.lock().unwrap_or_else(PoisonError::into_inner).push(kind);
        }

        let Ok(sink) = gst::ElementFactory::make("fakesink")
            .property("sync", false)
            .build()
        else {
            return;
        };
        if pipeline.add(&sink).is_ok() {
            let _ = sink.sync_state_with_parent();
            if let Some(sink_pad) = sink.static_pad("sink") {
                let _ = pad.link(&sink_pad);
            }
        }
    });

    pipeline
        .set_state(gst::State::Paused)
        .map_err(|e| ShrinkError::decode(format!("Failed to preroll {}: {e:?}", path.display())))?;
    let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(10));
    let duration_secs = pipeline
        .query_duration::<gst::ClockTime>()
        .map(clock_secs);
    let _ = pipeline.set_state(gst::State::Null);
    result.map_err(|e| ShrinkError::decode(format!("Failed to preroll {}: {e:?}", path.display())))?;

    let kinds = kinds.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(SourceInfo {
        duration_secs,
        has_video: kinds.contains(&TrackKind::Video),
        has_audio: kinds.contains(&TrackKind::Audio),
    })
}

fn clock_secs(time: gst::ClockTime) -> f64 {
    time.nseconds() as f64 / 1_000_000_000.0
}

fn element_available(name: &str) -> bool {
    gst::ElementFactory::find(name).is_some()
}

fn init_gstreamer() -> ShrinkResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(ShrinkError::unsupported(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipes_follow_the_container() {
        let vp9 = FormatRecipe::for_mime("video/webm; codecs=vp9").unwrap();
        assert_eq!(vp9.video_encoder, Some("vp9enc"));
        assert_eq!(vp9.muxer, "webmmux");
        assert_eq!(
            FormatRecipe::for_mime("video/mp4").unwrap().muxer,
            "mp4mux"
        );
        assert!(FormatRecipe::for_mime("video/webm;codecs=h264").is_none());
        assert_eq!(
            FormatRecipe::for_mime("audio/webm").unwrap().video_encoder,
            None
        );
    }

    #[test]
    fn video_fragment_carries_bitrate() {
        let vp8 = FormatRecipe::for_mime("video/webm").unwrap();
        assert_eq!(
            vp8.video_fragment(Some(1_500_000)).unwrap(),
            "vp8enc deadline=1 cpu-used=8 end-usage=cbr target-bitrate=1500000"
        );
        let h264 = FormatRecipe::for_mime("video/mp4").unwrap();
        assert!(h264
            .video_fragment(Some(2_000_000))
            .unwrap()
            .ends_with("bitrate=2000"));
    }

    #[test]
    fn escape_path_quotes() {
        assert_eq!(escape_path(Path::new("a\"b.mp4")), "a\\\"b.mp4");
    }
}
