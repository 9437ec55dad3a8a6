//! Playback-capture video transcoder.

use std::time::Duration;

use mediashrink_common::config::VideoDefaults;
use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::{
    CompressionTarget, EncodedArtifact, ProgressReporter, ProgressStage,
};
use mediashrink_platform_core::{
    AudioGraph, CaptureHost, EncoderOptions, IncrementalEncoder, MediaElement, MediaSignal,
    TrackKind,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::bitrate::{budget_bitrate, BitrateBudget};
use crate::formats::{select_format, SelectedFormat};
use crate::playback::drive_capture;
use crate::resources::CaptureResources;
use crate::session::CaptureSession;

/// How the audio reached the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPath {
    /// Routed through an audio graph and merged with the captured video.
    Routed,
    /// Taken straight from the element's captured signal.
    Direct,
}

/// Result of a successful transcode.
#[derive(Debug, Clone)]
pub struct VideoTranscode {
    pub artifact: EncodedArtifact,
    pub target: CompressionTarget,
    pub bitrate: BitrateBudget,
    pub format: SelectedFormat,
    pub audio_path: AudioPath,
}

impl VideoTranscode {
    pub fn achieved_size(&self) -> u64 {
        self.artifact.size()
    }
}

/// Re-encodes a video by playing it through a host element and recording the
/// live signal at a budgeted bitrate.
pub struct VideoTranscoder<H> {
    host: H,
    config: VideoDefaults,
}

impl<H: CaptureHost> VideoTranscoder<H> {
    pub fn new(host: H, config: VideoDefaults) -> Self {
        Self { host, config }
    }

    pub fn with_defaults(host: H) -> Self {
        Self::new(host, VideoDefaults::default())
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &VideoDefaults {
        &self.config
    }

    /// Bitrate a transcode of `element` toward `target` would request.
    pub fn plan(&self, element: &H::Element, target: CompressionTarget) -> BitrateBudget {
        budget_bitrate(target, element.duration_secs(), &self.config)
    }

    /// Play `element` once and return the re-encoded recording.
    ///
    /// Holding `element` mutably for the whole call keeps a second capture of
    /// the same element from starting while this one runs.
    pub async fn transcode(
        &self,
        element: &mut H::Element,
        target: CompressionTarget,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShrinkResult<VideoTranscode> {
        let mut session = CaptureSession::new("video");
        session.prepare()?;
        progress.report(ProgressStage::Preparing, 0.0);

        let mut resources = CaptureResources::new();
        match self
            .run(element, target, progress, cancel, &mut session, &mut resources)
            .await
        {
            Ok(result) => {
                resources.release();
                progress.report(ProgressStage::Complete, 1.0);
                tracing::info!(
                    size = result.artifact.size(),
                    target = target.bytes(),
                    bitrate = result.bitrate.bits_per_second,
                    format = %result.format.mime,
                    "Video transcode complete"
                );
                Ok(result)
            }
            Err(e) => {
                session.fail(e.to_string());
                resources.release();
                progress.report(ProgressStage::Failed, 1.0);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        element: &mut H::Element,
        target: CompressionTarget,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
        session: &mut CaptureSession,
        resources: &mut CaptureResources<H::Graph, H::Track>,
    ) -> ShrinkResult<VideoTranscode> {
        let bitrate = self.plan(element, target);
        tracing::info!(
            host = self.host.name(),
            target = target.bytes(),
            duration_secs = ?element.duration_secs(),
            bitrate = bitrate.bits_per_second,
            basis = ?bitrate.basis,
            "Starting video transcode"
        );

        let mut raw = self.host.capture_stream(element).map_err(|e| {
            if e.is_unsupported() {
                e
            } else {
                ShrinkError::unsupported(format!("capture not supported: {e}"))
            }
        })?;

        let audio_path = match self.route_audio(element, &mut raw, resources) {
            Ok(()) => {
                resources.keep(raw);
                AudioPath::Routed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio routing unavailable; capturing element audio directly");
                resources.set_active(raw);
                AudioPath::Direct
            }
        };

        let format = select_format(&self.config.format_preference, |mime| {
            self.host.is_type_supported(mime)
        })?;

        let signal = resources
            .active()
            .ok_or_else(|| ShrinkError::unsupported("no signal to encode"))?;
        let mut encoder = self.host.create_encoder(
            signal,
            &EncoderOptions {
                mime: format.mime.clone(),
                bits_per_second: Some(bitrate.bits_per_second),
            },
        )?;

        element.seek_to_start()?;
        element.set_muted(false);
        element.set_volume(match audio_path {
            AudioPath::Routed => 0.0,
            AudioPath::Direct => self.config.fallback_playback_volume,
        });

        session.begin_capture()?;
        encoder.start()?;
        if let Err(e) = element.play().await {
            encoder.stop();
            return Err(e);
        }

        drive_capture(
            element,
            &mut encoder,
            session,
            progress,
            cancel,
            Duration::from_secs(self.config.stop_grace_secs),
        )
        .await?;

        let artifact = session.complete(&format.container)?;
        Ok(VideoTranscode {
            artifact,
            target,
            bitrate,
            format,
            audio_path,
        })
    }

    /// Route the element's audio through a graph and pair it with the
    /// captured video track. On success the combined signal is active.
    fn route_audio(
        &self,
        element: &mut H::Element,
        raw: &mut MediaSignal<H::Track>,
        resources: &mut CaptureResources<H::Graph, H::Track>,
    ) -> ShrinkResult<()> {
        if !raw.has(TrackKind::Video) {
            return Err(ShrinkError::capture("captured signal has no video track"));
        }

        let mut graph = self.host.create_audio_graph()?;
        let mut routed = match self.host.route_element_audio(&mut graph, element) {
            Ok(signal) => signal,
            Err(e) => {
                graph.close();
                return Err(e);
            }
        };
        resources.set_graph(graph);

        let Some(audio) = routed.take_first(TrackKind::Audio) else {
            resources.keep(routed);
            return Err(ShrinkError::capture("audio route produced no audio track"));
        };
        resources.keep(routed);

        match raw.take_first(TrackKind::Video) {
            Some(video) => {
                resources.set_active(MediaSignal::combine(video, audio));
                Ok(())
            }
            None => {
                resources.keep(MediaSignal::new(vec![audio]));
                Err(ShrinkError::capture("captured signal has no video track"))
            }
        }
    }
}
