//! Playback-capture audio extractor.

use std::time::Duration;

use mediashrink_common::config::AudioDefaults;
use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::{mime_essence, EncodedArtifact, ProgressReporter, ProgressStage};
use mediashrink_platform_core::{
    AudioGraph, CaptureHost, EncoderOptions, IncrementalEncoder, MediaElement, TrackKind,
};
use tokio_util::sync::CancellationToken;

use crate::playback::drive_capture;
use crate::resources::CaptureResources;
use crate::session::CaptureSession;

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct AudioExtraction {
    pub artifact: EncodedArtifact,
    /// Number of non-empty encoder chunks that made up the artifact.
    pub chunks: usize,
}

/// Extracts the audio of a media element into a standalone file.
pub struct AudioExtractor<H> {
    host: H,
    config: AudioDefaults,
}

impl<H: CaptureHost> AudioExtractor<H> {
    pub fn new(host: H, config: AudioDefaults) -> Self {
        Self { host, config }
    }

    pub fn with_defaults(host: H) -> Self {
        Self::new(host, AudioDefaults::default())
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Play `element` once with its audio routed into an encoder.
    ///
    /// There is no fallback path: a host that cannot build an audio graph, or
    /// an element that was already routed, fails the call.
    pub async fn extract(
        &self,
        element: &mut H::Element,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShrinkResult<AudioExtraction> {
        let mut session = CaptureSession::new("audio");
        session.prepare()?;
        progress.report(ProgressStage::Preparing, 0.0);

        let mut resources = CaptureResources::new();
        let result = self
            .run(element, progress, cancel, &mut session, &mut resources)
            .await;

        if let Some(graph) = resources.graph_mut() {
            graph.disconnect();
        }
        resources.release();
        if let Err(e) = element.seek_to_start() {
            tracing::warn!(error = %e, "Failed to rewind element after extraction");
        }

        match result {
            Ok(extraction) => {
                progress.report(ProgressStage::Complete, 1.0);
                tracing::info!(
                    size = extraction.artifact.size(),
                    chunks = extraction.chunks,
                    "Audio extraction complete"
                );
                Ok(extraction)
            }
            Err(e) => {
                session.fail(e.to_string());
                progress.report(ProgressStage::Failed, 1.0);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        element: &mut H::Element,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
        session: &mut CaptureSession,
        resources: &mut CaptureResources<H::Graph, H::Track>,
    ) -> ShrinkResult<AudioExtraction> {
        let format = self.config.format.clone();
        tracing::info!(host = self.host.name(), format = %format, "Starting audio extraction");

        if !self.host.is_type_supported(&format) {
            return Err(ShrinkError::unsupported(format!(
                "audio format {format} is not supported"
            )));
        }

        let mut graph = self.host.create_audio_graph()?;
        let routed = match self.host.route_element_audio(&mut graph, element) {
            Ok(signal) => signal,
            Err(e) => {
                graph.close();
                return Err(e);
            }
        };
        resources.set_graph(graph);
        let has_audio = routed.has(TrackKind::Audio);
        resources.set_active(routed);
        if !has_audio {
            return Err(ShrinkError::unsupported("audio route produced no audio track"));
        }

        let signal = resources
            .active()
            .ok_or_else(|| ShrinkError::unsupported("no signal to encode"))?;
        let mut encoder = self.host.create_encoder(
            signal,
            &EncoderOptions {
                mime: format.clone(),
                bits_per_second: None,
            },
        )?;

        element.seek_to_start()?;
        element.set_muted(false);
        element.set_volume(0.0);

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

        if session.buffered_bytes() == 0 {
            return Err(ShrinkError::capture("audio extraction produced no data"));
        }
        let chunks = session.chunk_count();
        let artifact = session.complete(&mime_essence(&format))?;
        Ok(AudioExtraction { artifact, chunks })
    }
}
