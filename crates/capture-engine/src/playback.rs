//! The capture loop shared by the transcoder and the extractor.

use std::time::Duration;

use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::{ProgressReporter, ProgressStage};
use mediashrink_platform_core::{
    EncoderEvent, IncrementalEncoder, MediaElement, PlaybackEvent,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::session::{CaptureSession, SessionState};

/// Play `element` to the end while buffering `encoder` output into `session`.
///
/// The encoder must already be started and playback already running. On
/// success the session is in `Finalizing` with every chunk buffered. Errors
/// leave the session untouched; the caller decides how to fail it.
pub(crate) async fn drive_capture<E, C>(
    element: &mut E,
    encoder: &mut C,
    session: &mut CaptureSession,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
    stop_grace: Duration,
) -> ShrinkResult<()>
where
    E: MediaElement + ?Sized,
    C: IncrementalEncoder + ?Sized,
{
    let duration = element.duration_secs().filter(|d| d.is_finite() && *d > 0.0);
    let mut stop_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!("Capture cancelled");
                encoder.stop();
                element.pause();
                return Err(ShrinkError::Cancelled);
            }

            event = encoder.next_event() => match event {
                EncoderEvent::Data(chunk) => {
                    let len = chunk.len();
                    if session.push_chunk(chunk)? {
                        tracing::trace!(bytes = len, total = session.buffered_bytes(), "Chunk buffered");
                    }
                }
                EncoderEvent::Stopped => {
                    if session.state() == SessionState::Capturing {
                        element.pause();
                        return Err(ShrinkError::capture(format!(
                            "encoder stopped before playback ended ({} chunks buffered)",
                            session.chunk_count()
                        )));
                    }
                    tracing::debug!(
                        chunks = session.chunk_count(),
                        bytes = session.buffered_bytes(),
                        "Encoder stopped"
                    );
                    return Ok(());
                }
                EncoderEvent::Error { message } => {
                    element.pause();
                    return Err(ShrinkError::capture(format!("encoder failed: {message}")));
                }
            },

            event = element.next_event(), if session.state() == SessionState::Capturing => match event {
                PlaybackEvent::TimeUpdate { current_secs } => {
                    if let Some(duration) = duration {
                        progress.report(ProgressStage::Capturing, current_secs / duration);
                    }
                }
                PlaybackEvent::Ended => {
                    tracing::debug!("Playback ended; stopping encoder");
                    session.finalize()?;
                    encoder.stop();
                    progress.report(ProgressStage::Finalizing, 1.0);
                    stop_deadline = Some(Instant::now() + stop_grace);
                }
                PlaybackEvent::Error { message } => {
                    encoder.stop();
                    return Err(ShrinkError::capture(format!("playback failed: {message}")));
                }
            },

            _ = tokio::time::sleep_until(stop_deadline.unwrap_or_else(Instant::now)), if stop_deadline.is_some() => {
                return Err(ShrinkError::capture(format!(
                    "encoder did not stop within {}s of playback end",
                    stop_grace.as_secs()
                )));
            }
        }
    }
}
