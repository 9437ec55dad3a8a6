use mediashrink_capture_engine::sim::{SimElement, SimHost, SimOptions};
use mediashrink_capture_engine::{
    budget_bitrate, AudioExtractor, AudioPath, BudgetBasis, VideoTranscoder,
};
use mediashrink_common::config::{AudioDefaults, VideoDefaults};
use mediashrink_common::error::ShrinkError;
use mediashrink_media_model::{
    progress_channel, CompressionTarget, ProgressReporter, ProgressStage,
};
use mediashrink_platform_core::MediaElement;
use tokio_util::sync::CancellationToken;

fn four_mb() -> CompressionTarget {
    CompressionTarget::from_mb(4.0).unwrap()
}

async fn transcode(
    host: SimHost,
    element: &mut SimElement,
) -> Result<mediashrink_capture_engine::VideoTranscode, ShrinkError> {
    VideoTranscoder::with_defaults(host)
        .transcode(
            element,
            four_mb(),
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
}

#[tokio::test]
async fn fifteen_second_clip_lands_under_four_point_three_mb() {
    let host = SimHost::default();
    let mut element = SimElement::new("clip.mp4", 15.0);
    let result = transcode(host.clone(), &mut element).await.unwrap();

    assert!(result.achieved_size() <= 4_300_000, "{}", result.achieved_size());
    assert_eq!(result.bitrate.basis, BudgetBasis::Duration);
    assert_eq!(result.audio_path, AudioPath::Routed);
    assert_eq!(result.format.mime, "video/webm; codecs=vp9");
    assert_eq!(result.artifact.mime(), "video/webm");
    assert_eq!(&result.artifact.bytes()[..4], &[0x1A, 0x45, 0xDF, 0xA3]);

    let stats = host.stats();
    assert_eq!(stats.live_tracks(), 0);
    assert_eq!(stats.open_graphs(), 0);
    assert_eq!(stats.encoders_created, 1);
}

#[tokio::test]
async fn artifact_is_chunks_in_arrival_order() {
    let host = SimHost::new(SimOptions {
        header_bytes: 0,
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 1.0).with_tick(0.25);
    let result = transcode(host, &mut element).await.unwrap();

    // Each tick produced one chunk filled with its 1-based index.
    let bytes = result.artifact.bytes();
    let mut fills: Vec<u8> = bytes.to_vec();
    fills.dedup();
    assert_eq!(fills, vec![1, 2, 3, 4]);
    let mut sorted = bytes.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, bytes);
}

#[tokio::test]
async fn empty_encoder_payloads_are_skipped() {
    let host = SimHost::new(SimOptions {
        emit_empty_chunks: true,
        header_bytes: 0,
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 2.0);
    let result = transcode(host, &mut element).await.unwrap();
    let budget = budget_bitrate(four_mb(), Some(2.0), &VideoDefaults::default());
    assert_eq!(
        result.achieved_size(),
        budget.bits_per_second * 2 / 8
    );
}

#[tokio::test]
async fn encoder_error_after_chunks_fails_without_artifact() {
    let host = SimHost::new(SimOptions {
        encoder_error_after_chunks: Some(3),
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 10.0);
    let err = transcode(host.clone(), &mut element).await.unwrap_err();

    assert!(matches!(err, ShrinkError::RuntimeCapture { .. }), "{err}");
    assert!(!element.is_playing());
    let stats = host.stats();
    assert_eq!(stats.live_tracks(), 0);
    assert_eq!(stats.open_graphs(), 0);
}

#[tokio::test]
async fn encoder_stopping_mid_playback_is_a_failure() {
    let host = SimHost::new(SimOptions {
        encoder_stop_after_chunks: Some(2),
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 10.0);
    let err = transcode(host.clone(), &mut element).await.unwrap_err();

    assert!(matches!(err, ShrinkError::RuntimeCapture { .. }), "{err}");
    assert!(err.to_string().contains("stopped before playback ended"), "{err}");
    assert!(!element.is_playing());
    assert_eq!(host.stats().live_tracks(), 0);
    assert_eq!(host.stats().open_graphs(), 0);
}

#[tokio::test]
async fn encoder_that_never_stops_hits_the_grace_deadline() {
    let host = SimHost::new(SimOptions {
        encoder_ignores_stop: true,
        ..SimOptions::default()
    });
    let config = VideoDefaults {
        stop_grace_secs: 0,
        ..VideoDefaults::default()
    };
    let mut element = SimElement::new("clip.mp4", 2.0);
    let err = VideoTranscoder::new(host.clone(), config)
        .transcode(
            &mut element,
            four_mb(),
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShrinkError::RuntimeCapture { .. }), "{err}");
    assert!(err.to_string().contains("did not stop"), "{err}");
    let stats = host.stats();
    assert_eq!(stats.live_tracks(), 0);
    assert_eq!(stats.open_graphs(), 0);
}

#[tokio::test]
async fn playback_error_fails_the_transcode() {
    let host = SimHost::default();
    let mut element = SimElement::new("clip.mp4", 10.0).with_error_at(3.0);
    let err = transcode(host, &mut element).await.unwrap_err();
    assert!(err.to_string().contains("playback failed"), "{err}");
}

#[tokio::test]
async fn missing_capture_is_unsupported() {
    let host = SimHost::new(SimOptions {
        capture_supported: false,
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 5.0);
    let err = transcode(host, &mut element).await.unwrap_err();
    assert!(err.is_unsupported());
    assert!(err.to_string().contains("capture not supported"));
}

#[tokio::test]
async fn no_supported_format_is_fatal() {
    let host = SimHost::new(SimOptions {
        supported_formats: vec!["audio/webm".to_string()],
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 5.0);
    let err = transcode(host.clone(), &mut element).await.unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(host.stats().encoders_created, 0);
    assert_eq!(host.stats().live_tracks(), 0);
}

#[tokio::test]
async fn format_preference_falls_through_to_mp4() {
    let host = SimHost::new(SimOptions {
        supported_formats: vec!["video/mp4".to_string()],
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mov", 2.0);
    let result = transcode(host, &mut element).await.unwrap();
    assert_eq!(result.artifact.mime(), "video/mp4");
}

#[tokio::test]
async fn missing_audio_graph_falls_back_to_direct_capture() {
    let host = SimHost::new(SimOptions {
        audio_graph_supported: false,
        ..SimOptions::default()
    });
    let mut element = SimElement::new("clip.mp4", 3.0);
    let result = transcode(host.clone(), &mut element).await.unwrap();

    assert_eq!(result.audio_path, AudioPath::Direct);
    assert!(!element.is_muted());
    assert!((element.volume() - 0.05).abs() < f64::EPSILON);
    assert_eq!(host.stats().live_tracks(), 0);
}

#[tokio::test]
async fn routed_path_keeps_element_silent_but_unmuted() {
    let mut element = SimElement::new("clip.mp4", 3.0);
    let result = transcode(SimHost::default(), &mut element).await.unwrap();
    assert_eq!(result.audio_path, AudioPath::Routed);
    assert!(!element.is_muted());
    assert_eq!(element.volume(), 0.0);
}

#[tokio::test]
async fn already_tapped_element_still_transcodes() {
    let host = SimHost::default();
    let mut element = SimElement::new("clip.mp4", 2.0);
    transcode(host.clone(), &mut element).await.unwrap();
    assert!(element.is_tapped());

    let second = transcode(host, &mut element).await.unwrap();
    assert_eq!(second.audio_path, AudioPath::Direct);
}

#[tokio::test]
async fn unknown_duration_uses_fallback_bitrate() {
    let mut element = SimElement::new("clip.mp4", 2.0).with_unknown_duration();
    let result = transcode(SimHost::default(), &mut element).await.unwrap();
    assert_eq!(result.bitrate.bits_per_second, 2_500_000);
    assert_eq!(result.bitrate.basis, BudgetBasis::Fallback);
}

#[tokio::test]
async fn progress_tracks_playback_position() {
    let (tx, mut rx) = progress_channel();
    let mut element = SimElement::new("clip.mp4", 2.0).with_tick(0.5);
    VideoTranscoder::with_defaults(SimHost::default())
        .transcode(
            &mut element,
            four_mb(),
            &ProgressReporter::new(tx),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut capturing = Vec::new();
    let mut last = None;
    while let Ok(progress) = rx.try_recv() {
        if progress.stage == ProgressStage::Capturing {
            capturing.push(progress.fraction);
        }
        last = Some(progress.stage);
    }
    assert_eq!(capturing, vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(last, Some(ProgressStage::Complete));
}

#[tokio::test]
async fn cancelled_token_tears_everything_down() {
    let host = SimHost::default();
    let mut element = SimElement::new("clip.mp4", 60.0);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = VideoTranscoder::with_defaults(host.clone())
        .transcode(
            &mut element,
            four_mb(),
            &ProgressReporter::disabled(),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShrinkError::Cancelled));
    assert!(!element.is_playing());
    assert_eq!(host.stats().live_tracks(), 0);
    assert_eq!(host.stats().open_graphs(), 0);
}

#[tokio::test]
async fn audio_extraction_produces_webm_and_rewinds() {
    let host = SimHost::default();
    let mut element = SimElement::new("song.mp4", 4.0);
    let result = AudioExtractor::with_defaults(host.clone())
        .extract(
            &mut element,
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.artifact.mime(), "audio/webm");
    // 128 kbps for four seconds plus the container header.
    assert_eq!(result.artifact.size(), 128_000 * 4 / 8 + 1024);
    assert!(result.chunks > 1);
    assert_eq!(element.current_time_secs(), 0.0);
    assert_eq!(element.volume(), 0.0);
    assert_eq!(host.stats().live_tracks(), 0);
    assert_eq!(host.stats().open_graphs(), 0);
}

#[tokio::test]
async fn audio_extraction_without_graph_is_fatal() {
    let host = SimHost::new(SimOptions {
        audio_graph_supported: false,
        ..SimOptions::default()
    });
    let mut element = SimElement::new("song.mp4", 4.0);
    let err = AudioExtractor::new(host, AudioDefaults::default())
        .extract(
            &mut element,
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn audio_extraction_refuses_a_second_tap() {
    let host = SimHost::default();
    let mut element = SimElement::new("song.mp4", 1.0);
    let extractor = AudioExtractor::with_defaults(host.clone());
    extractor
        .extract(
            &mut element,
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let err = extractor
        .extract(
            &mut element,
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ShrinkError::RuntimeCapture { .. }), "{err}");
    assert_eq!(host.stats().open_graphs(), 0);
}

#[tokio::test]
async fn extraction_with_no_captured_bytes_fails() {
    let host = SimHost::new(SimOptions {
        header_bytes: 0,
        ..SimOptions::default()
    });
    let mut element = SimElement::new("empty.mp4", 0.0);
    let err = AudioExtractor::with_defaults(host.clone())
        .extract(
            &mut element,
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShrinkError::RuntimeCapture { .. }), "{err}");
    assert!(err.to_string().contains("no data"), "{err}");
    assert_eq!(host.stats().encoders_created, 1);
    assert_eq!(host.stats().live_tracks(), 0);
    assert_eq!(host.stats().open_graphs(), 0);
}

#[tokio::test]
async fn silent_source_cannot_be_extracted() {
    let mut element = SimElement::new("mute.mp4", 2.0).without_audio();
    let err = AudioExtractor::with_defaults(SimHost::default())
        .extract(
            &mut element,
            &ProgressReporter::disabled(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}
