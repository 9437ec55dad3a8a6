use std::path::PathBuf;

use mediashrink_capture_engine::sim::{SimElement, SimHost};
use mediashrink_capture_engine::{AudioPath, BudgetBasis, VideoTranscode, VideoTranscoder};
use mediashrink_common::config::AppConfig;
use mediashrink_common::format::{format_bytes, format_time, reduction_percent};
use mediashrink_media_model::{extension_for_mime, CompressionTarget, MediaKind, SourceMedia};
use mediashrink_platform_core::{CaptureHost, MediaElement};
use tokio_util::sync::CancellationToken;

use super::{output_path, progress_printer};

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    target_mb: Option<f64>,
    output: Option<PathBuf>,
    simulate: Option<f64>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let source = SourceMedia::from_path(&path)?;
    if source.kind() != MediaKind::Video {
        anyhow::bail!("{} is not a video ({})", path.display(), source.mime);
    }

    let defaults = &config.video;
    let target_mb = defaults.clamp_target_mb(target_mb.unwrap_or(defaults.default_target_mb));
    let target = CompressionTarget::from_mb(target_mb)?;

    println!("Compressing video: {}", source.name);
    println!("  Original: {}", format_bytes(source.size(), 2));
    println!("  Target:   {target_mb} MB");

    let result = match simulate {
        Some(length_secs) => {
            println!("  Host:     simulated ({})", format_time(length_secs));
            let transcoder = VideoTranscoder::new(SimHost::default(), defaults.clone());
            let mut element = SimElement::new(source.name.clone(), length_secs);
            transcode_on(&transcoder, &mut element, target, &cancel).await?
        }
        None => transcode_native(config, &path, target, &cancel).await?,
    };

    let ext = extension_for_mime(result.artifact.mime());
    let out = output_path(output, &path, "compressed_", source.stem(), ext);
    std::fs::write(&out, result.artifact.bytes())?;

    println!("  Compressed: {}", format_bytes(result.achieved_size(), 2));
    println!(
        "  Reduction:  {}%",
        reduction_percent(source.size(), result.achieved_size())
    );
    println!("  Format:     {}", result.format.mime);
    if result.audio_path == AudioPath::Direct {
        println!("  Audio:      captured directly from playback");
    }
    if result.achieved_size() > target.bytes() {
        println!("  ⚠ Output is above the target size");
    }
    println!("  Output:     {}", out.display());

    Ok(())
}

async fn transcode_on<H: CaptureHost>(
    transcoder: &VideoTranscoder<H>,
    element: &mut H::Element,
    target: CompressionTarget,
    cancel: &CancellationToken,
) -> anyhow::Result<VideoTranscode> {
    let plan = transcoder.plan(element, target);
    let basis = match plan.basis {
        BudgetBasis::Duration => "from duration",
        BudgetBasis::Floor => "floor",
        BudgetBasis::Fallback => "duration unknown",
    };
    println!(
        "  Bitrate:  {:.0} kbps ({basis})",
        plan.bits_per_second as f64 / 1000.0
    );
    if let Some(duration) = element.duration_secs() {
        println!("  Duration: {}", format_time(duration));
    }

    let (reporter, printer) = progress_printer();
    let result = transcoder.transcode(element, target, &reporter, cancel).await;
    drop(reporter);
    let _ = printer.await;
    Ok(result?)
}

#[cfg(feature = "gstreamer")]
async fn transcode_native(
    config: &AppConfig,
    path: &std::path::Path,
    target: CompressionTarget,
    cancel: &CancellationToken,
) -> anyhow::Result<VideoTranscode> {
    use mediashrink_capture_engine::backend::{GstHost, GstHostOptions};

    let host = GstHost::new(GstHostOptions::default())?;
    let mut element = host.open(path)?;
    let transcoder = VideoTranscoder::new(host, config.video.clone());
    transcode_on(&transcoder, &mut element, target, cancel).await
}

#[cfg(not(feature = "gstreamer"))]
async fn transcode_native(
    _config: &AppConfig,
    _path: &std::path::Path,
    _target: CompressionTarget,
    _cancel: &CancellationToken,
) -> anyhow::Result<VideoTranscode> {
    Err(mediashrink_common::error::ShrinkError::unsupported(
        "built without GStreamer; rebuild with --features gstreamer or pass --simulate",
    )
    .into())
}
