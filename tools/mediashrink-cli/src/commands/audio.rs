use std::path::PathBuf;

use mediashrink_capture_engine::sim::{SimElement, SimHost};
use mediashrink_capture_engine::{AudioExtraction, AudioExtractor};
use mediashrink_common::config::AppConfig;
use mediashrink_common::format::format_bytes;
use mediashrink_media_model::{extension_for_mime, MediaKind, SourceMedia};
use mediashrink_platform_core::CaptureHost;
use tokio_util::sync::CancellationToken;

use super::{output_path, progress_printer};

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    simulate: Option<f64>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let source = SourceMedia::from_path(&path)?;
    if !matches!(source.kind(), MediaKind::Video | MediaKind::Audio) {
        anyhow::bail!("{} has no playable audio ({})", path.display(), source.mime);
    }

    println!("Extracting audio: {}", source.name);

    let result = match simulate {
        Some(length_secs) => {
            let extractor = AudioExtractor::new(SimHost::default(), config.audio.clone());
            let mut element = SimElement::new(source.name.clone(), length_secs);
            extract_on(&extractor, &mut element, &cancel).await?
        }
        None => extract_native(config, &path, &cancel).await?,
    };

    let ext = extension_for_mime(result.artifact.mime());
    let out = output_path(output, &path, "audio_", source.stem(), ext);
    std::fs::write(&out, result.artifact.bytes())?;

    println!("  Size:   {}", format_bytes(result.artifact.size(), 2));
    println!("  Chunks: {}", result.chunks);
    println!("  Output: {}", out.display());

    Ok(())
}

async fn extract_on<H: CaptureHost>(
    extractor: &AudioExtractor<H>,
    element: &mut H::Element,
    cancel: &CancellationToken,
) -> anyhow::Result<AudioExtraction> {
    let (reporter, printer) = progress_printer();
    let result = extractor.extract(element, &reporter, cancel).await;
    drop(reporter);
    let _ = printer.await;
    Ok(result?)
}

#[cfg(feature = "gstreamer")]
async fn extract_native(
    config: &AppConfig,
    path: &std::path::Path,
    cancel: &CancellationToken,
) -> anyhow::Result<AudioExtraction> {
    use mediashrink_capture_engine::backend::{GstHost, GstHostOptions};

    let host = GstHost::new(GstHostOptions::default())?;
    let mut element = host.open(path)?;
    let extractor = AudioExtractor::new(host, config.audio.clone());
    extract_on(&extractor, &mut element, cancel).await
}

#[cfg(not(feature = "gstreamer"))]
async fn extract_native(
    _config: &AppConfig,
    _path: &std::path::Path,
    _cancel: &CancellationToken,
) -> anyhow::Result<AudioExtraction> {
    Err(mediashrink_common::error::ShrinkError::unsupported(
        "built without GStreamer; rebuild with --features gstreamer or pass --simulate",
    )
    .into())
}
