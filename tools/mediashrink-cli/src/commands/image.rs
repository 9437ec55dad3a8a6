use std::path::PathBuf;

use mediashrink_common::config::AppConfig;
use mediashrink_common::error::ShrinkResult;
use mediashrink_common::format::{format_bytes, reduction_percent};
use mediashrink_image_engine::{
    ConvergenceConfig, ConvergenceOutcome, ImageCompression, ImageCompressor, RasterCodec,
};
use mediashrink_media_model::{
    extension_for_mime, CompressionTarget, MediaKind, ProgressReporter, SourceMedia,
};
use mediashrink_platform_core::BitmapCodec;

use super::{output_path, progress_printer};

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    target_kb: Option<u64>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let source = SourceMedia::from_path(&path)?;
    if source.kind() != MediaKind::Image {
        anyhow::bail!("{} is not an image ({})", path.display(), source.mime);
    }

    let defaults = &config.image;
    let target_kb = defaults.clamp_target_kb(target_kb.unwrap_or(defaults.default_target_kb));
    let target = CompressionTarget::from_kb(target_kb)?;

    println!("Compressing image: {}", source.name);
    println!("  Original: {}", format_bytes(source.size(), 2));
    println!("  Target:   {target_kb} KB");

    let compressor = ImageCompressor::new(RasterCodec::default(), ConvergenceConfig::from(defaults));

    let (reporter, printer) = progress_printer();
    let (source, result) = compress_blocking(compressor, source, target, reporter).await?;
    let _ = printer.await;
    let result = result?;

    let ext = extension_for_mime(result.artifact.mime());
    let out = output_path(output, &path, "compressed_", source.stem(), ext);
    std::fs::write(&out, result.artifact.bytes())?;

    println!("  Compressed: {}", format_bytes(result.achieved_size(), 2));
    println!(
        "  Reduction:  {}%",
        reduction_percent(source.size(), result.achieved_size())
    );
    if let Some((w, h)) = result.final_dimensions() {
        println!("  Dimensions: {w}x{h}");
    }
    println!("  Attempts:   {}", result.attempts.len());
    match result.outcome {
        ConvergenceOutcome::TargetMet => {}
        ConvergenceOutcome::BudgetExhausted => {
            println!("  ⚠ Could not reach the target; kept the smallest attempt");
        }
        ConvergenceOutcome::EncodeAborted => {
            println!("  ⚠ Encoder failed mid-search; kept the last good attempt");
        }
    }
    println!("  Output:     {}", out.display());

    Ok(())
}

/// Run the encode search on the blocking pool. The source comes back with
/// the result so the caller can keep reporting on it.
async fn compress_blocking<C>(
    compressor: ImageCompressor<C>,
    source: SourceMedia,
    target: CompressionTarget,
    reporter: ProgressReporter,
) -> anyhow::Result<(SourceMedia, ShrinkResult<ImageCompression>)>
where
    C: BitmapCodec + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let result = compressor.compress(&source, target, &reporter);
        (source, result)
    })
    .await?;
    Ok(joined)
}
