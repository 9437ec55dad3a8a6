//! Size-convergence search.

use mediashrink_common::config::ImageDefaults;
use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::{
    lossy_output_mime, CompressionTarget, EncodedArtifact, ProgressReporter, ProgressStage,
    SourceMedia,
};
use mediashrink_platform_core::{BitmapCodec, EncodedImage};
use serde::{Deserialize, Serialize};

/// Hard ceiling on encode attempts per call, whatever the config says.
pub const MAX_ATTEMPTS: u32 = 10;

/// Knobs for the convergence loop.
///
/// Qualities are in tenths so every step lands exactly on the 0.1 grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceConfig {
    pub initial_quality_tenths: u8,
    pub quality_floor_tenths: u8,
    pub reset_quality_tenths: u8,
    pub scale_factor: f64,
    pub max_attempts: u32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self::from(&ImageDefaults::default())
    }
}

impl From<&ImageDefaults> for ConvergenceConfig {
    fn from(defaults: &ImageDefaults) -> Self {
        Self {
            initial_quality_tenths: defaults.initial_quality_tenths.clamp(1, 10),
            quality_floor_tenths: defaults.quality_floor_tenths.min(10),
            reset_quality_tenths: defaults.reset_quality_tenths.clamp(1, 10),
            scale_factor: defaults.scale_factor.clamp(0.05, 0.95),
            max_attempts: defaults.max_attempts.clamp(1, MAX_ATTEMPTS),
        }
    }
}

/// One encode trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionAttempt {
    /// Zero-based attempt index.
    pub index: u32,
    pub quality: f32,
    pub width: u32,
    pub height: u32,
    /// Encoded size, or `None` when the encode failed.
    pub size: Option<u64>,
}

/// How the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceOutcome {
    /// An attempt landed at or under the target.
    TargetMet,
    /// The attempt ceiling was reached above the target. Degraded success.
    BudgetExhausted,
    /// An encode or redraw failed after at least one earlier attempt succeeded.
    EncodeAborted,
}

/// Result of an image compression call.
#[derive(Debug, Clone)]
pub struct ImageCompression {
    pub artifact: EncodedArtifact,
    pub target: CompressionTarget,
    pub outcome: ConvergenceOutcome,
    pub attempts: Vec<CompressionAttempt>,
}

impl ImageCompression {
    pub fn achieved_size(&self) -> u64 {
        self.artifact.size()
    }

    pub fn target_met(&self) -> bool {
        self.outcome == ConvergenceOutcome::TargetMet
    }

    /// Final working dimensions.
    pub fn final_dimensions(&self) -> Option<(u32, u32)> {
        self.attempts
            .iter()
            .rev()
            .find(|a| a.size.is_some())
            .map(|a| (a.width, a.height))
    }
}

/// Re-encodes images until they fit a byte budget.
pub struct ImageCompressor<C> {
    codec: C,
    config: ConvergenceConfig,
}

impl<C: BitmapCodec> ImageCompressor<C> {
    pub fn new(codec: C, config: ConvergenceConfig) -> Self {
        Self { codec, config }
    }

    pub fn with_defaults(codec: C) -> Self {
        Self::new(codec, ConvergenceConfig::default())
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Compress `source` toward `target`.
    ///
    /// Returns the last successful encode even when it is still above the
    /// target; check [`ImageCompression::outcome`]. Fails only when the
    /// source cannot be decoded or the host cannot encode at all.
    pub fn compress(
        &self,
        source: &SourceMedia,
        target: CompressionTarget,
        progress: &ProgressReporter,
    ) -> ShrinkResult<ImageCompression> {
        tracing::info!(
            name = %source.name,
            mime = %source.mime,
            original_size = source.size(),
            target = target.bytes(),
            "Starting image compression"
        );
        progress.report(ProgressStage::Preparing, 0.1);

        let raster = self.codec.decode(&source.bytes)?;
        let (native_width, native_height) = self.codec.dimensions(&raster);
        let mut surface = self.codec.draw(&raster, native_width, native_height)?;
        progress.report(ProgressStage::Encoding, 0.3);

        let mime = lossy_output_mime(&source.mime);
        let cfg = self.config;

        let mut width = native_width as f64;
        let mut height = native_height as f64;
        let mut draw_size = (native_width, native_height);
        let mut quality = cfg.initial_quality_tenths;
        let mut attempts = Vec::new();
        let mut best: Option<EncodedImage> = None;
        let mut outcome = ConvergenceOutcome::BudgetExhausted;
        let mut last_error = None;

        let ceiling = cfg.max_attempts.clamp(1, MAX_ATTEMPTS);
        let mut index = 0;
        while index < ceiling {
            let q = f32::from(quality) / 10.0;
            let encoded = self.codec.encode(&surface, &mime, q);
            progress.report(ProgressStage::Encoding, 0.3 + f64::from(index) * 0.05);

            let image = match encoded {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(attempt = index, quality = q, error = %e, "Encode failed");
                    attempts.push(CompressionAttempt {
                        index,
                        quality: q,
                        width: draw_size.0,
                        height: draw_size.1,
                        size: None,
                    });
                    outcome = ConvergenceOutcome::EncodeAborted;
                    last_error = Some(e);
                    break;
                }
            };

            let size = image.size();
            tracing::debug!(
                attempt = index,
                quality = q,
                width = draw_size.0,
                height = draw_size.1,
                size,
                "Encode attempt"
            );
            attempts.push(CompressionAttempt {
                index,
                quality: q,
                width: draw_size.0,
                height: draw_size.1,
                size: Some(size),
            });
            best = Some(image);

            if size <= target.bytes() {
                outcome = ConvergenceOutcome::TargetMet;
                break;
            }

            index += 1;
            if index >= ceiling {
                break;
            }

            if quality > cfg.quality_floor_tenths {
                quality -= 1;
            } else {
                width *= cfg.scale_factor;
                height *= cfg.scale_factor;
                draw_size = (
                    (width.floor() as u32).max(1),
                    (height.floor() as u32).max(1),
                );
                quality = cfg.reset_quality_tenths;
                tracing::debug!(
                    width = draw_size.0,
                    height = draw_size.1,
                    "Quality exhausted; shrinking dimensions"
                );
                match self.codec.draw(&raster, draw_size.0, draw_size.1) {
                    Ok(next) => surface = next,
                    Err(e) => {
                        tracing::warn!(
                            attempt = index,
                            width = draw_size.0,
                            height = draw_size.1,
                            error = %e,
                            "Redraw failed"
                        );
                        attempts.push(CompressionAttempt {
                            index,
                            quality: f32::from(quality) / 10.0,
                            width: draw_size.0,
                            height: draw_size.1,
                            size: None,
                        });
                        outcome = ConvergenceOutcome::EncodeAborted;
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        let Some(image) = best else {
            progress.report(ProgressStage::Failed, 1.0);
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts were made".to_string());
            return Err(ShrinkError::unsupported(format!(
                "no usable image encoder for {mime}: {reason}"
            )));
        };

        let artifact = EncodedArtifact::new(image.bytes, image.mime);
        match outcome {
            ConvergenceOutcome::TargetMet => tracing::info!(
                size = artifact.size(),
                attempts = attempts.len(),
                "Image compressed within target"
            ),
            _ => tracing::warn!(
                size = artifact.size(),
                target = target.bytes(),
                attempts = attempts.len(),
                ?outcome,
                "Image still above target"
            ),
        }
        progress.report(ProgressStage::Complete, 1.0);

        Ok(ImageCompression {
            artifact,
            target,
            outcome,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_defaults_matches_documented_dial() {
        let cfg = ConvergenceConfig::default();
        assert_eq!(cfg.initial_quality_tenths, 9);
        assert_eq!(cfg.quality_floor_tenths, 1);
        assert_eq!(cfg.reset_quality_tenths, 5);
        assert!((cfg.scale_factor - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.max_attempts, 10);
    }

    #[test]
    fn config_cannot_raise_the_attempt_ceiling() {
        let defaults = ImageDefaults {
            max_attempts: 40,
            ..ImageDefaults::default()
        };
        assert_eq!(ConvergenceConfig::from(&defaults).max_attempts, MAX_ATTEMPTS);

        let zero = ImageDefaults {
            max_attempts: 0,
            ..ImageDefaults::default()
        };
        assert_eq!(ConvergenceConfig::from(&zero).max_attempts, 1);
    }
}
