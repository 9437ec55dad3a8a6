//! [`BitmapCodec`] backed by the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use mediashrink_common::error::{ShrinkError, ShrinkResult};
use mediashrink_media_model::mime_essence;
use mediashrink_platform_core::{BitmapCodec, EncodedImage};

/// Decodes with `image::load_from_memory` and encodes JPEG with a quality
/// dial. WebP and PNG are written lossless (quality ignored); any other hint
/// falls back to JPEG.
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    filter: FilterType,
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl RasterCodec {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

/// Map a `[0.0, 1.0]` quality onto the JPEG `1..=100` scale.
fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 90;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn encode_jpeg(surface: &DynamicImage, quality: f32) -> ShrinkResult<Vec<u8>> {
    let rgb = surface.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality))
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| ShrinkError::encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(surface: &DynamicImage) -> ShrinkResult<Vec<u8>> {
    let rgba = surface.to_rgba8();
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| ShrinkError::encode(format!("WebP encode failed: {e}")))?;
    Ok(buf)
}

fn encode_png(surface: &DynamicImage) -> ShrinkResult<Vec<u8>> {
    let rgba = surface.to_rgba8();
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| ShrinkError::encode(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

impl BitmapCodec for RasterCodec {
    type Raster = DynamicImage;
    type Surface = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> ShrinkResult<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| ShrinkError::decode(format!("Failed to decode image: {e}")))
    }

    fn dimensions(&self, raster: &DynamicImage) -> (u32, u32) {
        (raster.width(), raster.height())
    }

    fn draw(&self, raster: &DynamicImage, width: u32, height: u32) -> ShrinkResult<DynamicImage> {
        if width == 0 || height == 0 {
            return Err(ShrinkError::unsupported(format!(
                "cannot allocate a {width}x{height} surface"
            )));
        }
        if (width, height) == (raster.width(), raster.height()) {
            return Ok(raster.clone());
        }
        Ok(raster.resize_exact(width, height, self.filter))
    }

    fn encode(
        &self,
        surface: &DynamicImage,
        mime_hint: &str,
        quality: f32,
    ) -> ShrinkResult<EncodedImage> {
        let (bytes, mime) = match mime_essence(mime_hint).as_str() {
            "image/webp" => (encode_webp(surface)?, "image/webp"),
            "image/png" => (encode_png(surface)?, "image/png"),
            "image/jpeg" => (encode_jpeg(surface, quality)?, "image/jpeg"),
            other => {
                tracing::debug!(requested = other, "No encoder for hint; falling back to JPEG");
                (encode_jpeg(surface, quality)?, "image/jpeg")
            }
        };
        Ok(EncodedImage {
            bytes,
            mime: mime.to_string(),
        })
    }
}
