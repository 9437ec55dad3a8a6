//! Bitmap decode/draw/encode surface.

use mediashrink_common::error::ShrinkResult;

/// Output of a single surface encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// The mime actually produced, which may differ from the hint when the
    /// host cannot encode the requested type.
    pub mime: String,
}

impl EncodedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A raster decode/encode facility.
///
/// Implementations are CPU-bound and synchronous; callers that need to stay
/// responsive run them on a blocking thread.
pub trait BitmapCodec {
    /// A decoded source image at native resolution.
    type Raster;

    /// A drawable surface holding a raster at some working size.
    type Surface;

    /// Decode encoded bytes. Failure means the input is corrupt or of an
    /// unsupported type.
    fn decode(&self, bytes: &[u8]) -> ShrinkResult<Self::Raster>;

    /// Native `(width, height)` of a decoded raster.
    fn dimensions(&self, raster: &Self::Raster) -> (u32, u32);

    /// Draw the raster scaled onto a fresh `width` x `height` surface.
    fn draw(&self, raster: &Self::Raster, width: u32, height: u32) -> ShrinkResult<Self::Surface>;

    /// Encode a surface. `quality` is in `[0.0, 1.0]` and is ignored by
    /// lossless output types.
    fn encode(
        &self,
        surface: &Self::Surface,
        mime_hint: &str,
        quality: f32,
    ) -> ShrinkResult<EncodedImage>;
}
