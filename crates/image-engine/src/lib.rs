//! MediaShrink Image Engine
//!
//! Shrinks an image below a byte budget by re-encoding it repeatedly:
//! quality steps first, then a dimension shrink once quality bottoms out.
//! The search is bounded by a fixed attempt ceiling, so worst-case work is
//! a handful of encodes no matter how incompressible the input is.
//!
//! - [`convergence`]: the search loop, generic over any [`BitmapCodec`]
//! - [`raster`]: a [`BitmapCodec`] backed by the `image` crate
//!
//! [`BitmapCodec`]: mediashrink_platform_core::BitmapCodec

pub mod convergence;
pub mod raster;

pub use convergence::*;
pub use raster::RasterCodec;
