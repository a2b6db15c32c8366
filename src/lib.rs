//! rDevelop - GPU-accelerated photographic develop core.
//!
//! Applies a parametric adjustment vector, per-channel tone-curve lookup
//! tables, and an optional crop to an in-memory RGB image on the GPU,
//! producing an RGBA result. RAW decoding and JPEG encoding live outside
//! this crate: callers hand in raw pixel buffers and take back owned
//! results.
//!
//! ```no_run
//! use rdevelop::{CropRect, GpuOptions, GpuProcessor, ToneCurves};
//!
//! let gpu = GpuProcessor::new(&GpuOptions::default())?;
//! let rgb = vec![0u8; 4032 * 3024 * 3];
//! let adjustments = [0.0f32; 14]; // all-zero = no change
//! let developed = gpu.process_with_curves_and_crop(
//!     &rgb,
//!     4032,
//!     3024,
//!     &adjustments,
//!     CropRect::new(0.1, 0.1, 0.9, 0.9),
//!     &ToneCurves::identity(),
//! )?;
//! assert_eq!(developed.pixels.len(), (developed.width * developed.height * 4) as usize);
//! # Ok::<(), rdevelop::GpuError>(())
//! ```

pub mod errors;
pub mod gpu;
pub mod logging;

pub use errors::{GpuError, Result};
pub use gpu::{
    CropRect, DeviceInfo, GpuOptions, GpuProcessor, ProcessedImage, ShaderParams, ToneCurves,
};
pub use logging::VERBOSE_ENV;

#[cfg(test)]
mod tests;
