//! Pixel algorithms operating on [Image] values.
//!
//! Every algorithm is a small configurable struct. The configuration is a
//! serde-friendly value (e.g. [BinningConfig]) so that processing pipelines
//! can be described in files. Algorithms check the pixel format of their
//! input and fail with [Error::ImageFormatNotSupported] for formats they do
//! not handle, and with [Error::OutOfRange] for images below their minimum
//! size.
//!
//! In-place variants either complete or leave the image untouched.

pub use ipl_formats::{Error, ErrorKind, Result};
use ipl_formats::PixelFormat;
use ipl_image::Image;

mod binning;
mod color_corrector;
mod common;
mod decimation;
mod edge_enhancement;
mod gain;
mod gamma;
mod histogram;
mod hotpixel;
mod pixel_line;
mod sharpness;
mod transformer;

pub use binning::{Binning, BinningConfig, BinningMode, FACTOR_RANGE};
pub use color_corrector::{ColorCorrectionFactors, ColorCorrector, ColorCorrectorConfig};
pub use decimation::{Decimation, DecimationConfig};
pub use edge_enhancement::{EdgeEnhancement, EdgeEnhancementConfig};
pub use gain::{Gain, GainConfig};
pub use gamma::{GammaConfig, GammaCorrector};
pub use histogram::{Histogram, HistogramChannel};
pub use hotpixel::{
    CONFIRM_COUNT as HOTPIXEL_CONFIRM_COUNT, HotpixelConfig, HotpixelCorrection, SensitivityLevel,
};
pub use pixel_line::{PixelLine, PixelLineChannel};
pub use sharpness::{Sharpness, SharpnessAlgorithm, SharpnessRoi, SharpnessRoiWeight};
pub use transformer::{ImageTransformer, Mirror, RotationAngle};

/// An algorithm usable as one step of a processing pipeline.
pub trait Operator {
    fn name(&self) -> &'static str;
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool;
    /// Process `image` into a new image.
    ///
    /// Stateful algorithms (adaptive hotpixel correction) update their state.
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>>;
}
