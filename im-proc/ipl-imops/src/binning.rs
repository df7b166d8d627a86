use serde::{Deserialize, Serialize};

use ipl_formats::{Error, PixelFormat, Range, Result, Size2D};
use ipl_image::Image;

use crate::Operator;
use crate::common::{
    image_like, is_unpacked_sample_format, reduced_size, reduction_origin, reduction_step,
    require_format, require_non_empty,
};

/// Valid binning and decimation factors.
pub const FACTOR_RANGE: Range<u32> = Range {
    min: 1,
    max: 8,
    inc: 1,
};

/// How the pixels of a bin are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u16)]
pub enum BinningMode {
    #[default]
    Average = 0,
    /// Saturating sum.
    Sum = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    pub x: u32,
    pub y: u32,
    pub mode: BinningMode,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            x: 1,
            y: 1,
            mode: BinningMode::Average,
        }
    }
}

impl BinningConfig {
    pub fn validate(&self) -> Result<()> {
        FACTOR_RANGE.check("binning x", self.x)?;
        FACTOR_RANGE.check("binning y", self.y)
    }
}

/// Combines blocks of `x` by `y` pixels into one.
///
/// Bayer images are binned per color site, so the output has the same
/// pattern as the input.
#[derive(Debug, Clone, Default)]
pub struct Binning {
    config: BinningConfig,
}

impl Binning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BinningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    pub fn set_binning_x(&mut self, value: u32) -> Result<()> {
        FACTOR_RANGE.check("binning x", value)?;
        self.config.x = value;
        Ok(())
    }

    pub fn binning_x(&self) -> u32 {
        self.config.x
    }

    pub fn set_binning_y(&mut self, value: u32) -> Result<()> {
        FACTOR_RANGE.check("binning y", value)?;
        self.config.y = value;
        Ok(())
    }

    pub fn binning_y(&self) -> u32 {
        self.config.y
    }

    pub fn binning_range(&self) -> Range<u32> {
        FACTOR_RANGE
    }

    pub fn set_mode(&mut self, mode: BinningMode) {
        self.config.mode = mode;
    }

    pub fn mode(&self) -> BinningMode {
        self.config.mode
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    /// Size of the binned image, without processing anything.
    pub fn expected_output_size(&self, input: Size2D, pixel_format: PixelFormat) -> Result<Size2D> {
        require_format(
            "binning",
            pixel_format,
            self.is_pixel_format_supported(pixel_format),
        )?;
        Ok(reduced_size(
            input,
            pixel_format,
            self.config.x,
            self.config.y,
        ))
    }

    pub fn process(&self, image: &Image<'_>) -> Result<Image<'static>> {
        let fmt = image.pixel_format();
        let out_size = self.expected_output_size(image.size(), fmt)?;
        require_non_empty("binning", image)?;
        if out_size.area() == 0 {
            return Err(Error::OutOfRange(format!(
                "{}x{} image is too small for {}x{} binning",
                image.width(),
                image.height(),
                self.config.x,
                self.config.y
            )));
        }

        let channels = fmt.num_channels() as usize;
        let bayer = fmt.is_bayered();
        let step = reduction_step(bayer);
        let (bx, by) = (self.config.x as usize, self.config.y as usize);
        let count = (bx * by) as u32;
        let max = fmt.maximum_value_per_channel();
        let width = image.width();
        let src = image.samples()?;

        let mut out = Vec::with_capacity(out_size.area() * channels);
        for oy in 0..out_size.height {
            let y0 = reduction_origin(oy, by, bayer);
            for ox in 0..out_size.width {
                let x0 = reduction_origin(ox, bx, bayer);
                for c in 0..channels {
                    let mut sum = 0u32;
                    for j in 0..by {
                        let row = (y0 + j * step) * width;
                        for i in 0..bx {
                            sum += src[(row + x0 + i * step) * channels + c] as u32;
                        }
                    }
                    let v = match self.config.mode {
                        BinningMode::Average => (sum + count / 2) / count,
                        BinningMode::Sum => sum.min(max),
                    };
                    out.push(v as u16);
                }
            }
        }
        image_like(image, out_size.width, out_size.height, fmt, &out)
    }
}

impl Operator for Binning {
    fn name(&self) -> &'static str {
        "binning"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        Binning::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.process(image)
    }
}
