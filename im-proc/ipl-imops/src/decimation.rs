use serde::{Deserialize, Serialize};

use ipl_formats::{Error, PixelFormat, Range, Result, Size2D};
use ipl_image::Image;

use crate::Operator;
use crate::binning::FACTOR_RANGE;
use crate::common::{
    image_like, is_unpacked_sample_format, reduced_size, reduction_origin, require_format,
    require_non_empty,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    pub x: u32,
    pub y: u32,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

impl DecimationConfig {
    pub fn validate(&self) -> Result<()> {
        FACTOR_RANGE.check("decimation x", self.x)?;
        FACTOR_RANGE.check("decimation y", self.y)
    }
}

/// Keeps every `x`-th column and `y`-th row, without averaging.
#[derive(Debug, Clone, Default)]
pub struct Decimation {
    config: DecimationConfig,
}

impl Decimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecimationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecimationConfig {
        &self.config
    }

    pub fn set_decimation_x(&mut self, value: u32) -> Result<()> {
        FACTOR_RANGE.check("decimation x", value)?;
        self.config.x = value;
        Ok(())
    }

    pub fn decimation_x(&self) -> u32 {
        self.config.x
    }

    pub fn set_decimation_y(&mut self, value: u32) -> Result<()> {
        FACTOR_RANGE.check("decimation y", value)?;
        self.config.y = value;
        Ok(())
    }

    pub fn decimation_y(&self) -> u32 {
        self.config.y
    }

    pub fn decimation_range(&self) -> Range<u32> {
        FACTOR_RANGE
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    pub fn expected_output_size(&self, input: Size2D, pixel_format: PixelFormat) -> Result<Size2D> {
        require_format(
            "decimation",
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
        require_non_empty("decimation", image)?;
        if out_size.area() == 0 {
            return Err(Error::OutOfRange(format!(
                "{}x{} image is too small for {}x{} decimation",
                image.width(),
                image.height(),
                self.config.x,
                self.config.y
            )));
        }
        let channels = fmt.num_channels() as usize;
        let bayer = fmt.is_bayered();
        let (dx, dy) = (self.config.x as usize, self.config.y as usize);
        let src = image.samples()?;
        let width = image.width();

        let mut out = Vec::with_capacity(out_size.area() * channels);
        for oy in 0..out_size.height {
            let y = reduction_origin(oy, dy, bayer);
            for ox in 0..out_size.width {
                let x = reduction_origin(ox, dx, bayer);
                let start = (y * width + x) * channels;
                out.extend_from_slice(&src[start..start + channels]);
            }
        }
        image_like(image, out_size.width, out_size.height, fmt, &out)
    }
}

impl Operator for Decimation {
    fn name(&self) -> &'static str {
        "decimation"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        Decimation::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.process(image)
    }
}
