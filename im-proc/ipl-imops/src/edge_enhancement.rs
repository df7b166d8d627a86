use serde::{Deserialize, Serialize};

use ipl_formats::{PixelFormat, Range, Result, Size2D};
use ipl_image::Image;

use crate::Operator;
use crate::common::{
    Plane, clamp_round, is_unpacked_sample_format, require_format, require_min_size,
    require_non_empty,
};

const FACTOR_RANGE: Range<u32> = Range {
    min: 1,
    max: 9,
    inc: 1,
};

const DEFAULT_FACTOR: u32 = 2;

const MIN_SIZE: Size2D = Size2D::new(3, 3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeEnhancementConfig {
    pub factor: u32,
}

impl Default for EdgeEnhancementConfig {
    fn default() -> Self {
        Self {
            factor: DEFAULT_FACTOR,
        }
    }
}

impl EdgeEnhancementConfig {
    pub fn validate(&self) -> Result<()> {
        FACTOR_RANGE.check("edge enhancement factor", self.factor)
    }
}

/// Unsharp masking against the 3x3 mean.
///
/// Each sample moves away from its local mean by `factor / 4` times the
/// difference.
#[derive(Debug, Clone, Default)]
pub struct EdgeEnhancement {
    config: EdgeEnhancementConfig,
}

impl EdgeEnhancement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EdgeEnhancementConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EdgeEnhancementConfig {
        &self.config
    }

    pub fn set_factor(&mut self, factor: u32) -> Result<()> {
        FACTOR_RANGE.check("edge enhancement factor", factor)?;
        self.config.factor = factor;
        Ok(())
    }

    pub fn factor(&self) -> u32 {
        self.config.factor
    }

    pub fn default_factor(&self) -> u32 {
        DEFAULT_FACTOR
    }

    pub fn factor_range(&self) -> Range<u32> {
        FACTOR_RANGE
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format) && !pixel_format.is_bayered()
    }

    fn enhanced_samples(&self, image: &Image<'_>) -> Result<Vec<u16>> {
        let fmt = image.pixel_format();
        require_format(
            "edge enhancement",
            fmt,
            self.is_pixel_format_supported(fmt),
        )?;
        require_non_empty("edge enhancement", image)?;
        require_min_size("edge enhancement", image, MIN_SIZE)?;
        let (w, h) = (image.width(), image.height());
        let channels = fmt.num_channels() as usize;
        let color_channels = if fmt.has_alpha() { 3 } else { channels };
        let max = fmt.maximum_value_per_channel() as u16;
        let amount = self.config.factor as f64 / 4.0;

        let src = image.samples()?;
        let mut out = src.clone();
        for c in 0..color_channels {
            let plane = Plane::channel(&src, w, h, channels, c);
            for y in 0..h {
                for x in 0..w {
                    let v = plane.get(x, y) as f64;
                    let mean = plane.mean3x3(x, y);
                    out[(y * w + x) * channels + c] = clamp_round(v + amount * (v - mean), max);
                }
            }
        }
        Ok(out)
    }

    pub fn process(&self, image: &Image<'_>) -> Result<Image<'static>> {
        let samples = self.enhanced_samples(image)?;
        let out = image.to_owned_image();
        out.write_samples(&samples)?;
        Ok(out)
    }

    pub fn process_in_place(&self, image: &Image<'_>) -> Result<()> {
        let samples = self.enhanced_samples(image)?;
        image.write_samples(&samples)
    }
}

impl Operator for EdgeEnhancement {
    fn name(&self) -> &'static str {
        "edge-enhancement"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        EdgeEnhancement::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.process(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_edge() -> Image<'static> {
        let mut data = vec![0u8; 6 * 3];
        for row in data.chunks_exact_mut(6) {
            row[..3].fill(100);
            row[3..].fill(150);
        }
        Image::from_vec(6, 3, PixelFormat::Mono8, data).unwrap()
    }

    #[test]
    fn test_flat_image_unchanged() {
        let im = Image::from_vec(4, 4, PixelFormat::Mono8, vec![77; 16]).unwrap();
        let out = EdgeEnhancement::new().process(&im).unwrap();
        assert_eq!(&out.data()[..], &im.data()[..]);
    }

    #[test]
    fn test_contrast_grows_with_factor() {
        let im = step_edge();
        let mut ee = EdgeEnhancement::new();
        let mut previous = 50;
        for factor in [1, 4, 9] {
            ee.set_factor(factor).unwrap();
            let out = ee.process(&im).unwrap();
            let d = out.data();
            let contrast = d[3] as i32 - d[2] as i32;
            assert!(contrast > previous, "factor {factor}: {contrast}");
            previous = contrast;
        }
    }

    #[test]
    fn test_factor_range() {
        let mut ee = EdgeEnhancement::new();
        assert_eq!(ee.factor(), ee.default_factor());
        assert!(ee.set_factor(0).is_err());
        assert!(ee.set_factor(10).is_err());
    }

    #[test]
    fn test_too_small() {
        let im = Image::new(2, 5, PixelFormat::Mono8).unwrap();
        let err = EdgeEnhancement::new().process(&im).unwrap_err();
        assert_eq!(err.kind(), ipl_formats::ErrorKind::OutOfRange);
    }
}
