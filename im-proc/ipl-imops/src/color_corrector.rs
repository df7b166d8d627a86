use serde::{Deserialize, Serialize};

use ipl_formats::{PixelFormat, Range, Result};
use ipl_image::Image;

use crate::Operator;
use crate::common::{clamp_round, is_unpacked_rgb, require_format, require_non_empty, rgb_indices};

const SATURATION_RANGE: Range<f64> = Range {
    min: 0.0,
    max: 2.0,
    inc: 0.0,
};

/// Factors compared as equal when closer than this.
const FACTOR_EPSILON: f64 = 1e-5;

/// A 3x3 color correction matrix.
///
/// Field `xy` is the contribution of input channel `x` to output channel
/// `y`, so the first matrix row `rr, gr, br` computes red.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColorCorrectionFactors {
    pub rr: f64,
    pub gr: f64,
    pub br: f64,
    pub rg: f64,
    pub gg: f64,
    pub bg: f64,
    pub rb: f64,
    pub gb: f64,
    pub bb: f64,
}

impl ColorCorrectionFactors {
    pub const IDENTITY: Self = Self {
        rr: 1.0,
        gr: 0.0,
        br: 0.0,
        rg: 0.0,
        gg: 1.0,
        bg: 0.0,
        rb: 0.0,
        gb: 0.0,
        bb: 1.0,
    };

    /// Build from a row-major matrix.
    pub fn from_rows(m: [[f64; 3]; 3]) -> Self {
        Self {
            rr: m[0][0],
            gr: m[0][1],
            br: m[0][2],
            rg: m[1][0],
            gg: m[1][1],
            bg: m[1][2],
            rb: m[2][0],
            gb: m[2][1],
            bb: m[2][2],
        }
    }

    pub fn rows(&self) -> [[f64; 3]; 3] {
        [
            [self.rr, self.gr, self.br],
            [self.rg, self.gg, self.bg],
            [self.rb, self.gb, self.bb],
        ]
    }
}

impl Default for ColorCorrectionFactors {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PartialEq for ColorCorrectionFactors {
    fn eq(&self, other: &Self) -> bool {
        self.rows()
            .iter()
            .flatten()
            .zip(other.rows().iter().flatten())
            .all(|(a, b)| (a - b).abs() <= FACTOR_EPSILON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCorrectorConfig {
    pub factors: ColorCorrectionFactors,
    pub saturation: f64,
}

impl Default for ColorCorrectorConfig {
    fn default() -> Self {
        Self {
            factors: ColorCorrectionFactors::IDENTITY,
            saturation: 1.0,
        }
    }
}

impl ColorCorrectorConfig {
    pub fn validate(&self) -> Result<()> {
        SATURATION_RANGE.check("saturation", self.saturation)
    }
}

/// Applies a color matrix followed by a saturation adjustment to RGB-family
/// images.
#[derive(Debug, Clone, Default)]
pub struct ColorCorrector {
    config: ColorCorrectorConfig,
}

impl ColorCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ColorCorrectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ColorCorrectorConfig {
        &self.config
    }

    pub fn set_color_correction_factors(&mut self, factors: ColorCorrectionFactors) {
        self.config.factors = factors;
    }

    pub fn color_correction_factors(&self) -> ColorCorrectionFactors {
        self.config.factors
    }

    pub fn set_saturation(&mut self, saturation: f64) -> Result<()> {
        SATURATION_RANGE.check("saturation", saturation)?;
        self.config.saturation = saturation;
        Ok(())
    }

    pub fn saturation(&self) -> f64 {
        self.config.saturation
    }

    pub fn saturation_min(&self) -> f64 {
        SATURATION_RANGE.min
    }

    pub fn saturation_max(&self) -> f64 {
        SATURATION_RANGE.max
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_rgb(pixel_format)
    }

    fn corrected_samples(&self, image: &Image<'_>) -> Result<Vec<u16>> {
        let fmt = image.pixel_format();
        require_format(
            "color correction",
            fmt,
            self.is_pixel_format_supported(fmt),
        )?;
        require_non_empty("color correction", image)?;
        let max = fmt.maximum_value_per_channel() as u16;
        let channels = fmt.num_channels() as usize;
        let [ri, gi, bi] = rgb_indices(fmt);
        let m = self.config.factors.rows();
        let s = self.config.saturation;

        let mut samples = image.samples()?;
        for px in samples.chunks_exact_mut(channels) {
            let rgb = [px[ri] as f64, px[gi] as f64, px[bi] as f64];
            let mut out = [0.0f64; 3];
            for (o, row) in out.iter_mut().zip(m.iter()) {
                *o = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2];
            }
            let y = 0.299 * out[0] + 0.587 * out[1] + 0.114 * out[2];
            for o in out.iter_mut() {
                *o = y + s * (*o - y);
            }
            px[ri] = clamp_round(out[0], max);
            px[gi] = clamp_round(out[1], max);
            px[bi] = clamp_round(out[2], max);
        }
        Ok(samples)
    }

    pub fn process(&self, image: &Image<'_>) -> Result<Image<'static>> {
        let samples = self.corrected_samples(image)?;
        let out = image.to_owned_image();
        out.write_samples(&samples)?;
        Ok(out)
    }

    pub fn process_in_place(&self, image: &Image<'_>) -> Result<()> {
        let samples = self.corrected_samples(image)?;
        image.write_samples(&samples)
    }
}

impl Operator for ColorCorrector {
    fn name(&self) -> &'static str {
        "color-correction"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        ColorCorrector::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.process(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_equality() {
        let mut a = ColorCorrectionFactors::IDENTITY;
        a.gr = 1e-7;
        assert_eq!(a, ColorCorrectionFactors::IDENTITY);
        a.gr = 0.01;
        assert_ne!(a, ColorCorrectionFactors::IDENTITY);
    }

    #[test]
    fn test_swap_red_and_blue() {
        let im = Image::from_vec(1, 1, PixelFormat::BGR8, vec![30, 20, 10]).unwrap();
        let mut cc = ColorCorrector::new();
        cc.set_color_correction_factors(ColorCorrectionFactors::from_rows([
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
        ]));
        let out = cc.process(&im).unwrap();
        assert_eq!(&out.data()[..], &[10, 20, 30]);
    }

    #[test]
    fn test_zero_saturation_is_gray() {
        let im = Image::from_vec(1, 1, PixelFormat::RGB8, vec![200, 100, 50]).unwrap();
        let mut cc = ColorCorrector::new();
        cc.set_saturation(0.0).unwrap();
        cc.process_in_place(&im).unwrap();
        let d = im.data();
        assert_eq!(d[0], d[1]);
        assert_eq!(d[1], d[2]);
    }

    #[test]
    fn test_saturation_range() {
        let mut cc = ColorCorrector::new();
        assert!(cc.set_saturation(2.5).is_err());
        assert!(cc.set_saturation(-0.1).is_err());
        assert_eq!(cc.saturation(), 1.0);
    }

    #[test]
    fn test_mono_rejected() {
        let im = Image::new(2, 2, PixelFormat::Mono8).unwrap();
        assert!(ColorCorrector::new().process(&im).is_err());
    }
}
