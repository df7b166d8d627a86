use serde::{Deserialize, Serialize};

use ipl_formats::{PixelFormat, Range, Result};
use ipl_image::Image;

use crate::Operator;
use crate::common::{clamp_round, is_unpacked_sample_format, require_format, require_non_empty};

const GAMMA_RANGE: Range<f64> = Range {
    min: 0.3,
    max: 3.0,
    inc: 0.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GammaConfig {
    pub value: f64,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl GammaConfig {
    pub fn validate(&self) -> Result<()> {
        GAMMA_RANGE.check("gamma", self.value)
    }
}

/// Power law remapping `out = max * (in / max)^(1 / gamma)` of every color
/// channel.
///
/// Gamma values above one brighten mid tones. Alpha is left untouched.
#[derive(Debug, Clone, Default)]
pub struct GammaCorrector {
    config: GammaConfig,
}

impl GammaCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GammaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GammaConfig {
        &self.config
    }

    pub fn set_gamma_correction_value(&mut self, value: f64) -> Result<()> {
        GAMMA_RANGE.check("gamma", value)?;
        self.config.value = value;
        Ok(())
    }

    pub fn gamma_correction_value(&self) -> f64 {
        self.config.value
    }

    pub fn gamma_correction_min(&self) -> f64 {
        GAMMA_RANGE.min
    }

    pub fn gamma_correction_max(&self) -> f64 {
        GAMMA_RANGE.max
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    fn lookup_table(&self, max: u16) -> Vec<u16> {
        let inv = 1.0 / self.config.value;
        let maxf = max as f64;
        (0..=max)
            .map(|v| clamp_round(maxf * (v as f64 / maxf).powf(inv), max))
            .collect()
    }

    fn corrected_samples(&self, image: &Image<'_>) -> Result<Vec<u16>> {
        let fmt = image.pixel_format();
        require_format(
            "gamma correction",
            fmt,
            self.is_pixel_format_supported(fmt),
        )?;
        require_non_empty("gamma correction", image)?;
        let lut = self.lookup_table(fmt.maximum_value_per_channel() as u16);
        let channels = fmt.num_channels() as usize;
        let color_channels = if fmt.has_alpha() { 3 } else { channels };
        let mut samples = image.samples()?;
        for px in samples.chunks_exact_mut(channels) {
            for v in &mut px[..color_channels] {
                *v = lut[*v as usize];
            }
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

impl Operator for GammaCorrector {
    fn name(&self) -> &'static str {
        "gamma"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        GammaCorrector::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.process(image)
    }
}
