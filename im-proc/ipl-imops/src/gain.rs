use serde::{Deserialize, Serialize};

use ipl_formats::{CfaColor, PixelFormat, Range, Result};
use ipl_image::Image;

use crate::Operator;
use crate::common::{
    clamp_round, is_unpacked_sample_format, require_format, require_non_empty, rgb_indices,
};

const GAIN_RANGE: Range<f64> = Range {
    min: 1.0,
    max: 10.0,
    inc: 0.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainConfig {
    pub master: f64,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            master: 1.0,
            red: 1.0,
            green: 1.0,
            blue: 1.0,
        }
    }
}

impl GainConfig {
    pub fn validate(&self) -> Result<()> {
        GAIN_RANGE.check("master gain", self.master)?;
        GAIN_RANGE.check("red gain", self.red)?;
        GAIN_RANGE.check("green gain", self.green)?;
        GAIN_RANGE.check("blue gain", self.blue)
    }

    fn color_gain(&self, color: CfaColor) -> f64 {
        match color {
            CfaColor::Red => self.red,
            CfaColor::Green => self.green,
            CfaColor::Blue => self.blue,
        }
    }
}

/// Digital gain.
///
/// The master gain multiplies every color sample. Color gains additionally
/// apply to their channel of RGB-family images and to their filter sites of
/// Bayer images. Mono images only see the master gain.
#[derive(Debug, Clone, Default)]
pub struct Gain {
    config: GainConfig,
}

impl Gain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GainConfig {
        &self.config
    }

    pub fn set_master_gain(&mut self, value: f64) -> Result<()> {
        GAIN_RANGE.check("master gain", value)?;
        self.config.master = value;
        Ok(())
    }

    pub fn master_gain(&self) -> f64 {
        self.config.master
    }

    pub fn set_red_gain(&mut self, value: f64) -> Result<()> {
        GAIN_RANGE.check("red gain", value)?;
        self.config.red = value;
        Ok(())
    }

    pub fn red_gain(&self) -> f64 {
        self.config.red
    }

    pub fn set_green_gain(&mut self, value: f64) -> Result<()> {
        GAIN_RANGE.check("green gain", value)?;
        self.config.green = value;
        Ok(())
    }

    pub fn green_gain(&self) -> f64 {
        self.config.green
    }

    pub fn set_blue_gain(&mut self, value: f64) -> Result<()> {
        GAIN_RANGE.check("blue gain", value)?;
        self.config.blue = value;
        Ok(())
    }

    pub fn blue_gain(&self) -> f64 {
        self.config.blue
    }

    /// Valid range shared by the master and color gains.
    pub fn gain_range(&self) -> Range<f64> {
        GAIN_RANGE
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    fn amplified_samples(&self, image: &Image<'_>) -> Result<Vec<u16>> {
        let fmt = image.pixel_format();
        require_format("gain", fmt, self.is_pixel_format_supported(fmt))?;
        require_non_empty("gain", image)?;
        let max = fmt.maximum_value_per_channel() as u16;
        let master = self.config.master;
        let mut samples = image.samples()?;

        if fmt.is_bayered() {
            let pattern = fmt.bayer_pattern();
            let width = image.width();
            for (y, row) in samples.chunks_exact_mut(width).enumerate() {
                for (x, v) in row.iter_mut().enumerate() {
                    let color_gain = pattern
                        .color_at(y, x)
                        .map_or(1.0, |color| self.config.color_gain(color));
                    *v = clamp_round(*v as f64 * master * color_gain, max);
                }
            }
        } else if fmt.is_rgb_family() {
            let channels = fmt.num_channels() as usize;
            let [ri, gi, bi] = rgb_indices(fmt);
            let gains = [
                (ri, self.config.red),
                (gi, self.config.green),
                (bi, self.config.blue),
            ];
            for px in samples.chunks_exact_mut(channels) {
                for (i, g) in gains {
                    px[i] = clamp_round(px[i] as f64 * master * g, max);
                }
            }
        } else {
            for v in samples.iter_mut() {
                *v = clamp_round(*v as f64 * master, max);
            }
        }
        Ok(samples)
    }

    pub fn process(&self, image: &Image<'_>) -> Result<Image<'static>> {
        let samples = self.amplified_samples(image)?;
        let out = image.to_owned_image();
        out.write_samples(&samples)?;
        Ok(out)
    }

    pub fn process_in_place(&self, image: &Image<'_>) -> Result<()> {
        let samples = self.amplified_samples(image)?;
        image.write_samples(&samples)
    }
}

impl Operator for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        Gain::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.process(image)
    }
}
