//! Detection and correction of hot pixels.
//!
//! A pixel is hot when it exceeds the brightest of its same-color
//! neighbours by a threshold. The threshold is a fraction of the channel
//! maximum chosen by the [SensitivityLevel], scaled by the sensor gain so
//! that amplified noise is not mistaken for defects.
//!
//! Hot pixels can be corrected from an explicit list (e.g. a factory
//! calibration read from the camera) or adaptively. In adaptive mode the
//! corrector keeps a list across calls: a candidate is confirmed after it
//! was detected in [CONFIRM_COUNT] consecutive images and forgotten after
//! as many consecutive misses.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use ipl_formats::{Error, PixelFormat, Point2D, Result, Size2D};
use ipl_image::Image;

use crate::Operator;
use crate::common::{
    image_like, is_unpacked_sample_format, require_format, require_min_size, require_non_empty,
};

/// Consecutive detections needed to confirm, and misses needed to forget,
/// an adaptively tracked hot pixel.
pub const CONFIRM_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    Level1,
    Level2,
    #[default]
    Level3,
    Level4,
    Level5,
}

impl SensitivityLevel {
    /// Detection threshold in percent of the channel maximum.
    fn threshold_percent(&self) -> f64 {
        match self {
            SensitivityLevel::Level1 => 50.0,
            SensitivityLevel::Level2 => 35.0,
            SensitivityLevel::Level3 => 25.0,
            SensitivityLevel::Level4 => 15.0,
            SensitivityLevel::Level5 => 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotpixelConfig {
    pub sensitivity: SensitivityLevel,
    pub gain_factor_percent: u32,
}

impl Default for HotpixelConfig {
    fn default() -> Self {
        Self {
            sensitivity: SensitivityLevel::Level3,
            gain_factor_percent: 100,
        }
    }
}

impl HotpixelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gain_factor_percent == 0 {
            return Err(Error::InvalidArgument(
                "gain factor percent must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Track {
    hits: u32,
    misses: u32,
    confirmed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HotpixelCorrection {
    config: HotpixelConfig,
    tracked: BTreeMap<Point2D, Track>,
    tracked_size: Option<Size2D>,
}

impl HotpixelCorrection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HotpixelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &HotpixelConfig {
        &self.config
    }

    pub fn set_sensitivity(&mut self, level: SensitivityLevel) {
        self.config.sensitivity = level;
    }

    pub fn sensitivity(&self) -> SensitivityLevel {
        self.config.sensitivity
    }

    pub fn set_gain_factor_percent(&mut self, percent: u32) -> Result<()> {
        let config = HotpixelConfig {
            gain_factor_percent: percent,
            ..self.config
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn gain_factor_percent(&self) -> u32 {
        self.config.gain_factor_percent
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    /// Hot pixels confirmed by adaptive correction so far.
    pub fn hotpixels(&self) -> Vec<Point2D> {
        self.tracked
            .iter()
            .filter(|(_, t)| t.confirmed)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Forget all adaptively tracked hot pixels.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.tracked_size = None;
    }

    fn check(&self, image: &Image<'_>) -> Result<()> {
        let fmt = image.pixel_format();
        require_format(
            "hotpixel correction",
            fmt,
            self.is_pixel_format_supported(fmt),
        )?;
        require_non_empty("hotpixel correction", image)?;
        let min = if fmt.is_bayered() {
            Size2D::new(5, 5)
        } else {
            Size2D::new(3, 3)
        };
        require_min_size("hotpixel correction", image, min)
    }

    /// Find hot pixels in a single image.
    ///
    /// This does not touch the adaptively tracked list.
    pub fn detect(&self, image: &Image<'_>) -> Result<Vec<Point2D>> {
        self.check(image)?;
        let samples = image.samples()?;
        Ok(self.find(&SampleView::new(image, &samples)))
    }

    fn find(&self, view: &SampleView<'_>) -> Vec<Point2D> {
        let threshold = view.max as f64 * self.config.sensitivity.threshold_percent() / 100.0
            * self.config.gain_factor_percent as f64
            / 100.0;
        let mut found = Vec::new();
        for y in 0..view.height {
            for x in 0..view.width {
                let hot = (0..view.color_channels).any(|c| {
                    let v = view.get(x, y, c) as f64;
                    let neighbour_max = view
                        .neighbours(x, y)
                        .map(|(nx, ny)| view.get(nx, ny, c))
                        .max()
                        .unwrap_or(u16::MAX);
                    v > neighbour_max as f64 + threshold
                });
                if hot {
                    found.push(Point2D::new(x, y));
                }
            }
        }
        found
    }

    fn corrected(&self, view: &SampleView<'_>, hotpixels: &[Point2D]) -> Vec<u16> {
        let mut out = view.samples.to_vec();
        for p in hotpixels {
            if p.x >= view.width || p.y >= view.height {
                tracing::warn!(
                    "skipping hotpixel ({}, {}) outside {}x{} image",
                    p.x,
                    p.y,
                    view.width,
                    view.height
                );
                continue;
            }
            for c in 0..view.color_channels {
                let (sum, n) = view
                    .neighbours(p.x, p.y)
                    .fold((0u32, 0u32), |(sum, n), (nx, ny)| {
                        (sum + view.get(nx, ny, c) as u32, n + 1)
                    });
                if n > 0 {
                    out[view.index(p.x, p.y, c)] = ((sum + n / 2) / n) as u16;
                }
            }
        }
        out
    }

    /// Replace each listed pixel by the mean of its same-color neighbours.
    pub fn correct(&self, image: &Image<'_>, hotpixels: &[Point2D]) -> Result<Image<'static>> {
        self.check(image)?;
        let samples = image.samples()?;
        let out = self.corrected(&SampleView::new(image, &samples), hotpixels);
        image_like(
            image,
            image.width(),
            image.height(),
            image.pixel_format(),
            &out,
        )
    }

    pub fn correct_in_place(&self, image: &Image<'_>, hotpixels: &[Point2D]) -> Result<()> {
        self.check(image)?;
        let samples = image.samples()?;
        let out = self.corrected(&SampleView::new(image, &samples), hotpixels);
        image.write_samples(&out)
    }

    /// Update the tracked list from `image`, then correct it with the
    /// confirmed hot pixels.
    pub fn correct_adaptive(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.check(image)?;
        let out = self.adaptive_samples(image)?;
        image_like(
            image,
            image.width(),
            image.height(),
            image.pixel_format(),
            &out,
        )
    }

    /// Adaptive correction writing into the storage of `image`.
    ///
    /// Read-only images fail with [Error::NotPermitted] before the tracked
    /// list is touched.
    pub fn correct_adaptive_in_place(&mut self, image: &Image<'_>) -> Result<()> {
        self.check(image)?;
        if !image.is_writable() {
            return Err(Error::NotPermitted(
                "adaptive hotpixel correction needs a writable image".into(),
            ));
        }
        let out = self.adaptive_samples(image)?;
        image.write_samples(&out)
    }

    fn adaptive_samples(&mut self, image: &Image<'_>) -> Result<Vec<u16>> {
        if self.tracked_size != Some(image.size()) {
            if !self.tracked.is_empty() {
                tracing::debug!("image size changed, forgetting tracked hotpixels");
            }
            self.tracked.clear();
            self.tracked_size = Some(image.size());
        }
        let samples = image.samples()?;
        let view = SampleView::new(image, &samples);
        let candidates: BTreeSet<Point2D> = self.find(&view).into_iter().collect();
        self.update_tracked(&candidates);
        Ok(self.corrected(&view, &self.hotpixels()))
    }

    fn update_tracked(&mut self, candidates: &BTreeSet<Point2D>) {
        let confirmed_before = self.hotpixels().len();
        for p in candidates {
            let track = self.tracked.entry(*p).or_default();
            track.hits = track.hits.saturating_add(1);
            track.misses = 0;
            if track.hits >= CONFIRM_COUNT {
                track.confirmed = true;
            }
        }
        self.tracked.retain(|p, track| {
            if candidates.contains(p) {
                return true;
            }
            track.hits = 0;
            track.misses += 1;
            track.misses < CONFIRM_COUNT
        });
        let confirmed_after = self.hotpixels().len();
        if confirmed_after != confirmed_before {
            tracing::debug!(
                "tracked hotpixels changed from {confirmed_before} to {confirmed_after}"
            );
        }
    }
}

impl Operator for HotpixelCorrection {
    fn name(&self) -> &'static str {
        "hotpixel"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        HotpixelCorrection::is_pixel_format_supported(self, pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        self.correct_adaptive(image)
    }
}

/// Interleaved samples with same-color neighbourhood lookup.
struct SampleView<'a> {
    samples: &'a [u16],
    width: usize,
    height: usize,
    channels: usize,
    color_channels: usize,
    /// Distance to the nearest same-color pixel.
    step: usize,
    max: u16,
}

impl<'a> SampleView<'a> {
    fn new(image: &Image<'_>, samples: &'a [u16]) -> Self {
        let fmt = image.pixel_format();
        let channels = fmt.num_channels() as usize;
        Self {
            samples,
            width: image.width(),
            height: image.height(),
            channels,
            color_channels: if fmt.has_alpha() { 3 } else { channels },
            step: if fmt.is_bayered() { 2 } else { 1 },
            max: fmt.maximum_value_per_channel() as u16,
        }
    }

    #[inline]
    fn index(&self, x: usize, y: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }

    #[inline]
    fn get(&self, x: usize, y: usize, c: usize) -> u16 {
        self.samples[self.index(x, y, c)]
    }

    /// In-bounds same-color neighbours of the eight surrounding positions.
    fn neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let s = self.step as isize;
        let (x, y) = (x as isize, y as isize);
        [-s, 0, s]
            .into_iter()
            .flat_map(move |dy| [-s, 0, s].into_iter().map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(|&(nx, ny)| {
                nx >= 0 && ny >= 0 && (nx as usize) < self.width && (ny as usize) < self.height
            })
            .map(|(nx, ny)| (nx as usize, ny as usize))
    }
}
