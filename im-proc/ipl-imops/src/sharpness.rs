//! Relative focus measure.
//!
//! Scores are only meaningful when compared against each other, e.g. while
//! sweeping a lens through its focus range. They are normalized by the
//! channel maximum so that images of different bit depths give comparable
//! values.

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use ipl_formats::{Error, PixelFormat, Rect2D, Result, Size2D};
use ipl_image::Image;

use crate::common::{is_unpacked_sample_format, require_format, require_non_empty, rgb_indices};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SharpnessAlgorithm {
    /// Mean squared Sobel gradient.
    #[default]
    Tenengrad,
    /// Mean absolute difference to the right and lower neighbours.
    MeanScore,
    /// Variance of the sample values.
    HistogramVariance,
    /// Mean Sobel gradient magnitude.
    Sobel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum SharpnessRoiWeight {
    Weak = 0x21,
    #[default]
    Medium = 0x42,
    Strong = 0x63,
}

impl SharpnessRoiWeight {
    fn factor(self) -> f64 {
        self as u8 as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharpnessRoi {
    pub rect: Rect2D,
    /// Distance between evaluated columns.
    #[serde(default = "one")]
    pub x_sampling_interval: usize,
    /// Distance between evaluated rows.
    #[serde(default = "one")]
    pub y_sampling_interval: usize,
    #[serde(default)]
    pub weight: SharpnessRoiWeight,
}

fn one() -> usize {
    1
}

impl SharpnessRoi {
    pub fn new(rect: Rect2D) -> Self {
        Self {
            rect,
            x_sampling_interval: 1,
            y_sampling_interval: 1,
            weight: SharpnessRoiWeight::Medium,
        }
    }

    pub fn with_weight(self, weight: SharpnessRoiWeight) -> Self {
        Self { weight, ..self }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sharpness {
    algorithm: SharpnessAlgorithm,
    rois: Vec<SharpnessRoi>,
}

impl Sharpness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    pub fn supported_pixel_formats(&self) -> Vec<PixelFormat> {
        PixelFormat::all()
            .iter()
            .copied()
            .filter(|f| self.is_pixel_format_supported(*f))
            .collect()
    }

    pub fn set_algorithm(&mut self, algorithm: SharpnessAlgorithm) {
        self.algorithm = algorithm;
    }

    pub fn algorithm(&self) -> SharpnessAlgorithm {
        self.algorithm
    }

    /// Smallest ROI that can be measured for `pixel_format`.
    ///
    /// Bayer images compare sites of the same color, which doubles the
    /// required extent.
    pub fn roi_min_size(&self, pixel_format: PixelFormat) -> Size2D {
        if pixel_format.is_bayered() {
            Size2D::new(32, 32)
        } else {
            Size2D::new(16, 16)
        }
    }

    /// Replace the ROIs. An empty list measures the whole image.
    pub fn set_rois(&mut self, rois: Vec<SharpnessRoi>) -> Result<()> {
        for roi in &rois {
            if roi.x_sampling_interval == 0 || roi.y_sampling_interval == 0 {
                return Err(Error::InvalidArgument(format!(
                    "sampling interval of {roi:?} must be positive"
                )));
            }
        }
        self.rois = rois;
        Ok(())
    }

    pub fn set_roi(&mut self, roi: SharpnessRoi) -> Result<()> {
        self.set_rois(vec![roi])
    }

    pub fn set_roi_rect(&mut self, rect: Rect2D) -> Result<()> {
        self.set_roi(SharpnessRoi::new(rect))
    }

    pub fn rois(&self) -> &[SharpnessRoi] {
        &self.rois
    }

    /// Weighted mean score of all ROIs.
    pub fn measure(&self, image: &Image<'_>) -> Result<f64> {
        let fmt = image.pixel_format();
        require_format("sharpness", fmt, self.is_pixel_format_supported(fmt))?;
        require_non_empty("sharpness", image)?;
        let whole = [SharpnessRoi::new(Rect2D::new(
            0,
            0,
            image.width(),
            image.height(),
        ))];
        let rois = if self.rois.is_empty() {
            &whole[..]
        } else {
            &self.rois[..]
        };
        let min = self.roi_min_size(fmt);
        for roi in rois {
            if roi.rect.width < min.width || roi.rect.height < min.height {
                return Err(Error::OutOfRange(format!(
                    "sharpness ROI {:?} is smaller than {}x{}",
                    roi.rect, min.width, min.height
                )));
            }
            if !roi.rect.fits_within(image.size()) {
                return Err(Error::OutOfRange(format!(
                    "sharpness ROI {:?} outside {}x{} image",
                    roi.rect,
                    image.width(),
                    image.height()
                )));
            }
        }

        let plane = IntensityPlane::new(image)?;
        let (mut total, mut weights) = (0.0, 0.0);
        for roi in rois {
            let w = roi.weight.factor();
            total += w * plane.score(self.algorithm, roi);
            weights += w;
        }
        Ok(total / weights)
    }
}

/// A single intensity value per pixel, scaled to `0.0..=1.0`.
struct IntensityPlane {
    values: Vec<f64>,
    width: usize,
    height: usize,
    /// Distance to the nearest comparable pixel.
    step: usize,
}

impl IntensityPlane {
    fn new(image: &Image<'_>) -> Result<Self> {
        let fmt = image.pixel_format();
        let max = fmt.maximum_value_per_channel() as f64;
        let channels = fmt.num_channels() as usize;
        let samples = image.samples()?;
        let values = if fmt.is_rgb_family() {
            let [ri, gi, bi] = rgb_indices(fmt);
            samples
                .chunks_exact(channels)
                .map(|px| {
                    (0.299 * px[ri] as f64 + 0.587 * px[gi] as f64 + 0.114 * px[bi] as f64) / max
                })
                .collect()
        } else {
            samples.iter().map(|&v| v as f64 / max).collect()
        };
        Ok(Self {
            values,
            width: image.width(),
            height: image.height(),
            step: if fmt.is_bayered() { 2 } else { 1 },
        })
    }

    fn get(&self, x: isize, y: isize) -> f64 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.values[y * self.width + x]
    }

    fn sobel(&self, x: usize, y: usize) -> (f64, f64) {
        let s = self.step as isize;
        let (x, y) = (x as isize, y as isize);
        let p = |dx: isize, dy: isize| self.get(x + dx * s, y + dy * s);
        let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
        let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
        (gx, gy)
    }

    fn score(&self, algorithm: SharpnessAlgorithm, roi: &SharpnessRoi) -> f64 {
        let r = roi.rect;
        let points: Vec<(usize, usize)> = iproduct!(
            (r.y..r.y + r.height).step_by(roi.y_sampling_interval),
            (r.x..r.x + r.width).step_by(roi.x_sampling_interval)
        )
        .map(|(y, x)| (x, y))
        .collect();
        let n = points.len() as f64;
        match algorithm {
            SharpnessAlgorithm::Tenengrad => {
                points
                    .iter()
                    .map(|&(x, y)| {
                        let (gx, gy) = self.sobel(x, y);
                        gx * gx + gy * gy
                    })
                    .sum::<f64>()
                    / n
            }
            SharpnessAlgorithm::Sobel => {
                points
                    .iter()
                    .map(|&(x, y)| {
                        let (gx, gy) = self.sobel(x, y);
                        (gx * gx + gy * gy).sqrt()
                    })
                    .sum::<f64>()
                    / n
            }
            SharpnessAlgorithm::MeanScore => {
                let s = self.step as isize;
                points
                    .iter()
                    .map(|&(x, y)| {
                        let (x, y) = (x as isize, y as isize);
                        let v = self.get(x, y);
                        (self.get(x + s, y) - v).abs() + (self.get(x, y + s) - v).abs()
                    })
                    .sum::<f64>()
                    / n
            }
            SharpnessAlgorithm::HistogramVariance => {
                let vals: Vec<f64> = points
                    .iter()
                    .map(|&(x, y)| self.values[y * self.width + x])
                    .collect();
                let mean = vals.iter().sum::<f64>() / n;
                vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
            }
        }
    }
}
