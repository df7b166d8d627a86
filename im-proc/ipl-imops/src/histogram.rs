use ipl_formats::{PixelFormat, Result};
use ipl_image::Image;

use crate::common::{is_unpacked_sample_format, require_format};

/// Statistics of a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramChannel {
    pub pixel_sum: u64,
    pub pixel_count: u64,
    /// One bin per representable value, `0..=max`.
    pub bins: Vec<u64>,
}

impl HistogramChannel {
    fn new(max: u32) -> Self {
        Self {
            pixel_sum: 0,
            pixel_count: 0,
            bins: vec![0; max as usize + 1],
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.pixel_count == 0 {
            None
        } else {
            Some(self.pixel_sum as f64 / self.pixel_count as f64)
        }
    }
}

/// Per-channel histogram at the native bit depth of an image.
///
/// Bayer images yield a single channel covering every site.
#[derive(Debug, Clone)]
pub struct Histogram {
    pixel_format: PixelFormat,
    channels: Vec<HistogramChannel>,
}

impl Histogram {
    pub fn is_pixel_format_supported(pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    pub fn new(image: &Image<'_>) -> Result<Self> {
        let fmt = image.pixel_format();
        require_format("histogram", fmt, Self::is_pixel_format_supported(fmt))?;
        let max = fmt.maximum_value_per_channel();
        let n = fmt.num_channels() as usize;
        let mut channels = vec![HistogramChannel::new(max); n];
        let samples = image.samples()?;
        for px in samples.chunks_exact(n) {
            for (ch, &v) in channels.iter_mut().zip(px) {
                ch.bins[v as usize] += 1;
                ch.pixel_sum += v as u64;
                ch.pixel_count += 1;
            }
        }
        Ok(Self {
            pixel_format: fmt,
            channels,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn channels(&self) -> &[HistogramChannel] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_counts() {
        let im = Image::from_vec(2, 1, PixelFormat::RGB8, vec![1, 2, 3, 1, 5, 7]).unwrap();
        let h = Histogram::new(&im).unwrap();
        assert_eq!(h.channels().len(), 3);
        let red = &h.channels()[0];
        assert_eq!(red.bins.len(), 256);
        assert_eq!(red.bins[1], 2);
        assert_eq!(red.pixel_count, 2);
        assert_eq!(h.channels()[2].pixel_sum, 10);
        assert_eq!(h.channels()[1].mean(), Some(3.5));
    }

    #[test]
    fn test_bins_follow_depth() {
        let im = Image::new(4, 4, PixelFormat::Mono12).unwrap();
        let h = Histogram::new(&im).unwrap();
        assert_eq!(h.channels()[0].bins.len(), 4096);
        assert_eq!(h.channels()[0].bins[0], 16);
    }
}
