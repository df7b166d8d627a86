use ipl_formats::{ColorFamily, Error, PixelFormat, Result, Size2D};
use ipl_image::Image;

/// Formats whose samples can be read one per channel.
pub(crate) fn is_unpacked_sample_format(fmt: PixelFormat) -> bool {
    fmt.has_unpacked_samples() && !fmt.is_yuv()
}

pub(crate) fn is_unpacked_rgb(fmt: PixelFormat) -> bool {
    is_unpacked_sample_format(fmt) && fmt.is_rgb_family()
}

pub(crate) fn require_format(algorithm: &str, fmt: PixelFormat, supported: bool) -> Result<()> {
    if supported {
        Ok(())
    } else {
        Err(Error::ImageFormatNotSupported(format!(
            "{algorithm} does not support {fmt}"
        )))
    }
}

/// Fails with [Error::InvalidArgument] for images without pixels.
pub(crate) fn require_non_empty(algorithm: &str, image: &Image<'_>) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidArgument(format!(
            "{algorithm} cannot process a {}x{} image",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

pub(crate) fn require_min_size(algorithm: &str, image: &Image<'_>, min: Size2D) -> Result<()> {
    if image.width() < min.width || image.height() < min.height {
        return Err(Error::OutOfRange(format!(
            "{algorithm} needs at least {}x{} pixels, got {}x{}",
            min.width,
            min.height,
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

/// Positions of red, green and blue within a pixel of an RGB-family format.
pub(crate) fn rgb_indices(fmt: PixelFormat) -> [usize; 3] {
    match fmt.family() {
        ColorFamily::Bgr | ColorFamily::Bgra => [2, 1, 0],
        _ => [0, 1, 2],
    }
}

/// Build an owned image of the same shape holding `samples`.
pub(crate) fn image_like(
    image: &Image<'_>,
    width: usize,
    height: usize,
    fmt: PixelFormat,
    samples: &[u16],
) -> Result<Image<'static>> {
    let out = Image::new(width, height, fmt)?.with_timestamp(image.timestamp());
    out.write_samples(samples)?;
    Ok(out)
}

/// Clamp a float result into `0..=max`.
#[inline]
pub(crate) fn clamp_round(v: f64, max: u16) -> u16 {
    v.round().clamp(0.0, max as f64) as u16
}

/// A single channel plane with edge-replicating reads.
pub(crate) struct Plane<'a> {
    pub(crate) data: &'a [u16],
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) stride: usize,
    pub(crate) offset: usize,
}

impl<'a> Plane<'a> {
    /// Channel `channel` of interleaved samples with `channels` per pixel.
    pub(crate) fn channel(
        data: &'a [u16],
        width: usize,
        height: usize,
        channels: usize,
        channel: usize,
    ) -> Self {
        Self {
            data,
            width,
            height,
            stride: channels,
            offset: channel,
        }
    }

    #[inline]
    pub(crate) fn get(&self, x: usize, y: usize) -> u16 {
        self.data[(y * self.width + x) * self.stride + self.offset]
    }

    #[inline]
    pub(crate) fn get_clamped(&self, x: isize, y: isize) -> u16 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.get(x, y)
    }

    /// Mean of the 3x3 neighbourhood around `(x, y)`.
    pub(crate) fn mean3x3(&self, x: usize, y: usize) -> f64 {
        let (x, y) = (x as isize, y as isize);
        let mut sum = 0u32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                sum += self.get_clamped(x + dx, y + dy) as u32;
            }
        }
        sum as f64 / 9.0
    }
}

/// Output size when reducing by integer factors.
///
/// Bayer images are reduced in whole 2x2 cells so that the output keeps the
/// input's pattern.
pub(crate) fn reduced_size(input: Size2D, fmt: PixelFormat, x: u32, y: u32) -> Size2D {
    let (x, y) = (x as usize, y as usize);
    if fmt.is_bayered() {
        Size2D::new(input.width / (2 * x) * 2, input.height / (2 * y) * 2)
    } else {
        Size2D::new(input.width / x, input.height / y)
    }
}

/// First source coordinate contributing to output coordinate `o`.
///
/// Further contributions follow at a distance of [reduction_step].
#[inline]
pub(crate) fn reduction_origin(o: usize, factor: usize, bayer: bool) -> usize {
    if bayer {
        (o / 2) * 2 * factor + o % 2
    } else {
        o * factor
    }
}

#[inline]
pub(crate) fn reduction_step(bayer: bool) -> usize {
    if bayer { 2 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_edges_replicate() {
        let data = [1u16, 10, 2, 20, 3, 30, 4, 40];
        let plane = Plane::channel(&data, 2, 2, 2, 1);
        assert_eq!(plane.get(1, 1), 40);
        assert_eq!(plane.get_clamped(-1, -1), 10);
        assert_eq!(plane.get_clamped(5, 0), 20);
        let mean = plane.mean3x3(0, 0);
        assert!((mean - (10.0 * 4.0 + 20.0 * 2.0 + 30.0 * 2.0 + 40.0) / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_bayer_reduction_keeps_cells() {
        let size = reduced_size(Size2D::new(10, 9), PixelFormat::BayerRG8, 2, 2);
        assert_eq!(size, Size2D::new(4, 4));
        // Output column 3 is the odd column of the second cell.
        assert_eq!(reduction_origin(3, 2, true), 5);
        assert_eq!(reduction_origin(3, 2, false), 6);
    }
}
