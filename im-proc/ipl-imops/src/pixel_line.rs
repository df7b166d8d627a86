use ipl_formats::{Error, Orientation, PixelFormat, Result};
use ipl_image::Image;

use crate::common::{is_unpacked_sample_format, require_format};

/// Raw samples of one channel along the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelLineChannel {
    pub values: Vec<u16>,
}

/// One row or column of an image, split per channel.
#[derive(Debug, Clone)]
pub struct PixelLine {
    pixel_format: PixelFormat,
    orientation: Orientation,
    offset: usize,
    channels: Vec<PixelLineChannel>,
}

impl PixelLine {
    pub fn is_pixel_format_supported(pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    /// Extract the row (for [Orientation::Horizontal]) or column at `offset`.
    pub fn new(image: &Image<'_>, orientation: Orientation, offset: usize) -> Result<Self> {
        let fmt = image.pixel_format();
        require_format("pixel line", fmt, Self::is_pixel_format_supported(fmt))?;
        let (w, h) = (image.width(), image.height());
        let limit = match orientation {
            Orientation::Horizontal => h,
            Orientation::Vertical => w,
        };
        if offset >= limit {
            return Err(Error::OutOfRange(format!(
                "{orientation:?} line {offset} outside {w}x{h} image"
            )));
        }

        let n = fmt.num_channels() as usize;
        let samples = image.samples()?;
        let positions: Box<dyn Iterator<Item = usize>> = match orientation {
            Orientation::Horizontal => Box::new((0..w).map(|x| offset * w + x)),
            Orientation::Vertical => Box::new((0..h).map(|y| y * w + offset)),
        };
        let mut channels = vec![
            PixelLineChannel {
                values: Vec::with_capacity(limit)
            };
            n
        ];
        for pos in positions {
            for (c, ch) in channels.iter_mut().enumerate() {
                ch.values.push(samples[pos * n + c]);
            }
        }
        Ok(Self {
            pixel_format: fmt,
            orientation,
            offset,
            channels,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn channels(&self) -> &[PixelLineChannel] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipl_formats::ErrorKind;

    fn counting_rgb() -> Image<'static> {
        let data: Vec<u8> = (0..3 * 3 * 2).collect();
        Image::from_vec(3, 2, PixelFormat::RGB8, data).unwrap()
    }

    #[test]
    fn test_row() {
        let line = PixelLine::new(&counting_rgb(), Orientation::Horizontal, 1).unwrap();
        assert_eq!(line.channels().len(), 3);
        assert_eq!(line.channels()[0].values, vec![9, 12, 15]);
        assert_eq!(line.channels()[2].values, vec![11, 14, 17]);
    }

    #[test]
    fn test_column() {
        let line = PixelLine::new(&counting_rgb(), Orientation::Vertical, 2).unwrap();
        assert_eq!(line.channels()[1].values, vec![7, 16]);
    }

    #[test]
    fn test_offset_outside() {
        let err = PixelLine::new(&counting_rgb(), Orientation::Vertical, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_packed_rejected() {
        let im = Image::new(4, 2, PixelFormat::Mono10p).unwrap();
        let err = PixelLine::new(&im, Orientation::Horizontal, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImageFormatNotSupported);
    }
}
