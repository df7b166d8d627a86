//! Mirroring and rotation in steps of 90 degrees.
//!
//! Pixels move as whole units, so no sample is modified. For Bayer images
//! the color filter seen at the new origin may differ from the input's, and
//! the output reports the pattern that actually results.

use serde::{Deserialize, Serialize};

use ipl_formats::{BayerPattern, CfaColor, Error, PixelFormat, Result};
use ipl_image::Image;

use crate::Operator;
use crate::common::{is_unpacked_sample_format, require_format, require_non_empty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mirror {
    /// Flip around the horizontal axis.
    UpDown,
    /// Flip around the vertical axis.
    LeftRight,
    UpDownLeftRight,
}

/// Rotation angle. [RotationAngle::Degree90] turns counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum RotationAngle {
    Degree90 = 90,
    Degree180 = 180,
    Degree270 = 270,
}

impl TryFrom<u16> for RotationAngle {
    type Error = Error;
    fn try_from(degrees: u16) -> Result<Self> {
        match degrees {
            90 => Ok(RotationAngle::Degree90),
            180 => Ok(RotationAngle::Degree180),
            270 => Ok(RotationAngle::Degree270),
            other => Err(Error::InvalidArgument(format!(
                "rotation by {other} degrees is not supported"
            ))),
        }
    }
}

impl From<RotationAngle> for u16 {
    fn from(angle: RotationAngle) -> u16 {
        angle as u16
    }
}

#[derive(Debug, Clone, Copy)]
enum Transform {
    Mirror(Mirror),
    Rotate(RotationAngle),
}

impl Transform {
    fn output_dims(self, w: usize, h: usize) -> (usize, usize) {
        match self {
            Transform::Rotate(RotationAngle::Degree90 | RotationAngle::Degree270) => (h, w),
            _ => (w, h),
        }
    }

    /// Source pixel of output pixel `(x, y)` for a `w` by `h` input.
    #[inline]
    fn source_of(self, w: usize, h: usize, x: usize, y: usize) -> (usize, usize) {
        match self {
            Transform::Mirror(Mirror::UpDown) => (x, h - 1 - y),
            Transform::Mirror(Mirror::LeftRight) => (w - 1 - x, y),
            Transform::Mirror(Mirror::UpDownLeftRight) => (w - 1 - x, h - 1 - y),
            Transform::Rotate(RotationAngle::Degree90) => (w - 1 - y, x),
            Transform::Rotate(RotationAngle::Degree180) => (w - 1 - x, h - 1 - y),
            Transform::Rotate(RotationAngle::Degree270) => (y, h - 1 - x),
        }
    }
}

/// The Bayer pattern at the output origin after applying `t`.
fn transformed_pattern(
    pattern: BayerPattern,
    t: Transform,
    w: usize,
    h: usize,
) -> Result<BayerPattern> {
    let (ow, oh) = t.output_dims(w, h);
    if ow < 2 || oh < 2 {
        // A single row or column has no complete cell; keep the label.
        return Ok(pattern);
    }
    let mut cells = [[CfaColor::Green; 2]; 2];
    for (r, row) in cells.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            let (sx, sy) = t.source_of(w, h, c, r);
            *cell = pattern.color_at(sy, sx).ok_or_else(|| {
                Error::Internal(format!("no color filter in {pattern} image"))
            })?;
        }
    }
    BayerPattern::from_cells(cells)
        .ok_or_else(|| Error::Internal(format!("{cells:?} is not a Bayer cell")))
}

/// Stateless mirroring and rotation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTransformer;

impl ImageTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        is_unpacked_sample_format(pixel_format)
    }

    fn transformed(
        &self,
        image: &Image<'_>,
        t: Transform,
    ) -> Result<(Vec<u8>, usize, usize, PixelFormat)> {
        let fmt = image.pixel_format();
        require_format("image transformer", fmt, self.is_pixel_format_supported(fmt))?;
        require_non_empty("image transformer", image)?;
        let (w, h) = (image.width(), image.height());
        let (ow, oh) = t.output_dims(w, h);
        let bpp = fmt.num_storage_bits_per_pixel() as usize / 8;
        let out_fmt = if fmt.is_bayered() {
            fmt.with_bayer_pattern(transformed_pattern(fmt.bayer_pattern(), t, w, h)?)?
        } else {
            fmt
        };

        let src = image.data();
        let mut out = vec![0u8; ow * oh * bpp];
        for (y, row) in out.chunks_exact_mut(ow * bpp).enumerate() {
            for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
                let (sx, sy) = t.source_of(w, h, x, y);
                let start = (sy * w + sx) * bpp;
                px.copy_from_slice(&src[start..start + bpp]);
            }
        }
        Ok((out, ow, oh, out_fmt))
    }

    fn apply_new(&self, image: &Image<'_>, t: Transform) -> Result<Image<'static>> {
        let (data, w, h, fmt) = self.transformed(image, t)?;
        Ok(Image::from_vec(w, h, fmt, data)?.with_timestamp(image.timestamp()))
    }

    /// Overwrite the storage of `image` and return a view with the new
    /// dimensions and Bayer label.
    fn apply_in_place<'a>(&self, image: &Image<'a>, t: Transform) -> Result<Image<'a>> {
        let (data, w, h, fmt) = self.transformed(image, t)?;
        image.data_mut()?.copy_from_slice(&data);
        image.reinterpret(w, h, fmt)
    }

    pub fn mirror(&self, image: &Image<'_>, mirror: Mirror) -> Result<Image<'static>> {
        self.apply_new(image, Transform::Mirror(mirror))
    }

    /// Mirror the pixels of `image` inside its own storage.
    ///
    /// Use the returned view afterwards. Other shallow copies of `image`
    /// see the rewritten bytes but keep the old Bayer label, so a mirrored
    /// Bayer image must only be read through the returned view.
    pub fn mirror_in_place<'a>(&self, image: &Image<'a>, mirror: Mirror) -> Result<Image<'a>> {
        self.apply_in_place(image, Transform::Mirror(mirror))
    }

    pub fn mirror_up_down(&self, image: &Image<'_>) -> Result<Image<'static>> {
        self.mirror(image, Mirror::UpDown)
    }

    pub fn mirror_left_right(&self, image: &Image<'_>) -> Result<Image<'static>> {
        self.mirror(image, Mirror::LeftRight)
    }

    pub fn mirror_up_down_left_right(&self, image: &Image<'_>) -> Result<Image<'static>> {
        self.mirror(image, Mirror::UpDownLeftRight)
    }

    pub fn rotate(&self, image: &Image<'_>, angle: RotationAngle) -> Result<Image<'static>> {
        self.apply_new(image, Transform::Rotate(angle))
    }

    /// Rotate the pixels of `image` inside its own storage.
    ///
    /// Image metadata is immutable, so `image` and its other shallow copies
    /// keep their old width, height and Bayer label over the rewritten
    /// bytes. Only the returned view describes the rotated layout.
    pub fn rotate_in_place<'a>(&self, image: &Image<'a>, angle: RotationAngle) -> Result<Image<'a>> {
        self.apply_in_place(image, Transform::Rotate(angle))
    }
}

impl Operator for Mirror {
    fn name(&self) -> &'static str {
        "mirror"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        ImageTransformer.is_pixel_format_supported(pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        ImageTransformer.mirror(image, *self)
    }
}

impl Operator for RotationAngle {
    fn name(&self) -> &'static str {
        "rotate"
    }
    fn is_pixel_format_supported(&self, pixel_format: PixelFormat) -> bool {
        ImageTransformer.is_pixel_format_supported(pixel_format)
    }
    fn apply(&mut self, image: &Image<'_>) -> Result<Image<'static>> {
        ImageTransformer.rotate(image, *self)
    }
}
