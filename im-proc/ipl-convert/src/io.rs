//! Reading and writing images in common file formats.

use std::path::Path;

use image::{ExtendedColorType, ImageEncoder};

use ipl_formats::{Error, ErrorKind, PixelFormat, Result};
use ipl_image::Image;

use crate::ImageConverter;

fn from_image_error(e: image::ImageError) -> Error {
    match e {
        image::ImageError::IoError(e) => Error::Io(e),
        image::ImageError::Unsupported(e) => Error::ImageFormatNotSupported(e.to_string()),
        other => Error::ImageFormatInterpretationError(other.to_string()),
    }
}

/// Convert an image decoded by the `image` crate.
///
/// Grayscale inputs become Mono8, everything else RGB8.
pub fn from_dynamic_image(im: image::DynamicImage) -> Result<Image<'static>> {
    let (width, height) = (im.width() as usize, im.height() as usize);
    if im.color().has_color() {
        Image::from_vec(width, height, PixelFormat::RGB8, im.into_rgb8().into_raw())
    } else {
        Image::from_vec(width, height, PixelFormat::Mono8, im.into_luma8().into_raw())
    }
}

/// Load an image file (PNG, JPEG, BMP or TIFF).
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Image<'static>> {
    let path = path.as_ref();
    let im = image::open(path).map_err(from_image_error)?;
    let image = from_dynamic_image(im)?;
    tracing::debug!(
        "read {}x{} {} from {}",
        image.width(),
        image.height(),
        image.pixel_format(),
        path.display()
    );
    Ok(image)
}

/// Load an image file and interpret it as `pixel_format`.
///
/// Fails with [Error::ImageFormatInterpretationError] if the file contents
/// cannot be expressed in that format.
pub fn read_image_as<P: AsRef<Path>>(path: P, pixel_format: PixelFormat) -> Result<Image<'static>> {
    let image = read_image(path)?;
    if image.pixel_format() == pixel_format {
        return Ok(image);
    }
    ImageConverter::new()
        .convert(&image, pixel_format)
        .map_err(|e| match e.kind() {
            ErrorKind::ImageFormatNotSupported => Error::ImageFormatInterpretationError(format!(
                "a {} file cannot be read as {pixel_format}",
                image.pixel_format()
            )),
            _ => e,
        })
}

/// Pixel data as Mono8 or RGB8, the layouts the encoders accept.
fn to_rgb8_or_mono8(image: &Image<'_>) -> Result<(Vec<u8>, ExtendedColorType)> {
    let fmt = image.pixel_format();
    if fmt == PixelFormat::Mono8 {
        return Ok((image.data().to_vec(), ExtendedColorType::L8));
    }
    if fmt == PixelFormat::RGB8 {
        return Ok((image.data().to_vec(), ExtendedColorType::Rgb8));
    }
    let (target, color) = if fmt.is_mono() {
        (PixelFormat::Mono8, ExtendedColorType::L8)
    } else {
        (PixelFormat::RGB8, ExtendedColorType::Rgb8)
    };
    let converted = ImageConverter::new().convert(image, target)?;
    let data = converted.data().to_vec();
    Ok((data, color))
}

/// Save an image, choosing the file format from the extension.
///
/// Mono images are written as 8-bit grayscale and all others as 8-bit RGB.
pub fn write_image<P: AsRef<Path>>(path: P, image: &Image<'_>) -> Result<()> {
    let path = path.as_ref();
    let (data, color) = to_rgb8_or_mono8(image)?;
    image::save_buffer(
        path,
        &data,
        image.width() as u32,
        image.height() as u32,
        color,
    )
    .map_err(from_image_error)?;
    tracing::debug!("wrote {} to {}", image.pixel_format(), path.display());
    Ok(())
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ImageOptions {
    Jpeg(u8),
    Png,
}

/// Encode an image to a Jpeg or Png buffer.
pub fn encode_image(image: &Image<'_>, opts: ImageOptions) -> Result<Vec<u8>> {
    let (data, color) = to_rgb8_or_mono8(image)?;
    let (w, h) = (image.width() as u32, image.height() as u32);
    let mut result = Vec::new();
    match opts {
        ImageOptions::Jpeg(quality) => {
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut result, quality);
            encoder
                .encode(&data, w, h, color)
                .map_err(from_image_error)?;
        }
        ImageOptions::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut result);
            encoder
                .write_image(&data, w, h, color)
                .map_err(from_image_error)?;
        }
    }
    Ok(result)
}
