//! Pixel format conversion.
//!
//! [ImageConverter] converts an [Image] into any format listed by
//! [supported_output_pixel_formats]. Conversion decodes the source into
//! channel values, debayers when a color or luma target needs it, rescales
//! the bit depth, reorders channels and re-encodes into the target layout.
//!
//! Output storage comes from per-converter buffer pools keyed by source
//! format, target format and size. A buffer returns to its pool when the
//! last image using it is dropped, so steady-state conversion of a video
//! stream does not allocate.

use std::collections::{HashMap, hash_map::Entry};

use ipl_formats::{BayerPattern, ColorFamily, PixelFormat};
use ipl_image::{BufferPool, Image};

pub use ipl_formats::{Error, ErrorKind, Result};

mod debayer;
pub mod io;
pub mod packing;
mod yuv;

pub use debayer::MIN_DEBAYER_SIZE;

/// Quality and speed tradeoff of debayering.
///
/// The mode never changes output format or size. Each mode is
/// deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// Nearest neighbour interpolation.
    Fast,
    /// Bicubic interpolation.
    #[default]
    HighQuality,
    /// Bilinear interpolation.
    Classic,
}

impl std::str::FromStr for ConversionMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "high-quality" | "highquality" => Ok(Self::HighQuality),
            "classic" => Ok(Self::Classic),
            _ => Err(Error::InvalidArgument(format!("unknown conversion mode {s:?}"))),
        }
    }
}

/// Target formats reachable from `input`.
///
/// Mono, RGB-family and YUV sources convert to any Mono, RGB-family or YUV
/// format. Bayer sources additionally convert to every Bayer format with
/// the same pattern.
pub fn supported_output_pixel_formats(input: PixelFormat) -> Vec<PixelFormat> {
    PixelFormat::all()
        .iter()
        .copied()
        .filter(|out| {
            if out.is_bayered() {
                input.is_bayered() && out.bayer_pattern() == input.bayer_pattern()
            } else {
                true
            }
        })
        .collect()
}

fn check_supported(input: PixelFormat, output: PixelFormat) -> Result<()> {
    if supported_output_pixel_formats(input).contains(&output) {
        Ok(())
    } else {
        Err(Error::ImageFormatNotSupported(format!(
            "no conversion from {input} to {output}"
        )))
    }
}

/// Bytes of a converted `width` x `height` image in `target`.
fn output_len(target: PixelFormat, width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|n| target.checked_storage_size_of_pixels(n))
        .ok_or_else(|| Error::InvalidArgument(format!("image size {width}x{height} overflows")))
}

fn check_size(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "cannot convert a {width}x{height} image"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PoolKey {
    source: PixelFormat,
    target: PixelFormat,
    width: usize,
    height: usize,
}

/// Converts images between pixel formats, reusing output buffers.
///
/// One pool is kept per distinct (source, target, width, height) shape and
/// pools only grow. Long-running callers seeing many shapes should call
/// [ImageConverter::clear_pools] when the set of shapes changes.
///
/// The converter is not meant to be shared between threads; use one
/// instance per thread.
#[derive(Debug, Default)]
pub struct ImageConverter {
    mode: ConversionMode,
    pools: HashMap<PoolKey, BufferPool>,
}

impl ImageConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: ConversionMode) -> Self {
        Self {
            mode,
            pools: HashMap::new(),
        }
    }

    pub fn conversion_mode(&self) -> ConversionMode {
        self.mode
    }

    pub fn set_conversion_mode(&mut self, mode: ConversionMode) {
        self.mode = mode;
    }

    pub fn supported_output_pixel_formats(&self, input: PixelFormat) -> Vec<PixelFormat> {
        supported_output_pixel_formats(input)
    }

    fn pool(&mut self, key: PoolKey) -> Result<&BufferPool> {
        let pool = match self.pools.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let size = output_len(key.target, key.width, key.height)?;
                tracing::debug!(
                    "new conversion pool {} -> {} for {}x{} ({size} bytes per image)",
                    key.source,
                    key.target,
                    key.width,
                    key.height
                );
                entry.insert(BufferPool::new(size))
            }
        };
        Ok(&*pool)
    }

    /// Drop every conversion pool.
    ///
    /// Images still holding pooled buffers stay valid; their memory is
    /// freed instead of returned when they are dropped.
    pub fn clear_pools(&mut self) {
        if !self.pools.is_empty() {
            tracing::debug!("dropping {} conversion pools", self.pools.len());
        }
        self.pools.clear();
    }

    /// Grow the pool for this conversion to hold `image_count` images.
    ///
    /// Conversions of a matching shape then take their output buffers from
    /// the pool. The pool is never shrunk while the converter exists.
    pub fn pre_allocate_conversion(
        &mut self,
        input: PixelFormat,
        output: PixelFormat,
        width: usize,
        height: usize,
        image_count: usize,
    ) -> Result<()> {
        check_size(width, height)?;
        check_supported(input, output)?;
        let key = PoolKey {
            source: input,
            target: output,
            width,
            height,
        };
        let pool = self.pool(key)?;
        pool.reserve(image_count);
        tracing::debug!(
            "pre-allocated {} buffers for {input} -> {output} {width}x{height}",
            pool.allocated()
        );
        Ok(())
    }

    /// Number of buffers allocated for a conversion shape.
    pub fn pooled_buffer_count(
        &self,
        input: PixelFormat,
        output: PixelFormat,
        width: usize,
        height: usize,
    ) -> usize {
        let key = PoolKey {
            source: input,
            target: output,
            width,
            height,
        };
        self.pools.get(&key).map(|p| p.allocated()).unwrap_or(0)
    }

    /// Convert into a new image of format `target`.
    pub fn convert(&mut self, image: &Image<'_>, target: PixelFormat) -> Result<Image<'static>> {
        check_size(image.width(), image.height())?;
        check_supported(image.pixel_format(), target)?;
        let key = PoolKey {
            source: image.pixel_format(),
            target,
            width: image.width(),
            height: image.height(),
        };
        let mode = self.mode;
        let mut buf = self.pool(key)?.acquire();
        convert_bytes(image, target, mode, buf.as_mut_slice())?;
        Ok(
            Image::from_pooled(image.width(), image.height(), target, buf)?
                .with_timestamp(image.timestamp()),
        )
    }

    /// Convert into caller-provided memory.
    ///
    /// Fails with [Error::BufferTooSmall] if `dest` cannot hold the result.
    pub fn convert_into<'b>(
        &self,
        image: &Image<'_>,
        target: PixelFormat,
        dest: &'b mut [u8],
    ) -> Result<Image<'b>> {
        check_size(image.width(), image.height())?;
        check_supported(image.pixel_format(), target)?;
        let required = output_len(target, image.width(), image.height())?;
        if dest.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                actual: dest.len(),
            });
        }
        convert_bytes(image, target, self.mode, &mut dest[..required])?;
        Ok(
            Image::from_slice_mut(dest, image.width(), image.height(), target)?
                .with_timestamp(image.timestamp()),
        )
    }
}

/// Convenience conversion on the image itself.
pub trait ConvertTo {
    fn convert_to(&self, target: PixelFormat, mode: ConversionMode) -> Result<Image<'static>>;
}

impl ConvertTo for Image<'_> {
    fn convert_to(&self, target: PixelFormat, mode: ConversionMode) -> Result<Image<'static>> {
        ImageConverter::with_mode(mode).convert(self, target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Gray,
    Raw(BayerPattern),
    Rgb,
    Rgba,
}

impl Layout {
    fn channels(&self) -> usize {
        match self {
            Layout::Gray | Layout::Raw(_) => 1,
            Layout::Rgb => 3,
            Layout::Rgba => 4,
        }
    }
}

/// Decoded channel values in RGB(A) channel order.
struct Samples {
    layout: Layout,
    bits: u32,
    values: Vec<u16>,
}

fn is_bgr_order(fmt: PixelFormat) -> bool {
    matches!(fmt.family(), ColorFamily::Bgr | ColorFamily::Bgra)
}

fn swap_red_blue(values: &mut [u16], channels: usize) {
    for px in values.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
}

#[inline]
fn rescale(v: u16, from: u32, to: u32) -> u16 {
    if to >= from { v << (to - from) } else { v >> (from - to) }
}

/// Full range BT.601 luma.
#[inline]
fn luma(r: u16, g: u16, b: u16) -> u16 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u16
}

fn decode(image: &Image<'_>) -> Result<Samples> {
    let fmt = image.pixel_format();
    let (w, h) = (image.width(), image.height());
    let data = image.data();
    let bits = fmt.num_significant_bits_per_channel();
    let samples = match fmt.family() {
        ColorFamily::Mono => Samples {
            layout: Layout::Gray,
            bits,
            values: packing::unpack(fmt, &data, w * h)?,
        },
        ColorFamily::Bayer => Samples {
            layout: Layout::Raw(fmt.bayer_pattern()),
            bits,
            values: packing::unpack(fmt, &data, w * h)?,
        },
        ColorFamily::Rgb | ColorFamily::Bgr | ColorFamily::Rgba | ColorFamily::Bgra => {
            let layout = if fmt.has_alpha() {
                Layout::Rgba
            } else {
                Layout::Rgb
            };
            let mut values = packing::unpack(fmt, &data, w * h)?;
            if is_bgr_order(fmt) {
                swap_red_blue(&mut values, layout.channels());
            }
            Samples {
                layout,
                bits,
                values,
            }
        }
        ColorFamily::Yuv420Uv | ColorFamily::Yuv420Vu => Samples {
            layout: Layout::Rgb,
            bits: 8,
            values: yuv::decode_to_rgb8(fmt, &data, w, h)?,
        },
    };
    Ok(samples)
}

fn into_rgb(s: Samples, w: usize, h: usize, mode: ConversionMode) -> Result<Samples> {
    let values = match s.layout {
        Layout::Rgb | Layout::Rgba => return Ok(s),
        Layout::Gray => s.values.iter().flat_map(|&v| [v, v, v]).collect(),
        Layout::Raw(pattern) => debayer::debayer(&s.values, w, h, s.bits, pattern, mode)?,
    };
    Ok(Samples {
        layout: Layout::Rgb,
        bits: s.bits,
        values,
    })
}

fn into_gray(s: Samples, w: usize, h: usize, mode: ConversionMode) -> Result<Samples> {
    let s = match s.layout {
        Layout::Gray => return Ok(s),
        _ => into_rgb(s, w, h, mode)?,
    };
    let channels = s.layout.channels();
    let values = s
        .values
        .chunks_exact(channels)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect();
    Ok(Samples {
        layout: Layout::Gray,
        bits: s.bits,
        values,
    })
}

fn convert_bytes(
    image: &Image<'_>,
    target: PixelFormat,
    mode: ConversionMode,
    out: &mut [u8],
) -> Result<()> {
    let source = image.pixel_format();
    let (w, h) = (image.width(), image.height());
    tracing::trace!("converting {w}x{h} {source} -> {target} ({mode:?})");
    if source == target {
        let data = image.data();
        let n = out.len();
        out.copy_from_slice(&data[..n]);
        return Ok(());
    }
    if target.is_yuv() {
        yuv::check_dims(target, w, h)?;
    }

    let samples = decode(image)?;
    let target_bits = target.num_significant_bits_per_channel();

    match target.family() {
        ColorFamily::Mono => {
            let gray = into_gray(samples, w, h, mode)?;
            let values: Vec<u16> = gray
                .values
                .iter()
                .map(|&v| rescale(v, gray.bits, target_bits))
                .collect();
            packing::pack(target, &values, out)
        }
        ColorFamily::Bayer => match samples.layout {
            Layout::Raw(pattern) if pattern == target.bayer_pattern() => {
                let values: Vec<u16> = samples
                    .values
                    .iter()
                    .map(|&v| rescale(v, samples.bits, target_bits))
                    .collect();
                packing::pack(target, &values, out)
            }
            _ => Err(Error::ImageFormatNotSupported(format!(
                "no conversion from {source} to {target}"
            ))),
        },
        ColorFamily::Rgb | ColorFamily::Bgr | ColorFamily::Rgba | ColorFamily::Bgra => {
            let rgb = into_rgb(samples, w, h, mode)?;
            let src_channels = rgb.layout.channels();
            let dst_channels = target.num_channels() as usize;
            let alpha_max = target.maximum_value_per_channel() as u16;
            let mut values = Vec::with_capacity(w * h * dst_channels);
            for px in rgb.values.chunks_exact(src_channels) {
                for &v in &px[..3] {
                    values.push(rescale(v, rgb.bits, target_bits));
                }
                if dst_channels == 4 {
                    let alpha = if src_channels == 4 {
                        rescale(px[3], rgb.bits, target_bits)
                    } else {
                        alpha_max
                    };
                    values.push(alpha);
                }
            }
            if is_bgr_order(target) {
                swap_red_blue(&mut values, dst_channels);
            }
            packing::pack(target, &values, out)
        }
        ColorFamily::Yuv420Uv | ColorFamily::Yuv420Vu => {
            let s = match samples.layout {
                Layout::Gray => samples,
                _ => into_rgb(samples, w, h, mode)?,
            };
            let channels = s.layout.channels();
            let mut values = Vec::with_capacity(w * h * channels.min(3));
            for px in s.values.chunks_exact(channels) {
                for &v in px.iter().take(3) {
                    values.push(rescale(v, s.bits, 8));
                }
            }
            yuv::encode(target, &values, channels.min(3), w, h, out)
        }
    }
}
