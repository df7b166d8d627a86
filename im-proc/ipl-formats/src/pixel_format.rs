//! Runtime description of every supported pixel format.
//!
//! Formats follow the GenICam Pixel Format Naming Convention (PFNC), extended
//! with a few vendor specific grouped layouts (suffix `IDS`).

use std::str::FromStr;

use crate::{Error, Result};

/// Position of the red, green and blue sites in a Bayer mosaic.
///
/// The name lists the colors of the first row, starting at the top-left
/// pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BayerPattern {
    None,
    GR,
    RG,
    GB,
    BG,
}

/// The color filter over a single Bayer site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfaColor {
    Red,
    Green,
    Blue,
}

impl BayerPattern {
    /// Color of the site at `(row, col)` in an image with this pattern.
    ///
    /// Returns `None` for [BayerPattern::None].
    pub fn color_at(self, row: usize, col: usize) -> Option<CfaColor> {
        use CfaColor::*;
        let cells = match self {
            BayerPattern::None => return None,
            BayerPattern::RG => [[Red, Green], [Green, Blue]],
            BayerPattern::GR => [[Green, Red], [Blue, Green]],
            BayerPattern::GB => [[Green, Blue], [Red, Green]],
            BayerPattern::BG => [[Blue, Green], [Green, Red]],
        };
        Some(cells[row % 2][col % 2])
    }

    /// Find the pattern whose top-left 2x2 cell matches `cells`.
    pub fn from_cells(cells: [[CfaColor; 2]; 2]) -> Option<Self> {
        [
            BayerPattern::RG,
            BayerPattern::GR,
            BayerPattern::GB,
            BayerPattern::BG,
        ]
        .into_iter()
        .find(|p| {
            (0..2).all(|r| (0..2).all(|c| p.color_at(r, c) == Some(cells[r][c])))
        })
    }

    /// The pattern seen from an origin moved by `(dx, dy)` pixels.
    pub fn shifted(self, dx: usize, dy: usize) -> Self {
        if self == BayerPattern::None {
            return self;
        }
        let mut cells = [[CfaColor::Green; 2]; 2];
        for (r, row) in cells.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if let Some(color) = self.color_at(r + dy, c + dx) {
                    *cell = color;
                }
            }
        }
        Self::from_cells(cells).unwrap_or(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BayerPattern::None => "None",
            BayerPattern::GR => "GR",
            BayerPattern::RG => "RG",
            BayerPattern::GB => "GB",
            BayerPattern::BG => "BG",
        }
    }
}

impl std::fmt::Display for BayerPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Unknown,
    Little,
    Big,
}

/// How channel values are laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packing {
    /// One byte per 8-bit channel, a little-endian `u16` otherwise.
    Unpacked,
    /// Contiguous LSB-first bit stream (`...10p`, `...12p`).
    Packed,
    /// Four 10-bit pixels in five bytes, MSB bytes first (`...10g40IDS`).
    Grouped40,
    /// Two 12-bit pixels in three bytes, MSB bytes first (`...12g24IDS`).
    Grouped24,
    /// Three 10-bit channels in the low bits of a little-endian `u32`.
    Packed32,
    /// Full resolution luma plane followed by an interleaved chroma plane.
    Semiplanar,
}

/// Channel arrangement of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFamily {
    Mono,
    Bayer,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    /// YUV 4:2:0 with U before V in the chroma plane.
    Yuv420Uv,
    /// YUV 4:2:0 with V before U in the chroma plane.
    Yuv420Vu,
}

struct FormatInfo {
    code: u32,
    channels: u32,
    significant_bits: u32,
    storage_bits_channel: u32,
    storage_bits_pixel: u32,
    packing: Packing,
    family: ColorFamily,
    pattern: BayerPattern,
}

macro_rules! pixel_formats {
    ($($name:ident => ($code:expr, $channels:expr, $sig:expr, $storage_ch:expr, $storage_px:expr, $packing:ident, $family:ident, $pattern:ident)),* $(,)?) => {
        /// A pixel format known to the image processing library.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum PixelFormat {
            $($name),*
        }

        impl PixelFormat {
            /// All supported pixel formats.
            pub const fn all() -> &'static [PixelFormat] {
                &[$(PixelFormat::$name),*]
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(PixelFormat::$name => stringify!($name)),*
                }
            }

            fn info(&self) -> FormatInfo {
                match self {
                    $(PixelFormat::$name => FormatInfo {
                        code: $code,
                        channels: $channels,
                        significant_bits: $sig,
                        storage_bits_channel: $storage_ch,
                        storage_bits_pixel: $storage_px,
                        packing: Packing::$packing,
                        family: ColorFamily::$family,
                        pattern: BayerPattern::$pattern,
                    }),*
                }
            }
        }
    };
}

pixel_formats! {
    Mono8 => (0x0108_0001, 1, 8, 8, 8, Unpacked, Mono, None),
    Mono10 => (0x0110_0003, 1, 10, 16, 16, Unpacked, Mono, None),
    Mono12 => (0x0110_0005, 1, 12, 16, 16, Unpacked, Mono, None),
    Mono10p => (0x010A_0046, 1, 10, 10, 10, Packed, Mono, None),
    Mono12p => (0x010C_0047, 1, 12, 12, 12, Packed, Mono, None),
    Mono10g40IDS => (0x4000_000F, 1, 10, 10, 10, Grouped40, Mono, None),
    Mono12g24IDS => (0x4000_001F, 1, 12, 12, 12, Grouped24, Mono, None),

    BayerGR8 => (0x0108_0008, 1, 8, 8, 8, Unpacked, Bayer, GR),
    BayerRG8 => (0x0108_0009, 1, 8, 8, 8, Unpacked, Bayer, RG),
    BayerGB8 => (0x0108_000A, 1, 8, 8, 8, Unpacked, Bayer, GB),
    BayerBG8 => (0x0108_000B, 1, 8, 8, 8, Unpacked, Bayer, BG),
    BayerGR10 => (0x0110_000C, 1, 10, 16, 16, Unpacked, Bayer, GR),
    BayerRG10 => (0x0110_000D, 1, 10, 16, 16, Unpacked, Bayer, RG),
    BayerGB10 => (0x0110_000E, 1, 10, 16, 16, Unpacked, Bayer, GB),
    BayerBG10 => (0x0110_000F, 1, 10, 16, 16, Unpacked, Bayer, BG),
    BayerGR12 => (0x0110_0010, 1, 12, 16, 16, Unpacked, Bayer, GR),
    BayerRG12 => (0x0110_0011, 1, 12, 16, 16, Unpacked, Bayer, RG),
    BayerGB12 => (0x0110_0012, 1, 12, 16, 16, Unpacked, Bayer, GB),
    BayerBG12 => (0x0110_0013, 1, 12, 16, 16, Unpacked, Bayer, BG),

    BayerGR10p => (0x010A_0056, 1, 10, 10, 10, Packed, Bayer, GR),
    BayerRG10p => (0x010A_0058, 1, 10, 10, 10, Packed, Bayer, RG),
    BayerGB10p => (0x010A_0054, 1, 10, 10, 10, Packed, Bayer, GB),
    BayerBG10p => (0x010A_0052, 1, 10, 10, 10, Packed, Bayer, BG),
    BayerGR12p => (0x010C_0057, 1, 12, 12, 12, Packed, Bayer, GR),
    BayerRG12p => (0x010C_0059, 1, 12, 12, 12, Packed, Bayer, RG),
    BayerGB12p => (0x010C_0055, 1, 12, 12, 12, Packed, Bayer, GB),
    BayerBG12p => (0x010C_0053, 1, 12, 12, 12, Packed, Bayer, BG),

    BayerRG10g40IDS => (0x4000_0001, 1, 10, 10, 10, Grouped40, Bayer, RG),
    BayerGB10g40IDS => (0x4000_0002, 1, 10, 10, 10, Grouped40, Bayer, GB),
    BayerGR10g40IDS => (0x4000_0003, 1, 10, 10, 10, Grouped40, Bayer, GR),
    BayerBG10g40IDS => (0x4000_0004, 1, 10, 10, 10, Grouped40, Bayer, BG),
    BayerRG12g24IDS => (0x4000_0011, 1, 12, 12, 12, Grouped24, Bayer, RG),
    BayerGB12g24IDS => (0x4000_0012, 1, 12, 12, 12, Grouped24, Bayer, GB),
    BayerGR12g24IDS => (0x4000_0013, 1, 12, 12, 12, Grouped24, Bayer, GR),
    BayerBG12g24IDS => (0x4000_0014, 1, 12, 12, 12, Grouped24, Bayer, BG),

    RGB8 => (0x0218_0014, 3, 8, 8, 24, Unpacked, Rgb, None),
    BGR8 => (0x0218_0015, 3, 8, 8, 24, Unpacked, Bgr, None),
    RGBa8 => (0x0220_0016, 4, 8, 8, 32, Unpacked, Rgba, None),
    BGRa8 => (0x0220_0017, 4, 8, 8, 32, Unpacked, Bgra, None),
    RGB10 => (0x0230_0018, 3, 10, 16, 48, Unpacked, Rgb, None),
    BGR10 => (0x0230_0019, 3, 10, 16, 48, Unpacked, Bgr, None),
    RGB12 => (0x0230_001A, 3, 12, 16, 48, Unpacked, Rgb, None),
    BGR12 => (0x0230_001B, 3, 12, 16, 48, Unpacked, Bgr, None),
    RGBa10 => (0x0240_005F, 4, 10, 16, 64, Unpacked, Rgba, None),
    BGRa10 => (0x0240_004C, 4, 10, 16, 64, Unpacked, Bgra, None),
    RGBa12 => (0x0240_0061, 4, 12, 16, 64, Unpacked, Rgba, None),
    BGRa12 => (0x0240_004E, 4, 12, 16, 64, Unpacked, Bgra, None),
    RGB10p32 => (0x0220_001D, 3, 10, 10, 32, Packed32, Rgb, None),
    BGR10p32 => (0x0220_001E, 3, 10, 10, 32, Packed32, Bgr, None),

    YUV420_8_YY_UV_SemiplanarIDS => (0x420C_0001, 3, 8, 8, 12, Semiplanar, Yuv420Uv, None),
    YUV420_8_YY_VU_SemiplanarIDS => (0x420C_0002, 3, 8, 8, 12, Semiplanar, Yuv420Vu, None),
}

impl PixelFormat {
    /// The PFNC (or vendor) numeric code of this format.
    pub fn code(&self) -> u32 {
        self.info().code
    }

    pub fn num_channels(&self) -> u32 {
        self.info().channels
    }

    pub fn num_significant_bits_per_channel(&self) -> u32 {
        self.info().significant_bits
    }

    pub fn num_storage_bits_per_channel(&self) -> u32 {
        self.info().storage_bits_channel
    }

    pub fn num_significant_bits_per_pixel(&self) -> u32 {
        let info = self.info();
        if self.is_yuv() {
            // chroma is shared between four pixels
            info.storage_bits_pixel
        } else {
            info.channels * info.significant_bits
        }
    }

    /// Average number of bits a pixel occupies in memory.
    pub fn num_storage_bits_per_pixel(&self) -> u32 {
        self.info().storage_bits_pixel
    }

    pub fn maximum_value_per_channel(&self) -> u32 {
        (1u32 << self.num_significant_bits_per_channel()) - 1
    }

    pub fn endianness(&self) -> Endianness {
        if self.num_storage_bits_per_channel() > 8 {
            Endianness::Little
        } else {
            Endianness::Unknown
        }
    }

    pub fn packing(&self) -> Packing {
        self.info().packing
    }

    pub fn family(&self) -> ColorFamily {
        self.info().family
    }

    pub fn is_packed(&self) -> bool {
        matches!(
            self.packing(),
            Packing::Packed | Packing::Grouped40 | Packing::Grouped24 | Packing::Packed32
        )
    }

    pub fn is_bayered(&self) -> bool {
        self.family() == ColorFamily::Bayer
    }

    pub fn is_yuv(&self) -> bool {
        matches!(self.family(), ColorFamily::Yuv420Uv | ColorFamily::Yuv420Vu)
    }

    pub fn is_mono(&self) -> bool {
        self.family() == ColorFamily::Mono
    }

    /// True for RGB, BGR, RGBa and BGRa formats, packed or not.
    pub fn is_rgb_family(&self) -> bool {
        matches!(
            self.family(),
            ColorFamily::Rgb | ColorFamily::Bgr | ColorFamily::Rgba | ColorFamily::Bgra
        )
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self.family(), ColorFamily::Rgba | ColorFamily::Bgra)
    }

    /// True if every channel value can be read as a whole byte or a
    /// little-endian `u16`.
    pub fn has_unpacked_samples(&self) -> bool {
        self.packing() == Packing::Unpacked
    }

    pub fn bayer_pattern(&self) -> BayerPattern {
        self.info().pattern
    }

    /// Number of pixels forming the smallest whole-byte storage unit.
    pub fn pixels_per_group(&self) -> usize {
        match self.packing() {
            Packing::Grouped40 => 4,
            Packing::Grouped24 => 2,
            _ => {
                let bits = self.num_storage_bits_per_pixel() as usize;
                8 / gcd(bits, 8)
            }
        }
    }

    /// Exact number of bytes needed to store `num_pixels` pixels.
    ///
    /// A trailing partial group still occupies a full group. For the YUV
    /// 4:2:0 formats the result is only meaningful when the frame has even
    /// width and height, since each chroma pair covers a 2x2 block.
    pub fn storage_size_of_pixels(&self, num_pixels: usize) -> usize {
        match self.packing() {
            Packing::Grouped40 => num_pixels.div_ceil(4) * 5,
            Packing::Grouped24 => num_pixels.div_ceil(2) * 3,
            _ => (num_pixels * self.num_storage_bits_per_pixel() as usize).div_ceil(8),
        }
    }

    /// Like [PixelFormat::storage_size_of_pixels], returning `None` on
    /// overflow.
    pub fn checked_storage_size_of_pixels(&self, num_pixels: usize) -> Option<usize> {
        match self.packing() {
            Packing::Grouped40 => num_pixels.div_ceil(4).checked_mul(5),
            Packing::Grouped24 => num_pixels.div_ceil(2).checked_mul(3),
            _ => num_pixels
                .checked_mul(self.num_storage_bits_per_pixel() as usize)
                .map(|bits| bits.div_ceil(8)),
        }
    }

    /// The format with identical depth and packing but another Bayer pattern.
    pub fn with_bayer_pattern(&self, pattern: BayerPattern) -> Result<PixelFormat> {
        if !self.is_bayered() || pattern == BayerPattern::None {
            return Err(Error::ImageFormatNotSupported(format!(
                "cannot apply Bayer pattern {pattern} to {self}"
            )));
        }
        PixelFormat::all()
            .iter()
            .copied()
            .find(|f| {
                f.bayer_pattern() == pattern
                    && f.packing() == self.packing()
                    && f.num_significant_bits_per_channel()
                        == self.num_significant_bits_per_channel()
            })
            .ok_or_else(|| Error::Internal(format!("no {pattern} variant of {self}")))
    }

    /// The same channel arrangement with a different bit depth.
    ///
    /// Only formats with unpacked samples are returned.
    pub fn with_unpacked_depth(&self, significant_bits: u32) -> Option<PixelFormat> {
        PixelFormat::all().iter().copied().find(|f| {
            f.has_unpacked_samples()
                && f.family() == self.family()
                && f.bayer_pattern() == self.bayer_pattern()
                && f.num_significant_bits_per_channel() == significant_bits
        })
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        PixelFormat::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::ImageFormatNotSupported(format!("unknown pixel format {s:?}")))
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = Error;
    fn try_from(code: u32) -> Result<Self> {
        PixelFormat::all()
            .iter()
            .copied()
            .find(|f| f.code() == code)
            .ok_or_else(|| {
                Error::ImageFormatNotSupported(format!("unknown pixel format code {code:#010x}"))
            })
    }
}

impl From<PixelFormat> for u32 {
    fn from(fmt: PixelFormat) -> u32 {
        fmt.code()
    }
}
