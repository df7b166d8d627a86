//! YUV 4:2:0 semiplanar layouts.
//!
//! The luma plane of `width * height` bytes is followed by one plane of
//! interleaved chroma pairs, each shared by a 2x2 block of pixels.

use itertools::izip;

use ipl_formats::{ColorFamily, Error, PixelFormat, Result};

#[allow(non_snake_case)]
#[derive(PartialEq, Debug, Clone, Copy)]
pub(crate) struct YUV444 {
    pub Y: u8,
    pub U: u8,
    pub V: u8,
}

#[inline]
fn clamp(i: i32) -> u8 {
    i.clamp(0, 255) as u8
}

#[allow(non_snake_case)]
pub(crate) fn YUV444toRGB888(Y: u8, U: u8, V: u8) -> [u8; 3] {
    // see http://en.wikipedia.org/wiki/YUV
    let C: i32 = Y as i32 - 16;
    let D: i32 = U as i32 - 128;
    let E: i32 = V as i32 - 128;

    let R = clamp((298 * C + 409 * E + 128) >> 8);
    let G = clamp((298 * C - 100 * D - 208 * E + 128) >> 8);
    let B = clamp((298 * C + 516 * D + 128) >> 8);
    [R, G, B]
}

#[allow(non_snake_case)]
#[inline]
pub(crate) fn RGB888toYUV444(R: u8, G: u8, B: u8) -> YUV444 {
    let R = R as i32;
    let G = G as i32;
    let B = B as i32;
    let Y = ((66 * R + 129 * G + 25 * B + 128) >> 8) + 16;
    let U = ((-38 * R - 74 * G + 112 * B + 128) >> 8) + 128;
    let V = ((112 * R - 94 * G - 18 * B + 128) >> 8) + 128;
    YUV444 {
        Y: clamp(Y),
        U: clamp(U),
        V: clamp(V),
    }
}

pub(crate) fn check_dims(fmt: PixelFormat, width: usize, height: usize) -> Result<()> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(Error::InvalidArgument(format!(
            "{fmt} requires even width and height, got {width}x{height}"
        )));
    }
    Ok(())
}

fn uv_first(fmt: PixelFormat) -> Result<bool> {
    match fmt.family() {
        ColorFamily::Yuv420Uv => Ok(true),
        ColorFamily::Yuv420Vu => Ok(false),
        _ => Err(Error::ImageFormatNotSupported(format!(
            "{fmt} is not a YUV 4:2:0 format"
        ))),
    }
}

/// Decode to interleaved 8-bit RGB values.
pub(crate) fn decode_to_rgb8(
    fmt: PixelFormat,
    bytes: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<u16>> {
    check_dims(fmt, width, height)?;
    let uv_first = uv_first(fmt)?;
    let luma_size = width * height;
    let needed = luma_size + luma_size / 2;
    if bytes.len() < needed {
        return Err(Error::BufferTooSmall {
            required: needed,
            actual: bytes.len(),
        });
    }
    let (luma, chroma) = bytes[..needed].split_at(luma_size);
    let mut rgb = Vec::with_capacity(luma_size * 3);
    for (y, luma_row) in luma.chunks_exact(width.max(1)).enumerate() {
        let chroma_row = &chroma[(y / 2) * width..];
        for (x, &l) in luma_row.iter().enumerate() {
            let pair = &chroma_row[(x / 2) * 2..(x / 2) * 2 + 2];
            let (u, v) = if uv_first {
                (pair[0], pair[1])
            } else {
                (pair[1], pair[0])
            };
            rgb.extend(YUV444toRGB888(l, u, v).map(u16::from));
        }
    }
    Ok(rgb)
}

/// Encode from 8-bit values, either one gray channel or interleaved RGB.
pub(crate) fn encode(
    fmt: PixelFormat,
    values: &[u16],
    channels: usize,
    width: usize,
    height: usize,
    out: &mut [u8],
) -> Result<()> {
    check_dims(fmt, width, height)?;
    let uv_first = uv_first(fmt)?;
    let luma_size = width * height;
    let needed = luma_size + luma_size / 2;
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            required: needed,
            actual: out.len(),
        });
    }
    let (luma, chroma) = out[..needed].split_at_mut(luma_size);
    if width == 0 {
        return Ok(());
    }

    if channels == 1 {
        for (dst, &v) in luma.iter_mut().zip(values) {
            *dst = v.min(255) as u8;
        }
        chroma.fill(128);
        return Ok(());
    }

    // Full resolution chroma planes, downsampled below.
    let mut u_full = vec![0u8; luma_size];
    let mut v_full = vec![0u8; luma_size];
    for (ydest, udest, vdest, rgb) in izip![
        luma.iter_mut(),
        u_full.iter_mut(),
        v_full.iter_mut(),
        values.chunks_exact(3)
    ] {
        let yuv = RGB888toYUV444(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8);
        *ydest = yuv.Y;
        *udest = yuv.U;
        *vdest = yuv.V;
    }

    for y in 0..height / 2 {
        for x in 0..width / 2 {
            let block = |plane: &[u8]| {
                let i = 2 * y * width + 2 * x;
                ((plane[i] as u16 + plane[i + 1] as u16 + plane[i + width] as u16
                    + plane[i + width + 1] as u16)
                    / 4) as u8
            };
            let (u, v) = (block(&u_full), block(&v_full));
            let dst = &mut chroma[y * width + 2 * x..y * width + 2 * x + 2];
            if uv_first {
                dst.copy_from_slice(&[u, v]);
            } else {
                dst.copy_from_slice(&[v, u]);
            }
        }
    }
    Ok(())
}
