//! Bit-level encoding of channel values.
//!
//! All layouts are decoded into interleaved `u16` channel values in memory
//! channel order and encoded back from the same representation.

use ipl_formats::{Error, Packing, PixelFormat, Result};
use ipl_image::samples;

fn check_len(fmt: PixelFormat, len: usize, num_pixels: usize) -> Result<()> {
    let required = fmt.storage_size_of_pixels(num_pixels);
    if len < required {
        return Err(Error::BufferTooSmall {
            required,
            actual: len,
        });
    }
    Ok(())
}

/// Decode the channel values of `num_pixels` pixels.
pub fn unpack(fmt: PixelFormat, bytes: &[u8], num_pixels: usize) -> Result<Vec<u16>> {
    check_len(fmt, bytes.len(), num_pixels)?;
    let bits = fmt.num_significant_bits_per_channel();
    let mask = (1u32 << bits) - 1;
    let values = match fmt.packing() {
        Packing::Unpacked => samples::decode(fmt, bytes, num_pixels * fmt.num_channels() as usize)?,
        Packing::Packed => (0..num_pixels)
            .map(|i| {
                let bitpos = i * bits as usize;
                let byte = bitpos / 8;
                let word = (0..3).fold(0u32, |acc, k| {
                    acc | (*bytes.get(byte + k).unwrap_or(&0) as u32) << (8 * k)
                });
                ((word >> (bitpos % 8)) & mask) as u16
            })
            .collect(),
        Packing::Grouped40 => {
            let mut out = Vec::with_capacity(num_pixels);
            for group in bytes.chunks_exact(5) {
                for k in 0..4 {
                    if out.len() == num_pixels {
                        break;
                    }
                    let v = ((group[k] as u16) << 2) | ((group[4] as u16 >> (2 * k)) & 0x3);
                    out.push(v);
                }
            }
            out
        }
        Packing::Grouped24 => {
            let mut out = Vec::with_capacity(num_pixels);
            for group in bytes.chunks_exact(3) {
                let lsb = group[2] as u16;
                for (k, shift) in [(0, 0), (1, 4)] {
                    if out.len() == num_pixels {
                        break;
                    }
                    out.push(((group[k] as u16) << 4) | ((lsb >> shift) & 0xF));
                }
            }
            out
        }
        Packing::Packed32 => bytes[..num_pixels * 4]
            .chunks_exact(4)
            .flat_map(|c| {
                let word = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                [0, 10, 20].map(|shift| ((word >> shift) & mask) as u16)
            })
            .collect(),
        Packing::Semiplanar => {
            return Err(Error::ImageFormatNotSupported(format!(
                "{fmt} has no per-pixel channel layout"
            )));
        }
    };
    Ok(values)
}

/// Encode channel values into `out`, zeroing unused bits.
///
/// Values wider than the format's depth are clamped.
pub fn pack(fmt: PixelFormat, values: &[u16], out: &mut [u8]) -> Result<()> {
    let channels = fmt.num_channels() as usize;
    let num_pixels = values.len() / channels;
    check_len(fmt, out.len(), num_pixels)?;
    let max = fmt.maximum_value_per_channel() as u16;
    let bits = fmt.num_significant_bits_per_channel() as usize;
    let used = fmt.storage_size_of_pixels(num_pixels);
    out[..used].fill(0);
    match fmt.packing() {
        Packing::Unpacked => samples::encode(fmt, values, out)?,
        Packing::Packed => {
            for (i, &v) in values.iter().enumerate() {
                let v = v.min(max) as u32;
                let bitpos = i * bits;
                let byte = bitpos / 8;
                let word = v << (bitpos % 8);
                for k in 0..3 {
                    if let Some(dst) = out.get_mut(byte + k) {
                        *dst |= (word >> (8 * k)) as u8;
                    }
                }
            }
        }
        Packing::Grouped40 => {
            for (group, chunk) in out[..used].chunks_exact_mut(5).zip(values.chunks(4)) {
                for (k, &v) in chunk.iter().enumerate() {
                    let v = v.min(max);
                    group[k] = (v >> 2) as u8;
                    group[4] |= ((v & 0x3) as u8) << (2 * k);
                }
            }
        }
        Packing::Grouped24 => {
            for (group, chunk) in out[..used].chunks_exact_mut(3).zip(values.chunks(2)) {
                for (k, &v) in chunk.iter().enumerate() {
                    let v = v.min(max);
                    group[k] = (v >> 4) as u8;
                    group[2] |= ((v & 0xF) as u8) << (4 * k);
                }
            }
        }
        Packing::Packed32 => {
            for (dst, px) in out.chunks_exact_mut(4).zip(values.chunks_exact(3)) {
                let word = px
                    .iter()
                    .zip([0, 10, 20])
                    .fold(0u32, |acc, (&v, shift)| acc | (v.min(max) as u32) << shift);
                dst.copy_from_slice(&word.to_le_bytes());
            }
        }
        Packing::Semiplanar => {
            return Err(Error::ImageFormatNotSupported(format!(
                "{fmt} has no per-pixel channel layout"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use PixelFormat::*;

    #[test]
    fn test_mono10p_bit_layout() {
        let values = [0x3FF, 0x001, 0x200, 0x155];
        let mut out = [0u8; 5];
        pack(Mono10p, &values, &mut out).unwrap();
        // LSB first: p0 fills byte 0 and the low two bits of byte 1.
        assert_eq!(out[0], 0xFF);
        assert_eq!(out[1], 0x03 | (0x01 << 2));
        assert_eq!(unpack(Mono10p, &out, 4).unwrap(), values);
    }

    #[test]
    fn test_mono12p_bit_layout() {
        let mut out = [0u8; 3];
        pack(Mono12p, &[0xABC, 0x123], &mut out).unwrap();
        assert_eq!(out, [0xBC, 0x3A, 0x12]);
        assert_eq!(unpack(Mono12p, &out, 2).unwrap(), vec![0xABC, 0x123]);
    }

    #[test]
    fn test_grouped40_layout() {
        let mut out = [0u8; 5];
        pack(BayerRG10g40IDS, &[0x3FF, 0x000, 0x2AA, 0x001], &mut out).unwrap();
        assert_eq!(out, [0xFF, 0x00, 0xAA, 0x00, 0b01_10_00_11]);
    }

    #[test]
    fn test_grouped24_layout() {
        let mut out = [0u8; 3];
        pack(Mono12g24IDS, &[0xABC, 0x123], &mut out).unwrap();
        assert_eq!(out, [0xAB, 0x12, 0x3C]);
    }

    #[test]
    fn test_partial_group_padding_is_zero() {
        let mut out = [0xEEu8; 5];
        pack(Mono10g40IDS, &[0x3FF], &mut out).unwrap();
        assert_eq!(out, [0xFF, 0, 0, 0, 0x03]);
        assert_eq!(unpack(Mono10g40IDS, &out, 1).unwrap(), vec![0x3FF]);

        let mut out = [0xEEu8; 2];
        pack(Mono10p, &[0x3FF], &mut out).unwrap();
        assert_eq!(out, [0xFF, 0x03]);
    }

    #[test]
    fn test_packed32_layout() {
        let mut out = [0u8; 4];
        pack(RGB10p32, &[1, 2, 0x3FF], &mut out).unwrap();
        let word = u32::from_le_bytes(out);
        assert_eq!(word, 1 | (2 << 10) | (0x3FF << 20));
        assert_eq!(unpack(RGB10p32, &out, 1).unwrap(), vec![1, 2, 0x3FF]);
    }

    #[test]
    fn test_short_buffer() {
        let mut out = [0u8; 4];
        let err = pack(Mono10p, &[1, 2, 3, 4], &mut out).unwrap_err();
        assert_eq!(err.kind(), ipl_formats::ErrorKind::BufferTooSmall);
    }
}
