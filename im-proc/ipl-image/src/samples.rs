//! Channel value access for formats with byte-aligned samples.
//!
//! Samples are returned in memory order, i.e. interleaved for multi-channel
//! formats. Eight bit formats use one byte per sample, deeper formats a
//! little-endian `u16`.

use crate::{Error, Image, PixelFormat, Result};

fn check_unpacked(fmt: PixelFormat, what: &str) -> Result<()> {
    if fmt.has_unpacked_samples() {
        Ok(())
    } else {
        Err(Error::ImageFormatNotSupported(format!(
            "{what} requires unpacked samples, {fmt} is packed or planar"
        )))
    }
}

/// Bytes per sample of an unpacked format.
pub fn bytes_per_sample(fmt: PixelFormat) -> usize {
    if fmt.num_storage_bits_per_channel() > 8 {
        2
    } else {
        1
    }
}

/// Decode the samples of an unpacked format.
///
/// Bits above the format's significant depth are ignored by clamping.
pub fn decode(fmt: PixelFormat, bytes: &[u8], num_samples: usize) -> Result<Vec<u16>> {
    check_unpacked(fmt, "sample access")?;
    let bps = bytes_per_sample(fmt);
    let needed = num_samples * bps;
    if bytes.len() < needed {
        return Err(Error::BufferTooSmall {
            required: needed,
            actual: bytes.len(),
        });
    }
    let max = fmt.maximum_value_per_channel() as u16;
    let samples = if bps == 1 {
        bytes[..needed].iter().map(|&b| (b as u16).min(max)).collect()
    } else {
        bytes[..needed]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]).min(max))
            .collect()
    };
    Ok(samples)
}

/// Encode samples of an unpacked format into `out`.
///
/// Values above the format's maximum are clamped.
pub fn encode(fmt: PixelFormat, samples: &[u16], out: &mut [u8]) -> Result<()> {
    check_unpacked(fmt, "sample access")?;
    let bps = bytes_per_sample(fmt);
    let needed = samples.len() * bps;
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            required: needed,
            actual: out.len(),
        });
    }
    let max = fmt.maximum_value_per_channel() as u16;
    if bps == 1 {
        for (dst, &v) in out.iter_mut().zip(samples) {
            *dst = v.min(max) as u8;
        }
    } else {
        for (dst, &v) in out.chunks_exact_mut(2).zip(samples) {
            dst.copy_from_slice(&v.min(max).to_le_bytes());
        }
    }
    Ok(())
}

impl Image<'_> {
    /// Number of channel values stored for this image.
    pub fn num_samples(&self) -> usize {
        self.width() * self.height() * self.pixel_format().num_channels() as usize
    }

    /// All channel values, interleaved in memory order.
    pub fn samples(&self) -> Result<Vec<u16>> {
        decode(self.pixel_format(), &self.data(), self.num_samples())
    }

    /// Overwrite all channel values.
    pub fn write_samples(&self, samples: &[u16]) -> Result<()> {
        if samples.len() != self.num_samples() {
            return Err(Error::InvalidArgument(format!(
                "expected {} samples, got {}",
                self.num_samples(),
                samples.len()
            )));
        }
        let fmt = self.pixel_format();
        check_unpacked(fmt, "sample access")?;
        let mut data = self.data_mut()?;
        encode(fmt, samples, &mut data)
    }
}
