use std::io::Cursor;

use bayer as wang_debayer;

use ipl_formats::{BayerPattern, Error, Result};

use crate::ConversionMode;

/// Smallest image the demosaic kernels handle with mirrored borders.
pub const MIN_DEBAYER_SIZE: usize = 4;

fn cfa(pattern: BayerPattern) -> Result<wang_debayer::CFA> {
    let cfa = match pattern {
        BayerPattern::RG => wang_debayer::CFA::RGGB,
        BayerPattern::GB => wang_debayer::CFA::GBRG,
        BayerPattern::GR => wang_debayer::CFA::GRBG,
        BayerPattern::BG => wang_debayer::CFA::BGGR,
        BayerPattern::None => {
            return Err(Error::ImageFormatNotSupported(
                "cannot debayer an image without Bayer pattern".into(),
            ));
        }
    };
    Ok(cfa)
}

fn demosaic(mode: ConversionMode) -> wang_debayer::Demosaic {
    match mode {
        ConversionMode::Fast => wang_debayer::Demosaic::NearestNeighbour,
        ConversionMode::Classic => wang_debayer::Demosaic::Linear,
        ConversionMode::HighQuality => wang_debayer::Demosaic::Cubic,
    }
}

/// Reconstruct interleaved RGB values from raw Bayer samples.
///
/// Output values are clamped to `2^bits - 1`.
pub fn debayer(
    raw: &[u16],
    width: usize,
    height: usize,
    bits: u32,
    pattern: BayerPattern,
    mode: ConversionMode,
) -> Result<Vec<u16>> {
    if width < MIN_DEBAYER_SIZE || height < MIN_DEBAYER_SIZE {
        return Err(Error::OutOfRange(format!(
            "debayering needs at least {MIN_DEBAYER_SIZE}x{MIN_DEBAYER_SIZE} pixels, got {width}x{height}"
        )));
    }
    let cfa = cfa(pattern)?;
    let alg = demosaic(mode);
    let map_err = |e: wang_debayer::BayerError| Error::Internal(format!("demosaic failed: {e:?}"));

    if bits <= 8 {
        let src: Vec<u8> = raw.iter().map(|&v| v as u8).collect();
        let mut buf = vec![0u8; width * height * 3];
        {
            let mut dst = wang_debayer::RasterMut::new(
                width,
                height,
                wang_debayer::RasterDepth::Depth8,
                &mut buf,
            );
            wang_debayer::run_demosaic(
                &mut Cursor::new(&src[..]),
                wang_debayer::BayerDepth::Depth8,
                cfa,
                alg,
                &mut dst,
            )
            .map_err(map_err)?;
        }
        Ok(buf.into_iter().map(u16::from).collect())
    } else {
        let max = ((1u32 << bits) - 1) as u16;
        let src: Vec<u8> = raw.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut buf = vec![0u8; width * height * 3 * 2];
        {
            let mut dst = wang_debayer::RasterMut::new(
                width,
                height,
                wang_debayer::RasterDepth::Depth16,
                &mut buf,
            );
            wang_debayer::run_demosaic(
                &mut Cursor::new(&src[..]),
                wang_debayer::BayerDepth::Depth16LE,
                cfa,
                alg,
                &mut dst,
            )
            .map_err(map_err)?;
        }
        // The raster stores samples in native byte order.
        Ok(buf
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]).min(max))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pixels at least two away from every border.
    fn interior(rgb: &[u16], w: usize, h: usize) -> impl Iterator<Item = &[u16]> {
        rgb.chunks_exact(3)
            .enumerate()
            .filter(move |(i, _)| {
                let (x, y) = (i % w, i / w);
                x >= 2 && y >= 2 && x + 2 < w && y + 2 < h
            })
            .map(|(_, px)| px)
    }

    fn assert_close(px: &[u16], expected: [u16; 3], what: &str) {
        for (&got, want) in px.iter().zip(expected) {
            assert!(got.abs_diff(want) <= 1, "{what}: {px:?} != {expected:?}");
        }
    }

    fn uniform(pattern: BayerPattern, r: u16, g: u16, b: u16) -> Vec<u16> {
        let (w, h) = (8, 6);
        let mut raw = Vec::with_capacity(w * h);
        for row in 0..h {
            for col in 0..w {
                let v = match pattern.color_at(row, col).unwrap() {
                    ipl_formats::CfaColor::Red => r,
                    ipl_formats::CfaColor::Green => g,
                    ipl_formats::CfaColor::Blue => b,
                };
                raw.push(v);
            }
        }
        raw
    }

    #[test]
    fn test_flat_field_all_patterns_and_modes() {
        for pattern in [
            BayerPattern::RG,
            BayerPattern::GR,
            BayerPattern::GB,
            BayerPattern::BG,
        ] {
            for mode in [
                ConversionMode::Fast,
                ConversionMode::Classic,
                ConversionMode::HighQuality,
            ] {
                let raw = uniform(pattern, 200, 100, 50);
                let rgb = debayer(&raw, 8, 6, 8, pattern, mode).unwrap();
                for px in interior(&rgb, 8, 6) {
                    assert_close(px, [200, 100, 50], &format!("{pattern} {mode:?}"));
                }
            }
        }
    }

    #[test]
    fn test_deep_flat_field() {
        let raw = uniform(BayerPattern::BG, 4000, 2000, 100);
        let rgb = debayer(&raw, 8, 6, 12, BayerPattern::BG, ConversionMode::HighQuality).unwrap();
        for px in interior(&rgb, 8, 6) {
            assert_close(px, [4000, 2000, 100], "BG 12 bit");
        }
    }

    #[test]
    fn test_too_small() {
        let err = debayer(&[0; 9], 3, 3, 8, BayerPattern::RG, ConversionMode::Fast).unwrap_err();
        assert_eq!(err.kind(), ipl_formats::ErrorKind::OutOfRange);
    }
}
