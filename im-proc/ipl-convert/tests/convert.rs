use ipl_convert::{ConversionMode, ConvertTo, ImageConverter};
use ipl_formats::{ErrorKind, PixelFormat};
use ipl_image::Image;

fn ramp(width: usize, height: usize, fmt: PixelFormat) -> Image<'static> {
    let data: Vec<u8> = (0..fmt.storage_size_of_pixels(width * height))
        .map(|i| (i * 7 % 251) as u8)
        .collect();
    Image::from_vec(width, height, fmt, data).unwrap()
}

#[test_log::test]
fn identity_conversion_is_byte_identical() {
    let mut converter = ImageConverter::new();
    for fmt in [
        PixelFormat::Mono8,
        PixelFormat::BayerGR12p,
        PixelFormat::RGB10p32,
        PixelFormat::Mono10g40IDS,
    ] {
        let src = ramp(16, 8, fmt);
        let out = converter.convert(&src, fmt).unwrap();
        assert_eq!(&out.data()[..], &src.data()[..], "{fmt}");
        assert!(!out.shares_storage_with(&src));
    }
}

#[test_log::test]
fn mono_depth_roundtrip() {
    let src = ramp(8, 4, PixelFormat::Mono8);
    let deep = src.convert_to(PixelFormat::Mono12, ConversionMode::Fast).unwrap();
    assert_eq!(deep.samples().unwrap()[1], (src.data()[1] as u16) << 4);
    let back = deep.convert_to(PixelFormat::Mono8, ConversionMode::Fast).unwrap();
    assert_eq!(&back.data()[..], &src.data()[..]);
}

#[test_log::test]
fn packed_bayer_roundtrip() {
    let mut converter = ImageConverter::new();
    let src = ramp(8, 4, PixelFormat::BayerRG8);
    for packed in [
        PixelFormat::BayerRG10p,
        PixelFormat::BayerRG12p,
        PixelFormat::BayerRG10g40IDS,
        PixelFormat::BayerRG12g24IDS,
    ] {
        let p = converter.convert(&src, packed).unwrap();
        assert_eq!(p.byte_count(), packed.storage_size_of_pixels(32));
        let back = converter.convert(&p, PixelFormat::BayerRG8).unwrap();
        assert_eq!(&back.data()[..], &src.data()[..], "{packed}");
    }
}

#[test_log::test]
fn mono_to_color_replicates() {
    let src = Image::from_vec(2, 1, PixelFormat::Mono8, vec![10, 200]).unwrap();
    let rgb = src.convert_to(PixelFormat::RGB8, ConversionMode::default()).unwrap();
    assert_eq!(&rgb.data()[..], &[10, 10, 10, 200, 200, 200]);
    let bgra = src.convert_to(PixelFormat::BGRa8, ConversionMode::default()).unwrap();
    assert_eq!(&bgra.data()[..], &[10, 10, 10, 255, 200, 200, 200, 255]);
}

#[test_log::test]
fn channel_order_and_alpha() {
    let src = Image::from_vec(1, 1, PixelFormat::RGB8, vec![1, 2, 3]).unwrap();
    let bgra = src.convert_to(PixelFormat::BGRa8, ConversionMode::Fast).unwrap();
    assert_eq!(&bgra.data()[..], &[3, 2, 1, 255]);

    let rgba12 = bgra.convert_to(PixelFormat::RGBa12, ConversionMode::Fast).unwrap();
    assert_eq!(rgba12.samples().unwrap(), vec![16, 32, 48, 4080]);

    let rgb = rgba12.convert_to(PixelFormat::RGB8, ConversionMode::Fast).unwrap();
    assert_eq!(&rgb.data()[..], &[1, 2, 3]);
}

#[test_log::test]
fn gray_rgb_becomes_same_mono() {
    let src = Image::from_vec(2, 1, PixelFormat::RGB8, vec![77, 77, 77, 255, 255, 255]).unwrap();
    let mono = src.convert_to(PixelFormat::Mono8, ConversionMode::Fast).unwrap();
    assert_eq!(&mono.data()[..], &[77, 255]);
}

#[test_log::test]
fn flat_bayer_debayers_to_flat_color() {
    let (w, h) = (8, 8);
    let mut raw = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            raw[y * w + x] = match (y % 2, x % 2) {
                (0, 0) => 180,
                (1, 1) => 40,
                _ => 90,
            };
        }
    }
    let src = Image::from_vec(w, h, PixelFormat::BayerRG8, raw).unwrap();
    for mode in [
        ConversionMode::Fast,
        ConversionMode::Classic,
        ConversionMode::HighQuality,
    ] {
        let rgb = src.convert_to(PixelFormat::RGB8, mode).unwrap();
        assert_eq!(rgb.size(), src.size());
        let data = rgb.data();
        for y in 2..h - 2 {
            for x in 2..w - 2 {
                let i = (y * w + x) * 3;
                for (got, want) in data[i..i + 3].iter().zip([180u8, 90, 40]) {
                    assert!(got.abs_diff(want) <= 1, "{mode:?} at ({x}, {y})");
                }
            }
        }
    }
}

#[test_log::test]
fn conversion_is_deterministic_per_mode() {
    let src = ramp(16, 12, PixelFormat::BayerGB8);
    for mode in [
        ConversionMode::Fast,
        ConversionMode::Classic,
        ConversionMode::HighQuality,
    ] {
        let mut converter = ImageConverter::with_mode(mode);
        let a = converter.convert(&src, PixelFormat::BGR8).unwrap();
        let b = converter.convert(&src, PixelFormat::BGR8).unwrap();
        assert_eq!(&a.data()[..], &b.data()[..]);
        assert_eq!(a.size(), src.size());
    }
}

#[test_log::test]
fn unsupported_conversions() {
    let mut converter = ImageConverter::new();
    let bayer = ramp(8, 8, PixelFormat::BayerRG8);
    let err = converter.convert(&bayer, PixelFormat::BayerGB8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageFormatNotSupported);

    let mono = ramp(8, 8, PixelFormat::Mono8);
    let err = converter.convert(&mono, PixelFormat::BayerRG8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageFormatNotSupported);
    assert!(
        !converter
            .supported_output_pixel_formats(PixelFormat::Mono8)
            .contains(&PixelFormat::BayerRG8)
    );
}

#[test_log::test]
fn empty_image_is_rejected() {
    let empty = Image::new(0, 0, PixelFormat::Mono8).unwrap();
    let err = ImageConverter::new()
        .convert(&empty, PixelFormat::RGB8)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test_log::test]
fn tiny_bayer_is_out_of_range() {
    let src = ramp(2, 2, PixelFormat::BayerRG8);
    let err = src
        .convert_to(PixelFormat::RGB8, ConversionMode::Fast)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test_log::test]
fn yuv_roundtrip_of_flat_color() {
    let rgb: Vec<u8> = std::iter::repeat_n([200u8, 60, 30], 16).flatten().collect();
    let src = Image::from_vec(4, 4, PixelFormat::RGB8, rgb).unwrap();
    for fmt in [
        PixelFormat::YUV420_8_YY_UV_SemiplanarIDS,
        PixelFormat::YUV420_8_YY_VU_SemiplanarIDS,
    ] {
        let yuv = src.convert_to(fmt, ConversionMode::Fast).unwrap();
        assert_eq!(yuv.byte_count(), 24);
        let back = yuv.convert_to(PixelFormat::RGB8, ConversionMode::Fast).unwrap();
        for (a, b) in back.data().iter().zip(src.data().iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 3, "{fmt}: {a} vs {b}");
        }
    }

    let odd = ramp(3, 2, PixelFormat::RGB8);
    let err = odd
        .convert_to(PixelFormat::YUV420_8_YY_UV_SemiplanarIDS, ConversionMode::Fast)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test_log::test]
fn timestamp_is_carried() {
    let src = ramp(4, 4, PixelFormat::Mono8).with_timestamp(Some(123_456));
    let out = src
        .convert_to(PixelFormat::RGB8, ConversionMode::Fast)
        .unwrap();
    assert_eq!(out.timestamp(), Some(123_456));
}

#[test_log::test]
fn pool_reuses_buffers() {
    let mut converter = ImageConverter::new();
    let src = ramp(32, 16, PixelFormat::Mono8);
    for _ in 0..5 {
        let out = converter.convert(&src, PixelFormat::RGB8).unwrap();
        drop(out);
    }
    assert_eq!(
        converter.pooled_buffer_count(PixelFormat::Mono8, PixelFormat::RGB8, 32, 16),
        1
    );

    let held: Vec<_> = (0..3)
        .map(|_| converter.convert(&src, PixelFormat::RGB8).unwrap())
        .collect();
    assert_eq!(
        converter.pooled_buffer_count(PixelFormat::Mono8, PixelFormat::RGB8, 32, 16),
        3
    );
    drop(held);
}

#[test_log::test]
fn pre_allocation_fills_the_pool() {
    let mut converter = ImageConverter::new();
    converter
        .pre_allocate_conversion(PixelFormat::BayerRG8, PixelFormat::RGB8, 16, 16, 4)
        .unwrap();
    assert_eq!(
        converter.pooled_buffer_count(PixelFormat::BayerRG8, PixelFormat::RGB8, 16, 16),
        4
    );
    let src = ramp(16, 16, PixelFormat::BayerRG8);
    let _out = converter.convert(&src, PixelFormat::RGB8).unwrap();
    assert_eq!(
        converter.pooled_buffer_count(PixelFormat::BayerRG8, PixelFormat::RGB8, 16, 16),
        4
    );

    let err = converter
        .pre_allocate_conversion(PixelFormat::Mono8, PixelFormat::BayerBG8, 16, 16, 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageFormatNotSupported);
}

#[test_log::test]
fn cleared_pools_release_buffers() {
    let mut converter = ImageConverter::new();
    let src = ramp(16, 8, PixelFormat::Mono8);
    let held = converter.convert(&src, PixelFormat::RGB8).unwrap();
    for width in [4, 6, 10] {
        let other = ramp(width, 2, PixelFormat::Mono8);
        converter.convert(&other, PixelFormat::RGB8).unwrap();
    }
    assert_eq!(
        converter.pooled_buffer_count(PixelFormat::Mono8, PixelFormat::RGB8, 6, 2),
        1
    );

    converter.clear_pools();
    for width in [4, 6, 10, 16] {
        let height = if width == 16 { 8 } else { 2 };
        assert_eq!(
            converter.pooled_buffer_count(PixelFormat::Mono8, PixelFormat::RGB8, width, height),
            0
        );
    }
    let reference = ImageConverter::new().convert(&src, PixelFormat::RGB8).unwrap();
    assert_eq!(&held.data()[..], &reference.data()[..]);
    drop(held);

    let again = converter.convert(&src, PixelFormat::RGB8).unwrap();
    assert_eq!(again.byte_count(), 16 * 8 * 3);
    assert_eq!(
        converter.pooled_buffer_count(PixelFormat::Mono8, PixelFormat::RGB8, 16, 8),
        1
    );
}

#[test_log::test]
fn pre_allocation_rejects_overflowing_size() {
    let mut converter = ImageConverter::new();
    let err = converter
        .pre_allocate_conversion(PixelFormat::Mono8, PixelFormat::RGB8, usize::MAX, 2, 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test_log::test]
fn convert_into_caller_buffer() {
    let mut converter = ImageConverter::new();
    let src = ramp(8, 8, PixelFormat::BayerBG8);
    let expected = converter.convert(&src, PixelFormat::RGB8).unwrap();

    let mut small = vec![0u8; 10];
    let err = converter
        .convert_into(&src, PixelFormat::RGB8, &mut small)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BufferTooSmall);

    let mut dest = vec![0u8; 8 * 8 * 3 + 16];
    {
        let out = converter
            .convert_into(&src, PixelFormat::RGB8, &mut dest)
            .unwrap();
        assert_eq!(out.pixel_format(), PixelFormat::RGB8);
        assert_eq!(&out.data()[..8 * 8 * 3], &expected.data()[..]);
    }
    assert_eq!(&dest[..8 * 8 * 3], &expected.data()[..]);
}

#[test_log::test]
fn mode_does_not_change_geometry() {
    let mut converter = ImageConverter::new();
    assert_eq!(converter.conversion_mode(), ConversionMode::HighQuality);
    converter.set_conversion_mode(ConversionMode::Classic);
    let src = ramp(10, 6, PixelFormat::BayerGR10);
    let out = converter.convert(&src, PixelFormat::RGB10).unwrap();
    assert_eq!(out.byte_count(), 10 * 6 * 6);
    assert!(out.samples().unwrap().iter().all(|&v| v <= 1023));
}
