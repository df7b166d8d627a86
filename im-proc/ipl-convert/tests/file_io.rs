use ipl_convert::io::{ImageOptions, encode_image, read_image, read_image_as, write_image};
use ipl_formats::{ErrorKind, PixelFormat};
use ipl_image::Image;

fn rgb_gradient(width: usize, height: usize) -> Image<'static> {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128]);
        }
    }
    Image::from_vec(width, height, PixelFormat::RGB8, data).unwrap()
}

#[test_log::test]
fn png_roundtrip_rgb() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradient.png");
    let src = rgb_gradient(8, 6);
    write_image(&path, &src).unwrap();

    let back = read_image(&path).unwrap();
    assert_eq!(back.pixel_format(), PixelFormat::RGB8);
    assert_eq!(back.size(), src.size());
    assert_eq!(&back.data()[..], &src.data()[..]);
}

#[test_log::test]
fn deep_mono_is_written_as_gray() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.png");
    let src = Image::new(4, 2, PixelFormat::Mono12).unwrap();
    src.write_samples(&[0, 16, 32, 4095, 160, 320, 640, 1280]).unwrap();
    write_image(&path, &src).unwrap();

    let back = read_image(&path).unwrap();
    assert_eq!(back.pixel_format(), PixelFormat::Mono8);
    assert_eq!(&back.data()[..], &[0, 1, 2, 255, 10, 20, 40, 80]);
}

#[test_log::test]
fn forced_interpretation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("color.png");
    write_image(&path, &rgb_gradient(4, 4)).unwrap();

    let bgr = read_image_as(&path, PixelFormat::BGR8).unwrap();
    assert_eq!(&bgr.data()[..3], &[128, 0, 0]);

    let err = read_image_as(&path, PixelFormat::BayerRG8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageFormatInterpretationError);
}

#[test_log::test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_image(dir.path().join("nope.png")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test_log::test]
fn encode_to_memory() {
    let src = rgb_gradient(8, 8);
    let png = encode_image(&src, ImageOptions::Png).unwrap();
    let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png).unwrap();
    assert_eq!(decoded.to_rgb8().into_raw(), src.data().to_vec());

    let jpeg = encode_image(&src, ImageOptions::Jpeg(90)).unwrap();
    assert!(jpeg.starts_with(&[0xFF, 0xD8]));
}
