use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ipl_formats::PixelFormat;
use ipl_image::Image;
use ipl_imops::*;

fn get_im(pixel_format: PixelFormat) -> Image<'static> {
    const W: usize = 1024;
    const H: usize = 1024;
    let im = Image::new(W, H, pixel_format).unwrap();
    let samples: Vec<u16> = (0..im.num_samples())
        .map(|i| (i % 251) as u16 * 4)
        .collect();
    im.write_samples(&samples).unwrap();
    im
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("binning_2x2_mono12", |b| {
        let im = get_im(PixelFormat::Mono12);
        let binning = Binning::with_config(BinningConfig {
            x: 2,
            y: 2,
            mode: BinningMode::Average,
        })
        .unwrap();
        b.iter(|| binning.process(black_box(&im)).unwrap());
    });

    c.bench_function("gamma_rgb8", |b| {
        let im = get_im(PixelFormat::RGB8);
        let gamma = GammaCorrector::with_config(GammaConfig { value: 2.2 }).unwrap();
        b.iter(|| gamma.process_in_place(black_box(&im)).unwrap());
    });

    c.bench_function("hotpixel_detect_bayer", |b| {
        let im = get_im(PixelFormat::BayerRG12);
        let hc = HotpixelCorrection::new();
        b.iter(|| hc.detect(black_box(&im)).unwrap());
    });

    c.bench_function("sharpness_tenengrad", |b| {
        let im = get_im(PixelFormat::Mono8);
        let sharpness = Sharpness::new();
        b.iter(|| sharpness.measure(black_box(&im)).unwrap());
    });

    c.bench_function("rotate_90_bgra8", |b| {
        let im = get_im(PixelFormat::BGRa8);
        let t = ImageTransformer::new();
        b.iter(|| t.rotate(black_box(&im), RotationAngle::Degree90).unwrap());
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
