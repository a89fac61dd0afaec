use criterion::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use std::hint::black_box;

use photon_slicer::{
    raster::{Raster, RasterSize},
    rle,
};

/// Full-panel layer with a filled disk of the given radius (in pixels)
fn disk(radius: f32) -> Raster {
    let size = RasterSize::PHOTON;
    let (cx, cy) = (size.width as f32 / 2.0, size.height as f32 / 2.0);
    let mut out = Raster::empty(size);
    for y in 0..size.height {
        let row = out.row_mut(y);
        for (x, p) in row.iter_mut().enumerate() {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy < radius * radius {
                *p = rle::SOLID;
            }
        }
    }
    out
}

/// Full-panel layer with alternating one-pixel columns
fn stripes() -> Raster {
    let size = RasterSize::PHOTON;
    let data = (0..size.pixel_count())
        .map(|i| if i % 2 == 0 { rle::SOLID } else { rle::VOID })
        .collect();
    Raster::new(size, data)
}

pub fn encode_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("rle encode (1440 x 2560)");
    group.throughput(Throughput::Elements(
        RasterSize::PHOTON.pixel_count() as u64,
    ));
    for radius in [0.0, 100.0, 500.0, 1000.0] {
        let raster = &disk(radius);
        group.bench_function(BenchmarkId::new("disk", radius), move |b| {
            b.iter(|| black_box(rle::encode(raster.pixels())))
        });
    }
    let raster = &stripes();
    group.bench_function("stripes", move |b| {
        b.iter(|| black_box(rle::encode(raster.pixels())))
    });
}

pub fn decode_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("rle decode (1440 x 2560)");
    group.throughput(Throughput::Elements(
        RasterSize::PHOTON.pixel_count() as u64,
    ));
    for radius in [0.0, 500.0] {
        let encoded = &rle::encode(disk(radius).pixels());
        group.bench_function(BenchmarkId::new("disk", radius), move |b| {
            b.iter(|| black_box(rle::decode(encoded)))
        });
    }
}

criterion_group!(benches, encode_sweep, decode_sweep);
criterion_main!(benches);
