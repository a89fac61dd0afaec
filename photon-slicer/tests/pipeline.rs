use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use photon_slicer::{
    Error,
    container::{HeaderField, PhotonFile},
    mesh::{LoadSettings, Mesh},
    raster::{Raster, RasterSize, Rasterizer, ScanlineRasterizer},
    rle,
    slice::{self, SliceSettings, ThreadCount},
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Closed axis-aligned box, as a binary STL
fn cuboid_stl(size: Vector3<f32>) -> Vec<u8> {
    let c = |i: usize| {
        Point3::new(
            if i & 1 == 0 { 0.0 } else { size.x },
            if i & 2 == 0 { 0.0 } else { size.y },
            if i & 4 == 0 { 0.0 } else { size.z },
        )
    };
    let faces = [
        ([0, 2, 3, 1], -Vector3::z()),
        ([4, 5, 7, 6], Vector3::z()),
        ([0, 1, 5, 4], -Vector3::y()),
        ([2, 6, 7, 3], Vector3::y()),
        ([0, 4, 6, 2], -Vector3::x()),
        ([1, 3, 7, 5], Vector3::x()),
    ];
    let mut points = vec![];
    let mut normals = vec![];
    for (q, n) in faces {
        points.extend([c(q[0]), c(q[1]), c(q[2])]);
        points.extend([c(q[0]), c(q[2]), c(q[3])]);
        normals.extend([n, n]);
    }
    let mut out = vec![];
    Mesh::new(points, normals)
        .unwrap()
        .write_stl(&mut out)
        .unwrap();
    out
}

/// Wraps a rasterizer and counts how often it is called
struct Counting<R> {
    inner: R,
    calls: AtomicUsize,
}

impl<R: Rasterizer> Rasterizer for Counting<R> {
    fn size(&self) -> RasterSize {
        self.inner.size()
    }
    fn rasterize_at(&self, fraction: f32) -> Raster {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.rasterize_at(fraction)
    }
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("photon-slicer-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn cube_to_container() {
    let stl = cuboid_stl(Vector3::new(10.0, 10.0, 10.0));
    let mesh = Mesh::read_stl(stl.as_slice(), &LoadSettings::default()).unwrap();
    assert_eq!(mesh.triangle_count(), 12);

    let rasterizer =
        ScanlineRasterizer::new(&mesh, RasterSize::new(40, 40), 0.5).unwrap();
    let settings = SliceSettings {
        threads: ThreadCount::Many(4.try_into().unwrap()),
        ..SliceSettings::default()
    };
    let file =
        slice::to_container(&mesh, &rasterizer, &settings, PhotonFile::default())
            .unwrap();
    assert_eq!(file.layer_count(), 200);

    let dir = temp_dir("cube");
    let path = dir.join("cube.photon");
    file.write(&path).unwrap();
    let loaded = PhotonFile::open(&path).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(loaded, file);
    assert_eq!(loaded.get(HeaderField::LayerCount).unwrap(), 200u32.into());
    assert_eq!(loaded.get(HeaderField::ResolutionX).unwrap(), 40u32.into());
    assert_eq!(loaded.get(HeaderField::ResolutionY).unwrap(), 40u32.into());
    assert_eq!(
        loaded.header_field("layer_height_mm").unwrap(),
        0.05f32.into()
    );
    for (i, layer) in loaded.layers().iter().enumerate() {
        assert_eq!(rle::decoded_len(layer.data()), 40 * 40);
        assert_eq!(rle::solid_count(layer.data()), 400, "layer {i}");
        assert_relative_eq!(layer.z_mm, i as f32 * 0.05, epsilon = 1e-4);
        assert_eq!(layer.off_time_s, 6.5);
    }
}

#[test]
fn too_wide_fails_before_rendering() {
    let stl = cuboid_stl(Vector3::new(70.0, 20.0, 5.0));
    let mesh = Mesh::read_stl(stl.as_slice(), &LoadSettings::default()).unwrap();
    let rasterizer = Counting {
        inner: ScanlineRasterizer::new(&mesh, RasterSize::new(8, 8), 1.0)
            .unwrap(),
        calls: AtomicUsize::new(0),
    };
    let err = slice::to_container(
        &mesh,
        &rasterizer,
        &SliceSettings::default(),
        PhotonFile::default(),
    )
    .unwrap_err();
    match err {
        Error::OutOfBuildVolume { x, y, width, depth } => {
            assert_eq!((x, y, width, depth), (70.0, 20.0, 65.0, 115.0));
        }
        e => panic!("unexpected error {e}"),
    }
    assert_eq!(rasterizer.calls.load(Ordering::Relaxed), 0);
}

#[test]
fn scale_applies_before_validation() {
    // 40 mm fits, but not once it's doubled
    let stl = cuboid_stl(Vector3::new(40.0, 10.0, 1.0));
    let settings = SliceSettings {
        scale: 2.0,
        ..SliceSettings::default()
    };
    let mesh = Mesh::read_stl(stl.as_slice(), &settings.load_settings()).unwrap();
    assert_eq!(mesh.bounds().extent(), Vector3::new(80.0, 20.0, 2.0));
    let rasterizer =
        ScanlineRasterizer::new(&mesh, RasterSize::new(8, 8), 1.0).unwrap();
    assert!(matches!(
        slice::plan(&mesh, &rasterizer, &settings),
        Err(Error::OutOfBuildVolume { .. })
    ));
}

#[test]
fn codec_example() {
    let mut pixels = vec![0xFF; 100];
    pixels.extend([0x00; 50]);
    let encoded = rle::encode(&pixels);
    assert_eq!(encoded, [0x80 | 100, 50]);
    assert_eq!(rle::decode(&encoded), pixels);
}

#[test]
fn patch_template() {
    let dir = temp_dir("template");
    let template = dir.join("template.photon");
    let mut file = PhotonFile::default();
    file.set_header_field("print_time_s", 1234u32.into()).unwrap();
    file.replace_layers(vec![vec![1, 2, 3]; 5]);
    file.write(&template).unwrap();

    let stl = cuboid_stl(Vector3::new(2.0, 2.0, 1.0));
    let mesh = Mesh::read_stl(stl.as_slice(), &LoadSettings::default()).unwrap();
    let rasterizer =
        ScanlineRasterizer::new(&mesh, RasterSize::new(8, 8), 0.5).unwrap();
    let settings = SliceSettings {
        layer_height_mm: 0.25,
        bottom_layers: 1,
        threads: ThreadCount::One,
        ..SliceSettings::default()
    };
    let out = slice::to_container(
        &mesh,
        &rasterizer,
        &settings,
        PhotonFile::open(&template).unwrap(),
    )
    .unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    // Fields the slicer doesn't own come through from the template
    assert_eq!(out.header_field("print_time_s").unwrap(), 1234u32.into());
    assert_eq!(out.layer_count(), 4);
    assert_eq!(out.header_field("resolution_x").unwrap(), 8u32.into());
    assert_eq!(out.header_field("resolution_y").unwrap(), 8u32.into());
    assert_eq!(out.layers()[0].exposure_s, 90.0);
    assert_eq!(out.layers()[1].exposure_s, 8.0);
    for layer in out.layers() {
        assert_eq!(rle::solid_count(layer.data()), 16);
    }
}
