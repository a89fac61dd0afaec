//! CPU cross-section rendering by plane cutting and scanline fill
use super::{Raster, RasterSize, Rasterizer};
use crate::{
    Error,
    mesh::{Bounds, Mesh},
};
use nalgebra::{Point2, Point3};

/// Headless rasterizer which cuts the mesh with a plane and fills the contour
///
/// Model units are millimeters.  The model's XY bounding-box center is placed
/// in the middle of the panel, with +X to the right and +Y towards row 0.
///
/// Filling uses the even-odd rule at pixel centers, so the mesh should be
/// closed; open meshes produce streaks rather than errors.
pub struct ScanlineRasterizer {
    triangles: Vec<[Point3<f32>; 3]>,
    bounds: Bounds,
    size: RasterSize,
    pixel_mm: f32,

    /// Model-space position of the top-left corner of the panel
    origin: Point2<f32>,
}

impl ScanlineRasterizer {
    /// Pixel pitch of the Anycubic Photon LCD (68.04 mm / 1440 px)
    pub const PHOTON_PIXEL_MM: f32 = 0.04725;

    /// Builds a rasterizer for the given mesh
    pub fn new(
        mesh: &Mesh,
        size: RasterSize,
        pixel_mm: f32,
    ) -> Result<Self, Error> {
        if !(pixel_mm.is_finite() && pixel_mm > 0.0) {
            return Err(Error::Configuration(
                "pixel size must be finite and positive",
            ));
        }
        let bounds = mesh.bounds();
        let center = bounds.center();
        let origin = Point2::new(
            center.x - size.width as f32 * pixel_mm / 2.0,
            center.y + size.height as f32 * pixel_mm / 2.0,
        );
        Ok(Self {
            triangles: mesh.triangles().collect(),
            bounds,
            size,
            pixel_mm,
            origin,
        })
    }

    /// Cuts every triangle with the plane at height `z`
    ///
    /// An edge crosses the plane when exactly one endpoint is at or below it;
    /// this means each triangle produces zero or two crossings, and vertices
    /// lying exactly on the plane are counted consistently.
    fn segments(&self, z: f32) -> Vec<[Point2<f32>; 2]> {
        let mut out = vec![];
        for t in &self.triangles {
            let mut hits = [Point2::origin(); 2];
            let mut n = 0;
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                if (a.z <= z) == (b.z <= z) {
                    continue;
                }
                // Shared edges must give bit-identical crossings in both of
                // their triangles, so always interpolate from the lower end
                let (a, b) = if a.z < b.z { (a, b) } else { (b, a) };
                let s = (z - a.z) / (b.z - a.z);
                if n < 2 {
                    hits[n] =
                        Point2::new(a.x + s * (b.x - a.x), a.y + s * (b.y - a.y));
                }
                n += 1;
            }
            if n == 2 {
                out.push(hits);
            }
        }
        out
    }

    /// Model-space Y coordinate of the center of the given row
    #[inline]
    fn row_y(&self, row: i64) -> f32 {
        self.origin.y - (row as f32 + 0.5) * self.pixel_mm
    }

    /// Index of the first column whose center is at or past `x`
    #[inline]
    fn column(&self, x: f32) -> i64 {
        ((x - self.origin.x) / self.pixel_mm - 0.5).ceil() as i64
    }
}

impl Rasterizer for ScanlineRasterizer {
    fn size(&self) -> RasterSize {
        self.size
    }

    fn rasterize_at(&self, fraction: f32) -> Raster {
        let z = self.bounds.min.z
            + fraction * (self.bounds.max.z - self.bounds.min.z);
        let height = self.size.height as i64;
        let width = self.size.width as i64;

        // Bucket edge crossings by row.  A segment covers the rows whose
        // center lies in [lo.y, hi.y), which keeps shared endpoints from
        // being counted twice.
        let mut crossings = vec![vec![]; self.size.height as usize];
        for [a, b] in self.segments(z) {
            let (lo, hi) = if a.y <= b.y { (a, b) } else { (b, a) };
            if lo.y == hi.y {
                continue;
            }
            let first = (((self.origin.y - hi.y) / self.pixel_mm - 0.5).floor()
                as i64
                + 1)
            .max(0);
            let last = (((self.origin.y - lo.y) / self.pixel_mm - 0.5).floor()
                as i64)
                .min(height - 1);
            for row in first..=last {
                let y = self.row_y(row);
                let x = lo.x + (y - lo.y) * (hi.x - lo.x) / (hi.y - lo.y);
                crossings[row as usize].push(x);
            }
        }

        let mut raster = Raster::empty(self.size);
        for (row, xs) in crossings.iter_mut().enumerate() {
            if xs.is_empty() {
                continue;
            }
            xs.sort_unstable_by(|a, b| a.total_cmp(b));
            let out = raster.row_mut(row as u32);
            for span in xs.chunks_exact(2) {
                let start = self.column(span[0]).clamp(0, width) as usize;
                let end = self.column(span[1]).clamp(0, width) as usize;
                if start < end {
                    out[start..end].fill(u8::MAX);
                }
            }
        }
        raster
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    /// Axis-aligned box from `lo` to `hi`, with outward-facing triangles
    fn cuboid(lo: Point3<f32>, hi: Point3<f32>) -> Mesh {
        let c = |i: usize| {
            Point3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
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
        Mesh::new(points, normals).unwrap()
    }

    #[test]
    fn cube_cross_section() {
        let mesh = cuboid(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
        let r =
            ScanlineRasterizer::new(&mesh, RasterSize::new(40, 40), 0.5).unwrap();
        for f in [0.0, 0.25, 0.5, 0.99] {
            let img = r.rasterize_at(f);
            assert_eq!(img.solid_count(), 400, "bad area at {f}");
            for y in 0..40 {
                for x in 0..40 {
                    let inside = (10..30).contains(&x) && (10..30).contains(&y);
                    assert_eq!(img.is_solid(x, y), inside, "at {x}, {y}");
                }
            }
        }
    }

    #[test]
    fn orientation() {
        // A bar which only covers the +X, +Y quadrant of its bounding box at
        // the top, attached to a full-width base
        let base = cuboid(Point3::origin(), Point3::new(8.0, 8.0, 1.0));
        let bar =
            cuboid(Point3::new(4.0, 4.0, 1.0), Point3::new(8.0, 8.0, 2.0));
        let mesh = Mesh::new(
            base.points().iter().chain(bar.points()).cloned().collect(),
            base.normals().iter().chain(bar.normals()).cloned().collect(),
        )
        .unwrap();
        let r =
            ScanlineRasterizer::new(&mesh, RasterSize::new(16, 16), 1.0).unwrap();

        let img = r.rasterize_at(0.75);
        assert_eq!(img.solid_count(), 16);
        // +X is to the right and +Y is up, i.e. towards row 0
        assert!(img.is_solid(11, 4));
        assert!(img.is_solid(8, 7));
        assert!(!img.is_solid(7, 8));
        assert!(!img.is_solid(4, 11));
    }

    #[test]
    fn clipped_to_panel() {
        let mesh = cuboid(Point3::origin(), Point3::new(100.0, 100.0, 1.0));
        let r =
            ScanlineRasterizer::new(&mesh, RasterSize::new(10, 20), 1.0).unwrap();
        let img = r.rasterize_at(0.5);
        assert_eq!(img.solid_count(), 200);
    }

    #[test]
    fn bad_pixel_size() {
        let mesh = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(
            ScanlineRasterizer::new(&mesh, RasterSize::new(4, 4), 0.0).is_err()
        );
    }
}
