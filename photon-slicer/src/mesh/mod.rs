//! Triangle meshes, as loaded from binary STL files
//!
//! A [`Mesh`] is deliberately simple: one point per triangle corner (no vertex
//! deduplication) and one normal per triangle, in file order.  That is all the
//! slicer needs, and it means loading never has to hash or sort anything.
//!
//! ```
//! use photon_slicer::mesh::{LoadSettings, Mesh};
//! use nalgebra::{Point3, Vector3};
//!
//! let mesh = Mesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(2.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 3.0),
//!     ],
//!     vec![Vector3::new(0.0, -1.0, 0.0)],
//! )?;
//!
//! let mut stl = vec![];
//! mesh.write_stl(&mut stl)?;
//!
//! let loaded = Mesh::read_stl(
//!     stl.as_slice(),
//!     &LoadSettings { scale: 2.0, ..Default::default() },
//! )?;
//! assert_eq!(loaded.triangle_count(), 1);
//! assert_eq!(loaded.bounds().max, Point3::new(4.0, 2.0, 6.0));
//! # Ok::<(), photon_slicer::Error>(())
//! ```
use crate::Error;
use nalgebra::{Point3, Vector3};
use std::path::Path;

mod output;
mod read;

/// Axis-aligned bounding box
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    /// Lower corner
    pub min: Point3<f32>,
    /// Upper corner
    pub max: Point3<f32>,
}

impl Bounds {
    /// Computes bounds over a set of points
    ///
    /// Returns `None` if the iterator is empty
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f32>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        });
        Some(Self { min, max })
    }

    /// Size of the box along each axis
    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Center of the box
    pub fn center(&self) -> Point3<f32> {
        self.min + self.extent() / 2.0
    }
}

/// Mapping from file axes to model axes
///
/// `AxisOrder([a, b, c])` builds each model-space vector as
/// `[file[a], file[b], file[c]]`; the identity is `[0, 1, 2]`.  This can be
/// parsed from a three-letter string, e.g. `"xzy"` swaps Y and Z.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AxisOrder([usize; 3]);

impl AxisOrder {
    /// Identity mapping
    pub const IDENTITY: Self = Self([0, 1, 2]);

    /// Builds a new axis order, checking that it's a permutation
    pub fn new(order: [usize; 3]) -> Result<Self, Error> {
        let mut seen = [false; 3];
        for &a in &order {
            if a > 2 || seen[a] {
                return Err(Error::BadAxisOrder(order));
            }
            seen[a] = true;
        }
        Ok(Self(order))
    }

    /// Checks whether this is the identity mapping
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    #[inline]
    fn apply(&self, v: [f32; 3]) -> [f32; 3] {
        [v[self.0[0]], v[self.0[1]], v[self.0[2]]]
    }
}

impl Default for AxisOrder {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::str::FromStr for AxisOrder {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        let mut order = [usize::MAX; 3];
        let mut chars = s.chars();
        for o in order.iter_mut() {
            *o = match chars.next().map(|c| c.to_ascii_lowercase()) {
                Some('x') => 0,
                Some('y') => 1,
                Some('z') => 2,
                _ => usize::MAX,
            };
        }
        if chars.next().is_some() {
            return Err(Error::BadAxisOrder(order));
        }
        Self::new(order)
    }
}

impl std::fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for a in self.0 {
            write!(f, "{}", ['x', 'y', 'z'][a])?;
        }
        Ok(())
    }
}

/// Settings used when loading a mesh
#[derive(Copy, Clone, Debug)]
pub struct LoadSettings {
    /// Uniform scale applied to every point before bounds are computed
    pub scale: f32,

    /// Axis permutation applied to points and normals as they are read
    pub axes: AxisOrder,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            axes: AxisOrder::IDENTITY,
        }
    }
}

impl LoadSettings {
    fn check(&self) -> Result<(), Error> {
        check_scale(self.scale)
    }
}

fn check_scale(scale: f32) -> Result<(), Error> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(Error::BadScale(scale))
    }
}

/// Unindexed triangle mesh
#[derive(Clone, Debug)]
pub struct Mesh {
    points: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    bounds: Bounds,
}

impl Mesh {
    /// Builds a mesh from triangle corners and per-triangle normals
    ///
    /// # Panics
    /// If `points.len() != 3 * normals.len()`
    pub fn new(
        points: Vec<Point3<f32>>,
        normals: Vec<Vector3<f32>>,
    ) -> Result<Self, Error> {
        assert_eq!(
            points.len(),
            normals.len() * 3,
            "expected three points per normal"
        );
        let bounds = Bounds::from_points(&points).ok_or(Error::EmptyMesh)?;
        Ok(Self {
            points,
            normals,
            bounds,
        })
    }

    /// Builds a mesh from `(corners, normal)` pairs
    pub fn from_triangles<I>(triangles: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = ([Point3<f32>; 3], Vector3<f32>)>,
    {
        let (points, normals): (Vec<[Point3<f32>; 3]>, Vec<_>) =
            triangles.into_iter().unzip();
        Self::new(points.into_iter().flatten().collect(), normals)
    }

    /// Opens and reads a binary STL file
    pub fn open<P: AsRef<Path>>(
        path: P,
        settings: &LoadSettings,
    ) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::read_stl(std::io::BufReader::new(file), settings)
    }

    /// Returns a copy of this mesh with every point scaled by `scale`
    ///
    /// Bounds are recomputed from the scaled points.
    pub fn scaled(&self, scale: f32) -> Result<Self, Error> {
        check_scale(scale)?;
        let points = self.points.iter().map(|p| *p * scale).collect();
        Self::new(points, self.normals.clone())
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.normals.len()
    }

    /// Triangle corners, three per triangle
    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }

    /// Triangle normals, as stored in the source file
    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    /// Bounds of the (scaled) points
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Iterates over triangles as arrays of corners
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        self.points.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds_of_points() {
        let pts = [
            Point3::new(1.0, -2.0, 3.0),
            Point3::new(-1.0, 5.0, 0.5),
            Point3::new(0.0, 0.0, 4.0),
        ];
        let b = Bounds::from_points(&pts).unwrap();
        assert_eq!(b.min, Point3::new(-1.0, -2.0, 0.5));
        assert_eq!(b.max, Point3::new(1.0, 5.0, 4.0));
        assert_eq!(b.extent(), Vector3::new(2.0, 7.0, 3.5));
        assert_eq!(b.center(), Point3::new(0.0, 1.5, 2.25));

        assert!(Bounds::from_points(&[] as &[Point3<f32>]).is_none());
    }

    #[test]
    fn axis_order_parsing() {
        assert_eq!("xyz".parse::<AxisOrder>().unwrap(), AxisOrder::IDENTITY);
        assert_eq!(
            "XZY".parse::<AxisOrder>().unwrap(),
            AxisOrder::new([0, 2, 1]).unwrap()
        );
        assert!("xxz".parse::<AxisOrder>().is_err());
        assert!("xy".parse::<AxisOrder>().is_err());
        assert!("xyzw".parse::<AxisOrder>().is_err());
        assert!(AxisOrder::new([0, 1, 3]).is_err());
        assert_eq!(AxisOrder::new([2, 0, 1]).unwrap().to_string(), "zxy");
    }

    #[test]
    fn axis_order_apply() {
        let a = AxisOrder::new([2, 0, 1]).unwrap();
        assert_eq!(a.apply([1.0, 2.0, 3.0]), [3.0, 1.0, 2.0]);
        assert!(!a.is_identity());
    }

    #[test]
    fn empty_mesh() {
        assert!(matches!(Mesh::new(vec![], vec![]), Err(Error::EmptyMesh)));
    }

    #[test]
    #[should_panic]
    fn mismatched_normals() {
        let _ = Mesh::new(vec![Point3::origin(); 3], vec![]);
    }

    #[test]
    fn from_triangles() {
        let t = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 2.0),
        ];
        let mesh =
            Mesh::from_triangles([(t, Vector3::z()), (t, -Vector3::z())])
                .unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.points().len(), 6);
        assert_eq!(mesh.triangles().nth(1), Some(t));
        assert_eq!(mesh.bounds().max, Point3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn scaled_mesh() {
        let mesh = Mesh::new(
            vec![
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(2.0, 1.0, 1.0),
                Point3::new(1.0, 3.0, 1.0),
            ],
            vec![Vector3::z()],
        )
        .unwrap();
        let s = mesh.scaled(10.0).unwrap();
        assert_eq!(s.bounds().min, Point3::new(10.0, 10.0, 10.0));
        assert_eq!(s.bounds().max, Point3::new(20.0, 30.0, 10.0));
        assert_eq!(s.normals(), mesh.normals());

        assert!(matches!(mesh.scaled(0.0), Err(Error::BadScale(_))));
        assert!(matches!(mesh.scaled(f32::NAN), Err(Error::BadScale(_))));
    }
}
