//! Layer planning
use crate::{Error, mesh::Bounds};

/// Relative distance within which a layer-count quotient snaps to an integer
///
/// Spans and thicknesses arrive as `f32`, so this has to absorb a few ulps of
/// their representation error.
const SNAP: f64 = 8.0 * f32::EPSILON as f64;

/// Number of layers to cut, and where to cut them
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayerPlan {
    count: usize,
    layer_height_mm: f32,
}

impl LayerPlan {
    /// Plans layers for a model with the given bounds
    ///
    /// `units_per_mm` converts model units (as seen by the rasterizer) into
    /// millimeters.  The layer count is rounded up, so the full height of the
    /// model is always covered; a flat model has zero layers.
    pub fn new(
        bounds: &Bounds,
        layer_height_mm: f32,
        units_per_mm: f32,
    ) -> Result<Self, Error> {
        if !(layer_height_mm.is_finite() && layer_height_mm > 0.0) {
            return Err(Error::BadLayerHeight(layer_height_mm));
        }
        if !(units_per_mm.is_finite() && units_per_mm > 0.0) {
            return Err(Error::BadUnits(units_per_mm));
        }
        let span_mm =
            f64::from(bounds.max.z - bounds.min.z) / f64::from(units_per_mm);
        let count = layer_count(span_mm, f64::from(layer_height_mm));
        Ok(Self {
            count,
            layer_height_mm,
        })
    }

    /// Number of layers
    pub fn count(&self) -> usize {
        self.count
    }

    /// Checks whether there are no layers at all
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Physical layer thickness
    pub fn layer_height_mm(&self) -> f32 {
        self.layer_height_mm
    }

    /// Normalized height of the given layer, in the range `[0, 1)`
    ///
    /// # Panics
    /// If `i` is out of range
    pub fn fraction(&self, i: usize) -> f32 {
        assert!(i < self.count, "layer {i} out of range");
        (i as f64 / self.count as f64) as f32
    }

    /// Height of the bottom of the given layer above the build plate
    pub fn z_mm(&self, i: usize) -> f32 {
        i as f32 * self.layer_height_mm
    }

    /// Iterates over `(index, fraction)` pairs
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, f32)> + '_ {
        (0..self.count).map(|i| (i, self.fraction(i)))
    }
}

/// Computes `ceil(span / thickness)`, tolerating floating-point noise
///
/// A quotient like `1.1f32 / 0.1f32 = 11.0000001` is an exact fit in
/// disguise, so it gets 11 layers rather than 12.
fn layer_count(span: f64, thickness: f64) -> usize {
    let q = span / thickness;
    if !(q > 0.0) {
        return 0;
    }
    let r = q.round();
    let n = if (q - r).abs() <= SNAP * r.max(1.0) {
        r
    } else {
        q.ceil()
    };
    n as usize
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point3;

    fn bounds(height: f32) -> Bounds {
        Bounds {
            min: Point3::new(0.0, 0.0, 1.0),
            max: Point3::new(1.0, 1.0, 1.0 + height),
        }
    }

    #[test]
    fn cube_layers() {
        let p = LayerPlan::new(&bounds(10.0), 0.05, 1.0).unwrap();
        assert_eq!(p.count(), 200);
    }

    #[test]
    fn rounds_up() {
        let p = LayerPlan::new(&bounds(1.0), 0.3, 1.0).unwrap();
        assert_eq!(p.count(), 4);
        let p = LayerPlan::new(&bounds(1.01), 0.05, 1.0).unwrap();
        assert_eq!(p.count(), 21);
    }

    #[test]
    fn exact_fits() {
        assert_eq!(layer_count(1.1, 0.1), 11);
        assert_eq!(layer_count(0.3, 0.1), 3);
        assert_eq!(layer_count(0.7, 0.1), 7);
        assert_eq!(layer_count(10.0, 0.05), 200);
        assert_eq!(layer_count(10.0, 0.025), 400);
    }

    #[test]
    fn exact_fits_from_f32() {
        let flat = |h: f32| Bounds {
            min: Point3::origin(),
            max: Point3::new(1.0, 1.0, h),
        };
        for (span, thickness, n) in [
            (0.3, 0.1, 3),
            (0.15, 0.05, 3),
            (1.1, 0.1, 11),
            (10.3, 0.1, 103),
            (7.0, 0.035, 200),
        ] {
            let p = LayerPlan::new(&flat(span), thickness, 1.0).unwrap();
            assert_eq!(p.count(), n, "{span} / {thickness}");
            // Same span, offset away from the origin
            let p = LayerPlan::new(&bounds(span), thickness, 1.0).unwrap();
            assert_eq!(p.count(), n, "{span} / {thickness} (offset)");
        }
        // A genuine remainder still rounds up
        let p = LayerPlan::new(&flat(10.31), 0.1, 1.0).unwrap();
        assert_eq!(p.count(), 104);
    }

    #[test]
    fn flat_model() {
        let p = LayerPlan::new(&bounds(0.0), 0.05, 1.0).unwrap();
        assert_eq!(p.count(), 0);
        assert!(p.is_empty());
        assert_eq!(p.iter().count(), 0);
    }

    #[test]
    fn units() {
        // Model units are half-millimeters, so the model is 5 mm tall
        let p = LayerPlan::new(&bounds(10.0), 0.05, 2.0).unwrap();
        assert_eq!(p.count(), 100);
    }

    #[test]
    fn bad_inputs() {
        for h in [0.0, -0.05, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                LayerPlan::new(&bounds(1.0), h, 1.0),
                Err(Error::BadLayerHeight(_))
            ));
        }
        assert!(matches!(
            LayerPlan::new(&bounds(1.0), 0.05, 0.0),
            Err(Error::BadUnits(_))
        ));
    }

    #[test]
    fn monotonic() {
        let b = bounds(7.3);
        let mut prev = usize::MAX;
        for i in 1..200 {
            let h = i as f32 * 0.01;
            let n = LayerPlan::new(&b, h, 1.0).unwrap().count();
            assert!(n <= prev, "{n} > {prev} at layer height {h}");
            prev = n;
        }
    }

    #[test]
    fn fractions() {
        let p = LayerPlan::new(&bounds(1.0), 0.25, 1.0).unwrap();
        let fs: Vec<_> = p.iter().collect();
        assert_eq!(fs, vec![(0, 0.0), (1, 0.25), (2, 0.5), (3, 0.75)]);
        assert_eq!(p.z_mm(2), 0.5);
    }

    #[test]
    #[should_panic]
    fn fraction_out_of_range() {
        let p = LayerPlan::new(&bounds(1.0), 0.25, 1.0).unwrap();
        p.fraction(4);
    }
}
