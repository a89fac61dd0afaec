//! Raster slices and the rasterizer interface
//!
//! The slicer doesn't care how a cross-section is drawn; anything which can
//! turn a normalized height into a [`Raster`] can be plugged in through the
//! [`Rasterizer`] trait.  A CPU implementation is included as
//! [`ScanlineRasterizer`] when the `scanline` feature is enabled.

#[cfg(feature = "scanline")]
mod scanline;
#[cfg(feature = "scanline")]
pub use scanline::ScanlineRasterizer;

/// Size of a raster, in pixels
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterSize {
    /// Number of columns
    pub width: u32,
    /// Number of rows
    pub height: u32,
}

impl RasterSize {
    /// LCD panel of the Anycubic Photon, in portrait orientation
    pub const PHOTON: Self = Self::new(1440, 2560);

    /// Builds a new raster size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Single-channel image of one cross-section
///
/// Pixels are stored row-major, starting from the top-left corner.  Any
/// non-zero pixel is solid; zero is void.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    size: RasterSize,
    data: Vec<u8>,
}

impl Raster {
    /// Builds a raster from row-major pixel data
    ///
    /// # Panics
    /// If `data` doesn't contain exactly `size.pixel_count()` pixels
    pub fn new(size: RasterSize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            size.pixel_count(),
            "raster data does not match a {}x{} image",
            size.width,
            size.height
        );
        Self { size, data }
    }

    /// Builds an all-void raster
    pub fn empty(size: RasterSize) -> Self {
        Self {
            size,
            data: vec![0; size.pixel_count()],
        }
    }

    /// Returns the raster size
    pub fn size(&self) -> RasterSize {
        self.size
    }

    /// Returns the row-major pixel data
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Returns a single row
    pub fn row(&self, y: u32) -> &[u8] {
        let w = self.size.width as usize;
        let start = y as usize * w;
        &self.data[start..start + w]
    }

    /// Returns a mutable view of a single row
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let w = self.size.width as usize;
        let start = y as usize * w;
        &mut self.data[start..start + w]
    }

    /// Checks whether the pixel at `(x, y)` is solid
    pub fn is_solid(&self, x: u32, y: u32) -> bool {
        self.row(y)[x as usize] != 0
    }

    /// Counts solid pixels
    pub fn solid_count(&self) -> usize {
        self.data.iter().filter(|p| **p != 0).count()
    }

    /// Unwraps the raster into its pixel data
    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }
}

/// Renderer which draws horizontal cross-sections of a model
///
/// Implementations are shared between worker threads during slicing, so they
/// must be `Sync`; a renderer bound to a single context (e.g. an OpenGL
/// window) should serialize access internally.
pub trait Rasterizer: Sync {
    /// Size of every raster produced by this renderer
    fn size(&self) -> RasterSize;

    /// Number of model units per millimeter
    fn units_per_mm(&self) -> f32 {
        1.0
    }

    /// Renders the cross-section at the given normalized height
    ///
    /// `fraction` is in `[0, 1)`, with 0 at the bottom of the model.
    fn rasterize_at(&self, fraction: f32) -> Raster;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raster_rows() {
        let mut r = Raster::empty(RasterSize::new(4, 3));
        r.row_mut(1)[2] = 255;
        r.row_mut(2).fill(1);
        assert!(r.is_solid(2, 1));
        assert!(!r.is_solid(1, 1));
        assert_eq!(r.solid_count(), 5);
        assert_eq!(r.pixels()[4 + 2], 255);
        assert_eq!(r.row(2), &[1, 1, 1, 1]);
    }

    #[test]
    #[should_panic]
    fn raster_size_mismatch() {
        Raster::new(RasterSize::new(4, 3), vec![0; 11]);
    }

    #[test]
    fn photon_panel() {
        assert_eq!(RasterSize::PHOTON.pixel_count(), 1440 * 2560);
    }
}
