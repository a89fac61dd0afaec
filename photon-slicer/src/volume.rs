//! Build-volume validation
use crate::{Error, mesh::Bounds};

/// Printable envelope of the build plate
///
/// Only the horizontal footprint is checked; a masked-SLA printer builds
/// downwards from the plate, so height is limited by the Z axis travel, which
/// isn't part of this check.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BuildVolume {
    /// Maximum extent along X, in millimeters
    pub width_mm: f32,
    /// Maximum extent along Y, in millimeters
    pub depth_mm: f32,
}

impl BuildVolume {
    /// Envelope of the Anycubic Photon build plate
    pub const PHOTON: Self = Self {
        width_mm: 65.0,
        depth_mm: 115.0,
    };

    /// Checks that the given bounds fit within this envelope
    ///
    /// A model exactly as large as the envelope fits.
    pub fn validate(&self, bounds: &Bounds) -> Result<(), Error> {
        let size = bounds.extent();
        if size.x > self.width_mm || size.y > self.depth_mm {
            Err(Error::OutOfBuildVolume {
                x: size.x,
                y: size.y,
                width: self.width_mm,
                depth: self.depth_mm,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for BuildVolume {
    fn default() -> Self {
        Self::PHOTON
    }
}
