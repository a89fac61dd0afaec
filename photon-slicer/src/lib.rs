//! `photon-slicer` turns a binary STL mesh into a stack of 2D cross-sections
//! for masked-SLA resin printing, and packages them into a Photon (`.photon`)
//! file that the printer can run directly.
//!
//! The pipeline is a chain of plain values, each stage consuming the output of
//! the previous one:
//!
//! ```text
//! Mesh ──> Bounds ──> LayerPlan ──> [Raster; N] ──> [RLE bytes; N] ──> PhotonFile
//! ```
//!
//! - [`Mesh`](crate::mesh::Mesh) parses a binary STL and computes its
//!   [`Bounds`](crate::mesh::Bounds)
//! - [`BuildVolume`](crate::volume::BuildVolume) rejects models which don't
//!   fit on the build plate
//! - [`LayerPlan`](crate::plan::LayerPlan) decides how many layers to cut
//! - a [`Rasterizer`](crate::raster::Rasterizer) produces one
//!   [`Raster`](crate::raster::Raster) per layer
//! - the [`rle`] codec compresses each raster independently
//! - [`PhotonFile`](crate::container::PhotonFile) stores the result behind a
//!   patchable header
//!
//! The [`slice`] module strings these together.  Here's the whole thing, using
//! the bundled scanline rasterizer and default settings:
//!
//! ```no_run
//! use photon_slicer::{
//!     container::PhotonFile,
//!     mesh::{LoadSettings, Mesh},
//!     raster::{RasterSize, ScanlineRasterizer},
//!     slice::{self, SliceSettings},
//! };
//!
//! let settings = SliceSettings::default();
//! let mesh = Mesh::open("model.stl", &LoadSettings::default())?;
//! let rasterizer = ScanlineRasterizer::new(
//!     &mesh,
//!     RasterSize::PHOTON,
//!     ScanlineRasterizer::PHOTON_PIXEL_MM,
//! )?;
//! let file = slice::to_container(
//!     &mesh,
//!     &rasterizer,
//!     &settings,
//!     PhotonFile::default(),
//! )?;
//! file.write("model.photon")?;
//! # Ok::<(), photon_slicer::Error>(())
//! ```
//!
//! Layers are independent of each other, so rasterization and encoding run
//! in parallel on a [`rayon`] pool; see
//! [`ThreadCount`](crate::slice::ThreadCount).
//!
//! # Feature flags
#![doc = document_features::document_features!()]
#![warn(missing_docs)]

mod error;
pub use error::Error;

pub mod container;
pub mod mesh;
pub mod plan;
pub mod raster;
pub mod rle;
pub mod slice;
pub mod volume;
