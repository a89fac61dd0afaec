//! Slicing pipeline
//!
//! [`to_container`] runs the whole pipeline: the mesh is checked against the
//! build volume, layers are planned, then every layer is rasterized and
//! run-length encoded before the results are stored in a [`PhotonFile`].
//! Nothing is rasterized until validation has passed.
//!
//! Layers are independent, so the per-layer loop runs on a [`rayon`] pool
//! sized by [`ThreadCount`]; results are always collected in layer order.
use crate::{
    Error,
    container::{HeaderField, PhotonFile},
    mesh::{Bounds, LoadSettings, Mesh},
    plan::LayerPlan,
    raster::{Raster, Rasterizer},
    rle,
    volume::BuildVolume,
};
use log::{debug, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Number of threads to use while slicing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Rasterize and encode every layer on the calling thread
    One,

    /// Slice on a pool of this many workers, built for each run
    ///
    /// `Many(1)` still moves the work off the calling thread; converting a
    /// `NonZeroUsize` of 1 gives [`ThreadCount::One`] instead.
    Many(std::num::NonZeroUsize),
}

impl From<std::num::NonZeroUsize> for ThreadCount {
    fn from(v: std::num::NonZeroUsize) -> Self {
        match v.get() {
            0 => unreachable!(),
            1 => ThreadCount::One,
            _ => ThreadCount::Many(v),
        }
    }
}

/// Shown as `-` when slicing on the calling thread
impl std::fmt::Display for ThreadCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadCount::One => write!(f, "-"),
            ThreadCount::Many(n) => write!(f, "{n}"),
        }
    }
}

impl ThreadCount {
    /// Gets the thread count
    ///
    /// Returns `None` if we are required to be single-threaded
    pub fn get(&self) -> Option<usize> {
        match self {
            ThreadCount::One => None,
            ThreadCount::Many(v) => Some(v.get()),
        }
    }
}

/// Uses every available core, falling back to single-threaded mode
impl Default for ThreadCount {
    fn default() -> Self {
        std::thread::available_parallelism()
            .map(Self::from)
            .unwrap_or(Self::One)
    }
}

/// Print and slicing parameters
#[derive(Copy, Clone, Debug)]
pub struct SliceSettings {
    /// Uniform scale applied to the mesh when it is loaded
    pub scale: f32,

    /// Thickness of each layer, in millimeters
    pub layer_height_mm: f32,

    /// Exposure time for normal layers, in seconds
    pub exposure_s: f32,

    /// Exposure time for bottom layers, in seconds
    pub bottom_exposure_s: f32,

    /// Number of layers which use the bottom exposure
    pub bottom_layers: u32,

    /// Light-off time between layers, in seconds
    pub off_time_s: f32,

    /// Printable envelope
    pub volume: BuildVolume,

    /// Worker threads for the per-layer loop
    pub threads: ThreadCount,
}

impl Default for SliceSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            layer_height_mm: 0.05,
            exposure_s: 8.0,
            bottom_exposure_s: 90.0,
            bottom_layers: 8,
            off_time_s: 6.5,
            volume: BuildVolume::default(),
            threads: ThreadCount::default(),
        }
    }
}

impl SliceSettings {
    /// Returns settings for loading a mesh at this scale
    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            scale: self.scale,
            ..LoadSettings::default()
        }
    }

    /// Checks that timings are usable
    ///
    /// Scale and layer height are checked where they are used.
    fn check(&self) -> Result<(), Error> {
        for t in [self.exposure_s, self.bottom_exposure_s, self.off_time_s] {
            if !(t.is_finite() && t >= 0.0) {
                return Err(Error::Configuration(
                    "exposure and off times must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// Where slices end up
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
    /// One grayscale image per layer, in the given directory
    Images(PathBuf),
    /// A single Photon file at the given path
    Container(PathBuf),
}

impl OutputTarget {
    /// Picks an output target from a pair of optional paths
    ///
    /// Exactly one of the two must be provided.
    pub fn from_options(
        image_dir: Option<PathBuf>,
        container: Option<PathBuf>,
    ) -> Result<Self, Error> {
        match (image_dir, container) {
            (Some(dir), None) => Ok(Self::Images(dir)),
            (None, Some(path)) => Ok(Self::Container(path)),
            (None, None) => Err(Error::Configuration(
                "no output given; pick an image directory or a container path",
            )),
            (Some(_), Some(_)) => Err(Error::Configuration(
                "both an image directory and a container path were given",
            )),
        }
    }
}

/// Returns the file name used for layer `i` in image output mode
pub fn layer_file_name(i: usize) -> String {
    format!("{i:04}.png")
}

/// Creates the directory used for image output, along with its parents
///
/// Failures are reported as [`Error::Write`] against `dir`.
pub fn create_image_dir(dir: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(dir).map_err(|source| Error::Write {
        path: dir.to_owned(),
        source,
    })
}

/// Validates the mesh and plans its layers
///
/// Bounds are converted into millimeters using the rasterizer's units before
/// being checked against the build volume.
pub fn plan<R: Rasterizer + ?Sized>(
    mesh: &Mesh,
    rasterizer: &R,
    settings: &SliceSettings,
) -> Result<LayerPlan, Error> {
    settings.check()?;
    let units = rasterizer.units_per_mm();
    if !(units.is_finite() && units > 0.0) {
        return Err(Error::BadUnits(units));
    }
    let bounds = mesh.bounds();
    let mm = Bounds {
        min: bounds.min / units,
        max: bounds.max / units,
    };
    settings.volume.validate(&mm)?;

    let plan = LayerPlan::new(&bounds, settings.layer_height_mm, units)?;
    let size = mm.extent();
    info!(
        "model is {:.2} x {:.2} x {:.2} mm; {} layers at {} mm",
        size.x,
        size.y,
        size.z,
        plan.count(),
        plan.layer_height_mm()
    );
    Ok(plan)
}

/// Runs `f` on every layer in the plan, returning results in layer order
fn run<T, F>(
    plan: &LayerPlan,
    threads: ThreadCount,
    f: F,
) -> Result<Vec<T>, Error>
where
    T: Send,
    F: Fn(usize, f32) -> T + Sync,
{
    match threads.get() {
        None => Ok(plan.iter().map(|(i, frac)| f(i, frac)).collect()),
        Some(n) => {
            let pool =
                rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            Ok(pool.install(|| {
                (0..plan.count())
                    .into_par_iter()
                    .map(|i| f(i, plan.fraction(i)))
                    .collect()
            }))
        }
    }
}

/// Rasterizes and encodes every layer in the plan
///
/// The returned blocks are in layer order, regardless of thread count.
pub fn encode_layers<R: Rasterizer + ?Sized>(
    plan: &LayerPlan,
    rasterizer: &R,
    threads: ThreadCount,
) -> Result<Vec<Vec<u8>>, Error> {
    run(plan, threads, |i, frac| {
        let raster = rasterizer.rasterize_at(frac);
        let data = rle::encode(raster.pixels());
        debug!(
            "layer {i}: {} solid pixels in {} bytes",
            raster.solid_count(),
            data.len()
        );
        data
    })
}

/// Rasterizes every layer in the plan, handing each raster to `sink`
///
/// `sink` may be called from several threads at once and in any order; the
/// first error it returns (by layer index) is propagated.
pub fn for_each_layer<R, F>(
    plan: &LayerPlan,
    rasterizer: &R,
    threads: ThreadCount,
    sink: F,
) -> Result<(), Error>
where
    R: Rasterizer + ?Sized,
    F: Fn(usize, Raster) -> Result<(), Error> + Sync,
{
    run(plan, threads, |i, frac| sink(i, rasterizer.rasterize_at(frac)))?
        .into_iter()
        .collect()
}

/// Slices a mesh into a Photon file
///
/// `template` supplies every header field which isn't owned by the slicer.
/// Layer height, exposure times, bottom layer count and off time are taken
/// from `settings`, the panel resolution from `rasterizer`, and the layer
/// stack is replaced entirely.
pub fn to_container<R: Rasterizer + ?Sized>(
    mesh: &Mesh,
    rasterizer: &R,
    settings: &SliceSettings,
    mut template: PhotonFile,
) -> Result<PhotonFile, Error> {
    let plan = plan(mesh, rasterizer, settings)?;

    template.set(HeaderField::LayerHeightMm, settings.layer_height_mm.into())?;
    template.set(HeaderField::ExposureS, settings.exposure_s.into())?;
    template
        .set(HeaderField::BottomExposureS, settings.bottom_exposure_s.into())?;
    template.set(HeaderField::BottomLayers, settings.bottom_layers.into())?;
    template.set(HeaderField::OffTimeS, settings.off_time_s.into())?;

    // Decoded layers must match the resolution the header advertises
    let size = rasterizer.size();
    let resolution = (
        template.get(HeaderField::ResolutionX)?,
        template.get(HeaderField::ResolutionY)?,
    );
    if resolution != (size.width.into(), size.height.into()) {
        info!(
            "template resolution {} x {} replaced by {} x {}",
            resolution.0, resolution.1, size.width, size.height
        );
    }
    template.set(HeaderField::ResolutionX, size.width.into())?;
    template.set(HeaderField::ResolutionY, size.height.into())?;

    let start = std::time::Instant::now();
    let layers = encode_layers(&plan, rasterizer, settings.threads)?;
    let bytes: usize = layers.iter().map(Vec::len).sum();
    info!(
        "encoded {} layers into {bytes} bytes in {:?} (threads: {})",
        layers.len(),
        start.elapsed(),
        settings.threads
    );
    template.replace_layers(layers);
    Ok(template)
}
