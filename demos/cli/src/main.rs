use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use strum::IntoEnumIterator;

use photon_slicer::{
    container::{HeaderField, PhotonFile},
    mesh::{AxisOrder, LoadSettings, Mesh},
    raster::{Raster, RasterSize, ScanlineRasterizer},
    rle,
    slice::{self, OutputTarget, SliceSettings, ThreadCount},
    volume::BuildVolume,
};

/// Resin printer slicer
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Slice a binary STL into layer images or a Photon file
    Slice {
        #[clap(flatten)]
        settings: SliceArgs,
    },

    /// Print the header and layer table of a Photon file
    Info {
        /// Photon file to inspect
        #[clap(short, long)]
        input: PathBuf,

        /// Print every layer, not just a summary
        #[clap(short, long)]
        all: bool,
    },
}

#[derive(Parser)]
struct SliceArgs {
    /// Binary STL file to slice
    #[clap(short, long)]
    input: PathBuf,

    /// Uniform scale applied to the model
    #[clap(short, long, default_value_t = 1.0)]
    scale: f32,

    /// Axis order of the input file, e.g. `xzy` to swap Y and Z
    #[clap(long, default_value_t = AxisOrder::IDENTITY)]
    axes: AxisOrder,

    /// Layer height, in millimeters
    #[clap(short, long, default_value_t = 0.05)]
    layer_height: f32,

    /// Exposure time for normal layers, in seconds
    #[clap(long, default_value_t = 8.0)]
    exposure: f32,

    /// Exposure time for bottom layers, in seconds
    #[clap(long, default_value_t = 90.0)]
    bottom_exposure: f32,

    /// Number of bottom layers
    #[clap(long, default_value_t = 8)]
    bottom_layers: u32,

    /// Light-off time between layers, in seconds
    #[clap(long, default_value_t = 6.5)]
    off_time: f32,

    /// Number of threads to use
    #[clap(short, long)]
    threads: Option<NonZeroUsize>,

    /// Photon file used as a template for the output
    #[clap(long)]
    template: Option<PathBuf>,

    /// Directory in which to write one `.png` per layer
    #[clap(short, long)]
    out_dir: Option<PathBuf>,

    /// Name of a `.photon` file to write
    #[clap(short, long)]
    photon: Option<PathBuf>,
}

impl SliceArgs {
    fn slice_settings(&self) -> SliceSettings {
        SliceSettings {
            scale: self.scale,
            layer_height_mm: self.layer_height,
            exposure_s: self.exposure,
            bottom_exposure_s: self.bottom_exposure,
            bottom_layers: self.bottom_layers,
            off_time_s: self.off_time,
            volume: BuildVolume::default(),
            threads: self.threads.map(ThreadCount::from).unwrap_or_default(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

fn save_png(path: &Path, raster: &Raster) -> Result<(), photon_slicer::Error> {
    let size = raster.size();
    image::save_buffer(
        path,
        raster.pixels(),
        size.width,
        size.height,
        image::ColorType::L8,
    )
    .map_err(|e| photon_slicer::Error::Write {
        path: path.to_owned(),
        source: match e {
            image::ImageError::IoError(e) => e,
            e => std::io::Error::other(e),
        },
    })
}

fn run_slice(args: SliceArgs) -> Result<()> {
    // Pick an output before doing any work
    let target =
        OutputTarget::from_options(args.out_dir.clone(), args.photon.clone())?;
    let settings = args.slice_settings();
    let template = match &args.template {
        Some(path) => PhotonFile::open(path)
            .with_context(|| format!("failed to load template {path:?}"))?,
        None => PhotonFile::default(),
    };

    let start = Instant::now();
    let load = LoadSettings {
        axes: args.axes,
        ..settings.load_settings()
    };
    let mesh = Mesh::open(&args.input, &load)
        .with_context(|| format!("failed to load {:?}", args.input))?;
    info!(
        "Loaded {} triangles in {:?}",
        mesh.triangle_count(),
        start.elapsed()
    );

    let rasterizer = ScanlineRasterizer::new(
        &mesh,
        RasterSize::PHOTON,
        ScanlineRasterizer::PHOTON_PIXEL_MM,
    )?;

    let start = Instant::now();
    match target {
        OutputTarget::Images(dir) => {
            let plan = slice::plan(&mesh, &rasterizer, &settings)?;
            slice::create_image_dir(&dir)?;
            slice::for_each_layer(&plan, &rasterizer, settings.threads, |i, r| {
                save_png(&dir.join(slice::layer_file_name(i)), &r)
            })?;
            info!(
                "Wrote {} images to {dir:?} in {:?}",
                plan.count(),
                start.elapsed()
            );
        }
        OutputTarget::Container(path) => {
            let file =
                slice::to_container(&mesh, &rasterizer, &settings, template)?;
            info!("Sliced in {:?}", start.elapsed());
            info!("Writing {} layers to {path:?}", file.layer_count());
            file.write(&path)?;
        }
    }
    Ok(())
}

fn run_info(input: &Path, all: bool) -> Result<()> {
    let file = PhotonFile::open(input)
        .with_context(|| format!("failed to load {input:?}"))?;

    for f in HeaderField::iter() {
        match file.get(f) {
            Ok(v) => println!("{:<22} {v}", f.name()),
            Err(_) => {
                println!("{:<22} {:02x?}", f.name(), file.header().raw(f))
            }
        }
    }
    for (name, p) in [
        ("large preview", file.large_preview()),
        ("small preview", file.small_preview()),
    ] {
        println!(
            "{name:<22} {}x{} ({} bytes)",
            p.width,
            p.height,
            p.data.len()
        );
    }

    let layers = file.layers();
    let bytes: usize = layers.iter().map(|l| l.data().len()).sum();
    println!("\n{} layers, {bytes} bytes of layer data", layers.len());
    if let (Some(first), Some(last)) = (layers.first(), layers.last()) {
        println!("z range: {} .. {} mm", first.z_mm, last.z_mm);
    }
    if all {
        println!(
            "{:>6} {:>10} {:>10} {:>10} {:>8} {:>10}",
            "layer", "z (mm)", "exposure", "off time", "bytes", "solid px"
        );
        for (i, l) in layers.iter().enumerate() {
            println!(
                "{i:>6} {:>10.4} {:>10} {:>10} {:>8} {:>10}",
                l.z_mm,
                l.exposure_s,
                l.off_time_s,
                l.data().len(),
                rle::solid_count(l.data())
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Slice { settings } => run_slice(settings),
        Command::Info { input, all } => run_info(&input, all),
    }
}
