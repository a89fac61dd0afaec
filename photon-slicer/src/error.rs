//! Module containing the universal error type
use thiserror::Error;

/// Universal error type for the slicer
#[derive(Error, Debug)]
pub enum Error {
    /// The STL preamble (80-byte header and triangle count) is incomplete
    #[error("mesh header is truncated ({0} of 84 bytes)")]
    TruncatedMeshHeader(usize),

    /// A triangle record ended in the middle of a 12-byte block
    #[error("triangle {index} is truncated ({got} of 48 bytes)")]
    TruncatedTriangle {
        /// Index of the incomplete triangle
        index: usize,
        /// Number of bytes read before the stream ended
        got: usize,
    },

    /// A vertex or normal contains a NaN or infinite coordinate
    #[error("triangle {0} has a non-finite coordinate")]
    NonFiniteVertex(usize),

    /// The mesh contains no triangles, so it has no bounds
    #[error("mesh contains no triangles")]
    EmptyMesh,

    /// The model does not fit on the build plate
    #[error(
        "model is too big ({x:.1} x {y:.1} mm) for build area \
         ({width} x {depth} mm); try another orientation, a smaller scale, \
         or cutting up the model"
    )]
    OutOfBuildVolume {
        /// Model extent along X, in millimeters
        x: f32,
        /// Model extent along Y, in millimeters
        y: f32,
        /// Width limit (X), in millimeters
        width: f32,
        /// Depth limit (Y), in millimeters
        depth: f32,
    },

    /// Header field name is not part of the container format
    #[error("unknown header field `{0}`")]
    UnknownField(String),

    /// Value can't be stored in the given header field
    #[error("can't encode value into header field `{field}`: {reason}")]
    FieldEncoding {
        /// Name of the field
        field: &'static str,
        /// Description of the mismatch
        reason: String,
    },

    /// Container does not begin with the Photon magic number
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    /// Container version is not supported
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),

    /// Container stores more than one bitmap per layer
    #[error("unsupported anti-alias level {0}")]
    UnsupportedAntiAlias(u32),

    /// A block or offset points outside of the container data
    #[error("container is truncated: {0} at offset {1} runs past the end")]
    TruncatedContainer(&'static str, usize),

    /// Invalid combination of settings
    #[error("configuration error: {0}")]
    Configuration(&'static str),

    /// Scale must be finite and positive
    #[error("scale must be finite and positive, not {0}")]
    BadScale(f32),

    /// Layer height must be finite and positive
    #[error("layer height must be finite and positive, not {0}")]
    BadLayerHeight(f32),

    /// Unit conversion factor must be finite and positive
    #[error("units per millimeter must be finite and positive, not {0}")]
    BadUnits(f32),

    /// Axis order must be a permutation of `[0, 1, 2]`
    #[error("axis order {0:?} is not a permutation of [0, 1, 2]")]
    BadAxisOrder([usize; 3]),

    /// Failed to write an output file
    #[error("failed to write {path:?}: {source}")]
    Write {
        /// Destination path
        path: std::path::PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO error; see inner code for details
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Could not build a worker thread pool
    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
