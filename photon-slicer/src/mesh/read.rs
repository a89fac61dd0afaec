//! Binary STL parser
use super::{LoadSettings, Mesh};
use crate::Error;
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use std::io::{ErrorKind, Read};

/// Size of the header and triangle count
const PREAMBLE_LEN: usize = 84;

/// Normal and three vertices
const TRIANGLE_LEN: usize = 4 * 12;

/// Triangle plus its 2-byte attribute
const RECORD_LEN: usize = TRIANGLE_LEN + 2;

/// Don't trust the declared triangle count further than this when reserving
const MAX_RESERVE: u32 = 1 << 20;

impl Mesh {
    /// Reads a binary STL from the given input
    ///
    /// Reading stops after the declared number of triangles, or earlier if the
    /// stream ends cleanly between two records; in the latter case, the
    /// triangles read so far are kept.  A stream which ends partway through a
    /// triangle is an error.
    pub fn read_stl<R: Read>(
        mut input: R,
        settings: &LoadSettings,
    ) -> Result<Self, Error> {
        settings.check()?;

        let mut preamble = [0u8; PREAMBLE_LEN];
        let n = read_full(&mut input, &mut preamble)?;
        if n < PREAMBLE_LEN {
            return Err(Error::TruncatedMeshHeader(n));
        }
        let declared = u32::from_le_bytes([
            preamble[80],
            preamble[81],
            preamble[82],
            preamble[83],
        ]);
        debug!("STL declares {declared} triangles");

        let reserve = declared.min(MAX_RESERVE) as usize;
        let mut points = Vec::with_capacity(reserve * 3);
        let mut normals = Vec::with_capacity(reserve);

        let mut record = [0u8; RECORD_LEN];
        let mut index = 0;
        while index < declared as usize {
            match read_full(&mut input, &mut record)? {
                0 => {
                    warn!(
                        "STL ended after {index} of {declared} triangles; \
                         using the triangles read so far"
                    );
                    break;
                }
                // The trailing attribute isn't needed, so a final record
                // missing it is still a whole triangle
                TRIANGLE_LEN..=RECORD_LEN => (),
                got => return Err(Error::TruncatedTriangle { index, got }),
            }

            let n = settings.axes.apply(read_vec3(&record[0..12]));
            if n.iter().any(|c| !c.is_finite()) {
                return Err(Error::NonFiniteVertex(index));
            }
            normals.push(Vector3::from(n));
            for chunk in record[12..TRIANGLE_LEN].chunks_exact(12) {
                let v = settings.axes.apply(read_vec3(chunk));
                if v.iter().any(|c| !c.is_finite()) {
                    return Err(Error::NonFiniteVertex(index));
                }
                points.push(Point3::from(v) * settings.scale);
            }
            index += 1;
        }

        Mesh::new(points, normals)
    }
}

#[inline]
fn read_vec3(b: &[u8]) -> [f32; 3] {
    let f = |i: usize| f32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
    [f(0), f(4), f(8)]
}

/// Reads until `buf` is full or the input is exhausted
///
/// Returns the number of bytes read, which is only less than `buf.len()` at
/// the end of the stream.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match input.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}
