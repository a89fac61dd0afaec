//! Run-length codec for 1-bit layer bitmaps
//!
//! Each encoded byte stores one run: the top bit is the pixel class (1 for
//! solid, 0 for void) and the low seven bits are the run length, from 1 to
//! [`MAX_RUN`].  Longer runs are split across several bytes.
//!
//! Slice masks are mostly long uniform runs, so a full 1440 × 2560 layer
//! typically compresses to a few kilobytes:
//!
//! ```
//! use photon_slicer::rle;
//!
//! let mut pixels = vec![255u8; 100];
//! pixels.extend([0u8; 50]);
//! let encoded = rle::encode(&pixels);
//! assert_eq!(encoded, [0x80 | 100, 50]);
//! assert_eq!(rle::decode(&encoded), pixels);
//! ```
//!
//! The codec only keeps the solid / void distinction; decoding yields `0xFF`
//! for solid pixels and `0x00` for void ones, so it round-trips binary masks
//! exactly.

/// Longest run stored in a single byte
pub const MAX_RUN: usize = 0x7D;

/// Value of a decoded solid pixel
pub const SOLID: u8 = u8::MAX;

/// Value of a decoded void pixel
pub const VOID: u8 = 0;

const CLASS_BIT: u8 = 0x80;
const RUN_MASK: u8 = 0x7F;

#[inline]
fn run_byte(solid: bool, len: usize) -> u8 {
    debug_assert!((1..=MAX_RUN).contains(&len));
    (u8::from(solid) << 7) | len as u8
}

/// Encodes a row-major pixel stream
///
/// Any non-zero pixel is solid.  Empty input produces empty output.
pub fn encode(pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = pixels.iter().map(|p| *p != 0);
    let Some(mut class) = iter.next() else {
        return out;
    };
    let mut len = 1;
    for p in iter {
        if p == class && len < MAX_RUN {
            len += 1;
        } else {
            out.push(run_byte(class, len));
            class = p;
            len = 1;
        }
    }
    out.push(run_byte(class, len));
    out
}

/// Decodes a run-length stream into `0x00` / `0xFF` pixels
///
/// Bytes with a zero run length expand to nothing.
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(decoded_len(data));
    for b in data {
        let px = if b & CLASS_BIT != 0 { SOLID } else { VOID };
        out.extend(std::iter::repeat_n(px, usize::from(b & RUN_MASK)));
    }
    out
}

/// Returns the number of pixels in an encoded stream
pub fn decoded_len(data: &[u8]) -> usize {
    data.iter().map(|b| usize::from(b & RUN_MASK)).sum()
}

/// Returns the number of solid pixels in an encoded stream
pub fn solid_count(data: &[u8]) -> usize {
    data.iter()
        .filter(|b| *b & CLASS_BIT != 0)
        .map(|b| usize::from(b & RUN_MASK))
        .sum()
}
