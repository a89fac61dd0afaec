//! Photon (`.photon`) printer container
//!
//! A Photon file is a fixed-size [`Header`] followed by blocks which it
//! addresses by absolute offset:
//!
//! ```text
//! +--------------------+ 0
//! | header (108 bytes) |
//! +--------------------+ large_preview_offset
//! | large preview      |   32-byte record + image data
//! +--------------------+ small_preview_offset
//! | small preview      |   32-byte record + image data
//! +--------------------+ print_params_offset (version 2 only)
//! | print parameters   |
//! +--------------------+ layer_defs_offset
//! | layer definitions  |   36 bytes per layer
//! +--------------------+
//! | layer data         |   one run-length encoded bitmap per layer
//! +--------------------+
//! ```
//!
//! Files are loaded from a template, patched, and written back out; whenever
//! the layer stack changes, every offset is recomputed.
//!
//! ```
//! use photon_slicer::container::{HeaderField, PhotonFile};
//!
//! let mut file = PhotonFile::default();
//! file.set_header_field("exposure_s", 6.0f32.into())?;
//! file.replace_layers(vec![vec![0x80 | 3], vec![0x03]]);
//! assert_eq!(file.get(HeaderField::LayerCount)?, 2u32.into());
//!
//! let mut bytes = vec![];
//! file.write_to(&mut bytes)?;
//! let loaded = PhotonFile::load(bytes.as_slice())?;
//! assert_eq!(loaded.layers()[1].data(), &[0x03]);
//! # Ok::<(), photon_slicer::Error>(())
//! ```
use crate::Error;
use log::{debug, warn};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

mod header;
pub use header::{FieldKind, FieldSpec, FieldValue, HEADER_LEN, Header, HeaderField};

/// Magic number at the start of every Photon file
pub const MAGIC: u32 = 0x12FD_0019;

/// Size of a preview record, without its image data
const PREVIEW_LEN: usize = 32;

/// Size of one layer definition
const LAYER_DEF_LEN: usize = 36;

/// Preview thumbnail
///
/// Image data is carried through as-is; the slicer doesn't render previews.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preview {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Encoded image data
    pub data: Vec<u8>,
    reserved: [u8; 16],
}

/// Per-layer metadata and bitmap
#[derive(Clone, Debug, PartialEq)]
pub struct LayerDef {
    /// Height of the layer above the build plate
    pub z_mm: f32,
    /// Exposure time for this layer
    pub exposure_s: f32,
    /// Light-off time after this layer
    pub off_time_s: f32,
    data: Vec<u8>,
    reserved: [u8; 16],
}

impl LayerDef {
    /// Run-length encoded bitmap
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// In-memory Photon file
#[derive(Clone, Debug, PartialEq)]
pub struct PhotonFile {
    header: Header,
    large_preview: Preview,
    small_preview: Preview,
    print_params: Option<Vec<u8>>,
    layers: Vec<LayerDef>,
}

impl Default for PhotonFile {
    /// Builds the bundled template: an Anycubic Photon with empty previews,
    /// no layers, and default print parameters
    fn default() -> Self {
        use HeaderField::*;
        let mut header = Header::zeroed();
        header.set_u32(Magic, MAGIC);
        header.set_u32(Version, 1);
        header.set_f32(BedXMm, 68.04);
        header.set_f32(BedYMm, 120.96);
        header.set_f32(BedZMm, 150.0);
        header.set_f32(LayerHeightMm, 0.05);
        header.set_f32(ExposureS, 8.0);
        header.set_f32(BottomExposureS, 90.0);
        header.set_f32(OffTimeS, 6.5);
        header.set_u32(BottomLayers, 8);
        header.set_u32(ResolutionX, 1440);
        header.set_u32(ResolutionY, 2560);
        header.set_u32(ProjectorType, 1);

        let mut out = Self {
            header,
            large_preview: Preview::default(),
            small_preview: Preview::default(),
            print_params: None,
            layers: vec![],
        };
        out.relayout();
        out
    }
}

impl PhotonFile {
    /// Opens and parses a Photon file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::load(std::fs::File::open(path)?)
    }

    /// Parses a Photon file from the given input
    pub fn load<R: Read>(mut input: R) -> Result<Self, Error> {
        let mut data = vec![];
        input.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Parses a Photon file from a byte buffer
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        use HeaderField::*;

        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(block(data, 0, HEADER_LEN, "header")?);
        let header = Header::from_bytes(raw);

        let magic = header.u32(Magic);
        if magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let version = header.u32(Version);
        if !(1..=2).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        // Version 1 files leave the tail of the header as padding
        let print_params = if version >= 2 {
            let aa = header.u32(AntiAliasLevel);
            if aa > 1 {
                return Err(Error::UnsupportedAntiAlias(aa));
            }
            match header.u32(PrintParamsOffset) as usize {
                0 => None,
                offset => {
                    let size = header.u32(PrintParamsSize) as usize;
                    Some(block(data, offset, size, "print parameters")?.to_vec())
                }
            }
        } else {
            None
        };

        let large_preview =
            read_preview(data, header.u32(LargePreviewOffset) as usize)?;
        let small_preview =
            read_preview(data, header.u32(SmallPreviewOffset) as usize)?;

        let count = header.u32(LayerCount) as usize;
        let defs_offset = header.u32(LayerDefsOffset) as usize;
        let defs_len = count
            .checked_mul(LAYER_DEF_LEN)
            .ok_or(Error::TruncatedContainer("layer table", defs_offset))?;
        let defs = block(data, defs_offset, defs_len, "layer table")?;
        let layers = defs
            .chunks_exact(LAYER_DEF_LEN)
            .map(|d| read_layer(data, d))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("loaded version {version} container with {count} layers");

        Ok(Self {
            header,
            large_preview,
            small_preview,
            print_params,
            layers,
        })
    }

    /// Returns the header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Reads a header field by name
    pub fn header_field(&self, name: &str) -> Result<FieldValue, Error> {
        self.get(parse_field(name)?)
    }

    /// Overwrites a header field by name
    ///
    /// Fails if the name isn't part of the header schema, or if the value
    /// can't be encoded into the field.
    pub fn set_header_field(
        &mut self,
        name: &str,
        value: FieldValue,
    ) -> Result<(), Error> {
        self.set(parse_field(name)?, value)
    }

    /// Reads a header field
    pub fn get(&self, field: HeaderField) -> Result<FieldValue, Error> {
        self.header.get(field)
    }

    /// Overwrites a header field
    ///
    /// Layout fields (see [`HeaderField::is_layout`]) are recomputed when the
    /// layers are replaced or the file is written.
    pub fn set(
        &mut self,
        field: HeaderField,
        value: FieldValue,
    ) -> Result<(), Error> {
        if field.is_layout() {
            warn!("{field} is recomputed on write; the new value won't stick");
        }
        self.header.set(field, value)
    }

    /// Returns the layer stack
    pub fn layers(&self) -> &[LayerDef] {
        &self.layers
    }

    /// Returns the number of layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns the large preview
    pub fn large_preview(&self) -> &Preview {
        &self.large_preview
    }

    /// Returns the small preview
    pub fn small_preview(&self) -> &Preview {
        &self.small_preview
    }

    /// Replaces every layer with the given encoded bitmaps, in order
    ///
    /// Each layer's metadata is derived from the current header: layer `i`
    /// sits at `i * layer_height_mm`, uses the bottom exposure for the first
    /// `bottom_layers` layers and the normal exposure afterwards, and the
    /// header's light-off time.  Set those fields first.
    pub fn replace_layers<I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        use HeaderField::*;
        let layer_height = self.header.f32(LayerHeightMm);
        let exposure = self.header.f32(ExposureS);
        let bottom_exposure = self.header.f32(BottomExposureS);
        let bottom_layers = self.header.u32(BottomLayers) as usize;
        let off_time = self.header.f32(OffTimeS);

        self.layers = blocks
            .into_iter()
            .enumerate()
            .map(|(i, data)| LayerDef {
                z_mm: i as f32 * layer_height,
                exposure_s: if i < bottom_layers {
                    bottom_exposure
                } else {
                    exposure
                },
                off_time_s: off_time,
                data,
                reserved: [0; 16],
            })
            .collect();
        self.relayout();
    }

    /// Recomputes every offset and length in the header
    fn relayout(&mut self) {
        let mut header = self.header.clone();
        self.layout_into(&mut header);
        self.header = header;
    }

    /// Writes offsets for the canonical block order into `header`, returning
    /// the offset of the first layer's data
    fn layout_into(&self, header: &mut Header) -> usize {
        use HeaderField::*;
        let mut pos = HEADER_LEN;
        header.set_u32(LargePreviewOffset, pos as u32);
        pos += PREVIEW_LEN + self.large_preview.data.len();
        header.set_u32(SmallPreviewOffset, pos as u32);
        pos += PREVIEW_LEN + self.small_preview.data.len();
        match &self.print_params {
            Some(p) => {
                header.set_u32(PrintParamsOffset, pos as u32);
                header.set_u32(PrintParamsSize, p.len() as u32);
                pos += p.len();
            }
            None if header.u32(Version) >= 2 => {
                header.set_u32(PrintParamsOffset, 0);
                header.set_u32(PrintParamsSize, 0);
            }
            // Version 1 keeps these bytes as untouched padding
            None => (),
        }
        header.set_u32(LayerDefsOffset, pos as u32);
        header.set_u32(LayerCount, self.layers.len() as u32);
        pos + LAYER_DEF_LEN * self.layers.len()
    }

    /// Serializes the file to the given output
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        self.serialize(out)?;
        Ok(())
    }

    fn serialize<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut header = self.header.clone();
        let mut data_pos = self.layout_into(&mut header);
        out.write_all(header.as_bytes())?;

        let mut pos = HEADER_LEN;
        for p in [&self.large_preview, &self.small_preview] {
            let data_offset = pos + PREVIEW_LEN;
            out.write_all(&p.width.to_le_bytes())?;
            out.write_all(&p.height.to_le_bytes())?;
            out.write_all(&(data_offset as u32).to_le_bytes())?;
            out.write_all(&(p.data.len() as u32).to_le_bytes())?;
            out.write_all(&p.reserved)?;
            out.write_all(&p.data)?;
            pos = data_offset + p.data.len();
        }
        if let Some(p) = &self.print_params {
            out.write_all(p)?;
        }

        for layer in &self.layers {
            out.write_all(&layer.z_mm.to_le_bytes())?;
            out.write_all(&layer.exposure_s.to_le_bytes())?;
            out.write_all(&layer.off_time_s.to_le_bytes())?;
            out.write_all(&(data_pos as u32).to_le_bytes())?;
            out.write_all(&(layer.data.len() as u32).to_le_bytes())?;
            out.write_all(&layer.reserved)?;
            data_pos += layer.data.len();
        }
        for layer in &self.layers {
            out.write_all(&layer.data)?;
        }
        out.flush()
    }

    /// Writes the file to the given path
    ///
    /// Data is written to a temporary file next to `path`, synced, and then
    /// renamed into place, so a failed write never leaves a partial file at
    /// `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let tmp = temp_path(path);
        let r = self
            .write_synced(&tmp)
            .and_then(|()| std::fs::rename(&tmp, path));
        if let Err(source) = r {
            if tmp.exists() {
                if let Err(e) = std::fs::remove_file(&tmp) {
                    warn!("could not remove temporary file {tmp:?}: {e}");
                }
            }
            return Err(Error::Write {
                path: path.to_owned(),
                source,
            });
        }
        Ok(())
    }

    fn write_synced(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(std::fs::File::create(path)?);
        self.serialize(&mut out)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

fn parse_field(name: &str) -> Result<HeaderField, Error> {
    name.parse()
        .map_err(|_| Error::UnknownField(name.to_owned()))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photon".to_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Returns `data[offset..offset + len]`, or an error if that's out of range
fn block<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], Error> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::TruncatedContainer(what, offset))
}

#[inline]
fn u32_at(b: &[u8], i: usize) -> u32 {
    u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]])
}

#[inline]
fn f32_at(b: &[u8], i: usize) -> f32 {
    f32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]])
}

fn read_preview(data: &[u8], offset: usize) -> Result<Preview, Error> {
    let rec = block(data, offset, PREVIEW_LEN, "preview")?;
    let data_offset = u32_at(rec, 8) as usize;
    let data_len = u32_at(rec, 12) as usize;
    let mut reserved = [0u8; 16];
    reserved.copy_from_slice(&rec[16..32]);
    Ok(Preview {
        width: u32_at(rec, 0),
        height: u32_at(rec, 4),
        data: block(data, data_offset, data_len, "preview image")?.to_vec(),
        reserved,
    })
}

fn read_layer(data: &[u8], def: &[u8]) -> Result<LayerDef, Error> {
    let data_offset = u32_at(def, 12) as usize;
    let data_len = u32_at(def, 16) as usize;
    let mut reserved = [0u8; 16];
    reserved.copy_from_slice(&def[20..36]);
    Ok(LayerDef {
        z_mm: f32_at(def, 0),
        exposure_s: f32_at(def, 4),
        off_time_s: f32_at(def, 8),
        data: block(data, data_offset, data_len, "layer data")?.to_vec(),
        reserved,
    })
}
