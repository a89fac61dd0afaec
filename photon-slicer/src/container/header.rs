//! Fixed-layout header schema
use crate::Error;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Size of the header record, in bytes
pub const HEADER_LEN: usize = 108;

/// Physical encoding of a header field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Little-endian `f32`
    F32,
    /// Little-endian `u32`
    U32,
    /// Little-endian `u16`
    U16,
    /// Opaque bytes, preserved but never interpreted
    Bytes,
}

/// Position and encoding of a header field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Byte offset from the start of the file
    pub offset: usize,
    /// Width in bytes
    pub width: usize,
    /// Physical encoding
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn new(offset: usize, kind: FieldKind) -> Self {
        let width = match kind {
            FieldKind::F32 | FieldKind::U32 => 4,
            FieldKind::U16 => 2,
            FieldKind::Bytes => panic!("byte fields need an explicit width"),
        };
        Self {
            offset,
            width,
            kind,
        }
    }

    const fn bytes(offset: usize, width: usize) -> Self {
        Self {
            offset,
            width,
            kind: FieldKind::Bytes,
        }
    }
}

/// Named field in the container header
///
/// Field names are the `snake_case` form of the variant, e.g.
/// `"layer_height_mm"` for [`HeaderField::LayerHeightMm`].
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)]
pub enum HeaderField {
    Magic,
    Version,
    BedXMm,
    BedYMm,
    BedZMm,
    #[strum(serialize = "reserved0")]
    Reserved0,
    LayerHeightMm,
    ExposureS,
    BottomExposureS,
    OffTimeS,
    BottomLayers,
    ResolutionX,
    ResolutionY,
    LargePreviewOffset,
    LayerDefsOffset,
    LayerCount,
    SmallPreviewOffset,
    PrintTimeS,
    ProjectorType,
    PrintParamsOffset,
    PrintParamsSize,
    AntiAliasLevel,
    LightPwm,
    BottomLightPwm,
    #[strum(serialize = "reserved1")]
    Reserved1,
}

impl HeaderField {
    /// Returns the field's position and encoding
    pub const fn spec(self) -> FieldSpec {
        use FieldKind::*;
        match self {
            Self::Magic => FieldSpec::new(0, U32),
            Self::Version => FieldSpec::new(4, U32),
            Self::BedXMm => FieldSpec::new(8, F32),
            Self::BedYMm => FieldSpec::new(12, F32),
            Self::BedZMm => FieldSpec::new(16, F32),
            Self::Reserved0 => FieldSpec::bytes(20, 12),
            Self::LayerHeightMm => FieldSpec::new(32, F32),
            Self::ExposureS => FieldSpec::new(36, F32),
            Self::BottomExposureS => FieldSpec::new(40, F32),
            Self::OffTimeS => FieldSpec::new(44, F32),
            Self::BottomLayers => FieldSpec::new(48, U32),
            Self::ResolutionX => FieldSpec::new(52, U32),
            Self::ResolutionY => FieldSpec::new(56, U32),
            Self::LargePreviewOffset => FieldSpec::new(60, U32),
            Self::LayerDefsOffset => FieldSpec::new(64, U32),
            Self::LayerCount => FieldSpec::new(68, U32),
            Self::SmallPreviewOffset => FieldSpec::new(72, U32),
            Self::PrintTimeS => FieldSpec::new(76, U32),
            Self::ProjectorType => FieldSpec::new(80, U32),
            Self::PrintParamsOffset => FieldSpec::new(84, U32),
            Self::PrintParamsSize => FieldSpec::new(88, U32),
            Self::AntiAliasLevel => FieldSpec::new(92, U32),
            Self::LightPwm => FieldSpec::new(96, U16),
            Self::BottomLightPwm => FieldSpec::new(98, U16),
            Self::Reserved1 => FieldSpec::bytes(100, 8),
        }
    }

    /// Checks whether the field is rewritten whenever the layout changes
    ///
    /// Values written to these fields are replaced on the next
    /// [`replace_layers`](super::PhotonFile::replace_layers) or write.
    pub fn is_layout(self) -> bool {
        matches!(
            self,
            Self::LargePreviewOffset
                | Self::SmallPreviewOffset
                | Self::LayerDefsOffset
                | Self::LayerCount
                | Self::PrintParamsOffset
                | Self::PrintParamsSize
        )
    }

    /// Returns the field name
    pub fn name(self) -> &'static str {
        self.into()
    }
}

static_assertions::const_assert_eq!(
    HeaderField::Reserved1.spec().offset + HeaderField::Reserved1.spec().width,
    HEADER_LEN
);

/// Value stored in (or read from) a numeric header field
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Floating-point value, for [`FieldKind::F32`] fields
    Float(f32),
    /// Integer value, for [`FieldKind::U32`] and [`FieldKind::U16`] fields
    Int(i64),
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        Self::Int(v.into())
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

/// Raw header record
///
/// Fields are stored as their on-disk bytes, so anything which isn't
/// explicitly written keeps its original value byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header([u8; HEADER_LEN]);

impl Header {
    /// Builds an all-zero header
    pub fn zeroed() -> Self {
        Self([0; HEADER_LEN])
    }

    /// Wraps raw header bytes
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw header bytes
    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.0
    }

    /// Returns the raw bytes of a single field
    pub fn raw(&self, field: HeaderField) -> &[u8] {
        let s = field.spec();
        &self.0[s.offset..s.offset + s.width]
    }

    fn raw_mut(&mut self, field: HeaderField) -> &mut [u8] {
        let s = field.spec();
        &mut self.0[s.offset..s.offset + s.width]
    }

    /// Reads a numeric field
    pub fn get(&self, field: HeaderField) -> Result<FieldValue, Error> {
        let b = self.raw(field);
        Ok(match field.spec().kind {
            FieldKind::F32 => {
                FieldValue::Float(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            FieldKind::U32 => FieldValue::Int(
                u32::from_le_bytes([b[0], b[1], b[2], b[3]]).into(),
            ),
            FieldKind::U16 => {
                FieldValue::Int(u16::from_le_bytes([b[0], b[1]]).into())
            }
            FieldKind::Bytes => {
                return Err(Error::FieldEncoding {
                    field: field.name(),
                    reason: "field holds raw bytes".to_owned(),
                });
            }
        })
    }

    /// Writes a numeric field
    ///
    /// The value must match the field's physical type: a float can't be
    /// stored into an integer field or vice versa, and integers must fit in
    /// the field's width.
    pub fn set(
        &mut self,
        field: HeaderField,
        value: FieldValue,
    ) -> Result<(), Error> {
        let err = |reason: String| Error::FieldEncoding {
            field: field.name(),
            reason,
        };
        match (field.spec().kind, value) {
            (FieldKind::F32, FieldValue::Float(v)) => {
                self.raw_mut(field).copy_from_slice(&v.to_le_bytes())
            }
            (FieldKind::U32, FieldValue::Int(v)) => {
                let v = u32::try_from(v)
                    .map_err(|_| err(format!("{v} does not fit in a u32")))?;
                self.raw_mut(field).copy_from_slice(&v.to_le_bytes())
            }
            (FieldKind::U16, FieldValue::Int(v)) => {
                let v = u16::try_from(v)
                    .map_err(|_| err(format!("{v} does not fit in a u16")))?;
                self.raw_mut(field).copy_from_slice(&v.to_le_bytes())
            }
            (FieldKind::F32, FieldValue::Int(v)) => {
                return Err(err(format!("expected a float, got integer {v}")));
            }
            (FieldKind::U32 | FieldKind::U16, FieldValue::Float(v)) => {
                return Err(err(format!("expected an integer, got float {v}")));
            }
            (FieldKind::Bytes, _) => {
                return Err(err("field holds raw bytes".to_owned()));
            }
        }
        Ok(())
    }

    /// Reads a field known to be a `u32`
    pub(crate) fn u32(&self, field: HeaderField) -> u32 {
        debug_assert_eq!(field.spec().kind, FieldKind::U32);
        let b = self.raw(field);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Reads a field known to be an `f32`
    pub(crate) fn f32(&self, field: HeaderField) -> f32 {
        debug_assert_eq!(field.spec().kind, FieldKind::F32);
        let b = self.raw(field);
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Writes a field known to be a `u32`
    pub(crate) fn set_u32(&mut self, field: HeaderField, v: u32) {
        debug_assert_eq!(field.spec().kind, FieldKind::U32);
        self.raw_mut(field).copy_from_slice(&v.to_le_bytes())
    }

    /// Writes a field known to be an `f32`
    pub(crate) fn set_f32(&mut self, field: HeaderField, v: f32) {
        debug_assert_eq!(field.spec().kind, FieldKind::F32);
        self.raw_mut(field).copy_from_slice(&v.to_le_bytes())
    }
}
