//! Binary layouts built from IDL types.
//!
//! A [`Layout`] is the resolved shape of one IDL type: every `defined`
//! reference has been looked up, every generic argument substituted. It
//! encodes a [`Value`] into bytes and decodes bytes back into a `Value`
//! using the Borsh wire format:
//!
//! - integers are little-endian two's complement, fixed width;
//! - `string`, `bytes` and `vec` carry a `u32` little-endian length prefix;
//! - `option` has a one byte tag, `coption` a four byte tag;
//! - enums have a one byte variant index;
//! - structs and arrays are plain concatenation.
//!
//! Layouts are built by the [`LayoutEngine`], which caches named types and
//! breaks recursion with [`Layout::Lazy`] references.

mod engine;
mod json;
mod reader;

use std::sync::{Arc, OnceLock, Weak};

use num_bigint::{BigInt, Sign};

use crate::error::{DecodeError, EncodeError};
use crate::value::{EnumValue, Fields, Value};

pub use engine::LayoutEngine;
pub use reader::{Reader, MAX_RECURSION_DEPTH};

/// Upper bound on bytes reserved up front when encoding.
const MAX_PREALLOC: usize = 4096;

/// Initial buffer capacity for an encoding of nominal size `size_hint`.
pub(crate) fn prealloc(size_hint: usize) -> usize {
    size_hint.min(MAX_PREALLOC)
}

/// Integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U128,
    I128,
    U256,
    I256,
}

impl IntKind {
    pub fn size(self) -> usize {
        match self {
            IntKind::U8 | IntKind::I8 => 1,
            IntKind::U16 | IntKind::I16 => 2,
            IntKind::U32 | IntKind::I32 => 4,
            IntKind::U64 | IntKind::I64 => 8,
            IntKind::U128 | IntKind::I128 => 16,
            IntKind::U256 | IntKind::I256 => 32,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntKind::I8
                | IntKind::I16
                | IntKind::I32
                | IntKind::I64
                | IntKind::I128
                | IntKind::I256
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            IntKind::U8 => "u8",
            IntKind::I8 => "i8",
            IntKind::U16 => "u16",
            IntKind::I16 => "i16",
            IntKind::U32 => "u32",
            IntKind::I32 => "i32",
            IntKind::U64 => "u64",
            IntKind::I64 => "i64",
            IntKind::U128 => "u128",
            IntKind::I128 => "i128",
            IntKind::U256 => "u256",
            IntKind::I256 => "i256",
        }
    }

    fn encode(self, value: &BigInt, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let out_of_range = || EncodeError::IntegerOutOfRange {
            ty: self.name(),
            value: value.to_string(),
        };
        let negative = value.sign() == Sign::Minus;
        let mut bytes = if self.is_signed() {
            value.to_signed_bytes_le()
        } else if negative {
            return Err(out_of_range());
        } else {
            value.to_bytes_le().1
        };
        if bytes.len() > self.size() {
            return Err(out_of_range());
        }
        bytes.resize(self.size(), if negative { 0xff } else { 0x00 });
        out.extend_from_slice(&bytes);
        Ok(())
    }

    fn decode(self, bytes: &[u8]) -> BigInt {
        if self.is_signed() {
            BigInt::from_signed_bytes_le(bytes)
        } else {
            BigInt::from_bytes_le(Sign::Plus, bytes)
        }
    }
}

/// Resolved encoder/decoder for one type shape.
#[derive(Debug, Clone)]
pub enum Layout {
    Bool,
    Int(IntKind),
    F32,
    F64,
    String,
    Bytes,
    Pubkey,
    Option(Box<Layout>),
    COption(Box<Layout>),
    Vec(Box<Layout>),
    Array(Box<Layout>, usize),
    Struct(StructLayout),
    Enum(EnumLayout),
    /// A named type from the IDL, shared through the engine cache.
    Defined(Arc<DefinedLayout>),
    /// Reference to a named type that was still being built when the
    /// reference was made (a recursive type).
    Lazy(LazyLayout),
}

/// Fields encoded back to back, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StructLayout {
    pub fields: Vec<FieldLayout>,
    /// Tuple fields are named `"0"`, `"1"`, ...
    pub tuple: bool,
}

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct EnumLayout {
    pub variants: Vec<VariantLayout>,
}

#[derive(Debug, Clone)]
pub struct VariantLayout {
    pub name: String,
    pub fields: StructLayout,
}

#[derive(Debug)]
pub struct DefinedLayout {
    /// Type name, with generic arguments when instantiated.
    pub name: String,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct LazyLayout {
    name: String,
    slot: Weak<OnceLock<Arc<DefinedLayout>>>,
}

impl LazyLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The referenced layout. `None` once the owning engine is gone.
    pub fn resolve(&self) -> Option<Arc<DefinedLayout>> {
        self.slot.upgrade().and_then(|slot| slot.get().cloned())
    }
}

impl Layout {
    /// Encode `value`, appending to `out`.
    pub fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        match (self, value) {
            (Layout::Bool, Value::Bool(b)) => out.push(*b as u8),
            (Layout::Int(kind), Value::Int(v)) => kind.encode(v, out)?,
            (Layout::F32, Value::Float(v)) => {
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(EncodeError::FloatOutOfRange {
                        value: v.to_string(),
                    });
                }
                out.extend_from_slice(&(*v as f32).to_le_bytes())
            }
            (Layout::F64, Value::Float(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (Layout::String, Value::String(s)) => {
                write_len(s.len(), out)?;
                out.extend_from_slice(s.as_bytes());
            }
            (Layout::Bytes, Value::Bytes(bytes)) => {
                write_len(bytes.len(), out)?;
                out.extend_from_slice(bytes);
            }
            (Layout::Pubkey, Value::Pubkey(key)) => out.extend_from_slice(key.as_bytes()),
            (Layout::Option(_), Value::Option(None)) => out.push(0),
            (Layout::Option(inner), Value::Option(Some(v))) => {
                out.push(1);
                inner.encode(v, out)?;
            }
            (Layout::COption(_), Value::Option(None)) => out.extend_from_slice(&0u32.to_le_bytes()),
            (Layout::COption(inner), Value::Option(Some(v))) => {
                out.extend_from_slice(&1u32.to_le_bytes());
                inner.encode(v, out)?;
            }
            (Layout::Vec(inner), Value::List(items)) => {
                write_len(items.len(), out)?;
                for item in items {
                    inner.encode(item, out)?;
                }
            }
            (Layout::Vec(inner), Value::Bytes(bytes)) if inner.is_u8() => {
                write_len(bytes.len(), out)?;
                out.extend_from_slice(bytes);
            }
            (Layout::Array(inner, len), Value::List(items)) => {
                check_array_len(*len, items.len())?;
                for item in items {
                    inner.encode(item, out)?;
                }
            }
            (Layout::Array(inner, len), Value::Bytes(bytes)) if inner.is_u8() => {
                check_array_len(*len, bytes.len())?;
                out.extend_from_slice(bytes);
            }
            (Layout::Struct(fields), value) => fields.encode(value, out)?,
            (Layout::Enum(e), Value::Enum(v)) => e.encode(v, out)?,
            (Layout::Defined(defined), value) => defined.layout.encode(value, out)?,
            (Layout::Lazy(lazy), value) => {
                let defined = lazy.resolve().ok_or_else(|| EncodeError::UnresolvedReference {
                    name: lazy.name.clone(),
                })?;
                defined.layout.encode(value, out)?;
            }
            (layout, value) => {
                return Err(EncodeError::TypeMismatch {
                    expected: layout.type_name(),
                    found: value.kind_name().to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(prealloc(self.size_hint()));
        self.encode(value, &mut out)?;
        Ok(out)
    }

    /// Decode a value from the start of `data`. Trailing bytes are ignored,
    /// since account buffers are commonly larger than their contents.
    pub fn decode(&self, data: &[u8]) -> Result<Value, DecodeError> {
        self.decode_with_len(data).map(|(value, _)| value)
    }

    /// Decode a value and report the number of bytes it consumed.
    pub fn decode_with_len(&self, data: &[u8]) -> Result<(Value, usize), DecodeError> {
        let mut reader = Reader::new(data);
        let value = self.read(&mut reader)?;
        Ok((value, reader.offset()))
    }

    /// Decode one value at the reader's position. Containers and named
    /// types count towards [`MAX_RECURSION_DEPTH`].
    pub fn read(&self, reader: &mut Reader<'_>) -> Result<Value, DecodeError> {
        match self {
            Layout::Option(_)
            | Layout::COption(_)
            | Layout::Vec(_)
            | Layout::Defined(_)
            | Layout::Lazy(_) => {
                reader.enter()?;
                let value = self.read_value(reader);
                reader.leave();
                value
            }
            _ => self.read_value(reader),
        }
    }

    fn read_value(&self, reader: &mut Reader<'_>) -> Result<Value, DecodeError> {
        let value = match self {
            Layout::Bool => {
                let offset = reader.offset();
                match reader.read_u8()? {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    value => return Err(DecodeError::InvalidBool { offset, value }),
                }
            }
            Layout::Int(kind) => Value::Int(kind.decode(reader.take(kind.size())?)),
            Layout::F32 => Value::Float(f32::from_le_bytes(reader.array()?) as f64),
            Layout::F64 => Value::Float(f64::from_le_bytes(reader.array()?)),
            Layout::String => {
                let len = reader.read_len(1)?;
                let offset = reader.offset();
                let bytes = reader.take(len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { offset })?;
                Value::String(s.to_string())
            }
            Layout::Bytes => {
                let len = reader.read_len(1)?;
                Value::Bytes(reader.take(len)?.to_vec())
            }
            Layout::Pubkey => Value::Pubkey(reader.array::<32>()?.into()),
            Layout::Option(inner) => {
                let offset = reader.offset();
                match reader.read_u8()? {
                    0 => Value::Option(None),
                    1 => Value::Option(Some(Box::new(inner.read(reader)?))),
                    tag => return Err(DecodeError::InvalidOptionTag { offset, tag }),
                }
            }
            Layout::COption(inner) => {
                let offset = reader.offset();
                match reader.read_u32()? {
                    0 => Value::Option(None),
                    1 => Value::Option(Some(Box::new(inner.read(reader)?))),
                    tag => return Err(DecodeError::InvalidCOptionTag { offset, tag }),
                }
            }
            Layout::Vec(inner) => {
                // Zero-sized elements still count as one byte here so a
                // corrupt prefix cannot spin through billions of items.
                let len = reader.read_len(inner.min_size().max(1))?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(inner.read(reader)?);
                }
                Value::List(items)
            }
            Layout::Array(inner, len) => {
                let needed = len.saturating_mul(inner.min_size());
                if needed > reader.remaining() {
                    return Err(DecodeError::UnexpectedEof {
                        offset: reader.offset(),
                        needed,
                        remaining: reader.remaining(),
                    });
                }
                let mut items = Vec::with_capacity((*len).min(reader.remaining().max(1)));
                for _ in 0..*len {
                    items.push(inner.read(reader)?);
                }
                Value::List(items)
            }
            Layout::Struct(fields) => Value::Struct(fields.read(reader)?),
            Layout::Enum(e) => Value::Enum(e.read(reader)?),
            Layout::Defined(defined) => defined.layout.read(reader)?,
            Layout::Lazy(lazy) => {
                let defined = lazy.resolve().ok_or_else(|| DecodeError::UnresolvedReference {
                    name: lazy.name.clone(),
                })?;
                defined.layout.read(reader)?
            }
        };
        Ok(value)
    }

    /// Nominal encoded size: variable-length members count as one byte and
    /// an enum as one byte plus its largest variant. Exact for fixed-size
    /// layouts.
    pub fn size_hint(&self) -> usize {
        match self {
            Layout::Bool => 1,
            Layout::Int(kind) => kind.size(),
            Layout::F32 => 4,
            Layout::F64 => 8,
            Layout::String | Layout::Bytes | Layout::Vec(_) => 1,
            Layout::Pubkey => 32,
            Layout::Option(inner) => inner.size_hint().saturating_add(1),
            Layout::COption(inner) => inner.size_hint().saturating_add(4),
            Layout::Array(inner, len) => inner.size_hint().saturating_mul(*len),
            Layout::Struct(fields) => fields.size_hint(),
            Layout::Enum(e) => e
                .variants
                .iter()
                .map(|v| v.fields.size_hint())
                .max()
                .unwrap_or(0)
                .saturating_add(1),
            Layout::Defined(defined) => defined.layout.size_hint(),
            Layout::Lazy(_) => 1,
        }
    }

    /// Smallest number of bytes any valid encoding occupies.
    pub fn min_size(&self) -> usize {
        match self {
            Layout::Bool => 1,
            Layout::Int(kind) => kind.size(),
            Layout::F32 => 4,
            Layout::F64 => 8,
            Layout::String | Layout::Bytes | Layout::Vec(_) => 4,
            Layout::Pubkey => 32,
            Layout::Option(_) => 1,
            Layout::COption(_) => 4,
            Layout::Array(inner, len) => inner.min_size().saturating_mul(*len),
            Layout::Struct(fields) => fields.min_size(),
            Layout::Enum(e) => e
                .variants
                .iter()
                .map(|v| v.fields.min_size())
                .min()
                .unwrap_or(0)
                .saturating_add(1),
            Layout::Defined(defined) => defined.layout.min_size(),
            Layout::Lazy(_) => 0,
        }
    }

    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Layout::Bool => "bool".to_string(),
            Layout::Int(kind) => kind.name().to_string(),
            Layout::F32 => "f32".to_string(),
            Layout::F64 => "f64".to_string(),
            Layout::String => "string".to_string(),
            Layout::Bytes => "bytes".to_string(),
            Layout::Pubkey => "pubkey".to_string(),
            Layout::Option(inner) => format!("Option<{}>", inner.type_name()),
            Layout::COption(inner) => format!("COption<{}>", inner.type_name()),
            Layout::Vec(inner) => format!("Vec<{}>", inner.type_name()),
            Layout::Array(inner, len) => format!("[{}; {}]", inner.type_name(), len),
            Layout::Struct(_) => "struct".to_string(),
            Layout::Enum(_) => "enum".to_string(),
            Layout::Defined(defined) => defined.name.clone(),
            Layout::Lazy(lazy) => lazy.name.clone(),
        }
    }

    /// Struct fields of this layout, looking through named types.
    pub fn as_struct(&self) -> Option<&StructLayout> {
        match self {
            Layout::Struct(fields) => Some(fields),
            Layout::Defined(defined) => defined.layout.as_struct(),
            _ => None,
        }
    }

    fn is_u8(&self) -> bool {
        matches!(self, Layout::Int(IntKind::U8))
    }
}

impl StructLayout {
    pub fn unit() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode a struct value. Tuple structs also accept a list.
    pub fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        match value {
            Value::Struct(fields) => self.encode_fields(fields, out),
            Value::List(items) if self.tuple => {
                check_array_len(self.fields.len(), items.len())?;
                for (field, item) in self.fields.iter().zip(items) {
                    field.layout.encode(item, out)?;
                }
                Ok(())
            }
            other => Err(EncodeError::TypeMismatch {
                expected: "struct".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    /// Encode each declared field from `values`. Extra entries are ignored.
    pub fn encode_fields(&self, values: &Fields, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        for field in &self.fields {
            let value = values.get(&field.name).ok_or_else(|| EncodeError::MissingField {
                field: field.name.clone(),
            })?;
            field.layout.encode(value, out)?;
        }
        Ok(())
    }

    pub fn read(&self, reader: &mut Reader<'_>) -> Result<Fields, DecodeError> {
        let mut fields = Fields::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = field.layout.read(reader)?;
            fields.insert(field.name.clone(), value);
        }
        Ok(fields)
    }

    pub fn size_hint(&self) -> usize {
        self.fields
            .iter()
            .fold(0, |acc: usize, f| acc.saturating_add(f.layout.size_hint()))
    }

    pub fn min_size(&self) -> usize {
        self.fields
            .iter()
            .fold(0, |acc: usize, f| acc.saturating_add(f.layout.min_size()))
    }
}

impl EnumLayout {
    fn encode(&self, value: &EnumValue, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let (index, variant) = self
            .variants
            .iter()
            .enumerate()
            .find(|(_, v)| v.name == value.variant)
            .ok_or_else(|| EncodeError::UnknownVariant {
                variant: value.variant.clone(),
            })?;
        // Variant count is capped at 256 when the layout is built.
        out.push(index as u8);
        variant.fields.encode_fields(&value.fields, out)
    }

    fn read(&self, reader: &mut Reader<'_>) -> Result<EnumValue, DecodeError> {
        let offset = reader.offset();
        let tag = reader.read_u8()?;
        let variant = self
            .variants
            .get(tag as usize)
            .ok_or(DecodeError::InvalidVariant {
                offset,
                tag,
                count: self.variants.len(),
            })?;
        Ok(EnumValue {
            variant: variant.name.clone(),
            fields: variant.fields.read(reader)?,
        })
    }
}

fn write_len(len: usize, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let len = u32::try_from(len).map_err(|_| EncodeError::LengthOverflow { len })?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn check_array_len(expected: usize, actual: usize) -> Result<(), EncodeError> {
    if expected != actual {
        return Err(EncodeError::ArrayLength { expected, actual });
    }
    Ok(())
}
