//! Dynamic values produced and consumed by layouts.
//!
//! Every integer width is carried as an arbitrary-precision [`BigInt`] so
//! 128- and 256-bit values round-trip without truncation. Struct-like values
//! keep their fields in declaration order.

use std::fmt;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::hex::hex_encode;
use crate::pubkey::Pubkey;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(BigInt),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Pubkey(Pubkey),
    /// Both `option` and `coption` decode to this.
    Option(Option<Box<Value>>),
    /// Both `vec` and `array` decode to this.
    List(Vec<Value>),
    Struct(Fields),
    Enum(EnumValue),
}

/// Ordered field name -> value record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub variant: String,
    pub fields: Fields,
}

impl Value {
    pub fn int(v: impl Into<BigInt>) -> Self {
        Value::Int(v.into())
    }

    pub fn none() -> Self {
        Value::Option(None)
    }

    pub fn some(v: impl Into<Value>) -> Self {
        Value::Option(Some(Box::new(v.into())))
    }

    pub fn unit_variant(variant: impl Into<String>) -> Self {
        Value::Enum(EnumValue {
            variant: variant.into(),
            fields: Fields::new(),
        })
    }

    pub fn variant(variant: impl Into<String>, fields: Fields) -> Self {
        Value::Enum(EnumValue {
            variant: variant.into(),
            fields,
        })
    }

    /// Name of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Pubkey(_) => "pubkey",
            Value::Option(_) => "option",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
            Value::Enum(_) => "enum",
        }
    }

    /// Field of a struct value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.get(field),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_int().and_then(|v| v.to_u64())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|v| v.to_i64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pubkey(&self) -> Option<&Pubkey> {
        match self {
            Value::Pubkey(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value` for presentation.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(BigInt::from(v))
                }
            }
        )*
    };
}

impl_from_int!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, usize, isize);

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Pubkey> for Value {
    fn from(v: Pubkey) -> Self {
        Value::Pubkey(v)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Value::Struct(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        Value::Option(v.map(|inner| Box::new(inner.into())))
    }
}

// ─── Presentation ────────────────────────────────────────────────

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(v) => {
                if let Some(small) = v.to_i64() {
                    serializer.serialize_i64(small)
                } else if let Some(small) = v.to_u64() {
                    serializer.serialize_u64(small)
                } else {
                    serializer.serialize_str(&v.to_string())
                }
            }
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => serializer.collect_seq(bytes.iter()),
            Value::Pubkey(key) => key.serialize(serializer),
            Value::Option(None) => serializer.serialize_none(),
            Value::Option(Some(inner)) => serializer.serialize_some(inner.as_ref()),
            Value::List(items) => serializer.collect_seq(items.iter()),
            Value::Struct(fields) => fields.serialize(serializer),
            Value::Enum(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&e.variant, &e.fields)?;
                map.end()
            }
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Bytes(bytes) => write!(f, "0x{}", hex_encode(bytes)),
            Value::Pubkey(key) => write!(f, "{}", key),
            Value::Option(None) => f.write_str("null"),
            Value::Option(Some(inner)) => write!(f, "{}", inner),
            Value::List(items) => {
                let strs: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", strs.join(", "))
            }
            Value::Struct(fields) => write!(f, "{}", fields),
            Value::Enum(e) if e.fields.is_empty() => f.write_str(&e.variant),
            Value::Enum(e) => write!(f, "{} {}", e.variant, e.fields),
        }
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let strs: Vec<String> = self.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{{ {} }}", strs.join(", "))
    }
}
