//! Layout-aware conversion of JSON input into [`Value`]s.

use std::str::FromStr;

use num_bigint::BigInt;
use serde_json::Value as Json;

use super::{EnumLayout, Layout, StructLayout};
use crate::error::EncodeError;
use crate::hex::hex_decode;
use crate::pubkey::Pubkey;
use crate::value::{EnumValue, Fields, Value};

impl Layout {
    /// Convert JSON into a value of this layout.
    ///
    /// Integers may be JSON numbers or decimal strings (`0x` hex accepted),
    /// pubkeys are base58 strings, `bytes` and `u8` arrays take either a
    /// number array or a `0x` hex string, `null` is an absent option, and
    /// enums are `"Variant"` or `{"Variant": fields}`.
    pub fn value_from_json(&self, json: &Json) -> Result<Value, EncodeError> {
        match self {
            Layout::Bool => json
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| mismatch("bool", json)),
            Layout::Int(kind) => parse_int(json)
                .map(Value::Int)
                .ok_or_else(|| mismatch(kind.name(), json)),
            Layout::F32 | Layout::F64 => parse_float(json)
                .map(Value::Float)
                .ok_or_else(|| mismatch("float", json)),
            Layout::String => json
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| mismatch("string", json)),
            Layout::Bytes => parse_bytes(json).map(Value::Bytes),
            Layout::Pubkey => parse_pubkey(json).map(Value::Pubkey),
            Layout::Option(inner) | Layout::COption(inner) => match json {
                Json::Null => Ok(Value::Option(None)),
                other => Ok(Value::Option(Some(Box::new(inner.value_from_json(other)?)))),
            },
            Layout::Vec(inner) | Layout::Array(inner, _) => match json {
                Json::String(_) if inner.is_u8() => parse_bytes(json).map(Value::Bytes),
                Json::Array(items) => items
                    .iter()
                    .map(|item| inner.value_from_json(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List),
                other => Err(mismatch("array", other)),
            },
            Layout::Struct(fields) => fields.value_from_json(json),
            Layout::Enum(e) => e.value_from_json(json),
            Layout::Defined(defined) => defined.layout.value_from_json(json),
            Layout::Lazy(lazy) => {
                let defined = lazy.resolve().ok_or_else(|| EncodeError::UnresolvedReference {
                    name: lazy.name().to_string(),
                })?;
                defined.layout.value_from_json(json)
            }
        }
    }
}

impl StructLayout {
    pub fn value_from_json(&self, json: &Json) -> Result<Value, EncodeError> {
        self.fields_from_json(json).map(Value::Struct)
    }

    /// Read the declared fields from a JSON object (or an array for tuple
    /// structs). Unknown keys are ignored.
    pub fn fields_from_json(&self, json: &Json) -> Result<Fields, EncodeError> {
        match json {
            Json::Null if self.is_empty() => Ok(Fields::new()),
            Json::Object(map) => {
                let mut fields = Fields::with_capacity(self.fields.len());
                for field in &self.fields {
                    let raw = map.get(&field.name).ok_or_else(|| EncodeError::MissingField {
                        field: field.name.clone(),
                    })?;
                    fields.insert(field.name.clone(), field.layout.value_from_json(raw)?);
                }
                Ok(fields)
            }
            Json::Array(items) if self.tuple => {
                if items.len() != self.fields.len() {
                    return Err(EncodeError::ArrayLength {
                        expected: self.fields.len(),
                        actual: items.len(),
                    });
                }
                let mut fields = Fields::with_capacity(items.len());
                for (field, item) in self.fields.iter().zip(items) {
                    fields.insert(field.name.clone(), field.layout.value_from_json(item)?);
                }
                Ok(fields)
            }
            other => Err(mismatch("object", other)),
        }
    }
}

static NULL: Json = Json::Null;

impl EnumLayout {
    fn value_from_json(&self, json: &Json) -> Result<Value, EncodeError> {
        let (name, body) = match json {
            Json::String(name) => (name, &NULL),
            Json::Object(map) if map.len() == 1 => match map.iter().next() {
                Some(entry) => entry,
                None => return Err(mismatch("enum", json)),
            },
            other => return Err(mismatch("enum", other)),
        };
        let variant = self
            .variants
            .iter()
            .find(|v| v.name == *name)
            .ok_or_else(|| EncodeError::UnknownVariant {
                variant: name.clone(),
            })?;
        let fields = match body {
            Json::Object(map) if map.is_empty() => Fields::new(),
            body => variant.fields.fields_from_json(body)?,
        };
        Ok(Value::Enum(EnumValue {
            variant: variant.name.clone(),
            fields,
        }))
    }
}

fn mismatch(expected: &str, found: &Json) -> EncodeError {
    EncodeError::InvalidJson {
        message: format!("expected {}, found {}", expected, found),
    }
}

fn parse_int(json: &Json) -> Option<BigInt> {
    match json {
        Json::Number(n) => n
            .as_i64()
            .map(BigInt::from)
            .or_else(|| n.as_u64().map(BigInt::from)),
        Json::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => BigInt::parse_bytes(hex.as_bytes(), 16),
                None => BigInt::from_str(s).ok(),
            }
        }
        _ => None,
    }
}

fn parse_float(json: &Json) -> Option<f64> {
    match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bytes(json: &Json) -> Result<Vec<u8>, EncodeError> {
    match json {
        Json::String(s) => hex_decode(s).map_err(|message| EncodeError::InvalidJson { message }),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| mismatch("byte", item))
            })
            .collect(),
        other => Err(mismatch("bytes", other)),
    }
}

fn parse_pubkey(json: &Json) -> Result<Pubkey, EncodeError> {
    match json {
        Json::String(s) => Pubkey::from_str(s).map_err(|e| EncodeError::InvalidJson {
            message: format!("invalid pubkey '{}': {}", s, e),
        }),
        Json::Array(_) => {
            let bytes = parse_bytes(json)?;
            Pubkey::try_from_slice(&bytes).ok_or(EncodeError::ArrayLength {
                expected: Pubkey::LEN,
                actual: bytes.len(),
            })
        }
        other => Err(mismatch("pubkey", other)),
    }
}
