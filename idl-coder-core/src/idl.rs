//! IDL (Interface Definition Language) types.
//!
//! The IDL is the JSON document a program publishes to describe its
//! instructions, accounts, events and user-defined types. This module
//! defines the serializable IDL format; the layout engine interprets it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::discriminator::legacy_discriminator;

/// Top-level IDL for a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub metadata: IdlMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,
    pub instructions: Vec<IdlInstruction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<IdlAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<IdlEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IdlErrorCode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<IdlTypeDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<IdlConst>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdlMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub spec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An instruction in the IDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlInstruction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,
    pub discriminator: Vec<u8>,
    #[serde(default)]
    pub accounts: Vec<IdlInstructionAccountItem>,
    #[serde(default)]
    pub args: Vec<IdlField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<IdlType>,
}

/// An account expected by an instruction, or a named group of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdlInstructionAccountItem {
    Composite(IdlInstructionAccounts),
    Single(IdlInstructionAccount),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlInstructionAccount {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,
    #[serde(default, alias = "isMut", skip_serializing_if = "is_false")]
    pub writable: bool,
    #[serde(default, alias = "isSigner", skip_serializing_if = "is_false")]
    pub signer: bool,
    #[serde(default, alias = "isOptional", skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pda: Option<IdlPda>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<String>,
}

fn is_false(v: &bool) -> bool {
    !v
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlInstructionAccounts {
    pub name: String,
    pub accounts: Vec<IdlInstructionAccountItem>,
}

/// PDA derivation specification. Carried for completeness; derivation
/// itself happens outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlPda {
    pub seeds: Vec<IdlSeed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<IdlSeed>,
}

/// A seed component for PDA derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlSeed {
    Const {
        value: Vec<u8>,
    },
    Arg {
        path: String,
    },
    Account {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
    },
}

/// Account type entry. The struct body normally lives in [`Idl::types`]
/// under the same name; older IDLs inline it as `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlAccount {
    pub name: String,
    pub discriminator: Vec<u8>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<IdlTypeDefTy>,
}

/// Event entry. Older IDLs inline the event fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlEvent {
    pub name: String,
    pub discriminator: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<IdlField>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlConst {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlType,
    pub value: String,
}

/// Error definition in the IDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlErrorCode {
    pub code: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// A named field in a struct type, an enum variant or an argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,
    #[serde(rename = "type")]
    pub ty: IdlType,
}

impl IdlField {
    pub fn new(name: impl Into<String>, ty: IdlType) -> Self {
        Self {
            name: name.into(),
            docs: vec![],
            ty,
        }
    }
}

/// User-defined type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlTypeDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,
    #[serde(default, skip_serializing_if = "IdlSerialization::is_borsh")]
    pub serialization: IdlSerialization,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generics: Vec<IdlTypeDefGeneric>,
    #[serde(rename = "type")]
    pub ty: IdlTypeDefTy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdlSerialization {
    #[default]
    Borsh,
    Bytemuck,
    #[serde(rename = "bytemuckunsafe")]
    BytemuckUnsafe,
    Custom(String),
}

impl IdlSerialization {
    fn is_borsh(&self) -> bool {
        matches!(self, IdlSerialization::Borsh)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlTypeDefGeneric {
    Type {
        name: String,
    },
    Const {
        name: String,
        #[serde(rename = "type")]
        ty: String,
    },
}

impl IdlTypeDefGeneric {
    pub fn name(&self) -> &str {
        match self {
            IdlTypeDefGeneric::Type { name } | IdlTypeDefGeneric::Const { name, .. } => name,
        }
    }
}

/// Body of a type definition (struct, enum or alias).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlTypeDefTy {
    Struct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<IdlDefinedFields>,
    },
    Enum {
        variants: Vec<IdlEnumVariant>,
    },
    #[serde(rename = "type")]
    Alias {
        alias: IdlType,
    },
}

/// An enum variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlEnumVariant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<IdlDefinedFields>,
}

/// Named (`{ a: u8 }`) or tuple (`(u8, u16)`) fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdlDefinedFields {
    Named(Vec<IdlField>),
    Tuple(Vec<IdlType>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdlArrayLen {
    Generic { generic: String },
    Value(usize),
}

/// Argument bound to a generic parameter of a defined type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlGenericArg {
    Type {
        #[serde(rename = "type")]
        ty: IdlType,
    },
    Const {
        value: String,
    },
}

/// Type representation in the IDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IdlTypeRepr", into = "IdlTypeRepr")]
pub enum IdlType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    U64,
    I64,
    F64,
    U128,
    I128,
    U256,
    I256,
    Bytes,
    String,
    Pubkey,
    Option(Box<IdlType>),
    /// Legacy nullable wrapper with a four byte tag.
    COption(Box<IdlType>),
    Vec(Box<IdlType>),
    Array(Box<IdlType>, IdlArrayLen),
    Defined {
        name: String,
        generics: Vec<IdlGenericArg>,
    },
    Generic(String),
}

impl IdlType {
    pub fn defined(name: impl Into<String>) -> Self {
        IdlType::Defined {
            name: name.into(),
            generics: vec![],
        }
    }

    pub fn option(inner: IdlType) -> Self {
        IdlType::Option(Box::new(inner))
    }

    pub fn coption(inner: IdlType) -> Self {
        IdlType::COption(Box::new(inner))
    }

    pub fn vec(inner: IdlType) -> Self {
        IdlType::Vec(Box::new(inner))
    }

    pub fn array(inner: IdlType, len: usize) -> Self {
        IdlType::Array(Box::new(inner), IdlArrayLen::Value(len))
    }

    fn primitive_name(&self) -> Option<&'static str> {
        let name = match self {
            IdlType::Bool => "bool",
            IdlType::U8 => "u8",
            IdlType::I8 => "i8",
            IdlType::U16 => "u16",
            IdlType::I16 => "i16",
            IdlType::U32 => "u32",
            IdlType::I32 => "i32",
            IdlType::F32 => "f32",
            IdlType::U64 => "u64",
            IdlType::I64 => "i64",
            IdlType::F64 => "f64",
            IdlType::U128 => "u128",
            IdlType::I128 => "i128",
            IdlType::U256 => "u256",
            IdlType::I256 => "i256",
            IdlType::Bytes => "bytes",
            IdlType::String => "string",
            IdlType::Pubkey => "pubkey",
            _ => return None,
        };
        Some(name)
    }

    fn from_primitive_name(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" => IdlType::Bool,
            "u8" => IdlType::U8,
            "i8" => IdlType::I8,
            "u16" => IdlType::U16,
            "i16" => IdlType::I16,
            "u32" => IdlType::U32,
            "i32" => IdlType::I32,
            "f32" => IdlType::F32,
            "u64" => IdlType::U64,
            "i64" => IdlType::I64,
            "f64" => IdlType::F64,
            "u128" => IdlType::U128,
            "i128" => IdlType::I128,
            "u256" => IdlType::U256,
            "i256" => IdlType::I256,
            "bytes" => IdlType::Bytes,
            "string" => IdlType::String,
            "pubkey" | "publicKey" => IdlType::Pubkey,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for IdlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdlType::Option(inner) => write!(f, "Option<{}>", inner),
            IdlType::COption(inner) => write!(f, "COption<{}>", inner),
            IdlType::Vec(inner) => write!(f, "Vec<{}>", inner),
            IdlType::Array(inner, IdlArrayLen::Value(len)) => write!(f, "[{}; {}]", inner, len),
            IdlType::Array(inner, IdlArrayLen::Generic { generic }) => {
                write!(f, "[{}; {}]", inner, generic)
            }
            IdlType::Defined { name, generics } if generics.is_empty() => f.write_str(name),
            IdlType::Defined { name, generics } => {
                let args: Vec<String> = generics.iter().map(|g| g.to_string()).collect();
                write!(f, "{}<{}>", name, args.join(", "))
            }
            IdlType::Generic(name) => f.write_str(name),
            primitive => f.write_str(primitive.primitive_name().unwrap_or_default()),
        }
    }
}

impl fmt::Display for IdlGenericArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdlGenericArg::Type { ty } => write!(f, "{}", ty),
            IdlGenericArg::Const { value } => f.write_str(value),
        }
    }
}

// ─── JSON shape of IdlType ───────────────────────────────────────

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IdlTypeRepr {
    Primitive(String),
    Option { option: Box<IdlType> },
    COption { coption: Box<IdlType> },
    Vec { vec: Box<IdlType> },
    Array { array: (Box<IdlType>, IdlArrayLen) },
    Defined { defined: IdlDefinedRepr },
    Generic { generic: String },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IdlDefinedRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        generics: Vec<IdlGenericArg>,
    },
}

impl TryFrom<IdlTypeRepr> for IdlType {
    type Error = String;

    fn try_from(repr: IdlTypeRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            IdlTypeRepr::Primitive(name) => IdlType::from_primitive_name(&name)
                .ok_or_else(|| format!("Unknown primitive type '{}'", name))?,
            IdlTypeRepr::Option { option } => IdlType::Option(option),
            IdlTypeRepr::COption { coption } => IdlType::COption(coption),
            IdlTypeRepr::Vec { vec } => IdlType::Vec(vec),
            IdlTypeRepr::Array { array } => IdlType::Array(array.0, array.1),
            IdlTypeRepr::Defined {
                defined: IdlDefinedRepr::Name(name),
            } => IdlType::defined(name),
            IdlTypeRepr::Defined {
                defined: IdlDefinedRepr::Full { name, generics },
            } => IdlType::Defined { name, generics },
            IdlTypeRepr::Generic { generic } => IdlType::Generic(generic),
        })
    }
}

impl From<IdlType> for IdlTypeRepr {
    fn from(ty: IdlType) -> Self {
        match ty {
            IdlType::Option(option) => IdlTypeRepr::Option { option },
            IdlType::COption(coption) => IdlTypeRepr::COption { coption },
            IdlType::Vec(vec) => IdlTypeRepr::Vec { vec },
            IdlType::Array(inner, len) => IdlTypeRepr::Array {
                array: (inner, len),
            },
            IdlType::Defined { name, generics } => IdlTypeRepr::Defined {
                defined: IdlDefinedRepr::Full { name, generics },
            },
            IdlType::Generic(generic) => IdlTypeRepr::Generic { generic },
            primitive => {
                IdlTypeRepr::Primitive(primitive.primitive_name().unwrap_or_default().to_string())
            }
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────

/// Failure to load an IDL document.
#[derive(Error, Debug)]
pub enum IdlError {
    #[error("Invalid IDL JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid IDL: {message}")]
    Invalid { message: String },
}

impl Idl {
    /// Create an empty IDL with the given program name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            address: None,
            metadata: IdlMetadata {
                name: name.into(),
                version: "0.1.0".to_string(),
                spec: "0.1.0".to_string(),
                description: None,
            },
            docs: vec![],
            instructions: vec![],
            accounts: vec![],
            events: vec![],
            errors: vec![],
            types: vec![],
            constants: vec![],
        }
    }

    /// Parse an IDL from JSON.
    ///
    /// Accepts the legacy layout as well: top-level `name`/`version`
    /// instead of `metadata`, and entries without an explicit
    /// `discriminator`, which get the legacy `sha256("<namespace>:<name>")`
    /// prefix filled in.
    pub fn from_json(json: &str) -> Result<Self, IdlError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(mut value: serde_json::Value) -> Result<Self, IdlError> {
        normalize_legacy(&mut value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize the IDL to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn find_account(&self, name: &str) -> Option<&IdlAccount> {
        self.accounts.iter().find(|a| a.name == name)
    }

    pub fn find_instruction(&self, name: &str) -> Option<&IdlInstruction> {
        self.instructions.iter().find(|ix| ix.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<&IdlEvent> {
        self.events.iter().find(|ev| ev.name == name)
    }

    pub fn find_type(&self, name: &str) -> Option<&IdlTypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Look up a custom program error by its numeric code.
    pub fn error_for_code(&self, code: u32) -> Option<&IdlErrorCode> {
        self.errors.iter().find(|e| e.code == code)
    }
}

fn normalize_legacy(value: &mut serde_json::Value) -> Result<(), IdlError> {
    let root = value.as_object_mut().ok_or_else(|| IdlError::Invalid {
        message: "expected a JSON object at the top level".to_string(),
    })?;

    if !root.contains_key("metadata") {
        let name = root.get("name").cloned().unwrap_or(json!(""));
        let version = root.get("version").cloned().unwrap_or(json!("0.0.0"));
        root.insert(
            "metadata".to_string(),
            json!({ "name": name, "version": version, "spec": "legacy" }),
        );
    }

    for (section, namespace) in [
        ("accounts", "account"),
        ("instructions", "global"),
        ("events", "event"),
    ] {
        let Some(entries) = root.get_mut(section).and_then(|v| v.as_array_mut()) else {
            continue;
        };
        for entry in entries.iter_mut().filter_map(|e| e.as_object_mut()) {
            if entry.contains_key("discriminator") {
                continue;
            }
            let name = entry
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| IdlError::Invalid {
                    message: format!("{} entry without a name", section),
                })?;
            let preimage_name = if namespace == "global" {
                to_snake_case(name)
            } else {
                name.to_string()
            };
            let disc = legacy_discriminator(namespace, &preimage_name);
            entry.insert("discriminator".to_string(), json!(disc.to_vec()));
        }
    }
    Ok(())
}

// ─── String utilities ────────────────────────────────────────────

pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for ch in s.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// `token_account` / `tokenAccount` -> `Token Account`.
pub fn to_sentence_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut upper_next = true;
    for ch in s.chars() {
        if ch == '_' {
            out.push(' ');
            upper_next = true;
            continue;
        }
        if ch.is_uppercase() && !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
