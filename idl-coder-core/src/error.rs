//! Structured error types for the coder.
//!
//! Construction problems with the IDL itself surface as [`SchemaError`]
//! and are fatal for the affected layout. Malformed bytes surface as
//! [`DecodeError`], values that do not fit a layout as [`EncodeError`].
//! [`CoderError`] is the per-call error of the codec front-ends and adds
//! the usage errors (unknown names, wrong codec for a name).
//!
//! "Nothing matched" is not an error anywhere in this crate: lookups by
//! discriminator return `Ok(None)`.

use thiserror::Error;

/// Result type alias for codec operations.
pub type CoderResult<T> = Result<T, CoderError>;

/// The IDL cannot be turned into a layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Type not found: {name}")]
    TypeNotFound { name: String },

    #[error("Type {name} is defined {count} times")]
    AmbiguousType { name: String, count: usize },

    #[error("Type {name} expects {expected} generic argument(s), got {actual}")]
    GenericArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Generic parameter {name} expects a {expected} argument")]
    GenericKind { name: String, expected: &'static str },

    #[error("Generic parameter {name} is not bound")]
    UnboundGeneric { name: String },

    #[error("Invalid array length: {value}")]
    InvalidArrayLength { value: String },

    #[error("Array of {ty} has length zero")]
    ZeroLengthArray { ty: String },

    #[error("Enum {name} has {count} variants, at most 256 are supported")]
    TooManyVariants { name: String, count: usize },

    #[error("Duplicate field {field} in {name}")]
    DuplicateField { name: String, field: String },

    #[error("Duplicate variant {variant} in {name}")]
    DuplicateVariant { name: String, variant: String },

    #[error("Type {name} contains itself without an option, coption, vec or enum in between")]
    InfiniteType { name: String },

    #[error("The {kind} {name} has no inline fields and no type of the same name")]
    MissingBody { kind: &'static str, name: String },
}

/// The bytes do not hold a valid encoding for the layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of data at offset {offset}: need {needed} byte(s), {remaining} left")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Length prefix {len} at offset {offset} exceeds the {remaining} remaining byte(s)")]
    LengthOverflow {
        offset: usize,
        len: usize,
        remaining: usize,
    },

    #[error("Invalid bool byte {value} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("Invalid option tag {tag} at offset {offset}")]
    InvalidOptionTag { offset: usize, tag: u8 },

    #[error("Invalid nullable tag {tag} at offset {offset}")]
    InvalidCOptionTag { offset: usize, tag: u32 },

    #[error("Invalid variant index {tag} at offset {offset}: enum has {count} variant(s)")]
    InvalidVariant {
        offset: usize,
        tag: u8,
        count: usize,
    },

    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Wrong discriminator: expected {expected:?}, found {found:?}")]
    DiscriminatorMismatch { expected: Vec<u8>, found: Vec<u8> },

    #[error("Recursive reference to {name} is no longer resolvable")]
    UnresolvedReference { name: String },

    #[error("Nesting deeper than {limit} levels at offset {offset}")]
    RecursionLimit { offset: usize, limit: usize },
}

/// The value does not fit the layout it is being encoded with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Value {value} is out of range for {ty}")]
    IntegerOutOfRange { ty: &'static str, value: String },

    #[error("Value {value} is out of range for f32")]
    FloatOutOfRange { value: String },

    #[error("Expected an array of {expected} element(s), got {actual}")]
    ArrayLength { expected: usize, actual: usize },

    #[error("Length {len} does not fit a u32 length prefix")]
    LengthOverflow { len: usize },

    #[error("Unknown variant {variant}")]
    UnknownVariant { variant: String },

    #[error("Missing field {field}")]
    MissingField { field: String },

    #[error("Invalid JSON input: {message}")]
    InvalidJson { message: String },

    #[error("Recursive reference to {name} is no longer resolvable")]
    UnresolvedReference { name: String },
}

/// Per-call error of the codec front-ends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoderError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Unknown account: {name}")]
    UnknownAccount { name: String },

    #[error("Unknown instruction: {name}")]
    UnknownInstruction { name: String },

    #[error("Unknown event: {name}")]
    UnknownEvent { name: String },

    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("{name} is an account; use the accounts coder so the discriminator is handled")]
    AccountAsType { name: String },

    #[error("Type {name} is generic and needs arguments")]
    GenericType { name: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

/// Coarse classification of a [`CoderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Decode,
    Encode,
    Usage,
}

impl CoderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoderError::Schema(_) => ErrorKind::Schema,
            CoderError::Decode(_) => ErrorKind::Decode,
            CoderError::Encode(_) => ErrorKind::Encode,
            CoderError::UnknownAccount { .. }
            | CoderError::UnknownInstruction { .. }
            | CoderError::UnknownEvent { .. }
            | CoderError::UnknownType { .. }
            | CoderError::AccountAsType { .. }
            | CoderError::GenericType { .. }
            | CoderError::InvalidInput { .. } => ErrorKind::Usage,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CoderError::InvalidInput {
            message: message.into(),
        }
    }
}
