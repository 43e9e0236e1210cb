//! # IDL Coder Core
//!
//! Schema-driven binary codec for programs described by an IDL: layouts
//! built at runtime from the IDL's type definitions, discriminator dispatch,
//! and codecs for accounts, instructions, events and user types.

pub mod coder;
pub mod discriminator;
pub mod error;
pub mod hex;
pub mod idl;
pub mod layout;
pub mod pubkey;
pub mod value;

pub mod prelude {
    pub use crate::coder::{
        AccountMeta, AccountsCoder, Coder, DecodedAccount, DecodedInstruction, Encoding, Event,
        EventCoder, InstructionCoder, InstructionDisplay, MemcmpFilter, TypesCoder,
    };
    pub use crate::discriminator::{DiscriminatorKind, DiscriminatorRegistry};
    pub use crate::error::{CoderError, CoderResult, DecodeError, EncodeError, SchemaError};
    pub use crate::idl::{Idl, IdlType};
    pub use crate::layout::{Layout, LayoutEngine};
    pub use crate::pubkey::Pubkey;
    pub use crate::value::{EnumValue, Fields, Value};
}
