//! Codec front-ends over one IDL.
//!
//! [`Coder`] owns the layout engine and discriminator registry for an IDL
//! and hands out the four codecs, which share both.

mod accounts;
mod event;
mod instruction;
mod types;

use std::sync::Arc;

use tracing::debug;

use crate::discriminator::DiscriminatorRegistry;
use crate::error::{DecodeError, SchemaError};
use crate::idl::{Idl, IdlErrorCode};
use crate::layout::LayoutEngine;

pub use accounts::{AccountsCoder, DecodedAccount, MemcmpFilter};
pub use event::{Event, EventCoder, EVENT_IX_TAG};
pub use instruction::{
    AccountMeta, DecodedInstruction, Encoding, InstructionAccountDisplay, InstructionArgDisplay,
    InstructionCoder, InstructionDisplay,
};
pub use types::TypesCoder;

/// All codecs for one IDL. Every layout is built up front, so schema
/// problems surface here rather than on first use.
#[derive(Debug)]
pub struct Coder {
    idl: Arc<Idl>,
    engine: Arc<LayoutEngine>,
    registry: Arc<DiscriminatorRegistry>,
    accounts: AccountsCoder,
    instruction: InstructionCoder,
    events: EventCoder,
    types: TypesCoder,
}

impl Coder {
    pub fn new(idl: Idl) -> Result<Self, SchemaError> {
        let idl = Arc::new(idl);
        let engine = Arc::new(LayoutEngine::new(idl.clone()));
        let registry = Arc::new(DiscriminatorRegistry::new(&idl));

        let accounts = AccountsCoder::new(&engine, registry.clone())?;
        let instruction = InstructionCoder::new(&engine, registry.clone())?;
        let events = EventCoder::new(&engine, registry.clone())?;
        let types = TypesCoder::new(&engine)?;

        debug!(
            program = %idl.metadata.name,
            accounts = idl.accounts.len(),
            instructions = idl.instructions.len(),
            events = idl.events.len(),
            layouts = engine.cached_len(),
            "coder ready"
        );

        Ok(Self {
            idl,
            engine,
            registry,
            accounts,
            instruction,
            events,
            types,
        })
    }

    pub fn idl(&self) -> &Idl {
        &self.idl
    }

    pub fn accounts(&self) -> &AccountsCoder {
        &self.accounts
    }

    pub fn instruction(&self) -> &InstructionCoder {
        &self.instruction
    }

    pub fn events(&self) -> &EventCoder {
        &self.events
    }

    pub fn types(&self) -> &TypesCoder {
        &self.types
    }

    pub fn registry(&self) -> &DiscriminatorRegistry {
        &self.registry
    }

    /// Shared layout engine, for building layouts of ad-hoc types.
    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    /// Custom program error declared in the IDL under `code`.
    pub fn error_for_code(&self, code: u32) -> Option<&IdlErrorCode> {
        self.idl.error_for_code(code)
    }
}

/// The bytes after a discriminator of `len` bytes.
fn strip_discriminator(data: &[u8], len: usize) -> Result<&[u8], DecodeError> {
    data.get(len..).ok_or(DecodeError::UnexpectedEof {
        offset: 0,
        needed: len,
        remaining: data.len(),
    })
}
