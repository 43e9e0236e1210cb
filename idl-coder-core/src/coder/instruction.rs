use std::collections::HashMap;
use std::sync::Arc;

use base58::FromBase58;
use serde::Serialize;
use tracing::trace;

use super::strip_discriminator;
use crate::discriminator::{DiscriminatorKind, DiscriminatorRegistry};
use crate::error::{CoderError, CoderResult, SchemaError};
use crate::hex::hex_decode;
use crate::idl::{to_sentence_case, Idl, IdlInstructionAccountItem};
use crate::layout::{prealloc, LayoutEngine, Reader, StructLayout};
use crate::pubkey::Pubkey;
use crate::value::{Fields, Value};

/// Encodes and decodes instruction data: discriminator followed by the
/// arguments encoded as a struct in declaration order.
#[derive(Debug)]
pub struct InstructionCoder {
    idl: Arc<Idl>,
    layouts: HashMap<String, InstructionLayout>,
    registry: Arc<DiscriminatorRegistry>,
}

#[derive(Debug)]
struct InstructionLayout {
    discriminator: Vec<u8>,
    args: StructLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInstruction {
    pub name: String,
    /// Arguments by name.
    pub data: Fields,
}

/// Text encoding of instruction data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Hex,
    Base58,
}

/// An account passed to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable,
        }
    }
}

/// Human-readable rendering of a decoded instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionDisplay {
    pub args: Vec<InstructionArgDisplay>,
    pub accounts: Vec<InstructionAccountDisplay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionArgDisplay {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionAccountDisplay {
    /// `None` for accounts beyond those the IDL declares.
    pub name: Option<String>,
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl InstructionCoder {
    pub fn new(engine: &LayoutEngine, registry: Arc<DiscriminatorRegistry>) -> Result<Self, SchemaError> {
        let mut layouts = HashMap::new();
        for ix in &engine.idl().instructions {
            let args = engine.build_fields(&ix.name, &ix.args)?;
            layouts.insert(
                ix.name.clone(),
                InstructionLayout {
                    discriminator: ix.discriminator.clone(),
                    args,
                },
            );
        }
        Ok(Self {
            idl: engine.idl().clone(),
            layouts,
            registry,
        })
    }

    fn get(&self, name: &str) -> CoderResult<&InstructionLayout> {
        self.layouts.get(name).ok_or_else(|| CoderError::UnknownInstruction {
            name: name.to_string(),
        })
    }

    pub fn args_layout(&self, name: &str) -> CoderResult<&StructLayout> {
        Ok(&self.get(name)?.args)
    }

    /// Encode instruction `name`. `args` is a struct value holding every
    /// declared argument by name.
    pub fn encode(&self, name: &str, args: &Value) -> CoderResult<Vec<u8>> {
        let ix = self.get(name)?;
        let mut out = Vec::with_capacity(prealloc(
            ix.args.size_hint().saturating_add(ix.discriminator.len()),
        ));
        out.extend_from_slice(&ix.discriminator);
        ix.args.encode(args, &mut out)?;
        Ok(out)
    }

    pub fn encode_json(&self, name: &str, json: &serde_json::Value) -> CoderResult<Vec<u8>> {
        let args = self.get(name)?.args.value_from_json(json)?;
        self.encode(name, &args)
    }

    /// Decode instruction data by its discriminator. `Ok(None)` when no
    /// instruction matches.
    pub fn decode(&self, data: &[u8]) -> CoderResult<Option<DecodedInstruction>> {
        let mut first_err = None;
        for name in self.registry.matches(DiscriminatorKind::Instruction, data) {
            match self.decode_args(name, data) {
                Ok(fields) => {
                    return Ok(Some(DecodedInstruction {
                        name: name.to_string(),
                        data: fields,
                    }))
                }
                Err(err) => {
                    trace!(instruction = name, error = %err, "candidate instruction failed to decode");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    /// Decode instruction data given as hex or base58 text.
    pub fn decode_str(&self, data: &str, encoding: Encoding) -> CoderResult<Option<DecodedInstruction>> {
        let bytes = match encoding {
            Encoding::Hex => hex_decode(data).map_err(CoderError::invalid_input)?,
            Encoding::Base58 => data
                .from_base58()
                .map_err(|e| CoderError::invalid_input(format!("invalid base58: {:?}", e)))?,
        };
        self.decode(&bytes)
    }

    fn decode_args(&self, name: &str, data: &[u8]) -> CoderResult<Fields> {
        let ix = self.get(name)?;
        let body = strip_discriminator(data, ix.discriminator.len())?;
        let mut reader = Reader::new(body);
        Ok(ix.args.read(&mut reader)?)
    }

    /// Render a decoded instruction with its accounts named after the IDL.
    /// Nested account groups are flattened as `Group > Account`; accounts
    /// past the declared ones stay unnamed. `None` if the instruction is not
    /// in the IDL.
    pub fn format(&self, ix: &DecodedInstruction, metas: &[AccountMeta]) -> Option<InstructionDisplay> {
        let idl_ix = self.idl.find_instruction(&ix.name)?;

        let args = idl_ix
            .args
            .iter()
            .map(|arg| InstructionArgDisplay {
                name: arg.name.clone(),
                ty: arg.ty.to_string(),
                data: ix
                    .data
                    .get(&arg.name)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        let mut names = Vec::new();
        flatten_accounts(&idl_ix.accounts, None, &mut names);
        let accounts = metas
            .iter()
            .enumerate()
            .map(|(i, meta)| InstructionAccountDisplay {
                name: names.get(i).cloned(),
                pubkey: meta.pubkey,
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
            })
            .collect();

        Some(InstructionDisplay { args, accounts })
    }
}

fn flatten_accounts(items: &[IdlInstructionAccountItem], prefix: Option<&str>, out: &mut Vec<String>) {
    for item in items {
        let (name, nested) = match item {
            IdlInstructionAccountItem::Single(account) => (&account.name, None),
            IdlInstructionAccountItem::Composite(group) => (&group.name, Some(&group.accounts)),
        };
        let label = match prefix {
            Some(prefix) => format!("{} > {}", prefix, to_sentence_case(name)),
            None => to_sentence_case(name),
        };
        match nested {
            Some(accounts) => flatten_accounts(accounts, Some(&label), out),
            None => out.push(label),
        }
    }
}
