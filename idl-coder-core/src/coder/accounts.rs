use std::collections::HashMap;
use std::sync::Arc;

use base58::ToBase58;
use serde::Serialize;
use tracing::trace;

use super::strip_discriminator;
use crate::discriminator::{DiscriminatorKind, DiscriminatorRegistry};
use crate::error::{CoderError, CoderResult, DecodeError, SchemaError};
use crate::layout::{prealloc, Layout, LayoutEngine};
use crate::value::Value;

/// Encodes and decodes account data: discriminator followed by the
/// account's struct encoding.
#[derive(Debug)]
pub struct AccountsCoder {
    layouts: HashMap<String, AccountLayout>,
    registry: Arc<DiscriminatorRegistry>,
}

#[derive(Debug)]
struct AccountLayout {
    discriminator: Vec<u8>,
    layout: Layout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAccount {
    pub name: String,
    pub data: Value,
}

/// Account data filter matching on a byte prefix, in the shape RPC
/// `memcmp` filters take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemcmpFilter {
    pub offset: usize,
    /// Base58 encoded.
    pub bytes: String,
}

impl AccountsCoder {
    pub fn new(engine: &LayoutEngine, registry: Arc<DiscriminatorRegistry>) -> Result<Self, SchemaError> {
        let mut layouts = HashMap::new();
        let idl = engine.idl();
        for account in &idl.accounts {
            if account.ty.is_none() && idl.find_type(&account.name).is_none() {
                return Err(SchemaError::MissingBody {
                    kind: "account",
                    name: account.name.clone(),
                });
            }
            let layout = engine.build_defined(&account.name)?;
            layouts.insert(
                account.name.clone(),
                AccountLayout {
                    discriminator: account.discriminator.clone(),
                    layout,
                },
            );
        }
        Ok(Self { layouts, registry })
    }

    fn get(&self, name: &str) -> CoderResult<&AccountLayout> {
        self.layouts.get(name).ok_or_else(|| CoderError::UnknownAccount {
            name: name.to_string(),
        })
    }

    pub fn layout(&self, name: &str) -> CoderResult<&Layout> {
        Ok(&self.get(name)?.layout)
    }

    pub fn discriminator(&self, name: &str) -> CoderResult<&[u8]> {
        Ok(&self.get(name)?.discriminator)
    }

    pub fn encode(&self, name: &str, value: &Value) -> CoderResult<Vec<u8>> {
        let account = self.get(name)?;
        let mut out = Vec::with_capacity(prealloc(
            account.layout.size_hint().saturating_add(account.discriminator.len()),
        ));
        out.extend_from_slice(&account.discriminator);
        account.layout.encode(value, &mut out)?;
        Ok(out)
    }

    pub fn encode_json(&self, name: &str, json: &serde_json::Value) -> CoderResult<Vec<u8>> {
        let value = self.get(name)?.layout.value_from_json(json)?;
        self.encode(name, &value)
    }

    /// Decode `data` as account `name`, checking its discriminator first.
    pub fn decode(&self, name: &str, data: &[u8]) -> CoderResult<Value> {
        let account = self.get(name)?;
        let disc = &account.discriminator;
        if !data.starts_with(disc) {
            let found = data[..data.len().min(disc.len())].to_vec();
            return Err(DecodeError::DiscriminatorMismatch {
                expected: disc.clone(),
                found,
            }
            .into());
        }
        self.decode_unchecked(name, data)
    }

    /// Decode `data` as account `name` without looking at the
    /// discriminator bytes. They are still skipped.
    pub fn decode_unchecked(&self, name: &str, data: &[u8]) -> CoderResult<Value> {
        let account = self.get(name)?;
        let body = strip_discriminator(data, account.discriminator.len())?;
        Ok(account.layout.decode(body)?)
    }

    /// Decode `data` as whichever account its discriminator names.
    ///
    /// `Ok(None)` when no account discriminator prefixes the data. When
    /// several do, they are tried in declaration order and the first
    /// successful decode wins; if all fail, the first error is returned.
    pub fn decode_any(&self, data: &[u8]) -> CoderResult<Option<DecodedAccount>> {
        let mut first_err = None;
        for name in self.registry.matches(DiscriminatorKind::Account, data) {
            match self.decode_unchecked(name, data) {
                Ok(value) => {
                    return Ok(Some(DecodedAccount {
                        name: name.to_string(),
                        data: value,
                    }))
                }
                Err(err) => {
                    trace!(account = name, error = %err, "candidate account failed to decode");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    /// Filter selecting accounts of type `name`, optionally followed by
    /// `append` at the start of the account body.
    pub fn memcmp(&self, name: &str, append: Option<&[u8]>) -> CoderResult<MemcmpFilter> {
        let mut bytes = self.get(name)?.discriminator.clone();
        if let Some(extra) = append {
            bytes.extend_from_slice(extra);
        }
        Ok(MemcmpFilter {
            offset: 0,
            bytes: bytes.to_base58(),
        })
    }

    /// Nominal account size: discriminator plus the layout's size hint.
    /// Variable-length members count as one byte, so accounts holding
    /// vectors or strings need more space than this.
    pub fn size(&self, name: &str) -> CoderResult<usize> {
        let account = self.get(name)?;
        Ok(account.layout.size_hint().saturating_add(account.discriminator.len()))
    }

    /// Account names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.iter(DiscriminatorKind::Account).map(|(name, _)| name)
    }
}
