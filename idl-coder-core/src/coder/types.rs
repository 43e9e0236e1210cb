use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoderError, CoderResult, SchemaError};
use crate::idl::Idl;
use crate::layout::{Layout, LayoutEngine};
use crate::value::Value;

/// Encodes and decodes user-defined types. No discriminator is involved.
#[derive(Debug)]
pub struct TypesCoder {
    idl: Arc<Idl>,
    layouts: HashMap<String, Layout>,
}

impl TypesCoder {
    /// Builds every type that can be coded on its own: not generic and not
    /// an account.
    pub fn new(engine: &LayoutEngine) -> Result<Self, SchemaError> {
        let idl = engine.idl().clone();
        let mut layouts = HashMap::new();
        for ty in &idl.types {
            if !ty.generics.is_empty() || idl.find_account(&ty.name).is_some() {
                continue;
            }
            layouts.insert(ty.name.clone(), engine.build_defined(&ty.name)?);
        }
        Ok(Self { idl, layouts })
    }

    pub fn layout(&self, name: &str) -> CoderResult<&Layout> {
        if let Some(layout) = self.layouts.get(name) {
            return Ok(layout);
        }
        let name = name.to_string();
        Err(if self.idl.find_account(&name).is_some() {
            CoderError::AccountAsType { name }
        } else if self.idl.find_type(&name).is_some() {
            CoderError::GenericType { name }
        } else {
            CoderError::UnknownType { name }
        })
    }

    pub fn encode(&self, name: &str, value: &Value) -> CoderResult<Vec<u8>> {
        Ok(self.layout(name)?.encode_to_vec(value)?)
    }

    pub fn encode_json(&self, name: &str, json: &serde_json::Value) -> CoderResult<Vec<u8>> {
        let layout = self.layout(name)?;
        let value = layout.value_from_json(json)?;
        Ok(layout.encode_to_vec(&value)?)
    }

    pub fn decode(&self, name: &str, data: &[u8]) -> CoderResult<Value> {
        Ok(self.layout(name)?.decode(data)?)
    }

    /// Nominal encoded size, see [`Layout::size_hint`].
    pub fn size(&self, name: &str) -> CoderResult<usize> {
        Ok(self.layout(name)?.size_hint())
    }
}
