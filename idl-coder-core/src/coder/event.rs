use std::collections::HashMap;
use std::sync::Arc;

use base58::FromBase58;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::trace;

use super::strip_discriminator;
use crate::discriminator::{DiscriminatorKind, DiscriminatorRegistry};
use crate::error::{CoderError, CoderResult, SchemaError};
use crate::layout::{Layout, LayoutEngine};
use crate::value::Value;

/// Leading bytes of the self-invoked instruction a program uses to emit an
/// event through CPI (little-endian `0x1d9acb512ea545e4`).
pub const EVENT_IX_TAG: [u8; 8] = 0x1d9a_cb51_2ea5_45e4u64.to_le_bytes();

/// Decodes events emitted in program logs as
/// `Program data: <base64(discriminator ++ fields)>`.
#[derive(Debug)]
pub struct EventCoder {
    layouts: HashMap<String, EventLayout>,
    registry: Arc<DiscriminatorRegistry>,
}

#[derive(Debug)]
struct EventLayout {
    discriminator: Vec<u8>,
    layout: Layout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub data: Value,
}

impl EventCoder {
    pub fn new(engine: &LayoutEngine, registry: Arc<DiscriminatorRegistry>) -> Result<Self, SchemaError> {
        let mut layouts = HashMap::new();
        let idl = engine.idl();
        for event in &idl.events {
            let layout = match &event.fields {
                Some(fields) => Layout::Struct(engine.build_fields(&event.name, fields)?),
                None if idl.find_type(&event.name).is_none() => {
                    return Err(SchemaError::MissingBody {
                        kind: "event",
                        name: event.name.clone(),
                    })
                }
                None => engine.build_defined(&event.name)?,
            };
            layouts.insert(
                event.name.clone(),
                EventLayout {
                    discriminator: event.discriminator.clone(),
                    layout,
                },
            );
        }
        Ok(Self { layouts, registry })
    }

    fn get(&self, name: &str) -> CoderResult<&EventLayout> {
        self.layouts.get(name).ok_or_else(|| CoderError::UnknownEvent {
            name: name.to_string(),
        })
    }

    /// Decode a log payload.
    ///
    /// The payload is either base64 event data or base58 CPI event
    /// instruction data (tagged with [`EVENT_IX_TAG`]). `Ok(None)` when it
    /// is neither, or when no event discriminator matches.
    pub fn decode(&self, log: &str) -> CoderResult<Option<Event>> {
        if let Some(data) = cpi_event_data(log) {
            return self.decode_bytes(&data);
        }
        match STANDARD.decode(log) {
            Ok(data) => self.decode_bytes(&data),
            Err(_) => Ok(None),
        }
    }

    /// Decode raw event bytes: discriminator followed by the event fields.
    pub fn decode_bytes(&self, data: &[u8]) -> CoderResult<Option<Event>> {
        let mut first_err = None;
        for name in self.registry.matches(DiscriminatorKind::Event, data) {
            let decoded = self.get(name).and_then(|event| {
                let body = strip_discriminator(data, event.discriminator.len())?;
                Ok(event.layout.decode(body)?)
            });
            match decoded {
                Ok(value) => {
                    return Ok(Some(Event {
                        name: name.to_string(),
                        data: value,
                    }))
                }
                Err(err) => {
                    trace!(event = name, error = %err, "candidate event failed to decode");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    /// Encode event `name` as the bytes a program would log.
    pub fn encode(&self, name: &str, value: &Value) -> CoderResult<Vec<u8>> {
        let event = self.get(name)?;
        let mut out = event.discriminator.clone();
        event.layout.encode(value, &mut out)?;
        Ok(out)
    }

    /// Encode event `name` as a base64 log payload.
    pub fn encode_log(&self, name: &str, value: &Value) -> CoderResult<String> {
        Ok(STANDARD.encode(self.encode(name, value)?))
    }
}

fn cpi_event_data(log: &str) -> Option<Vec<u8>> {
    let bytes = log.from_base58().ok()?;
    bytes.strip_prefix(&EVENT_IX_TAG[..]).map(|rest| rest.to_vec())
}
