//! Event extraction from transaction logs.

use idl_coder_core::coder::{Coder, Event};
use idl_coder_core::pubkey::Pubkey;
use tracing::{trace, warn};

use crate::logs::LogLine;

/// Pulls one program's events out of a transaction's log lines.
///
/// A transaction's logs interleave every program it runs, including
/// programs reached through CPI. The parser follows `invoke` and
/// `success`/`failed` lines to know which program is executing and only
/// decodes payloads emitted while the configured program is on top.
#[derive(Debug, Clone)]
pub struct EventParser<'c> {
    program_id: String,
    coder: &'c Coder,
}

impl<'c> EventParser<'c> {
    pub fn new(program_id: Pubkey, coder: &'c Coder) -> Self {
        Self {
            program_id: program_id.to_string(),
            coder,
        }
    }

    /// Parser for the program at the IDL's `address`, if it declares one.
    pub fn for_idl_address(coder: &'c Coder) -> Option<Self> {
        let address = coder.idl().address.as_deref()?;
        let program_id = address.parse().ok()?;
        Some(Self::new(program_id, coder))
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    /// Every event the program emitted, in log order.
    pub fn parse_logs<S: AsRef<str>>(&self, logs: &[S]) -> Vec<Event> {
        let mut events = Vec::new();
        self.parse_logs_with(logs, |event| events.push(event));
        events
    }

    /// Like [`parse_logs`](Self::parse_logs), handing each event to
    /// `on_event` as it is found.
    ///
    /// Payloads that match an event discriminator but fail to decode are
    /// logged and skipped.
    pub fn parse_logs_with<S, F>(&self, logs: &[S], mut on_event: F)
    where
        S: AsRef<str>,
        F: FnMut(Event),
    {
        let mut stack: Vec<&str> = Vec::new();
        for line in logs {
            let line = LogLine::parse(line.as_ref());
            match line {
                LogLine::Invoke { program, .. } => stack.push(program),
                LogLine::Success { .. } | LogLine::Failed { .. } => {
                    stack.pop();
                }
                _ => {}
            }

            let Some(payload) = line.event_payload() else {
                continue;
            };
            if stack.last() != Some(&self.program_id.as_str()) {
                continue;
            }
            match self.coder.events().decode(payload) {
                Ok(Some(event)) => {
                    trace!(event = %event.name, "decoded event");
                    on_event(event);
                }
                Ok(None) => {}
                Err(err) => warn!(program = %self.program_id, error = %err, "skipping undecodable event"),
            }
        }
    }
}
