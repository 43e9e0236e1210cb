//! Discriminator lookup for accounts, instructions and events.
//!
//! The registry only indexes the discriminators the IDL declares. Names are
//! never hashed here; legacy IDLs get their discriminators filled in by the
//! loader (see [`legacy_discriminator`]).

use std::fmt;

use sha2::{Digest, Sha256};

use crate::idl::Idl;

/// Length of the discriminators Anchor-style programs derive by hashing.
pub const DISCRIMINATOR_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscriminatorKind {
    Account,
    Instruction,
    Event,
}

impl fmt::Display for DiscriminatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscriminatorKind::Account => "account",
            DiscriminatorKind::Instruction => "instruction",
            DiscriminatorKind::Event => "event",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    kind: DiscriminatorKind,
    name: String,
    bytes: Vec<u8>,
}

/// Discriminators of one IDL, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DiscriminatorRegistry {
    entries: Vec<Entry>,
}

impl DiscriminatorRegistry {
    pub fn new(idl: &Idl) -> Self {
        let accounts = idl
            .accounts
            .iter()
            .map(|a| (DiscriminatorKind::Account, &a.name, &a.discriminator));
        let instructions = idl
            .instructions
            .iter()
            .map(|ix| (DiscriminatorKind::Instruction, &ix.name, &ix.discriminator));
        let events = idl
            .events
            .iter()
            .map(|ev| (DiscriminatorKind::Event, &ev.name, &ev.discriminator));

        let entries = accounts
            .chain(instructions)
            .chain(events)
            .map(|(kind, name, bytes)| Entry {
                kind,
                name: name.clone(),
                bytes: bytes.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn discriminator_for(&self, kind: DiscriminatorKind, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .map(|e| e.bytes.as_slice())
    }

    /// First entry, of any kind, whose discriminator prefixes `data`.
    pub fn match_discriminator(&self, data: &[u8]) -> Option<(DiscriminatorKind, &str)> {
        self.entries
            .iter()
            .find(|e| data.starts_with(&e.bytes))
            .map(|e| (e.kind, e.name.as_str()))
    }

    /// First entry of `kind` whose discriminator prefixes `data`.
    pub fn match_kind(&self, kind: DiscriminatorKind, data: &[u8]) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && data.starts_with(&e.bytes))
            .map(|e| e.name.as_str())
    }

    /// Every entry of `kind` whose discriminator prefixes `data`, in
    /// declaration order. More than one only when discriminators collide.
    pub fn matches<'a>(
        &'a self,
        kind: DiscriminatorKind,
        data: &'a [u8],
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.kind == kind && data.starts_with(&e.bytes))
            .map(|e| e.name.as_str())
    }

    /// `(name, discriminator)` pairs of one kind.
    pub fn iter(&self, kind: DiscriminatorKind) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| (e.name.as_str(), e.bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `sha256("<namespace>:<name>")[..8]`, the discriminator older IDLs leave
/// implicit. Namespaces are `account`, `event` and `global` (instructions).
pub fn legacy_discriminator(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}
