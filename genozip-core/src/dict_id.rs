//! `dict_id`: the 64-bit tag that names a [`crate::context::Context`].
//!
//! Contexts never refer to each other through pointers — only through this
//! id, stored in snips and container items (spec.md §9 "Cycles and
//! back-references"). A `DictId` packs a short ASCII name (up to 7 bytes)
//! into the low bytes and a one-nibble `DictIdType` into the top byte's high
//! nibble, matching the "short ASCII name + type nibble" scheme from
//! spec.md §3.1.

use std::fmt;

/// Which namespace a context's name was drawn from. Informational only —
/// it participates in equality because two identically-named FIELD and ATTR
/// contexts must not collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DictIdType {
    Field = 0,
    Item = 1,
    Attr = 2,
    Alias = 3,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DictId(u64);

impl DictId {
    /// Builds a dict_id from a short ASCII name (truncated/padded to 7
    /// bytes) and a type nibble, matching the on-disk packing used by
    /// snips and container items.
    pub fn new(name: &str, kind: DictIdType) -> Self {
        let bytes = name.as_bytes();
        let mut packed: u64 = 0;
        for (i, b) in bytes.iter().take(7).enumerate() {
            packed |= (*b as u64) << (8 * i);
        }
        packed |= (kind as u64) << 60;
        DictId(packed)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        DictId(raw)
    }

    pub fn kind(self) -> DictIdType {
        match (self.0 >> 60) & 0xF {
            0 => DictIdType::Field,
            1 => DictIdType::Item,
            2 => DictIdType::Attr,
            _ => DictIdType::Alias,
        }
    }

    pub fn name(self) -> String {
        let mut s = String::new();
        for i in 0..7 {
            let b = ((self.0 >> (8 * i)) & 0xFF) as u8;
            if b == 0 {
                break;
            }
            s.push(b as char);
        }
        s
    }
}

impl fmt::Debug for DictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DictId({}/{:?})", self.name(), self.kind())
    }
}

impl fmt::Display for DictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
