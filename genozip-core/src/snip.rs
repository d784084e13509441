//! SNIP opcodes (spec.md §3.1, §4.2). A snip is the byte string a `dict`
//! word_index resolves to; it is either plain text or begins with one of
//! these control opcodes, which the container engine dispatches on during
//! reconstruction (`container.rs`). The opcode byte values are part of the
//! file format and must not be renumbered across versions (spec.md §9
//! "Polymorphism").

use crate::dict_id::DictId;

pub const SNIP_LOOKUP: u8 = 0x01;
pub const SNIP_CONTAINER: u8 = 0x02;
pub const SNIP_SPECIAL: u8 = 0x03;
pub const SNIP_OTHER_DELTA: u8 = 0x04;
pub const SNIP_COPY_BUDDY: u8 = 0x05;
pub const SNIP_DIFF: u8 = 0x06;
pub const SNIP_PAIR_LOOKUP: u8 = 0x07;
/// First byte at or above this value is always plain text — no opcode uses
/// it, so ambiguity with real text beginning with a low byte value is
/// avoided by reserving the low range entirely for opcodes.
pub const SNIP_MAX_OPCODE: u8 = 0x07;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snip {
    /// Plain text snip, emitted as-is.
    Text(Vec<u8>),
    /// Draw the next value from this context's `local`.
    Lookup,
    /// The remainder is a serialized container; reconstruct recursively.
    Container(Vec<u8>),
    /// Dispatch to a per-data-type numbered callback.
    Special(u8),
    /// `other_ctx.last_value + delta`.
    OtherDelta { other: DictId, delta: i64 },
    /// Copy from the `history` slot `delta` lines back.
    CopyBuddy(BuddyKind, u32),
    /// Text diff vs another ctx's last value.
    Diff { other: DictId, ops: Vec<u8> },
    /// In paired FASTQ, draw from the corresponding R1 context.
    PairLookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuddyKind {
    Mate,
    Saggy,
    Both,
}

impl BuddyKind {
    fn to_byte(self) -> u8 {
        match self {
            BuddyKind::Mate => 0,
            BuddyKind::Saggy => 1,
            BuddyKind::Both => 2,
        }
    }

    fn from_byte(b: u8) -> Self {
        match b {
            0 => BuddyKind::Mate,
            1 => BuddyKind::Saggy,
            _ => BuddyKind::Both,
        }
    }
}

impl Snip {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Snip::Text(bytes) => bytes.clone(),
            Snip::Lookup => vec![SNIP_LOOKUP],
            Snip::Container(bytes) => {
                let mut out = vec![SNIP_CONTAINER];
                out.extend_from_slice(bytes);
                out
            }
            Snip::Special(id) => vec![SNIP_SPECIAL, *id],
            Snip::OtherDelta { other, delta } => {
                let mut out = vec![SNIP_OTHER_DELTA];
                out.extend_from_slice(&other.as_u64().to_le_bytes());
                out.extend_from_slice(&delta.to_le_bytes());
                out
            }
            Snip::CopyBuddy(kind, delta) => {
                let mut out = vec![SNIP_COPY_BUDDY, kind.to_byte()];
                out.extend_from_slice(&delta.to_le_bytes());
                out
            }
            Snip::Diff { other, ops } => {
                let mut out = vec![SNIP_DIFF];
                out.extend_from_slice(&other.as_u64().to_le_bytes());
                out.extend_from_slice(ops);
                out
            }
            Snip::PairLookup => vec![SNIP_PAIR_LOOKUP],
        }
    }

    pub fn decode(bytes: &[u8]) -> Snip {
        match bytes.first() {
            Some(&SNIP_LOOKUP) => Snip::Lookup,
            Some(&SNIP_CONTAINER) => Snip::Container(bytes[1..].to_vec()),
            Some(&SNIP_SPECIAL) => Snip::Special(*bytes.get(1).unwrap_or(&0)),
            Some(&SNIP_OTHER_DELTA) => {
                let other = DictId::from_u64(u64::from_le_bytes(bytes[1..9].try_into().unwrap()));
                let delta = i64::from_le_bytes(bytes[9..17].try_into().unwrap());
                Snip::OtherDelta { other, delta }
            }
            Some(&SNIP_COPY_BUDDY) => {
                let kind = BuddyKind::from_byte(bytes[1]);
                let delta = u32::from_le_bytes(bytes[2..6].try_into().unwrap());
                Snip::CopyBuddy(kind, delta)
            }
            Some(&SNIP_DIFF) => {
                let other = DictId::from_u64(u64::from_le_bytes(bytes[1..9].try_into().unwrap()));
                Snip::Diff {
                    other,
                    ops: bytes[9..].to_vec(),
                }
            }
            Some(&SNIP_PAIR_LOOKUP) => Snip::PairLookup,
            _ => Snip::Text(bytes.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_id::DictIdType;

    #[test]
    fn text_snip_round_trips() {
        let s = Snip::Text(b"chr1".to_vec());
        assert_eq!(Snip::decode(&s.encode()), s);
    }

    #[test]
    fn other_delta_round_trips() {
        let other = DictId::new("POS", DictIdType::Field);
        let s = Snip::OtherDelta { other, delta: -17 };
        assert_eq!(Snip::decode(&s.encode()), s);
    }

    #[test]
    fn copy_buddy_round_trips() {
        let s = Snip::CopyBuddy(BuddyKind::Saggy, 2);
        assert_eq!(Snip::decode(&s.encode()), s);
    }

    #[test]
    fn container_snip_round_trips() {
        let s = Snip::Container(vec![1, 2, 3, 4]);
        assert_eq!(Snip::decode(&s.encode()), s);
    }

    #[test]
    fn lookup_and_pair_lookup_round_trip() {
        assert_eq!(Snip::decode(&Snip::Lookup.encode()), Snip::Lookup);
        assert_eq!(Snip::decode(&Snip::PairLookup.encode()), Snip::PairLookup);
    }
}
