//! Context system: dict / b250 / local / history (spec.md §3.1, §4.2).
//!
//! A [`Context`] is the per-file, per-`dict_id` container for one logical
//! column. The segmenter calls [`Context::seg`] to append either a new snip
//! (growing `dict`) or a reference to an existing one; the merge phase
//! (`zip.rs`) folds per-VB fragments into the file-global table under a
//! single mutex, per spec.md §4.2.

use crate::dict_id::DictId;
use crate::snip::Snip;
use std::collections::HashMap;

/// Reserved base-250 sentinel values (spec.md §4.2, grounded on
/// `examples/original_source/base250.h`'s `BASE250_*` constants).
pub mod base250 {
    pub const EMPTY_SF: u8 = 250;
    pub const MISSING_SF: u8 = 251;
    pub const ONE_UP: u8 = 252;
    pub const NUM_2: u8 = 253;
    pub const NUM_3: u8 = 254;
    pub const NUM_4: u8 = 255;
    pub const MAX_NUMERAL: u32 = 250;

    /// Encodes a word_index as 1–4 base-250 numerals (the "B250_ENC_8"
    /// scheme), least-significant numeral first after the length marker.
    pub fn encode(n: u32) -> Vec<u8> {
        if n < MAX_NUMERAL {
            return vec![n as u8];
        }
        let mut numerals = Vec::new();
        let mut rem = n;
        while rem > 0 {
            numerals.push((rem % MAX_NUMERAL) as u8);
            rem /= MAX_NUMERAL;
        }
        let marker = match numerals.len() {
            2 => NUM_2,
            3 => NUM_3,
            _ => NUM_4,
        };
        let mut out = vec![marker];
        out.extend_from_slice(&numerals);
        out
    }

    /// Decodes one base-250 word reference starting at `buf[0]`, returning
    /// `(value, bytes_consumed)`.
    pub fn decode(buf: &[u8]) -> (u32, usize) {
        let first = buf[0];
        match first {
            EMPTY_SF | MISSING_SF | ONE_UP => (first as u32, 1),
            NUM_2 | NUM_3 | NUM_4 => {
                let count = match first {
                    NUM_2 => 2,
                    NUM_3 => 3,
                    _ => 4,
                };
                let mut value: u32 = 0;
                for i in 0..count {
                    value += (buf[1 + i] as u32) * MAX_NUMERAL.pow(i as u32);
                }
                (value, 1 + count)
            }
            n => (n as u32, 1),
        }
    }
}

/// A single b250 stream entry: a plain word reference or a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum B250Entry {
    WordIndex(u32),
    EmptySf,
    MissingSf,
    OneUp,
}

impl B250Entry {
    pub fn encode(self) -> Vec<u8> {
        match self {
            B250Entry::WordIndex(n) => base250::encode(n),
            B250Entry::EmptySf => vec![base250::EMPTY_SF],
            B250Entry::MissingSf => vec![base250::MISSING_SF],
            B250Entry::OneUp => vec![base250::ONE_UP],
        }
    }

    pub fn decode_one(buf: &[u8]) -> (B250Entry, usize) {
        let (value, consumed) = base250::decode(buf);
        let entry = match buf[0] {
            base250::EMPTY_SF => B250Entry::EmptySf,
            base250::MISSING_SF => B250Entry::MissingSf,
            base250::ONE_UP => B250Entry::OneUp,
            _ => B250Entry::WordIndex(value),
        };
        (entry, consumed)
    }
}

/// Typed `local` stream (spec.md §4.2's "Storage of local is typed").
#[derive(Debug, Clone, PartialEq)]
pub enum LocalStream {
    Bytes(Vec<u8>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    Bitmap(Vec<bool>),
}

impl Default for LocalStream {
    fn default() -> Self {
        LocalStream::Bytes(Vec::new())
    }
}

impl LocalStream {
    /// Serializes to little-endian bytes, per spec.md §6.1 ("multi-byte
    /// integers inside local streams are little-endian").
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            LocalStream::Bytes(v) | LocalStream::U8(v) => v.clone(),
            LocalStream::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            LocalStream::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            LocalStream::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            LocalStream::Bitmap(v) => {
                let mut out = vec![0u8; v.len().div_ceil(8)];
                for (i, &bit) in v.iter().enumerate() {
                    if bit {
                        out[i / 8] |= 1 << (i % 8);
                    }
                }
                out
            }
        }
    }
}

/// Per-line rolling value used by buddy/mate references (spec.md §4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryValue {
    Int(i64),
    Text(Vec<u8>),
    WordIndex(u32),
}

/// Context flags (spec.md §3.1): 4-bit on-disk flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    pub store_as: bool,
    pub all_the_same: bool,
    pub paired: bool,
    pub store_per_line: bool,
}

impl ContextFlags {
    pub fn to_nibble(self) -> u8 {
        (self.store_as as u8) | ((self.all_the_same as u8) << 1) | ((self.paired as u8) << 2)
            | ((self.store_per_line as u8) << 3)
    }

    pub fn from_nibble(n: u8) -> Self {
        ContextFlags {
            store_as: n & 1 != 0,
            all_the_same: n & 2 != 0,
            paired: n & 4 != 0,
            store_per_line: n & 8 != 0,
        }
    }
}

/// Per-file, per-`dict_id` container for one logical column.
#[derive(Debug, Clone)]
pub struct Context {
    pub dict_id: DictId,
    /// word_index → snip bytes. word_index is the ordinal in this vec.
    pub dict: Vec<Vec<u8>>,
    /// snip bytes → word_index, for O(1) seg-time lookup.
    dict_index: HashMap<Vec<u8>, u32>,
    pub b250: Vec<B250Entry>,
    pub local: LocalStream,
    pub history: Vec<HistoryValue>,
    pub flags: ContextFlags,
    pub last_value: Option<i64>,
}

impl Context {
    pub fn new(dict_id: DictId) -> Self {
        Context {
            dict_id,
            dict: Vec::new(),
            dict_index: HashMap::new(),
            b250: Vec::new(),
            local: LocalStream::default(),
            history: Vec::new(),
            flags: ContextFlags::default(),
            last_value: None,
        }
    }

    /// `seg_by_ctx`: appends a word reference for `snip`, creating a new
    /// dict entry only if this exact snip hasn't been seen before in this
    /// context (spec.md §4.2).
    pub fn seg(&mut self, snip: &Snip) -> u32 {
        let bytes = snip.encode();
        let word_index = match self.dict_index.get(&bytes) {
            Some(&idx) => idx,
            None => {
                let idx = self.dict.len() as u32;
                self.dict.push(bytes.clone());
                self.dict_index.insert(bytes, idx);
                idx
            }
        };
        self.b250.push(B250Entry::WordIndex(word_index));
        word_index
    }

    /// Folds another context's new dict entries into this one (the merge
    /// step of spec.md §2/§4.4). Caller already holds the global lock.
    /// Returns the mapping from the fragment's local word_index to this
    /// context's unified word_index, so the fragment's b250 can be
    /// rewritten if needed.
    pub fn merge_from(&mut self, fragment: &Context) -> Vec<u32> {
        let mut remap = Vec::with_capacity(fragment.dict.len());
        for bytes in &fragment.dict {
            let idx = match self.dict_index.get(bytes) {
                Some(&idx) => idx,
                None => {
                    let idx = self.dict.len() as u32;
                    self.dict.push(bytes.clone());
                    self.dict_index.insert(bytes.clone(), idx);
                    idx
                }
            };
            remap.push(idx);
        }
        remap
    }

    pub fn snip_at(&self, word_index: u32) -> Option<Snip> {
        self.dict.get(word_index as usize).map(|b| Snip::decode(b))
    }

    pub fn push_history(&mut self, value: HistoryValue) {
        self.history.push(value);
    }

    pub fn history_at(&self, line_back: usize) -> Option<&HistoryValue> {
        if line_back == 0 || line_back > self.history.len() {
            return None;
        }
        self.history.get(self.history.len() - line_back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_id::DictIdType;

    fn ctx() -> Context {
        Context::new(DictId::new("CHROM", DictIdType::Field))
    }

    #[test]
    fn base250_single_byte_for_small_values() {
        assert_eq!(base250::encode(5), vec![5]);
        let (v, n) = base250::decode(&[5]);
        assert_eq!((v, n), (5, 1));
    }

    #[test]
    fn base250_multi_numeral_round_trips() {
        for n in [249u32, 250, 1000, 62500, 62501, 5_000_000] {
            let encoded = base250::encode(n);
            let (decoded, consumed) = base250::decode(&encoded);
            assert_eq!(decoded, n, "n={n}");
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn seg_deduplicates_repeated_snips() {
        let mut c = ctx();
        let a = c.seg(&Snip::Text(b"chr1".to_vec()));
        let b = c.seg(&Snip::Text(b"chr2".to_vec()));
        let c2 = c.seg(&Snip::Text(b"chr1".to_vec()));
        assert_eq!(a, c2);
        assert_ne!(a, b);
        assert_eq!(c.dict.len(), 2);
        assert_eq!(c.b250.len(), 3);
    }

    #[test]
    fn b250_roundtrip_matches_segmenter_sequence() {
        let mut c = ctx();
        let words = ["chr1", "chr1", "chr2", "chr3", "chr2"];
        for w in &words {
            c.seg(&Snip::Text(w.as_bytes().to_vec()));
        }
        let mut recovered = Vec::new();
        for entry in &c.b250 {
            if let B250Entry::WordIndex(idx) = entry {
                if let Some(Snip::Text(bytes)) = c.snip_at(*idx) {
                    recovered.push(String::from_utf8(bytes).unwrap());
                }
            }
        }
        assert_eq!(recovered, words);
    }

    #[test]
    fn word_index_assigned_monotonically_increasing_across_merge() {
        let mut global = ctx();
        let mut vb1 = ctx();
        vb1.seg(&Snip::Text(b"a".to_vec()));
        vb1.seg(&Snip::Text(b"b".to_vec()));
        global.merge_from(&vb1);
        assert_eq!(global.dict.len(), 2);

        let mut vb2 = ctx();
        vb2.seg(&Snip::Text(b"b".to_vec()));
        vb2.seg(&Snip::Text(b"c".to_vec()));
        let remap = global.merge_from(&vb2);
        // "b" already existed at index 1; "c" is new and must get an index
        // higher than any index assigned while processing vb1.
        assert_eq!(remap[0], 1);
        assert!(remap[1] >= 2);
    }

    #[test]
    fn history_round_trips_last_value() {
        let mut c = ctx();
        c.push_history(HistoryValue::Int(100));
        c.push_history(HistoryValue::Int(200));
        assert_eq!(c.history_at(1), Some(&HistoryValue::Int(200)));
        assert_eq!(c.history_at(2), Some(&HistoryValue::Int(100)));
        assert_eq!(c.history_at(3), None);
    }

    #[test]
    fn flags_nibble_round_trips() {
        let flags = ContextFlags {
            store_as: true,
            all_the_same: false,
            paired: true,
            store_per_line: true,
        };
        assert_eq!(ContextFlags::from_nibble(flags.to_nibble()), flags);
    }
}
