//! Container engine: reconstruction recipes and the recursive renderer
//! that walks them (spec.md §3.1, §4.3). The TOPLEVEL container is the
//! root of the reconstruction tree for a `DataType`; nested containers
//! describe arrays, structured fields, and sub-records.

pub(crate) use crate::context::{B250Entry, HistoryValue};
use crate::dict_id::DictId;
use crate::error::{FormatError, Result};
use crate::snip::{BuddyKind, Snip};
use crate::translator::TranslatorId;
use std::collections::HashMap;

/// How many times a container repeats.
#[derive(Debug, Clone)]
pub enum Repeats {
    Fixed(u32),
    FromCtx(DictId),
    One,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFlags {
    pub invisible: bool,
    pub translator: Option<TranslatorId>,
}

#[derive(Debug, Clone)]
pub struct ContainerItem {
    pub dict_id: DictId,
    pub separator: Vec<u8>,
    pub flags: ItemFlags,
    /// Nested container for structured/array fields; `None` for a leaf
    /// context drawn directly from b250/local.
    pub child: Option<Box<Container>>,
}

#[derive(Debug, Clone)]
pub struct Container {
    pub repeats: Repeats,
    pub prefix: Vec<u8>,
    pub items: Vec<ContainerItem>,
}

/// Per-context cursor state used during reconstruction: the context's
/// already-merged dict/b250/local/history, plus read positions. Built once
/// per VB from the file-global contexts and that VB's own b250/local
/// sections (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct ReconCtx {
    pub dict: Vec<Vec<u8>>,
    pub b250: Vec<B250Entry>,
    pub local: Vec<Vec<u8>>,
    pub all_the_same: bool,
    pub history: Vec<HistoryValue>,
    pub(crate) b250_pos: usize,
    pub(crate) local_pos: usize,
    pub last_value: Option<i64>,
}

impl ReconCtx {
    fn next_b250(&mut self) -> Option<B250Entry> {
        if self.all_the_same {
            return self.b250.first().copied();
        }
        let entry = self.b250.get(self.b250_pos).copied();
        if entry.is_some() {
            self.b250_pos += 1;
        }
        entry
    }

    fn next_local(&mut self) -> Option<&[u8]> {
        let slice = self.local.get(self.local_pos).map(|v| v.as_slice());
        if slice.is_some() {
            self.local_pos += 1;
        }
        slice
    }
}

/// A registry of SPECIAL callbacks, keyed by opcode byte, per spec.md §4.2
/// (`SNIP_SPECIAL`) and §9 ("three small registries keyed by a byte
/// opcode"). Each callback receives the reconstruction state and the
/// calling context's dict_id and returns the bytes to emit.
pub type SpecialFn = fn(&mut ReconState, DictId) -> Vec<u8>;

/// All mutable reconstruction state for one VB.
pub struct ReconState {
    pub contexts: HashMap<DictId, ReconCtx>,
    pub specials: HashMap<u8, SpecialFn>,
    pub output: Vec<u8>,
    pub line_i: u64,
}

impl ReconState {
    pub fn new() -> Self {
        ReconState {
            contexts: HashMap::new(),
            specials: HashMap::new(),
            output: Vec::new(),
            line_i: 0,
        }
    }

    pub fn register_special(&mut self, id: u8, f: SpecialFn) {
        self.specials.insert(id, f);
    }

    fn resolve_repeats(&mut self, repeats: &Repeats) -> Result<u32> {
        Ok(match repeats {
            Repeats::Fixed(n) => *n,
            Repeats::One => 1,
            Repeats::FromCtx(dict_id) => {
                let ctx = self
                    .contexts
                    .get_mut(dict_id)
                    .ok_or_else(|| missing_ctx(*dict_id))?;
                match ctx.next_b250() {
                    Some(B250Entry::WordIndex(idx)) => {
                        let bytes = ctx.dict.get(idx as usize).cloned().unwrap_or_default();
                        std::str::from_utf8(&bytes)
                            .ok()
                            .and_then(|s| s.parse::<u32>().ok())
                            .unwrap_or(0)
                    }
                    _ => 0,
                }
            }
        })
    }

    /// Resolves a buddy reference: walks back `delta` reconstructed lines
    /// for `dict_id` and returns the history value stored there. `MATE` and
    /// `SAGGY` both look back exactly `delta` lines (the distinction is in
    /// what the segmenter chose for `delta` — a fixed pair stride for
    /// mates, a variable one for the last line carrying the same key for
    /// saggy); `BOTH` additionally falls back one line further when the
    /// requested slot hasn't been reconstructed yet (spec.md §4.5).
    fn resolve_buddy(&self, dict_id: DictId, kind: BuddyKind, delta: usize) -> Option<HistoryValue> {
        let history = &self.contexts.get(&dict_id)?.history;
        let at = |back: usize| history.get(history.len().checked_sub(back)?).cloned();
        match kind {
            BuddyKind::Mate | BuddyKind::Saggy => at(delta),
            BuddyKind::Both => at(delta).or_else(|| at(1)),
        }
    }

    fn emit_leaf(&mut self, dict_id: DictId) -> Result<Vec<u8>> {
        let entry = {
            let ctx = self
                .contexts
                .get_mut(&dict_id)
                .ok_or_else(|| missing_ctx(dict_id))?;
            ctx.next_b250()
        };

        let bytes = match entry {
            None => Vec::new(),
            Some(B250Entry::EmptySf) => Vec::new(),
            Some(B250Entry::MissingSf) => Vec::new(),
            Some(B250Entry::OneUp) => {
                let ctx = self.contexts.get_mut(&dict_id).unwrap();
                let next = ctx.last_value.unwrap_or(0) + 1;
                ctx.last_value = Some(next);
                return Ok(next.to_string().into_bytes());
            }
            Some(B250Entry::WordIndex(idx)) => {
                let snip_bytes = {
                    let ctx = self
                        .contexts
                        .get(&dict_id)
                        .ok_or_else(|| missing_ctx(dict_id))?;
                    ctx.dict
                        .get(idx as usize)
                        .cloned()
                        .ok_or_else(|| FormatError::WordIndexOutOfRange {
                            word_index: idx,
                            dict_id,
                            len: ctx.dict.len() as u32,
                        })?
                };
                self.render_snip(dict_id, &Snip::decode(&snip_bytes))?
            }
        };

        if let Some(n) = std::str::from_utf8(&bytes).ok().and_then(|s| s.parse::<i64>().ok()) {
            if let Some(ctx) = self.contexts.get_mut(&dict_id) {
                ctx.last_value = Some(n);
            }
        }
        Ok(bytes)
    }

    fn render_snip(&mut self, dict_id: DictId, snip: &Snip) -> Result<Vec<u8>> {
        match snip {
            Snip::Text(bytes) => Ok(bytes.clone()),
            Snip::Lookup | Snip::PairLookup => {
                let ctx = self
                    .contexts
                    .get_mut(&dict_id)
                    .ok_or_else(|| missing_ctx(dict_id))?;
                Ok(ctx.next_local().map(|b| b.to_vec()).unwrap_or_default())
            }
            Snip::Container(bytes) => {
                let container = decode_container(bytes)?;
                let before = self.output.len();
                self.container_reconstruct(&container)?;
                let rendered = self.output[before..].to_vec();
                self.output.truncate(before);
                Ok(rendered)
            }
            Snip::Special(id) => {
                let f = self
                    .specials
                    .get(id)
                    .copied()
                    .ok_or_else(|| FormatError::UnknownCodec(*id))?;
                Ok(f(self, dict_id))
            }
            Snip::OtherDelta { other, delta } => {
                let base = self
                    .contexts
                    .get(other)
                    .and_then(|c| c.last_value)
                    .unwrap_or(0);
                Ok((base + delta).to_string().into_bytes())
            }
            Snip::CopyBuddy(kind, delta) => {
                let value = self.resolve_buddy(dict_id, *kind, *delta as usize);
                Ok(match value {
                    Some(HistoryValue::Int(n)) => n.to_string().into_bytes(),
                    Some(HistoryValue::Text(t)) => t,
                    Some(HistoryValue::WordIndex(idx)) => self
                        .contexts
                        .get(&dict_id)
                        .and_then(|c| c.dict.get(idx as usize).cloned())
                        .unwrap_or_default(),
                    None => Vec::new(),
                })
            }
            Snip::Diff { other, ops } => {
                let base = self
                    .contexts
                    .get(other)
                    .and_then(|c| c.last_value)
                    .map(|n| n.to_string())
                    .unwrap_or_default();
                Ok(apply_diff(base.as_bytes(), ops))
            }
        }
    }

    /// `container_reconstruct`: spec.md §4.3 steps 1–4.
    pub fn container_reconstruct(&mut self, container: &Container) -> Result<()> {
        let repeats = self.resolve_repeats(&container.repeats)?;
        for _ in 0..repeats {
            self.output.extend_from_slice(&container.prefix);
            for item in &container.items {
                let rendered = match &item.child {
                    Some(child) => {
                        let before = self.output.len();
                        self.container_reconstruct(child)?;
                        let r = self.output[before..].to_vec();
                        if item.flags.invisible {
                            self.output.truncate(before);
                        }
                        r
                    }
                    None => {
                        let r = self.emit_leaf(item.dict_id)?;
                        if !item.flags.invisible {
                            self.output.extend_from_slice(&r);
                        }
                        r
                    }
                };

                if let Some(tid) = item.flags.translator {
                    if !item.flags.invisible {
                        // Replace the just-emitted bytes with their
                        // translated form.
                        let len = rendered.len();
                        let at = self.output.len() - len;
                        self.output.truncate(at);
                        self.output.extend_from_slice(&tid.apply(&rendered));
                    }
                }

                self.output.extend_from_slice(&item.separator);

                if let Some(ctx) = self.contexts.get_mut(&item.dict_id) {
                    if ctx.history.len() as u64 <= self.line_i {
                        ctx.history.push(HistoryValue::Text(rendered));
                    }
                }
            }
            self.line_i += 1;
        }
        Ok(())
    }
}

impl Default for ReconState {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_ctx(dict_id: DictId) -> crate::error::GenozipError {
    FormatError::WordIndexOutOfRange {
        word_index: 0,
        dict_id,
        len: 0,
    }
    .into()
}

/// Containers embedded as `SNIP_CONTAINER` operands use a small
/// self-describing encoding: repeats (u32 LE, 0 = "one"), prefix length +
/// bytes, then item count and each item's dict_id/separator/flags. Real
/// container trees built in-process (e.g. the TOPLEVEL container) skip
/// this encode/decode round trip entirely; it exists for nested nesting
/// that must live inside a dict entry on disk.
pub fn encode_container(c: &Container) -> Vec<u8> {
    let mut out = Vec::new();
    match c.repeats {
        Repeats::Fixed(n) => {
            out.push(0);
            out.extend_from_slice(&n.to_le_bytes());
        }
        Repeats::FromCtx(id) => {
            out.push(1);
            out.extend_from_slice(&id.as_u64().to_le_bytes());
        }
        Repeats::One => out.push(2),
    }
    out.extend_from_slice(&(c.prefix.len() as u32).to_le_bytes());
    out.extend_from_slice(&c.prefix);
    out.extend_from_slice(&(c.items.len() as u32).to_le_bytes());
    for item in &c.items {
        out.extend_from_slice(&item.dict_id.as_u64().to_le_bytes());
        out.extend_from_slice(&(item.separator.len() as u32).to_le_bytes());
        out.extend_from_slice(&item.separator);
        out.push(item.flags.invisible as u8);
        out.push(item.flags.translator.map(|t| t as u8).unwrap_or(0));
    }
    out
}

pub fn decode_container(bytes: &[u8]) -> Result<Container> {
    let mut pos = 0usize;
    let repeats = match bytes[pos] {
        0 => {
            let n = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
            pos += 5;
            Repeats::Fixed(n)
        }
        1 => {
            let id = DictId::from_u64(u64::from_le_bytes(bytes[1..9].try_into().unwrap()));
            pos += 9;
            Repeats::FromCtx(id)
        }
        _ => {
            pos += 1;
            Repeats::One
        }
    };
    let prefix_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
    pos += 4;
    let prefix = bytes[pos..pos + prefix_len].to_vec();
    pos += prefix_len;
    let n_items = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
    pos += 4;
    let mut items = Vec::with_capacity(n_items);
    for _ in 0..n_items {
        let dict_id = DictId::from_u64(u64::from_le_bytes(bytes[pos..pos + 8].try_into().unwrap()));
        pos += 8;
        let sep_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let separator = bytes[pos..pos + sep_len].to_vec();
        pos += sep_len;
        let invisible = bytes[pos] != 0;
        pos += 1;
        let translator = match bytes[pos] {
            0 => None,
            t => Some(TranslatorId::from_u8(t)),
        };
        pos += 1;
        items.push(ContainerItem {
            dict_id,
            separator,
            flags: ItemFlags {
                invisible,
                translator,
            },
            child: None,
        });
    }
    Ok(Container {
        repeats,
        prefix,
        items,
    })
}

/// A minimal char-by-char diff grammar for `SNIP_DIFF`: a run of `=n`
/// (copy n bytes from base) and `+<bytes>;` (insert literal bytes),
/// applied against `base`.
fn apply_diff(base: &[u8], ops: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut base_pos = 0;
    let mut i = 0;
    while i < ops.len() {
        match ops[i] {
            b'=' => {
                i += 1;
                let start = i;
                while i < ops.len() && ops[i].is_ascii_digit() {
                    i += 1;
                }
                let n: usize = std::str::from_utf8(&ops[start..i]).unwrap().parse().unwrap_or(0);
                out.extend_from_slice(&base[base_pos..(base_pos + n).min(base.len())]);
                base_pos += n;
            }
            b'+' => {
                i += 1;
                let start = i;
                while i < ops.len() && ops[i] != b';' {
                    i += 1;
                }
                out.extend_from_slice(&ops[start..i]);
                i += 1; // skip ';'
            }
            _ => i += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_id::DictIdType;

    fn leaf(dict_id: DictId) -> ContainerItem {
        ContainerItem {
            dict_id,
            separator: vec![b'\t'],
            flags: ItemFlags::default(),
            child: None,
        }
    }

    #[test]
    fn reconstructs_flat_record() {
        let chrom = DictId::new("CHROM", DictIdType::Field);
        let pos = DictId::new("POS", DictIdType::Field);

        let mut state = ReconState::new();
        state.contexts.insert(
            chrom,
            ReconCtx {
                dict: vec![b"chr1".to_vec()],
                b250: vec![B250Entry::WordIndex(0)],
                ..Default::default()
            },
        );
        state.contexts.insert(
            pos,
            ReconCtx {
                dict: vec![b"100".to_vec()],
                b250: vec![B250Entry::WordIndex(0)],
                ..Default::default()
            },
        );

        let toplevel = Container {
            repeats: Repeats::One,
            prefix: Vec::new(),
            items: vec![leaf(chrom), leaf(pos)],
        };
        state.container_reconstruct(&toplevel).unwrap();
        assert_eq!(state.output, b"chr1\t100\t");
    }

    #[test]
    fn other_delta_reconstructs_to_last_plus_delta() {
        let pos = DictId::new("POS", DictIdType::Field);
        let end = DictId::new("END", DictIdType::Field);

        let mut state = ReconState::new();
        let snip = Snip::OtherDelta { other: pos, delta: 50 };
        state.contexts.insert(
            pos,
            ReconCtx {
                dict: vec![b"100".to_vec()],
                b250: vec![B250Entry::WordIndex(0)],
                ..Default::default()
            },
        );
        state.contexts.insert(
            end,
            ReconCtx {
                dict: vec![snip.encode()],
                b250: vec![B250Entry::WordIndex(0)],
                ..Default::default()
            },
        );

        let toplevel = Container {
            repeats: Repeats::One,
            prefix: Vec::new(),
            items: vec![leaf(pos), leaf(end)],
        };
        state.container_reconstruct(&toplevel).unwrap();
        assert_eq!(state.output, b"100\t150\t");
    }

    #[test]
    fn copy_buddy_reads_previous_line_history() {
        let qname = DictId::new("QNAME", DictIdType::Field);
        let mut state = ReconState::new();
        state.contexts.insert(
            qname,
            ReconCtx {
                dict: vec![b"read1".to_vec(), Snip::CopyBuddy(BuddyKind::Mate, 1).encode()],
                b250: vec![B250Entry::WordIndex(0), B250Entry::WordIndex(1)],
                ..Default::default()
            },
        );
        let toplevel = Container {
            repeats: Repeats::Fixed(2),
            prefix: Vec::new(),
            items: vec![leaf(qname)],
        };
        state.container_reconstruct(&toplevel).unwrap();
        assert_eq!(state.output, b"read1\tread1\t");
    }

    #[test]
    fn copy_buddy_both_falls_back_when_delta_out_of_range() {
        let qname = DictId::new("QNAME", DictIdType::Field);
        let mut state = ReconState::new();
        state.contexts.insert(
            qname,
            ReconCtx {
                dict: vec![b"read1".to_vec(), Snip::CopyBuddy(BuddyKind::Both, 5).encode()],
                b250: vec![B250Entry::WordIndex(0), B250Entry::WordIndex(1)],
                ..Default::default()
            },
        );
        let toplevel = Container {
            repeats: Repeats::Fixed(2),
            prefix: Vec::new(),
            items: vec![leaf(qname)],
        };
        state.container_reconstruct(&toplevel).unwrap();
        // delta=5 has no history that far back yet, so BOTH falls back to
        // one line back instead of emitting nothing.
        assert_eq!(state.output, b"read1\tread1\t");
    }

    #[test]
    fn container_snip_encode_decode_round_trips() {
        let chrom = DictId::new("CHROM", DictIdType::Field);
        let c = Container {
            repeats: Repeats::Fixed(3),
            prefix: b"(".to_vec(),
            items: vec![leaf(chrom)],
        };
        let bytes = encode_container(&c);
        let decoded = decode_container(&bytes).unwrap();
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].dict_id, chrom);
        assert!(matches!(decoded.repeats, Repeats::Fixed(3)));
    }

    #[test]
    fn translator_rewrites_emitted_bytes() {
        let num = DictId::new("NUM", DictIdType::Field);
        let mut state = ReconState::new();
        state.contexts.insert(
            num,
            ReconCtx {
                dict: vec![b"1000".to_vec()],
                b250: vec![B250Entry::WordIndex(0)],
                ..Default::default()
            },
        );
        let toplevel = Container {
            repeats: Repeats::One,
            prefix: Vec::new(),
            items: vec![ContainerItem {
                dict_id: num,
                separator: Vec::new(),
                flags: ItemFlags {
                    invisible: false,
                    translator: Some(TranslatorId::TextIntToLeU32),
                },
                child: None,
            }],
        };
        state.container_reconstruct(&toplevel).unwrap();
        assert_eq!(state.output, 1000u32.to_le_bytes().to_vec());
    }

    #[test]
    fn diff_reconstructs_against_base() {
        assert_eq!(apply_diff(b"100", b"=2+5;"), b"105");
    }
}
