//! `DataType` plugin seam (spec.md §9, "Inheritance / per-format
//! segmenters"): per-format field logic is explicitly out of core scope,
//! but the core must expose a contract a segmenter plugs into — how a line
//! of text is turned into context pushes during ZIP, and what container
//! shape the core walks to reconstruct it during PIZ. [`Generic`] is the
//! one concrete implementation the core carries itself, used both as the
//! fallback for unrecognized input and as the reference plugin exercised
//! by the pipeline tests.

use crate::container::{Container, ContainerItem, ItemFlags, Repeats};
use crate::dict_id::{DictId, DictIdType};
use crate::snip::Snip;
use crate::vb::VBlock;

/// A per-format segmenter/reconstructor pair. ZIP calls [`segment_line`] once
/// per input line to populate that VB's contexts; PIZ calls [`toplevel`] once
/// per VB to get the container tree the reconstruction engine walks.
///
/// [`segment_line`]: DataType::segment_line
pub trait DataType: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pushes one line's fields into `vb`'s contexts (spec.md §3.3, seg
    /// phase). Returns nothing: contexts are populated in place and picked
    /// up by the merge phase.
    fn segment_line(&self, line: &[u8], vb: &mut VBlock);

    /// The reconstruction recipe for a VB of `num_lines` records.
    fn toplevel(&self, num_lines: u32) -> Container;
}

/// Tab-separated generic format: no field semantics, just "split on tabs,
/// store the tail and the rest separately so the trailing separator is
/// exact" (spec.md §9's catch-all for unrecognized input; also the
/// reference plugin used by the core's own pipeline tests, since it needs
/// no domain knowledge to segment or reconstruct).
pub struct Generic;

impl Generic {
    pub fn num_fields_minus_one_id() -> DictId {
        DictId::new("NFLDM1", DictIdType::Field)
    }
    pub fn field_id() -> DictId {
        DictId::new("FIELD", DictIdType::Field)
    }
    pub fn last_field_id() -> DictId {
        DictId::new("LAST", DictIdType::Field)
    }
}

impl DataType for Generic {
    fn name(&self) -> &'static str {
        "GENERIC"
    }

    fn segment_line(&self, line: &[u8], vb: &mut VBlock) {
        let fields: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();
        let n_minus_one = fields.len() - 1;
        vb.context_mut(Self::num_fields_minus_one_id())
            .seg(&Snip::Text(n_minus_one.to_string().into_bytes()));
        for field in &fields[..n_minus_one] {
            vb.context_mut(Self::field_id())
                .seg(&Snip::Text(field.to_vec()));
        }
        vb.context_mut(Self::last_field_id())
            .seg(&Snip::Text(fields[n_minus_one].to_vec()));
    }

    fn toplevel(&self, num_lines: u32) -> Container {
        let fields_repeat = Container {
            repeats: Repeats::FromCtx(Self::num_fields_minus_one_id()),
            prefix: Vec::new(),
            items: vec![ContainerItem {
                dict_id: Self::field_id(),
                separator: vec![b'\t'],
                flags: ItemFlags::default(),
                child: None,
            }],
        };

        let line = Container {
            repeats: Repeats::One,
            prefix: Vec::new(),
            items: vec![
                ContainerItem {
                    dict_id: Self::num_fields_minus_one_id(),
                    separator: Vec::new(),
                    flags: ItemFlags {
                        invisible: true,
                        translator: None,
                    },
                    child: Some(Box::new(fields_repeat)),
                },
                ContainerItem {
                    dict_id: Self::last_field_id(),
                    separator: vec![b'\n'],
                    flags: ItemFlags::default(),
                    child: None,
                },
            ],
        };

        Container {
            repeats: Repeats::Fixed(num_lines),
            prefix: Vec::new(),
            items: vec![ContainerItem {
                dict_id: Self::last_field_id(),
                separator: Vec::new(),
                flags: ItemFlags {
                    invisible: true,
                    translator: None,
                },
                child: Some(Box::new(line)),
            }],
        }
    }
}
