//! The Variable Block (VB): the unit of parallelism (spec.md §3.1, §3.3).
//! A VB owns its raw text, its per-context arenas, and its compressed
//! z-data; it is allocated from a pool sized to `max_threads` and reused
//! after release, the way the teacher's `Bz2Decoder` reuses per-thread
//! scratch buffers (`parallel_bzip2/src/decoder.rs`) rather than allocating
//! per block.

use crate::context::Context;
use crate::dict_id::DictId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct VBlock {
    pub vblock_i: u32,
    pub first_line: u64,
    pub num_lines: u32,
    /// Raw input text for this VB (ZIP) or reconstructed output (PIZ).
    pub txt_data: Vec<u8>,
    /// Contexts touched by this VB, lazily created on first touch by the
    /// segmenter (spec.md §3.3).
    pub contexts: HashMap<DictId, Context>,
    /// Compressed section bodies, appended in order, ready to be written
    /// to the output file as-is by the writer thread.
    pub z_data: Vec<u8>,
}

impl VBlock {
    pub fn new(vblock_i: u32) -> Self {
        VBlock {
            vblock_i,
            ..Default::default()
        }
    }

    pub fn context_mut(&mut self, dict_id: DictId) -> &mut Context {
        self.contexts.entry(dict_id).or_insert_with(|| Context::new(dict_id))
    }

    /// Resets this VB so it can be reused for a different `vblock_i`,
    /// keeping the allocated capacity of its buffers.
    pub fn reset(&mut self, vblock_i: u32) {
        self.vblock_i = vblock_i;
        self.first_line = 0;
        self.num_lines = 0;
        self.txt_data.clear();
        self.contexts.clear();
        self.z_data.clear();
    }
}

/// A pool of reusable VBs, sized to `max_threads` (spec.md §3.3). Workers
/// check one out, fill it, and return it on release; avoids allocator
/// pressure across VBs the way the teacher pools decompression scratch
/// buffers per-thread in `try_for_each_init`.
pub struct VbPool {
    free: Mutex<Vec<VBlock>>,
}

impl VbPool {
    pub fn new(max_threads: usize) -> Self {
        let free = (0..max_threads).map(|_| VBlock::default()).collect();
        VbPool {
            free: Mutex::new(free),
        }
    }

    pub fn acquire(&self, vblock_i: u32) -> VBlock {
        let mut guard = self.free.lock().unwrap();
        match guard.pop() {
            Some(mut vb) => {
                vb.reset(vblock_i);
                vb
            }
            None => VBlock::new(vblock_i),
        }
    }

    pub fn release(&self, vb: VBlock) {
        self.free.lock().unwrap().push(vb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_id::DictIdType;

    #[test]
    fn pool_reuses_released_blocks() {
        let pool = VbPool::new(2);
        let vb = pool.acquire(1);
        pool.release(vb);
        let vb2 = pool.acquire(2);
        assert_eq!(vb2.vblock_i, 2);
        assert!(vb2.txt_data.is_empty());
    }

    #[test]
    fn context_mut_lazily_creates_on_first_touch() {
        let mut vb = VBlock::new(1);
        assert!(vb.contexts.is_empty());
        let dict_id = DictId::new("CHROM", DictIdType::Field);
        vb.context_mut(dict_id);
        assert_eq!(vb.contexts.len(), 1);
    }

    #[test]
    fn reset_clears_but_does_not_deallocate() {
        let mut vb = VBlock::new(1);
        vb.txt_data.extend_from_slice(b"some data");
        let cap_before = vb.txt_data.capacity();
        vb.reset(2);
        assert!(vb.txt_data.is_empty());
        assert_eq!(vb.txt_data.capacity(), cap_before);
    }
}
