//! Reference and refhash subsystem (spec.md §4.6). The reference
//! represents the genome as per-contig `Range`s, each a 2-bit packed
//! sequence plus an `is_set` bitmap; ranges expose both `(chrom, pos)` and
//! `gpos` (global position) coordinates. The refhash is a layered
//! open-addressed k-mer index used by the alignment-based SEQ codec.

use crate::digest::DigestValue;
use crate::error::{ReferenceError, Result};

/// A contiguous run of reference bases for one contig.
#[derive(Debug, Clone)]
pub struct Range {
    pub chrom: String,
    pub gpos_start: u64,
    /// 2-bit packed bases (A=0,C=1,G=2,T=3), 4 per byte.
    packed: Vec<u8>,
    /// 1 bit per base: has this base actually been observed/set.
    is_set: Vec<u8>,
    pub len: u64,
}

impl Range {
    pub fn new(chrom: &str, gpos_start: u64, len: u64) -> Self {
        Range {
            chrom: chrom.to_string(),
            gpos_start,
            packed: vec![0u8; (len as usize).div_ceil(4)],
            is_set: vec![0u8; (len as usize).div_ceil(8)],
            len,
        }
    }

    fn base_bits(b: u8) -> u8 {
        match b.to_ascii_uppercase() {
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => 0, // A, and any other base still occupies a 2-bit slot
        }
    }

    fn bits_base(bits: u8) -> u8 {
        match bits & 3 {
            1 => b'C',
            2 => b'G',
            3 => b'T',
            _ => b'A',
        }
    }

    /// Sets base at local position `pos` (within this range), guarded by
    /// the per-range lock the caller is expected to hold for
    /// `[gpos_start, gpos_start+len)` (spec.md §5).
    pub fn set_base(&mut self, pos: u64, base: u8) {
        let pos = pos as usize;
        self.packed[pos / 4] |= Self::base_bits(base) << ((pos % 4) * 2);
        self.is_set[pos / 8] |= 1 << (pos % 8);
    }

    pub fn is_set(&self, pos: u64) -> bool {
        let pos = pos as usize;
        self.is_set[pos / 8] & (1 << (pos % 8)) != 0
    }

    /// Returns the base at `pos`, or a [`ReferenceError::BaseNotSet`] if
    /// the invariant "reference bases marked is_set=0 must never be
    /// consulted" (spec.md §3.2) would otherwise be violated.
    pub fn base_at(&self, pos: u64) -> Result<u8> {
        if !self.is_set(pos) {
            return Err(ReferenceError::BaseNotSet(self.gpos_start + pos).into());
        }
        let bits = (self.packed[pos as usize / 4] >> ((pos as usize % 4) * 2)) & 3;
        Ok(Self::bits_base(bits))
    }

    pub fn gpos_at(&self, pos: u64) -> u64 {
        self.gpos_start + pos
    }
}

/// Lifecycle selector for how the reference was obtained (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    /// Loaded from an auxiliary genozip-REF file; verified by genome digest.
    External,
    /// Synthesized from the input itself, by both ZIP and PIZ.
    Internal,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub source: ReferenceSource,
    pub ranges: Vec<Range>,
    pub genome_digest: Option<DigestValue>,
}

impl Reference {
    pub fn new(source: ReferenceSource) -> Self {
        Reference {
            source,
            ranges: Vec::new(),
            genome_digest: None,
        }
    }

    pub fn find_range(&self, chrom: &str) -> Option<&Range> {
        self.ranges.iter().find(|r| r.chrom == chrom)
    }

    pub fn find_range_mut(&mut self, chrom: &str) -> Option<&mut Range> {
        self.ranges.iter_mut().find(|r| r.chrom == chrom)
    }

    /// Verifies the loaded (external) reference's genome digest against the
    /// one stored in the main file's genozip header (spec.md §4.6, §6.5).
    pub fn verify_genome_digest(&self, expected: &DigestValue) -> Result<()> {
        match &self.genome_digest {
            Some(loaded) if loaded == expected => Ok(()),
            Some(loaded) => Err(ReferenceError::GenomeDigestMismatch {
                expected: expected.to_string(),
                loaded: loaded.to_string(),
            }
            .into()),
            None => Err(ReferenceError::GenomeDigestMismatch {
                expected: expected.to_string(),
                loaded: "none".into(),
            }
            .into()),
        }
    }
}

/// 28-bit k-mer key into the refhash (spec.md §4.6).
pub type Kmer = u32;
const KMER_MASK: u32 = (1 << 28) - 1;

/// One layer of the multi-layer open-addressed refhash. Each layer is half
/// the size of the previous, per spec.md §4.6 ("layer 0 ≈ 1 GiB, 4 layers
/// ≈ 1.875 GiB" for the real 28-bit table; here sized to the data under
/// test rather than hardware capacity).
#[derive(Debug, Clone)]
struct HashLayer {
    slots: Vec<Option<(Kmer, u64)>>,
}

impl HashLayer {
    fn new(capacity: usize) -> Self {
        HashLayer {
            slots: vec![None; capacity.max(1)],
        }
    }

    fn slot_for(&self, key: Kmer) -> usize {
        (key as usize) % self.slots.len()
    }

    fn try_insert(&mut self, key: Kmer, gpos: u64) -> bool {
        let slot = self.slot_for(key);
        if self.slots[slot].is_none() {
            self.slots[slot] = Some((key, gpos));
            true
        } else {
            false
        }
    }

    fn get(&self, key: Kmer) -> Option<u64> {
        let slot = self.slot_for(key);
        self.slots[slot].and_then(|(k, gpos)| if k == key { Some(gpos) } else { None })
    }
}

/// Layered k-mer hash: `gpos = refhash.lookup(kmer)`.
#[derive(Debug, Clone)]
pub struct RefHash {
    layers: Vec<HashLayer>,
}

impl RefHash {
    /// `n_layers` layers, each half the capacity of the previous, starting
    /// from `base_capacity`.
    pub fn new(base_capacity: usize, n_layers: usize) -> Self {
        let mut layers = Vec::with_capacity(n_layers);
        let mut cap = base_capacity;
        for _ in 0..n_layers {
            layers.push(HashLayer::new(cap));
            cap = (cap / 2).max(1);
        }
        RefHash { layers }
    }

    /// Inserts into the first free layer; if all layers are full for this
    /// key's slot, a 25% random-overwrite preserves bounded occupancy
    /// (spec.md §4.6).
    pub fn insert(&mut self, kmer: Kmer, gpos: u64) {
        let kmer = kmer & KMER_MASK;
        for layer in self.layers.iter_mut() {
            if layer.try_insert(kmer, gpos) {
                return;
            }
        }
        // All layers full at this slot: overwrite with 25% probability.
        if rand_quarter() {
            if let Some(layer) = self.layers.last_mut() {
                let slot = layer.slot_for(kmer);
                layer.slots[slot] = Some((kmer, gpos));
            }
        }
    }

    pub fn lookup(&self, kmer: Kmer) -> Option<u64> {
        let kmer = kmer & KMER_MASK;
        self.layers.iter().find_map(|l| l.get(kmer))
    }
}

fn rand_quarter() -> bool {
    use rand::Rng;
    rand::thread_rng().gen_ratio(1, 4)
}

/// Packs up to 14 bases (28 bits, 2 bits each) into a k-mer key, seeded on
/// the "first hook base" per spec.md §4.6.
pub fn kmer_from_bases(bases: &[u8]) -> Kmer {
    let mut kmer: u32 = 0;
    for &b in bases.iter().take(14) {
        let bits = match b.to_ascii_uppercase() {
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => 0,
        };
        kmer = (kmer << 2) | bits as u32;
    }
    kmer & KMER_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_round_trips_set_bases() {
        let mut r = Range::new("chr1", 0, 8);
        r.set_base(0, b'A');
        r.set_base(1, b'C');
        r.set_base(2, b'G');
        r.set_base(3, b'T');
        assert_eq!(r.base_at(0).unwrap(), b'A');
        assert_eq!(r.base_at(1).unwrap(), b'C');
        assert_eq!(r.base_at(2).unwrap(), b'G');
        assert_eq!(r.base_at(3).unwrap(), b'T');
    }

    #[test]
    fn unset_base_is_reference_error() {
        let r = Range::new("chr1", 0, 8);
        assert!(r.base_at(5).is_err());
    }

    #[test]
    fn gpos_offsets_by_range_start() {
        let r = Range::new("chr2", 1000, 10);
        assert_eq!(r.gpos_at(5), 1005);
    }

    #[test]
    fn genome_digest_mismatch_is_reference_error() {
        let mut reference = Reference::new(ReferenceSource::External);
        reference.genome_digest = Some(DigestValue([1u8; 16]));
        let expected = DigestValue([2u8; 16]);
        assert!(reference.verify_genome_digest(&expected).is_err());
    }

    #[test]
    fn genome_digest_match_is_ok() {
        let mut reference = Reference::new(ReferenceSource::External);
        let digest = DigestValue([7u8; 16]);
        reference.genome_digest = Some(digest);
        assert!(reference.verify_genome_digest(&digest).is_ok());
    }

    #[test]
    fn refhash_round_trips_inserted_kmers() {
        let mut rh = RefHash::new(1024, 4);
        let kmer = kmer_from_bases(b"ACGTACGTACGTAC");
        rh.insert(kmer, 555);
        assert_eq!(rh.lookup(kmer), Some(555));
    }

    #[test]
    fn refhash_layers_halve_in_size() {
        let rh = RefHash::new(1000, 3);
        assert_eq!(rh.layers[0].slots.len(), 1000);
        assert_eq!(rh.layers[1].slots.len(), 500);
        assert_eq!(rh.layers[2].slots.len(), 250);
    }
}
