//! Whole-file digest (spec.md §3.1, §6.4): MD5 or Adler-32, updated
//! incrementally in VB order on both ZIP and PIZ, compared at EOF.

use md5::{Digest as _, Md5};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Md5,
    Adler32,
}

/// A 16-byte digest value. Adler-32 values are zero-padded into the same
/// 16-byte slot as MD5, per spec.md §6.4 ("stored as 16-byte zero-padded").
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DigestValue(pub [u8; 16]);

impl fmt::Display for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestValue({})", self)
    }
}

/// Incremental digest accumulator, fed VB-sized chunks in VB order.
pub enum DigestAccumulator {
    Md5(Md5),
    Adler32(adler::Adler32),
}

impl DigestAccumulator {
    pub fn new(kind: DigestKind) -> Self {
        match kind {
            DigestKind::Md5 => DigestAccumulator::Md5(Md5::new()),
            DigestKind::Adler32 => DigestAccumulator::Adler32(adler::Adler32::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            DigestAccumulator::Md5(h) => h.update(data),
            DigestAccumulator::Adler32(h) => h.write_slice(data),
        }
    }

    pub fn finalize(self) -> DigestValue {
        match self {
            DigestAccumulator::Md5(h) => {
                let out = h.finalize();
                let mut buf = [0u8; 16];
                buf.copy_from_slice(&out);
                DigestValue(buf)
            }
            DigestAccumulator::Adler32(h) => {
                let checksum = h.checksum();
                let mut buf = [0u8; 16];
                buf[..4].copy_from_slice(&checksum.to_be_bytes());
                DigestValue(buf)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_vector() {
        let mut acc = DigestAccumulator::new(DigestKind::Md5);
        acc.update(b"abc");
        let digest = acc.finalize();
        assert_eq!(digest.to_string(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn adler32_is_zero_padded_into_16_bytes() {
        let mut acc = DigestAccumulator::new(DigestKind::Adler32);
        acc.update(b"abc");
        let digest = acc.finalize();
        assert_eq!(&digest.0[4..], &[0u8; 12]);
    }

    #[test]
    fn incremental_update_matches_single_shot() {
        let mut incremental = DigestAccumulator::new(DigestKind::Md5);
        incremental.update(b"hello ");
        incremental.update(b"world");
        let mut single = DigestAccumulator::new(DigestKind::Md5);
        single.update(b"hello world");
        assert_eq!(incremental.finalize(), single.finalize());
    }
}
