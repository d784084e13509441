//! Section catalogue and on-disk format (spec.md §4.1, §6.1, §6.2).
//!
//! Every section is a fixed 28-byte big-endian header followed by a
//! (possibly encrypted) codec body. Extended header variants add fixed
//! fields after the generic header; those are modeled as separate structs
//! that embed [`SectionHeader`] as their first field, the way the teacher's
//! C ancestor (`examples/original_source/sections.h`) packs its structs.

use crate::error::{FormatError, Result};

pub const GENOZIP_MAGIC: u32 = 0x2705_2012;
pub const SECTION_HEADER_LEN: usize = 28;

/// Section-type tag, §6.1/§6.2. Numbering matches the discriminants a real
/// on-disk format would freeze — do not renumber (spec.md §9
/// "Polymorphism").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SectionType {
    GenozipHeader = 0,
    TxtHeader = 1,
    VbHeader = 2,
    Dict = 3,
    B250 = 4,
    Local = 5,
    Reference = 6,
    RefIsSet = 7,
    RefHash = 8,
    RefRandAcc = 9,
    ReconPlan = 10,
    RandomAccess = 11,
    Aliases = 12,
    Counts = 13,
    Stats = 14,
    SectionList = 15,
}

impl SectionType {
    pub fn from_u8(v: u8) -> Result<Self> {
        use SectionType::*;
        Ok(match v {
            0 => GenozipHeader,
            1 => TxtHeader,
            2 => VbHeader,
            3 => Dict,
            4 => B250,
            5 => Local,
            6 => Reference,
            7 => RefIsSet,
            8 => RefHash,
            9 => RefRandAcc,
            10 => ReconPlan,
            11 => RandomAccess,
            12 => Aliases,
            13 => Counts,
            14 => Stats,
            15 => SectionList,
            other => return Err(FormatError::UnknownSectionType(other).into()),
        })
    }
}

/// Codec named by a single byte in the section header (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Codec {
    None = 0,
    Bzip2 = 1,
    Zlib = 2,
    Lzma = 3,
    Acgt = 4,
    Bsc = 5,
    Domq = 6,
    Hapm = 7,
    Longr = 8,
}

impl Codec {
    pub fn from_u8(v: u8) -> Result<Self> {
        use Codec::*;
        Ok(match v {
            0 => None,
            1 => Bzip2,
            2 => Zlib,
            3 => Lzma,
            4 => Acgt,
            5 => Bsc,
            6 => Domq,
            7 => Hapm,
            8 => Longr,
            other => return Err(FormatError::UnknownCodec(other).into()),
        })
    }
}

/// The generic 28-byte section header, spec.md §6.2.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeader {
    pub magic: u32,
    pub body_adler32: u32,
    pub data_encrypted_len: u32,
    pub data_compressed_len: u32,
    pub data_uncompressed_len: u32,
    pub vblock_i: u32,
    pub section_type: SectionType,
    pub codec: Codec,
    pub sub_codec: Codec,
    pub flags: u8,
}

impl SectionHeader {
    pub fn new(
        section_type: SectionType,
        vblock_i: u32,
        codec: Codec,
        sub_codec: Codec,
        flags: u8,
        uncompressed_len: u32,
        compressed_len: u32,
        body_adler32: u32,
    ) -> Self {
        SectionHeader {
            magic: GENOZIP_MAGIC,
            body_adler32,
            data_encrypted_len: 0,
            data_compressed_len: compressed_len,
            data_uncompressed_len: uncompressed_len,
            vblock_i,
            section_type,
            codec,
            sub_codec,
            flags,
        }
    }

    pub fn to_bytes(&self) -> [u8; SECTION_HEADER_LEN] {
        let mut buf = [0u8; SECTION_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4..8].copy_from_slice(&self.body_adler32.to_be_bytes());
        buf[8..12].copy_from_slice(&self.data_encrypted_len.to_be_bytes());
        buf[12..16].copy_from_slice(&self.data_compressed_len.to_be_bytes());
        buf[16..20].copy_from_slice(&self.data_uncompressed_len.to_be_bytes());
        buf[20..24].copy_from_slice(&self.vblock_i.to_be_bytes());
        buf[24] = self.section_type as u8;
        buf[25] = self.codec as u8;
        buf[26] = self.sub_codec as u8;
        buf[27] = self.flags;
        buf
    }

    pub fn from_bytes(buf: &[u8], offset: u64, expected: Option<SectionType>) -> Result<Self> {
        if buf.len() < SECTION_HEADER_LEN {
            return Err(FormatError::InconsistentLengths {
                compressed: buf.len() as u32,
                uncompressed: SECTION_HEADER_LEN as u32,
            }
            .into());
        }
        let magic = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        if magic != GENOZIP_MAGIC {
            return Err(FormatError::BadMagic {
                offset,
                expected: GENOZIP_MAGIC,
                found: magic,
            }
            .into());
        }
        let body_adler32 = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let data_encrypted_len = u32::from_be_bytes(buf[8..12].try_into().unwrap());
        let data_compressed_len = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        let data_uncompressed_len = u32::from_be_bytes(buf[16..20].try_into().unwrap());
        let vblock_i = u32::from_be_bytes(buf[20..24].try_into().unwrap());
        let section_type = SectionType::from_u8(buf[24])?;
        let codec = Codec::from_u8(buf[25])?;
        let sub_codec = Codec::from_u8(buf[26])?;
        let flags = buf[27];

        if let Some(want) = expected {
            if want != section_type {
                return Err(FormatError::UnexpectedSectionType {
                    offset,
                    expected: want,
                    found: section_type,
                }
                .into());
            }
        }

        Ok(SectionHeader {
            magic,
            body_adler32,
            data_encrypted_len,
            data_compressed_len,
            data_uncompressed_len,
            vblock_i,
            section_type,
            codec,
            sub_codec,
            flags,
        })
    }

    /// `compressed_offset`: header size plus any encryption padding before
    /// it (the core never pads the header itself, so this is constant).
    pub fn compressed_offset(&self) -> u32 {
        SECTION_HEADER_LEN as u32
    }

    /// Sets `data_encrypted_len` (0 when the section isn't encrypted).
    pub fn with_encrypted_len(mut self, encrypted_len: u32) -> Self {
        self.data_encrypted_len = encrypted_len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_bytes() {
        let h = SectionHeader::new(SectionType::B250, 3, Codec::Bzip2, Codec::None, 0b0101, 100, 40, 0xdead_beef);
        let bytes = h.to_bytes();
        let h2 = SectionHeader::from_bytes(&bytes, 0, None).unwrap();
        assert_eq!(h2.vblock_i, 3);
        assert_eq!(h2.section_type, SectionType::B250);
        assert_eq!(h2.codec, Codec::Bzip2);
        assert_eq!(h2.data_uncompressed_len, 100);
        assert_eq!(h2.data_compressed_len, 40);
        assert_eq!(h2.flags, 0b0101);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut buf = [0u8; SECTION_HEADER_LEN];
        buf[0..4].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        let err = SectionHeader::from_bytes(&buf, 0, None);
        assert!(err.is_err());
    }

    #[test]
    fn wrong_expected_type_is_fatal() {
        let h = SectionHeader::new(SectionType::Dict, 1, Codec::None, Codec::None, 0, 10, 10, 0);
        let bytes = h.to_bytes();
        let err = SectionHeader::from_bytes(&bytes, 0, Some(SectionType::B250));
        assert!(err.is_err());
    }
}
