//! Codec dispatch (spec.md §4.7). Each codec implements
//! `{compress, uncompress, est_size}`; `sub_codec` lets ACGT chain into a
//! second stage for its exception stream. Codec selection may be static
//! (segmenter picks it) or adaptive (smallest of a few trial compressions
//! wins); whichever is chosen is recorded in the section header and is
//! authoritative on PIZ.

use crate::error::{CodecError, Result};
use crate::section::Codec;
use std::io::{Read, Write};

/// Compresses `data` with the named codec. Returns `Ok(None)` when the
/// codec declines (e.g. NOT_COMPRESSIBLE), signalling the caller to fall
/// back to `Codec::None` (store), per spec.md §7's recoverable codec path.
pub fn compress(codec: Codec, data: &[u8]) -> Result<Option<Vec<u8>>> {
    match codec {
        Codec::None => Ok(Some(data.to_vec())),
        Codec::Bzip2 => {
            use bzip2::write::BzEncoder;
            use bzip2::Compression;
            let mut enc = BzEncoder::new(Vec::new(), Compression::best());
            enc.write_all(data)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            let out = enc
                .finish()
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Ok(Some(out))
        }
        Codec::Zlib => {
            use flate2::write::ZlibEncoder;
            use flate2::Compression;
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
            enc.write_all(data)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            let out = enc
                .finish()
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Ok(Some(out))
        }
        Codec::Lzma => {
            use xz2::write::XzEncoder;
            let mut enc = XzEncoder::new(Vec::new(), 6);
            enc.write_all(data)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            let out = enc
                .finish()
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Ok(Some(out))
        }
        Codec::Acgt => Ok(Some(crate::codec_acgt::pack(data))),
        Codec::Bsc | Codec::Domq | Codec::Hapm | Codec::Longr => {
            Err(CodecError::Unsupported(codec).into())
        }
    }
}

pub fn uncompress(codec: Codec, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    match codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Bzip2 => {
            use bzip2::read::BzDecoder;
            let mut dec = BzDecoder::new(data);
            let mut out = Vec::with_capacity(uncompressed_len);
            dec.read_to_end(&mut out)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Ok(out)
        }
        Codec::Zlib => {
            use flate2::read::ZlibDecoder;
            let mut dec = ZlibDecoder::new(data);
            let mut out = Vec::with_capacity(uncompressed_len);
            dec.read_to_end(&mut out)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Ok(out)
        }
        Codec::Lzma => {
            use xz2::read::XzDecoder;
            let mut dec = XzDecoder::new(data);
            let mut out = Vec::with_capacity(uncompressed_len);
            dec.read_to_end(&mut out)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            Ok(out)
        }
        Codec::Acgt => Ok(crate::codec_acgt::unpack(data, uncompressed_len)),
        Codec::Bsc | Codec::Domq | Codec::Hapm | Codec::Longr => {
            Err(CodecError::Unsupported(codec).into())
        }
    }
}

/// Adaptive codec selection: compress a small sample with each candidate
/// and pick the smallest result, per spec.md §4.7.
pub fn pick_best(data: &[u8], candidates: &[Codec]) -> Result<(Codec, Vec<u8>)> {
    let mut best: Option<(Codec, Vec<u8>)> = None;
    for &c in candidates {
        if let Ok(Some(out)) = compress(c, data) {
            let better = match &best {
                None => true,
                Some((_, prev)) => out.len() < prev.len(),
            };
            if better {
                best = Some((c, out));
            }
        }
    }
    best.ok_or_else(|| CodecError::NotCompressible.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bzip2_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compress(Codec::Bzip2, &data).unwrap().unwrap();
        let out = uncompress(Codec::Bzip2, &compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn zlib_round_trips() {
        let data = b"CHROM\tPOS\tID\tREF\tALT\n".repeat(50);
        let compressed = compress(Codec::Zlib, &data).unwrap().unwrap();
        let out = uncompress(Codec::Zlib, &compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn lzma_round_trips() {
        let data = b"ACGTACGTACGTACGTNNNNACGT".repeat(30);
        let compressed = compress(Codec::Lzma, &data).unwrap().unwrap();
        let out = uncompress(Codec::Lzma, &compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn none_codec_is_store_only() {
        let data = b"raw bytes".to_vec();
        let compressed = compress(Codec::None, &data).unwrap().unwrap();
        assert_eq!(compressed, data);
        let out = uncompress(Codec::None, &compressed, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn unsupported_codecs_are_codec_error() {
        let err = compress(Codec::Bsc, b"data").unwrap_err();
        match err {
            crate::error::GenozipError::Codec(CodecError::Unsupported(Codec::Bsc)) => {}
            other => panic!("expected Unsupported(Bsc), got {other:?}"),
        }
    }

    #[test]
    fn pick_best_chooses_smallest() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let (codec, out) = pick_best(&data, &[Codec::None, Codec::Bzip2, Codec::Zlib]).unwrap();
        assert!(out.len() <= data.len());
        assert!(matches!(codec, Codec::Bzip2 | Codec::Zlib | Codec::None));
    }
}
