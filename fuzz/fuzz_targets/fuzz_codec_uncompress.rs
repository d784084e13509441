#![no_main]

use genozip_core::section::Codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 || data.len() > 10_000_000 {
        return;
    }
    let codec = match data[0] % 9 {
        0 => Codec::None,
        1 => Codec::Bzip2,
        2 => Codec::Zlib,
        3 => Codec::Lzma,
        4 => Codec::Acgt,
        5 => Codec::Bsc,
        6 => Codec::Domq,
        7 => Codec::Hapm,
        _ => Codec::Longr,
    };
    let uncompressed_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
    if uncompressed_len > 10_000_000 {
        return;
    }
    // Decompressors must reject garbage with an Err, never panic.
    let _ = genozip_core::codec::uncompress(codec, &data[5..], uncompressed_len);
});
