//! ACGT codec: 2-bit packing of nucleotide bytes plus a companion
//! exception stream for anything that isn't A/C/G/T (spec.md §4.2, §4.6).
//! This is genozip-specific, not a generic compression algorithm, so unlike
//! the other codecs in `codec.rs` it is hand-rolled rather than pulled from
//! a crate.

/// One exception: a byte position (into the original stream) and the
/// original byte, for positions that weren't A/C/G/T.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exception {
    pub pos: u32,
    pub byte: u8,
}

fn base_to_bits(b: u8) -> Option<u8> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

fn bits_to_base(bits: u8) -> u8 {
    match bits & 0x3 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

/// Packs `data` into a 2-bit-per-base stream prefixed with a little-endian
/// `u32` exception count and the exceptions themselves (pos:u32, byte:u8
/// each), followed by the packed bases (non-ACGT bytes pack as `A`/bits 0,
/// overwritten on unpack from the exception list).
pub fn pack(data: &[u8]) -> Vec<u8> {
    let mut exceptions = Vec::new();
    let mut packed = vec![0u8; data.len().div_ceil(4)];

    for (i, &b) in data.iter().enumerate() {
        let bits = match base_to_bits(b) {
            Some(bits) => bits,
            None => {
                exceptions.push(Exception {
                    pos: i as u32,
                    byte: b,
                });
                0
            }
        };
        packed[i / 4] |= bits << ((i % 4) * 2);
    }

    let mut out = Vec::with_capacity(4 + exceptions.len() * 5 + packed.len());
    out.extend_from_slice(&(exceptions.len() as u32).to_le_bytes());
    for e in &exceptions {
        out.extend_from_slice(&e.pos.to_le_bytes());
        out.push(e.byte);
    }
    out.extend_from_slice(&packed);
    out
}

/// Reverses [`pack`]. `uncompressed_len` is the original base count,
/// carried in the section header's `data_uncompressed_len`.
pub fn unpack(data: &[u8], uncompressed_len: usize) -> Vec<u8> {
    if data.len() < 4 {
        return Vec::new();
    }
    let n_exceptions = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let mut offset = 4;
    let mut exceptions = Vec::with_capacity(n_exceptions);
    for _ in 0..n_exceptions {
        let pos = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
        let byte = data[offset + 4];
        exceptions.push(Exception { pos, byte });
        offset += 5;
    }
    let packed = &data[offset..];

    let mut out = Vec::with_capacity(uncompressed_len);
    for i in 0..uncompressed_len {
        let byte = packed[i / 4];
        let bits = (byte >> ((i % 4) * 2)) & 0x3;
        out.push(bits_to_base(bits));
    }
    for e in exceptions {
        if (e.pos as usize) < out.len() {
            out[e.pos as usize] = e.byte;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_acgt_round_trips() {
        let data = b"ACGTACGTACGTACGT".to_vec();
        let packed = pack(&data);
        let unpacked = unpack(&packed, data.len());
        assert_eq!(unpacked, data);
    }

    #[test]
    fn non_acgt_bytes_survive_via_exceptions() {
        let data = b"ACGTNNNACGT".to_vec();
        let packed = pack(&data);
        let unpacked = unpack(&packed, data.len());
        assert_eq!(unpacked, data);
    }

    #[test]
    fn empty_input_round_trips() {
        let data: Vec<u8> = Vec::new();
        let packed = pack(&data);
        let unpacked = unpack(&packed, 0);
        assert_eq!(unpacked, data);
    }

    #[test]
    fn non_multiple_of_4_length_round_trips() {
        let data = b"ACGTA".to_vec();
        let packed = pack(&data);
        let unpacked = unpack(&packed, data.len());
        assert_eq!(unpacked, data);
    }
}
