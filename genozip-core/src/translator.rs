//! Translator registry (spec.md §4.3, §9 "Polymorphism"): a small
//! `{fn_id → fn_ptr}` table, keyed by a byte opcode that is part of the
//! file format. Translators rewrite an item's final bytes during
//! reconstruction — e.g. a textual integer into a little-endian binary
//! integer for a SAM→BAM translation.

/// Built-in translator ids. Per-format translators beyond these are
/// registered by external segmenter plugins (spec.md §9); the core only
/// ships the generic, format-agnostic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TranslatorId {
    /// No-op: emit bytes unchanged.
    None = 0,
    /// ASCII decimal integer text → little-endian 32-bit binary integer.
    TextIntToLeU32 = 1,
    /// ASCII decimal integer text → little-endian 16-bit binary integer.
    TextIntToLeU16 = 2,
}

impl TranslatorId {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => TranslatorId::TextIntToLeU32,
            2 => TranslatorId::TextIntToLeU16,
            _ => TranslatorId::None,
        }
    }

    pub fn apply(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            TranslatorId::None => bytes.to_vec(),
            TranslatorId::TextIntToLeU32 => {
                let text = std::str::from_utf8(bytes).unwrap_or("0");
                let n: u32 = text.trim().parse().unwrap_or(0);
                n.to_le_bytes().to_vec()
            }
            TranslatorId::TextIntToLeU16 => {
                let text = std::str::from_utf8(bytes).unwrap_or("0");
                let n: u16 = text.trim().parse().unwrap_or(0);
                n.to_le_bytes().to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_int_translates_to_le_u32() {
        let out = TranslatorId::TextIntToLeU32.apply(b"1000");
        assert_eq!(out, 1000u32.to_le_bytes().to_vec());
    }

    #[test]
    fn none_is_identity() {
        assert_eq!(TranslatorId::None.apply(b"abc"), b"abc".to_vec());
    }
}
