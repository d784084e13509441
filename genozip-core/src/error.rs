//! Error kinds for the engine, per the propagation model: worker threads
//! stash one of these on a per-VB error slot, the dispatcher escalates it,
//! the writer flushes committed output and exits non-zero.

use thiserror::Error;

/// The seven error kinds of the engine's error-handling design.
#[derive(Error, Debug)]
pub enum GenozipError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("user error: {0}")]
    User(#[from] UserError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("bad magic at offset {offset}: expected {expected:#x}, found {found:#x}")]
    BadMagic {
        offset: u64,
        expected: u32,
        found: u32,
    },
    #[error("expected section type {expected:?}, found {found:?} at offset {offset}")]
    UnexpectedSectionType {
        offset: u64,
        expected: crate::section::SectionType,
        found: crate::section::SectionType,
    },
    #[error("invalid compressed_offset {0}")]
    InvalidCompressedOffset(u32),
    #[error("section automaton forbids transition from {from:?} to {to:?}")]
    ForbiddenTransition {
        from: crate::section::SectionType,
        to: crate::section::SectionType,
    },
    #[error("inconsistent section lengths: compressed={compressed} uncompressed={uncompressed}")]
    InconsistentLengths { compressed: u32, uncompressed: u32 },
    #[error("unknown codec id {0}")]
    UnknownCodec(u8),
    #[error("unknown section type id {0}")]
    UnknownSectionType(u8),
    #[error("section type {0:?} appeared before any VB_HEADER")]
    SectionOutOfOrder(crate::section::SectionType),
    #[error("word_index {word_index} out of range for dict {dict_id:?} (len {len})")]
    WordIndexOutOfRange {
        word_index: u32,
        dict_id: crate::dict_id::DictId,
        len: u32,
    },
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decompression failed: {0}")]
    Decompress(String),
    #[error("checksum mismatch inside codec")]
    ChecksumMismatch,
    #[error("codec {0:?} is not implemented in this build")]
    Unsupported(crate::section::Codec),
    #[error("block is not compressible, fall back to store")]
    NotCompressible,
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("password test block failed to verify")]
    WrongPassword,
    #[error("invalid AES input length {0}")]
    InvalidLength(usize),
    #[error("file is encrypted but no password was supplied")]
    PasswordRequired,
}

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: String, computed: String },
}

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("external reference genome digest mismatch: file expects {expected}, loaded {loaded}")]
    GenomeDigestMismatch { expected: String, loaded: String },
    #[error("reference base at gpos {0} is not set (is_set=0)")]
    BaseNotSet(u64),
    #[error("reference file not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("thread pool exhausted / deadlock suspected")]
    PoolExhausted,
    #[error("failed to spawn thread: {0}")]
    SpawnFailed(String),
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("invalid flag combination: {0}")]
    InvalidFlags(String),
    #[error("missing required input")]
    MissingInput,
    #[error("bad regions expression: {0}")]
    BadRegions(String),
}

pub type Result<T> = std::result::Result<T, GenozipError>;
