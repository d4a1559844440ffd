use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while keying or decoding a single archive's table of contents.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("{path}: expected version 0x52504637, found {found:#010x}")]
    InvalidVersion { path: PathBuf, found: u32 },

    #[error("{path}: directory entry at index {index} has sentinel {found:#010x}")]
    InvalidDirectoryEntry {
        path: PathBuf,
        index: u32,
        found: u32,
    },

    #[error("{path}: binary entry at index {index} has nonzero high bits in d2")]
    InvalidBinaryEntry { path: PathBuf, index: u32 },

    #[error("{path}: names table overrun resolving entry {index}")]
    NamesOverrun { path: PathBuf, index: u32 },

    #[error("{path}: archive truncated reading {what} ({needed} bytes at offset {offset})")]
    Truncated {
        path: PathBuf,
        what: &'static str,
        offset: u64,
        needed: u64,
    },

    #[error("{path}: NG encryption requires key material that is unavailable: {source}")]
    UnsupportedEncryption {
        path: PathBuf,
        #[source]
        source: NgKeyError,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by the NG keystream provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NgKeyError {
    #[error("no NG key material is available")]
    Unavailable,
}

/// Errors raised reading and decoding the bytes of a single file entry.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("entry is not a file")]
    EntryNotFile,

    #[error("read truncated: expected {expected} bytes")]
    ReadTruncated { expected: u64 },

    #[error("deflate decompression failed: {0}")]
    InflateFailed(String),

    #[error(
        "inflated size mismatch: expected {expected} bytes, produced {produced}"
    )]
    InflateLengthMismatch { expected: u32, produced: u64 },

    #[error("encryption unavailable: {0}")]
    EncryptionUnavailable(#[from] NgKeyError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised by path lookups (`find`, `list_directory`, `file_info`, ...).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FindError {
    #[error("path not found")]
    NotFound,

    #[error("path resolves to a file, not a directory")]
    NotADirectory,
}

/// Errors raised by registry-level operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry has not been initialized")]
    NotInitialized,

    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    #[error(transparent)]
    Find(#[from] FindError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
}
