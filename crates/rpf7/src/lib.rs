//! A read-only extractor for Rockstar Advanced Game Engine Package Files
//! (RPF7), the archive format used by Grand Theft Auto V.
//!
//! The crate exposes a virtual filesystem over one or more on-disk RPF7
//! archives: callers enumerate directories, inspect entry metadata, and
//! read file bytes transparently decrypted and decompressed. It does not
//! provide an RPC/CLI surface, archive writing, or game-asset decoding
//! beyond delivering raw bytes — those are left to collaborators.

pub mod archive;
pub mod cipher;
pub mod entry;
pub mod error;
pub mod keystream;
pub mod pipeline;
pub mod reader;
pub mod registry;

pub use archive::{Archive, DirectoryEntry, EncryptionMode, Entry, FileEntry, NestedArchive};
pub use error::{FindError, NgKeyError, OpenError, ReadError, RegistryError};
pub use keystream::{KeystreamProvider, UnavailableKeystreamProvider};
pub use registry::{DirectoryListing, EntryInfo, EntryKind, Registry, RegistryOptions, SearchHit, TreeNode};
