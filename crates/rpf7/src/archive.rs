//! Archive reader: header/TOC decode, hierarchy building and nested-archive
//! recursion, per `spec.md` §4.3.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::entry::{decode_record, BinaryFileRecord, DirectoryRecord, RawRecord, ResourceFileRecord};
use crate::error::OpenError;
use crate::keystream::{xor_with_keystream, KeystreamProvider};
use crate::{cipher, reader};

const HEADER_SIZE: u64 = 16;
const RECORD_SIZE: u64 = 16;
const PAYLOAD_BLOCK_SIZE: u64 = 512;
const RPF_VERSION: u32 = 0x5250_4637;
const ARCHIVE_EXTENSION: &str = ".rpf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    None,
    Open,
    Aes,
    Ng,
}

impl EncryptionMode {
    fn from_header_field(value: u32) -> EncryptionMode {
        match value {
            0x0000_0000 => EncryptionMode::None,
            0x4E45_504F => EncryptionMode::Open,
            0x0FFF_FFF9 => EncryptionMode::Aes,
            0x0FEF_FFFF => EncryptionMode::Ng,
            _ => {
                tracing::warn!(value, "unrecognized encryption mode field, treating as NONE");
                EncryptionMode::None
            }
        }
    }
}

/// A single entry in an archive's flat, index-addressed entry table.
#[derive(Debug, Clone)]
pub enum Entry {
    Directory(DirectoryEntry),
    BinaryFile(FileEntry),
    ResourceFile(FileEntry),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Directory(d) => &d.name,
            Entry::BinaryFile(f) | Entry::ResourceFile(f) => &f.name,
        }
    }

    pub fn name_lower(&self) -> &str {
        match self {
            Entry::Directory(d) => &d.name_lower,
            Entry::BinaryFile(f) | Entry::ResourceFile(f) => &f.name_lower,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Entry::Directory(d) => &d.path,
            Entry::BinaryFile(f) | Entry::ResourceFile(f) => &f.path,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        match self {
            Entry::Directory(d) => d.parent,
            Entry::BinaryFile(f) | Entry::ResourceFile(f) => f.parent,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub name_lower: String,
    pub path: String,
    pub parent: Option<usize>,
    pub entries_index: u32,
    pub entries_count: u32,
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub name_lower: String,
    pub path: String,
    pub parent: Option<usize>,
    pub on_disk_size: u64,
    pub uncompressed_size: u64,
    pub payload_block_offset: u32,
    pub encryption_type: u8,
}

impl FileEntry {
    pub fn is_compressed(&self) -> bool {
        self.uncompressed_size > 0 && self.uncompressed_size != self.on_disk_size
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_type != 0
    }

    pub fn payload_offset(&self, archive_start_offset: u64) -> u64 {
        archive_start_offset + self.payload_block_offset as u64 * PAYLOAD_BLOCK_SIZE
    }
}

/// A nested archive discovered inside a parent's TOC, along with the index
/// of the parent's file entry whose payload holds its bytes.
#[derive(Debug)]
pub struct NestedArchive {
    pub entry_index: usize,
    pub archive: Archive,
}

/// One open RPF7 archive: header metadata, its flat entry table, and any
/// archives nested inside it.
#[derive(Debug)]
pub struct Archive {
    pub backing_path: PathBuf,
    pub start_offset: u64,
    pub size: u64,
    pub encryption: EncryptionMode,
    pub entries: Vec<Entry>,
    pub children: Vec<NestedArchive>,
}

impl Archive {
    /// Opens the archive header, TOC and names table at `start_offset`
    /// within `backing_path`, then recursively opens every nested archive
    /// found inside it.
    ///
    /// `archive_name` and `size` seed the NG keystream and are otherwise
    /// only used for diagnostics: for a top-level archive these are
    /// typically the backing file's name and length; for a nested archive
    /// they are the containing file entry's own name and declared size.
    pub fn open(
        backing_path: &Path,
        start_offset: u64,
        archive_name: &str,
        size: u64,
        keystream: &dyn KeystreamProvider,
    ) -> Result<Archive, OpenError> {
        let _span = tracing::debug_span!("archive_open", path = %backing_path.display(), start_offset).entered();

        let header = read_checked(backing_path, start_offset, HEADER_SIZE, "header")?;
        let version = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let entry_count = u32::from_le_bytes(header[4..8].try_into().unwrap());
        let names_length = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let encryption_field = u32::from_le_bytes(header[12..16].try_into().unwrap());

        if version != RPF_VERSION {
            return Err(OpenError::InvalidVersion {
                path: backing_path.to_path_buf(),
                found: version,
            });
        }

        let encryption = EncryptionMode::from_header_field(encryption_field);

        let entries_offset = start_offset + HEADER_SIZE;
        let entries_len = entry_count as u64 * RECORD_SIZE;
        let mut entries_bytes = read_checked(backing_path, entries_offset, entries_len, "entries table")?;

        let names_offset = entries_offset + entries_len;
        let mut names_bytes =
            read_checked(backing_path, names_offset, names_length as u64, "names table")?;

        match encryption {
            EncryptionMode::Aes => {
                entries_bytes = cipher::decrypt(entries_bytes);
                names_bytes = cipher::decrypt(names_bytes);
            }
            EncryptionMode::Ng => {
                let stream = keystream
                    .keystream(&archive_name.to_lowercase(), size as u32)
                    .map_err(|source| OpenError::UnsupportedEncryption {
                        path: backing_path.to_path_buf(),
                        source,
                    })?;
                xor_with_keystream(&mut entries_bytes, &stream);
                xor_with_keystream(&mut names_bytes, &stream);
            }
            EncryptionMode::None | EncryptionMode::Open => {}
        }

        let mut raw_records = Vec::with_capacity(entry_count as usize);
        for index in 0..entry_count {
            let offset = index as usize * RECORD_SIZE as usize;
            let chunk: [u8; 16] = entries_bytes[offset..offset + 16].try_into().unwrap();
            raw_records.push(decode_record(&chunk, index, backing_path)?);
        }

        if entry_count > 0 && !matches!(raw_records[0], RawRecord::Directory(_)) {
            let root_h2 = u32::from_le_bytes(entries_bytes[4..8].try_into().unwrap());
            return Err(OpenError::InvalidDirectoryEntry {
                path: backing_path.to_path_buf(),
                index: 0,
                found: root_h2,
            });
        }

        let mut resolved: Vec<(RawRecord, String)> = Vec::with_capacity(raw_records.len());
        for (index, record) in raw_records.into_iter().enumerate() {
            let name_offset = match &record {
                RawRecord::Directory(d) => d.name_offset,
                RawRecord::BinaryFile(b) => b.name_offset,
                RawRecord::ResourceFile(r) => r.name_offset,
            };
            let name = resolve_name(&names_bytes, name_offset, index as u32, backing_path)?;
            resolved.push((record, name));
        }

        let entries = build_hierarchy(resolved);

        let mut archive = Archive {
            backing_path: backing_path.to_path_buf(),
            start_offset,
            size,
            encryption,
            entries,
            children: Vec::new(),
        };

        scan_nested_archives(&mut archive, keystream)?;

        Ok(archive)
    }

    /// Resolves `path` (either separator accepted) against this archive's
    /// tree, case-insensitively, directories tried before files at each
    /// level.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        let segments: Vec<String> = path
            .replace('/', "\\")
            .split('\\')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect();

        if segments.is_empty() {
            return self.entries.first();
        }

        let mut current_index = 0usize;
        for (depth, segment) in segments.iter().enumerate() {
            let is_last = depth == segments.len() - 1;
            let Entry::Directory(dir) = &self.entries[current_index] else {
                return None;
            };
            let range = dir.entries_index as usize
                ..(dir.entries_index as usize + dir.entries_count as usize).min(self.entries.len());

            let mut directories = Vec::new();
            let mut files = Vec::new();
            for idx in range {
                if self.entries[idx].name_lower() == segment {
                    if self.entries[idx].is_directory() {
                        directories.push(idx);
                    } else {
                        files.push(idx);
                    }
                }
            }

            let found = directories.into_iter().next().or_else(|| files.into_iter().next())?;
            if is_last {
                return self.entries.get(found);
            }
            current_index = found;
        }

        None
    }
}

fn read_checked(path: &Path, offset: u64, len: u64, what: &'static str) -> Result<Vec<u8>, OpenError> {
    reader::read_exact_at(path, offset, len).map_err(|source| {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            OpenError::Truncated {
                path: path.to_path_buf(),
                what,
                offset,
                needed: len,
            }
        } else {
            OpenError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn resolve_name(
    names: &[u8],
    offset: u32,
    index: u32,
    path: &Path,
) -> Result<String, OpenError> {
    let start = offset as usize;
    if start > names.len() {
        return Err(OpenError::NamesOverrun {
            path: path.to_path_buf(),
            index,
        });
    }
    let end = names[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|pos| start + pos)
        .ok_or_else(|| OpenError::NamesOverrun {
            path: path.to_path_buf(),
            index,
        })?;
    Ok(String::from_utf8_lossy(&names[start..end]).into_owned())
}

/// Builds parent links and backslash-joined paths for every entry via a
/// breadth-first walk starting at the root (index 0), per `spec.md` §4.3.
fn build_hierarchy(records: Vec<(RawRecord, String)>) -> Vec<Entry> {
    let count = records.len();
    let mut parents: Vec<Option<usize>> = vec![None; count];
    let mut paths: Vec<String> = vec![String::new(); count];

    if count > 0 {
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(0);

        while let Some(dir_index) = queue.pop_front() {
            let RawRecord::Directory(DirectoryRecord {
                entries_index,
                entries_count,
                ..
            }) = records[dir_index].0
            else {
                continue;
            };

            let start = entries_index as usize;
            let end = (start + entries_count as usize).min(count);
            let parent_path = paths[dir_index].clone();

            for idx in start..end {
                if idx == dir_index {
                    continue;
                }
                parents[idx] = Some(dir_index);
                let name = &records[idx].1;
                paths[idx] = if parent_path.is_empty() {
                    name.clone()
                } else {
                    format!("{parent_path}\\{name}")
                };
                if matches!(records[idx].0, RawRecord::Directory(_)) {
                    queue.push_back(idx);
                }
            }
        }
    }

    records
        .into_iter()
        .enumerate()
        .map(|(index, (record, name))| {
            let name_lower = name.to_lowercase();
            let parent = parents[index];
            let path = std::mem::take(&mut paths[index]);
            match record {
                RawRecord::Directory(DirectoryRecord {
                    entries_index,
                    entries_count,
                    ..
                }) => Entry::Directory(DirectoryEntry {
                    name,
                    name_lower,
                    path,
                    parent,
                    entries_index,
                    entries_count,
                }),
                RawRecord::BinaryFile(BinaryFileRecord {
                    on_disk_size,
                    payload_block_offset,
                    uncompressed_size,
                    encryption_type,
                    ..
                }) => Entry::BinaryFile(FileEntry {
                    name,
                    name_lower,
                    path,
                    parent,
                    on_disk_size: on_disk_size as u64,
                    uncompressed_size: uncompressed_size as u64,
                    payload_block_offset,
                    encryption_type,
                }),
                RawRecord::ResourceFile(record @ ResourceFileRecord { payload_block_offset, .. }) => {
                    let size = record.effective_size();
                    Entry::ResourceFile(FileEntry {
                        name,
                        name_lower,
                        path,
                        parent,
                        on_disk_size: size,
                        uncompressed_size: size,
                        payload_block_offset,
                        encryption_type: 0,
                    })
                }
            }
        })
        .collect()
}

fn scan_nested_archives(
    archive: &mut Archive,
    keystream: &dyn KeystreamProvider,
) -> Result<(), OpenError> {
    let candidates: Vec<(usize, String, u64, u32)> = archive
        .entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match entry {
            Entry::BinaryFile(f) if f.name_lower.ends_with(ARCHIVE_EXTENSION) => {
                Some((index, f.name.clone(), f.on_disk_size, f.payload_block_offset))
            }
            _ => None,
        })
        .collect();

    for (entry_index, name, size, payload_block_offset) in candidates {
        let child_offset = archive.start_offset + payload_block_offset as u64 * PAYLOAD_BLOCK_SIZE;
        match Archive::open(&archive.backing_path, child_offset, &name, size, keystream) {
            Ok(child) => {
                tracing::trace!(name = %name, offset = child_offset, "discovered nested archive");
                archive.children.push(NestedArchive {
                    entry_index,
                    archive: child,
                });
            }
            Err(err) => {
                tracing::warn!(name = %name, offset = child_offset, error = %err, "failed to open nested archive, skipping");
            }
        }
    }

    Ok(())
}
