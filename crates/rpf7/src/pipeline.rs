//! Entry data pipeline: read the raw payload, apply the archive's
//! encryption mode, then inflate when the entry declares a differing
//! uncompressed size. Per `spec.md` §4.4.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::archive::{Archive, EncryptionMode, Entry, FileEntry};
use crate::error::ReadError;
use crate::keystream::{xor_with_keystream, KeystreamProvider};
use crate::{cipher, reader};

/// Reads and fully decodes the bytes of `entry` within `archive`.
///
/// `entry` must be a [`Entry::BinaryFile`] or [`Entry::ResourceFile`];
/// directory entries return [`ReadError::EntryNotFile`].
pub fn read_entry(
    archive: &Archive,
    entry: &Entry,
    keystream: &dyn KeystreamProvider,
) -> Result<Vec<u8>, ReadError> {
    let (file, is_resource) = match entry {
        Entry::BinaryFile(f) => (f, false),
        Entry::ResourceFile(f) => (f, true),
        Entry::Directory(_) => return Err(ReadError::EntryNotFile),
    };

    let payload_offset = file.payload_offset(archive.start_offset);
    let mut buffer = read_payload(&archive.backing_path, payload_offset, file.on_disk_size)?;

    if file.encryption_type != 0 {
        buffer = decrypt_payload(archive, file, buffer, keystream)?;
    }

    if is_resource {
        return Ok(buffer);
    }

    if file.is_compressed() {
        inflate(&buffer, file.uncompressed_size)
    } else {
        Ok(buffer)
    }
}

fn decrypt_payload(
    archive: &Archive,
    file: &FileEntry,
    buffer: Vec<u8>,
    keystream: &dyn KeystreamProvider,
) -> Result<Vec<u8>, ReadError> {
    match archive.encryption {
        EncryptionMode::Aes => Ok(cipher::decrypt(buffer)),
        EncryptionMode::Ng => {
            let mut buffer = buffer;
            let stream = keystream.keystream(&file.name_lower, file.uncompressed_size as u32)?;
            xor_with_keystream(&mut buffer, &stream);
            Ok(buffer)
        }
        EncryptionMode::None | EncryptionMode::Open => Ok(buffer),
    }
}

fn inflate(buffer: &[u8], expected_len: u64) -> Result<Vec<u8>, ReadError> {
    let mut decoder = DeflateDecoder::new(buffer);
    let mut out = Vec::with_capacity(expected_len as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ReadError::InflateFailed(e.to_string()))?;

    if out.len() as u64 != expected_len {
        return Err(ReadError::InflateLengthMismatch {
            expected: expected_len as u32,
            produced: out.len() as u64,
        });
    }

    Ok(out)
}

fn read_payload(path: &std::path::Path, offset: u64, len: u64) -> Result<Vec<u8>, ReadError> {
    reader::read_exact_at(path, offset, len).map_err(|source| {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            ReadError::ReadTruncated { expected: len }
        } else {
            ReadError::Io(source)
        }
    })
}
