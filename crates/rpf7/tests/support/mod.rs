//! Shared fixture builders for the integration tests: byte-exact RPF7
//! archives assembled by hand so each scenario exercises a known, specific
//! on-disk layout rather than a round-trip through a writer this crate
//! doesn't implement.

use std::io::Write;

use tempfile::NamedTempFile;

pub const RPF_VERSION: u32 = 0x5250_4637;
pub const ENC_NONE: u32 = 0x0000_0000;
pub const ENC_AES: u32 = 0x0FFF_FFF9;
pub const DIRECTORY_SENTINEL: u64 = 0x7FFF_FF00;

/// Packs a directory TOC record: sentinel in the high 32 bits of `d1`,
/// `entries_index`/`entries_count` in the low/high halves of `d2`.
pub fn directory_record(name_offset: u32, entries_index: u32, entries_count: u32) -> [u8; 16] {
    let d1 = name_offset as u64 | (DIRECTORY_SENTINEL << 32);
    let d2 = entries_index as u64 | ((entries_count as u64) << 32);
    record_bytes(d1, d2)
}

/// Packs a binary-file TOC record.
pub fn binary_record(
    name_offset: u16,
    on_disk_size: u32,
    payload_block_offset: u32,
    uncompressed_size: u32,
    encryption_type: u8,
) -> [u8; 16] {
    let d1 = name_offset as u64
        | ((on_disk_size as u64 & 0x00FF_FFFF) << 16)
        | ((payload_block_offset as u64 & 0x00FF_FFFF) << 40);
    let d2 = (uncompressed_size as u64 & 0x00FF_FFFF) | ((encryption_type as u64) << 24);
    record_bytes(d1, d2)
}

/// Packs a resource-file TOC record. `graphics_flags` must carry the high
/// bit (the resource/binary discriminator) for the record to decode as a
/// resource at all; callers pass the full 32-bit field, discriminator
/// included.
pub fn resource_record(
    name_offset: u16,
    on_disk_size: u32,
    payload_block_offset: u32,
    system_flags: u32,
    graphics_flags: u32,
) -> [u8; 16] {
    let d1 = name_offset as u64
        | ((on_disk_size as u64 & 0x00FF_FFFF) << 16)
        | ((payload_block_offset as u64 & 0x00FF_FFFF) << 40);
    let d2 = system_flags as u64 | ((graphics_flags as u64) << 32);
    record_bytes(d1, d2)
}

fn record_bytes(d1: u64, d2: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&d1.to_le_bytes());
    out[8..16].copy_from_slice(&d2.to_le_bytes());
    out
}

/// Assembles a full archive byte buffer: header, entries table, names
/// table, then each `(payload_block_offset, bytes)` pair written at its
/// 512-byte-block-aligned absolute offset, zero-padding any gaps.
pub fn assemble_archive(
    entry_count: u32,
    names_length: u32,
    encryption_field: u32,
    entries: &[[u8; 16]],
    names: &[u8],
    payloads: &[(u32, &[u8])],
) -> Vec<u8> {
    assert_eq!(entries.len(), entry_count as usize);
    assert_eq!(names.len(), names_length as usize);

    let mut buf = Vec::new();
    buf.extend_from_slice(&RPF_VERSION.to_le_bytes());
    buf.extend_from_slice(&entry_count.to_le_bytes());
    buf.extend_from_slice(&names_length.to_le_bytes());
    buf.extend_from_slice(&encryption_field.to_le_bytes());
    for record in entries {
        buf.extend_from_slice(record);
    }
    buf.extend_from_slice(names);

    for &(block_offset, data) in payloads {
        let byte_offset = block_offset as usize * 512;
        if buf.len() < byte_offset {
            buf.resize(byte_offset, 0);
        }
        let end = byte_offset + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[byte_offset..end].copy_from_slice(data);
    }

    buf
}

pub fn write_temp_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}
