//! Decoding of the 16-byte TOC entry records into a closed, tagged `Entry`
//! enum, per the bit-packed layout in `spec.md` §3.
//!
//! Every on-disk integer is little-endian; fields are pulled out with
//! explicit shifts and masks rather than any `#[repr(C)]` struct cast,
//! because field boundaries are not byte-aligned (`on_disk_size` spans bits
//! 16..40 of the first 64-bit word).

use crate::error::OpenError;

/// Sentinel stored in a directory record's discriminator word.
pub const DIRECTORY_SENTINEL: u32 = 0x7FFF_FF00;

/// Sentinel on-disk size for a resource entry whose true size must be
/// reconstructed from its system/graphics flags.
pub const RESOURCE_SIZE_SENTINEL: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub name_offset: u32,
    pub entries_index: u32,
    pub entries_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFileRecord {
    pub name_offset: u32,
    pub on_disk_size: u32,
    pub payload_block_offset: u32,
    pub uncompressed_size: u32,
    pub encryption_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFileRecord {
    pub name_offset: u32,
    pub on_disk_size: u32,
    pub payload_block_offset: u32,
    pub system_flags: u32,
    pub graphics_flags: u32,
}

impl ResourceFileRecord {
    /// Reconstructs the true on-disk (== uncompressed) size from the
    /// bit-packed system/graphics flag fields, per `spec.md` §4.3. Only
    /// meaningful when `on_disk_size == RESOURCE_SIZE_SENTINEL`.
    pub fn reconstructed_size(&self) -> u64 {
        let sys = self.system_flags;
        let gfx = self.graphics_flags;

        let base: u64 = if (sys >> 27) & 1 != 0 { 0x10 } else { 0 };
        let vmem: u64 = ((sys & 0x7FF) as u64) << ((sys >> 11) & 0xF);
        let pmem: u64 = (((sys >> 15) & 0x7F) as u64) << ((sys >> 25) & 0xF);
        let vgfx: u64 = ((gfx & 0x7FF) as u64) << ((gfx >> 11) & 0xF);
        let pgfx: u64 = (((gfx >> 15) & 0x7F) as u64) << ((gfx >> 25) & 0xF);

        base + vmem + pmem + vgfx + pgfx
    }

    /// The effective on-disk size, resolving the `0xFFFFFF` sentinel.
    pub fn effective_size(&self) -> u64 {
        if self.on_disk_size == RESOURCE_SIZE_SENTINEL {
            self.reconstructed_size()
        } else {
            self.on_disk_size as u64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRecord {
    Directory(DirectoryRecord),
    BinaryFile(BinaryFileRecord),
    ResourceFile(ResourceFileRecord),
}

/// Decodes one 16-byte TOC record at `index` within `backing_path` (used
/// only for error messages).
pub fn decode_record(
    bytes: &[u8; 16],
    index: u32,
    backing_path: &std::path::Path,
) -> Result<RawRecord, OpenError> {
    let d1 = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let d2 = u64::from_le_bytes(bytes[8..16].try_into().unwrap());

    // `h2`: the second 32-bit word of the record (bytes 4..8, the upper
    // half of `d1`). Directory records store their sentinel here; file
    // records never do, since those bytes are bit-packed size/offset data.
    let h2 = (d1 >> 32) as u32;

    if h2 == DIRECTORY_SENTINEL {
        let name_offset = d1 as u32;
        let entries_index = d2 as u32;
        let entries_count = (d2 >> 32) as u32;
        return Ok(RawRecord::Directory(DirectoryRecord {
            name_offset,
            entries_index,
            entries_count,
        }));
    }

    let name_offset = (d1 & 0xFFFF) as u32;
    let on_disk_size = ((d1 >> 16) & 0x00FF_FFFF) as u32;
    let payload_block_offset = ((d1 >> 40) & 0x00FF_FFFF) as u32;

    // The file-entry high bit: the top bit of the second 64-bit word,
    // i.e. the high bit of the byte group starting at the record's 9th
    // byte. Set for resource files, clear for binary files.
    let is_resource = (d2 >> 63) & 1 != 0;

    if is_resource {
        let system_flags = d2 as u32;
        let graphics_flags = (d2 >> 32) as u32;
        Ok(RawRecord::ResourceFile(ResourceFileRecord {
            name_offset,
            on_disk_size,
            payload_block_offset,
            system_flags,
            graphics_flags,
        }))
    } else {
        if (d2 >> 32) != 0 {
            return Err(OpenError::InvalidBinaryEntry {
                path: backing_path.to_path_buf(),
                index,
            });
        }
        let uncompressed_size = (d2 & 0x00FF_FFFF) as u32;
        let encryption_type = ((d2 >> 24) & 0xFF) as u8;
        Ok(RawRecord::BinaryFile(BinaryFileRecord {
            name_offset,
            on_disk_size,
            payload_block_offset,
            uncompressed_size,
            encryption_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record_bytes(d1: u64, d2: u64) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&d1.to_le_bytes());
        out[8..16].copy_from_slice(&d2.to_le_bytes());
        out
    }

    #[test]
    fn decodes_directory_record() {
        let d1 = 9u64 | ((DIRECTORY_SENTINEL as u64) << 32);
        let d2 = 1u64 | (2u64 << 32);
        let bytes = record_bytes(d1, d2);
        let record = decode_record(&bytes, 0, Path::new("test.rpf")).unwrap();
        assert_eq!(
            record,
            RawRecord::Directory(DirectoryRecord {
                name_offset: 9,
                entries_index: 1,
                entries_count: 2,
            })
        );
    }

    #[test]
    fn decodes_binary_file_record() {
        let name_offset = 9u64;
        let on_disk_size = 5u64;
        let payload_block_offset = 1u64;
        let d1 = name_offset | (on_disk_size << 16) | (payload_block_offset << 40);
        let uncompressed_size = 0u64;
        let encryption_type = 0u64;
        let d2 = uncompressed_size | (encryption_type << 24);
        let bytes = record_bytes(d1, d2);
        let record = decode_record(&bytes, 1, Path::new("test.rpf")).unwrap();
        assert_eq!(
            record,
            RawRecord::BinaryFile(BinaryFileRecord {
                name_offset: 9,
                on_disk_size: 5,
                payload_block_offset: 1,
                uncompressed_size: 0,
                encryption_type: 0,
            })
        );
    }

    #[test]
    fn rejects_binary_record_with_nonzero_high_bits() {
        let d1 = 0u64;
        let d2 = 1u64 << 40;
        let bytes = record_bytes(d1, d2);
        let err = decode_record(&bytes, 3, Path::new("test.rpf")).unwrap_err();
        assert!(matches!(err, OpenError::InvalidBinaryEntry { index: 3, .. }));
    }

    #[test]
    fn decodes_resource_file_record() {
        let d1 = 9u64 | (RESOURCE_SIZE_SENTINEL as u64) << 16;
        let system_flags = 0x0000_0001u64;
        let graphics_flags = 0x8000_0000u64; // high bit set -> marks resource
        let d2 = system_flags | (graphics_flags << 32);
        let bytes = record_bytes(d1, d2);
        let record = decode_record(&bytes, 2, Path::new("test.rpf")).unwrap();
        match record {
            RawRecord::ResourceFile(r) => {
                assert_eq!(r.system_flags, 1);
                assert_eq!(r.graphics_flags, 0x8000_0000);
                assert_eq!(r.reconstructed_size(), 1);
                assert_eq!(r.effective_size(), 1);
            }
            other => panic!("expected resource file, got {other:?}"),
        }
    }

    #[test]
    fn reconstructed_size_is_monotonic_in_each_flag_field() {
        let base = ResourceFileRecord {
            name_offset: 0,
            on_disk_size: RESOURCE_SIZE_SENTINEL,
            payload_block_offset: 0,
            system_flags: 0,
            graphics_flags: 0x8000_0000,
        };
        let bumped = ResourceFileRecord {
            system_flags: base.system_flags | 1,
            ..base
        };
        assert!(bumped.reconstructed_size() >= base.reconstructed_size());
    }
}
