//! Fixed-key AES-128 ECB block cipher used by the `AES` encryption mode.
//!
//! The key is compiled in: this mode carries no per-archive or per-entry
//! key material, unlike `fstools-dvdbnd`'s BHD key-provider scheme. Any
//! trailing bytes that don't fill a full 16-byte block are passed through
//! unchanged, matching the archive's own padding policy.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use rayon::{iter::ParallelIterator, slice::ParallelSliceMut};

const BLOCK_SIZE: usize = 16;

/// Compiled-in 128-bit key for the `AES` TOC/payload mode.
///
/// This is a placeholder constant, not a recovered game key: the real value
/// is specific to each title's build and is intentionally not shipped here.
/// Swap this array for verified key material before relying on `AES` mode
/// against real archives.
const FIXED_KEY: [u8; 16] = [
    0x1a, 0xe3, 0x78, 0x9c, 0x4f, 0xd2, 0x65, 0x0b, 0x93, 0x5e, 0xc1, 0x27, 0xa8, 0x46, 0xf0, 0x3d,
];

fn cipher() -> Aes128 {
    Aes128::new(GenericArray::from_slice(&FIXED_KEY))
}

fn process_blocks(buffer: &mut [u8], encrypt: bool) {
    let whole_len = (buffer.len() / BLOCK_SIZE) * BLOCK_SIZE;
    let (whole, _tail) = buffer.split_at_mut(whole_len);

    let cipher = cipher();
    whole.par_chunks_mut(BLOCK_SIZE).for_each(|chunk| {
        let block = GenericArray::from_mut_slice(chunk);
        if encrypt {
            cipher.encrypt_block(block);
        } else {
            cipher.decrypt_block(block);
        }
    });
}

/// Decrypts `buffer` in place using fixed-key AES-128 ECB, 16 bytes at a
/// time. Any trailing `len % 16` bytes are left untouched.
pub fn decrypt(mut buffer: Vec<u8>) -> Vec<u8> {
    process_blocks(&mut buffer, false);
    buffer
}

/// Encrypts `buffer` in place using fixed-key AES-128 ECB. Symmetric with
/// [`decrypt`]: `encrypt(decrypt(buf)) == buf` for any length.
pub fn encrypt(mut buffer: Vec<u8>) -> Vec<u8> {
    process_blocks(&mut buffer, true);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_block_aligned_buffer() {
        let plain = vec![0x42u8; 64];
        let cipher = encrypt(plain.clone());
        assert_ne!(cipher, plain);
        let round_tripped = decrypt(cipher);
        assert_eq!(round_tripped, plain);
    }

    #[test]
    fn passes_through_trailing_partial_block() {
        let mut plain = vec![0xAAu8; 16];
        plain.extend_from_slice(b"tail");
        let cipher = encrypt(plain.clone());
        assert_eq!(&cipher[16..], b"tail");
        let round_tripped = decrypt(cipher);
        assert_eq!(round_tripped, plain);
    }

    #[test]
    fn empty_buffer_round_trips() {
        assert_eq!(decrypt(encrypt(Vec::new())), Vec::<u8>::new());
    }

    #[test]
    fn short_buffer_passes_through_entirely() {
        let plain = vec![1, 2, 3];
        assert_eq!(encrypt(plain.clone()), plain);
        assert_eq!(decrypt(plain.clone()), plain);
    }
}
