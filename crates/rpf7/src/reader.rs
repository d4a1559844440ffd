//! Scoped, positioned access to a backing file.
//!
//! Every read opens its own file descriptor and releases it when the
//! function returns, on every exit path including errors: descriptors are
//! never held across calls or shared between concurrent reads, so readers
//! never contend on a shared seek position. This differs from
//! `fstools-dvdbnd`'s persistent per-archive `mmap`: `spec.md` §5 requires a
//! fresh descriptor per read, which a long-lived mapping does not model.

use std::fs::File;
use std::io;
use std::path::Path;

#[cfg(unix)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(not(unix))]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

/// Reads exactly `len` bytes at `offset` from the file at `path`, opening
/// and closing a fresh descriptor for the call.
pub fn read_exact_at(path: &Path, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buf = vec![0u8; len as usize];
    read_at(&file, offset, &mut buf)?;
    Ok(buf)
}

/// Reads exactly `len` bytes at `offset`, but tolerates a short file: any
/// bytes beyond EOF come back as the partial read rather than an error.
/// Used for validating input during tests; production reads always use
/// [`read_exact_at`] and surface `Truncated`/`ReadTruncated` instead.
#[cfg(test)]
pub fn read_at_best_effort(path: &Path, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    let mut total = 0;
    loop {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    buf.truncate(total);
    Ok(buf)
}
