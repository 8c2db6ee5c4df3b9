//! Scoped memory mappings over raster backing files
//!
//! The whole backing file is mapped from its origin, which keeps the OS
//! page-alignment requirement out of the caller's sight: element offsets
//! are plain byte offsets into the mapping. The mapping is unmapped when
//! the owning [`super::Volume`] drops, on every exit path.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{Error, Result};

/// A mapping of a backing file, read-only or read-write.
#[derive(Debug)]
pub(super) enum MappedRegion {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl MappedRegion {
    pub(super) fn bytes(&self) -> &[u8] {
        match self {
            MappedRegion::ReadOnly(map) => map,
            MappedRegion::ReadWrite(map) => map,
        }
    }

    pub(super) fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match self {
            MappedRegion::ReadOnly(_) => Err(Error::ReadOnlyVolume),
            MappedRegion::ReadWrite(map) => Ok(map),
        }
    }

    pub(super) fn flush(&self) -> Result<()> {
        if let MappedRegion::ReadWrite(map) = self {
            map.flush()?;
        }
        Ok(())
    }
}

/// Map `path` read-only, requiring at least `needed` bytes.
pub(super) fn map_readonly(path: &Path, needed: u64) -> Result<MappedRegion> {
    let file = File::open(path)?;
    ensure_len(path, &file, needed)?;
    // Safety: the single producer/consumer contract gives this process
    // exclusive access to the byte range for the mapping's lifetime.
    let map = unsafe { MmapOptions::new().map(&file)? };
    Ok(MappedRegion::ReadOnly(map))
}

/// Map `path` read-write, requiring at least `needed` bytes.
pub(super) fn map_readwrite(path: &Path, needed: u64) -> Result<MappedRegion> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    ensure_len(path, &file, needed)?;
    // Safety: see map_readonly.
    let map = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(MappedRegion::ReadWrite(map))
}

/// Create (or truncate) a zero-filled backing file of `len` bytes and map it
/// read-write.
pub(super) fn create_backing(path: &Path, len: u64) -> Result<MappedRegion> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(len)?;
    // Safety: see map_readonly.
    let map = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(MappedRegion::ReadWrite(map))
}

fn ensure_len(path: &Path, file: &File, needed: u64) -> Result<()> {
    let actual = file.metadata()?.len();
    if actual < needed {
        return Err(Error::ShortFile {
            path: path.to_path_buf(),
            needed,
            actual,
        });
    }
    Ok(())
}
