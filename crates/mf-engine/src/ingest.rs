use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

/// Read-only memory-mapped dataset.
///
/// The engine only needs "a byte buffer of known length"; mapping the
/// file keeps ingestion one `&[u8]` away from the kernel page cache with
/// no copy into userspace.
pub struct InputFile {
    map: Mmap,
}

impl InputFile {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is private and read-only; the dataset file
        // must not be truncated by another process while the run holds
        // the map.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
