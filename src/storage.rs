//! Storage abstraction layer for Repodex.
//!
//! The index treats its durable store as a flat namespace of named blobs
//! plus a write lock. Two backends are provided:
//!
//! - [`file::FileStorage`]: one file per blob in a directory
//! - [`memory::MemoryStorage`]: in-process, for tests and throwaway indexes
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//!
//! use repodex::storage::Storage;
//! use repodex::storage::memory::MemoryStorage;
//!
//! # fn main() -> repodex::error::Result<()> {
//! let storage = MemoryStorage::new();
//! let mut out = storage.create_output("hello.bin")?;
//! out.write_all(b"hi")?;
//! out.close()?;
//! assert_eq!(repodex::storage::read_file(&storage, "hello.bin")?, b"hi");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod traits;

pub use traits::{Storage, StorageInput, StorageLock, StorageOutput};

/// Read a whole blob into memory.
pub fn read_file(storage: &dyn Storage, name: &str) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name)?;
    let mut data = Vec::with_capacity(input.size()? as usize);
    input.read_to_end(&mut data)?;
    Ok(data)
}

/// Write a blob under a temporary name, sync it and rename it into place,
/// so readers never see a partially written `name`.
pub fn write_file_atomic(storage: &dyn Storage, name: &str, data: &[u8]) -> Result<()> {
    let temp = format!("{name}.tmp");
    let mut output = storage.create_output(&temp)?;
    output.write_all(data)?;
    output.flush_and_sync()?;
    output.close()?;
    storage.rename_file(&temp, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_atomic_write() {
        let storage = MemoryStorage::new();
        write_file_atomic(&storage, "segments_1", b"{}").unwrap();
        assert!(storage.file_exists("segments_1"));
        assert!(!storage.file_exists("segments_1.tmp"));
        assert_eq!(read_file(&storage, "segments_1").unwrap(), b"{}");
    }
}
