//! Storage traits.

use std::fmt::Debug;
use std::io::{Read, Write};

use crate::error::Result;

/// A flat namespace of named blobs.
pub trait Storage: Send + Sync + Debug {
    /// Open a blob for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a blob for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a blob exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a blob. Deleting a missing blob is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all blob names, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Size of a blob in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Rename a blob, replacing any existing blob named `new_name`.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make every completed write and rename durable.
    fn sync(&self) -> Result<()>;

    /// Acquire an exclusive named lock. Fails if it is already held.
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;
}

/// Trait for storage input streams.
pub trait StorageInput: Read + Send + Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// Trait for storage output streams.
pub trait StorageOutput: Write + Send + Debug {
    /// Flush and sync the output to the backing store.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Close the output stream, publishing its contents.
    fn close(&mut self) -> Result<()>;
}

/// An exclusive lock held on a storage.
pub trait StorageLock: Send + Debug {
    /// Get the lock name.
    fn name(&self) -> &str;

    /// Release the lock. Releasing twice is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Check if the lock is still held.
    fn is_valid(&self) -> bool;
}
