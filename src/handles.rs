//! Handle table granting exactly-once release of worker-owned buffers
//!
//! Buffers produced by the compression pipeline are owned by exactly one
//! table entry from registration until release. Handles are minted from a
//! monotone counter and never reused, so a stale handle can never alias a
//! newer buffer.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

/// Opaque identifier for one registered buffer, never zero
pub type Handle = u64;

/// Reserved invalid handle value
pub const INVALID_HANDLE: Handle = 0;

/// Concurrency-safe map from handle to owned buffer
#[derive(Debug)]
pub struct HandleTable {
    entries: Mutex<HashMap<Handle, Vec<u8>>>,
    next_handle: AtomicU64,
}

impl HandleTable {
    /// Create an empty table, first handle issued is 1
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Take ownership of `buffer` and return a freshly minted handle
    pub fn register(&self, buffer: Vec<u8>) -> Handle {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().insert(handle, buffer);
        handle
    }

    /// Free the buffer behind `handle`; false if it is unknown or already
    /// released, with no other effect
    pub fn release(&self, handle: Handle) -> bool {
        self.entries.lock().unwrap().remove(&handle).is_some()
    }

    /// Snapshot emptiness check
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Number of outstanding entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
