//! Append-only output buffer with capacity doubling.

use tracing::trace;

use crate::error::{Error, Result};

/// Capacity a fresh buffer starts with.
pub const INITIAL_CAPACITY: usize = 0x100;

/// Owned byte storage that doubles its capacity whenever an append would
/// overflow it.
///
/// Growth failures are reported as [`Error::Alloc`] and leave the bytes
/// appended so far untouched.
#[derive(Debug)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl GrowableBuffer {
    /// Create a buffer with [`INITIAL_CAPACITY`].
    pub fn new() -> Result<Self> {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Create a buffer with the given starting capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_| Error::Alloc)?;
        Ok(Self { data, capacity })
    }

    /// Append bytes, doubling the capacity until they fit.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.data.len().checked_add(bytes.len()).ok_or(Error::Alloc)?;
        if needed > self.capacity {
            self.grow_to(needed)?;
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn grow_to(&mut self, needed: usize) -> Result<()> {
        let mut capacity = self.capacity;
        while capacity < needed {
            capacity = capacity.checked_mul(2).ok_or(Error::Alloc)?;
        }
        self.data
            .try_reserve_exact(capacity - self.data.len())
            .map_err(|_| Error::Alloc)?;
        trace!(from = self.capacity, to = capacity, "Grew line buffer.");
        self.capacity = capacity;
        Ok(())
    }

    /// Append a single byte.
    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.append(&[byte])
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current logical capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Borrow the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Hand the written bytes over to the caller.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Lets numbers be rendered with `write!` straight into the buffer.
impl std::fmt::Write for GrowableBuffer {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.append(s.as_bytes()).map_err(|_| std::fmt::Error)
    }
}
