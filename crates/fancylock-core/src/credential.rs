//! Zeroizing buffer for in-progress password entry
//!
//! The backing storage is always fully initialised: bytes past the logical
//! length are zero. Every operation that shrinks the logical length zeroes
//! the vacated bytes before returning, and growth copies into a fresh
//! allocation and zeroes the old one before it is released. The buffer is
//! wiped on drop.

use std::fmt;

use zeroize::Zeroize;

/// Default cap on the true credential length, in bytes
pub const DEFAULT_MAX_CREDENTIAL_LEN: usize = 512;

/// Initial backing allocation
const INITIAL_CAPACITY: usize = 64;

/// Secure buffer holding the password currently being typed
pub struct SecureCredentialBuffer {
    /// Backing storage; `storage.len()` is the capacity, not the logical length
    storage: Vec<u8>,
    /// Logical length in bytes
    len: usize,
    /// Hard cap on the logical length; input beyond it is dropped
    max_len: usize,
}

impl SecureCredentialBuffer {
    /// Create an empty buffer with the default length cap
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_CREDENTIAL_LEN)
    }

    /// Create an empty buffer that silently drops input beyond `max_len` bytes
    pub fn with_max_len(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            storage: vec![0u8; INITIAL_CAPACITY.min(max_len)],
            len: 0,
            max_len,
        }
    }

    /// Append a single byte. Returns false if the cap dropped it.
    pub fn append(&mut self, byte: u8) -> bool {
        if self.len >= self.max_len {
            return false;
        }
        if self.len == self.storage.len() {
            self.grow();
        }
        self.storage[self.len] = byte;
        self.len += 1;
        true
    }

    /// Append a character as UTF-8. The whole character is dropped if it
    /// would not fit under the cap.
    pub fn push_char(&mut self, c: char) -> bool {
        let mut encoded = [0u8; 4];
        let width = c.encode_utf8(&mut encoded).len();

        let accepted = self.len + width <= self.max_len;
        if accepted {
            for byte in &encoded[..width] {
                self.append(*byte);
            }
        }

        encoded.zeroize();
        accepted
    }

    /// Remove the last character (all of its UTF-8 bytes), zeroing them.
    /// Returns false if the buffer was already empty.
    pub fn remove_last(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }

        let mut start = self.len - 1;
        while start > 0 && is_continuation(self.storage[start]) {
            start -= 1;
        }

        self.storage[start..self.len].zeroize();
        self.len = start;
        true
    }

    /// Zero and empty the buffer
    pub fn clear(&mut self) {
        self.storage[..self.len].zeroize();
        self.len = 0;
    }

    /// Logical length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been typed
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of characters typed (what the dot row counts)
    pub fn char_count(&self) -> usize {
        self.expose()
            .iter()
            .filter(|byte| !is_continuation(**byte))
            .count()
    }

    /// Length cap in bytes
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Read-only view of the credential, for the verification call only
    pub fn expose(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Move into a larger allocation, wiping the old one
    fn grow(&mut self) {
        let capacity = (self.storage.len() * 2).clamp(self.len + 1, self.max_len);
        let mut next = vec![0u8; capacity];
        next[..self.len].copy_from_slice(&self.storage[..self.len]);

        let mut old = std::mem::replace(&mut self.storage, next);
        old.zeroize();
    }

    #[cfg(test)]
    fn backing(&self) -> &[u8] {
        &self.storage
    }
}

impl Default for SecureCredentialBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SecureCredentialBuffer {
    fn drop(&mut self) {
        self.storage.zeroize();
        self.len = 0;
    }
}

impl fmt::Debug for SecureCredentialBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCredentialBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
