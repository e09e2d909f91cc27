//! Bounded circular character queue.

use thiserror::Error;

/// Capacity of the console input queue.
pub const CHAR_QUEUE_CAPACITY: usize = 1024;

/// Returned by [`CharQueue::enqueue`] when every slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("console input queue is full, dropped {byte:#04x}")]
pub struct QueueFull {
    /// Character that was not stored.
    pub byte: u8,
}

/// FIFO ring of characters indexed by head and count modulo capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharQueue {
    slots: Box<[u8]>,
    head: usize,
    count: usize,
}

impl Default for CharQueue {
    fn default() -> Self {
        Self::with_capacity(CHAR_QUEUE_CAPACITY)
    }
}

impl CharQueue {
    /// Creates an empty queue holding at most `capacity` characters.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            head: 0,
            count: 0,
        }
    }

    /// Maximum number of queued characters.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of queued characters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` when nothing is queued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns `true` when no slot is free.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Appends a character at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] and leaves the queue unchanged when it is full.
    pub fn enqueue(&mut self, byte: u8) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull { byte });
        }
        let tail = (self.head + self.count) % self.slots.len();
        self.slots[tail] = byte;
        self.count += 1;
        Ok(())
    }

    /// Removes the character at the head.
    pub fn dequeue(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        Some(byte)
    }
}
