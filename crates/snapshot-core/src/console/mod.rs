//! Character I/O side channel of the running workload.
//!
//! These handles are driven from the hardware notification path alongside
//! [`AckSink`](crate::AckSink) but never touch the request gate.

/// Console word decoding and rendering.
pub mod mmio;
/// Bounded character ring.
pub mod queue;

pub use mmio::{ConsoleMessage, ConsoleOutput};
pub use queue::{CharQueue, QueueFull, CHAR_QUEUE_CAPACITY};

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

#[derive(Debug, Default)]
struct InputShared {
    queue: Mutex<CharQueue>,
    available: Condvar,
}

/// Keyboard input waiting to be read by the workload. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct ConsoleInput {
    shared: Arc<InputShared>,
}

impl ConsoleInput {
    /// Creates an input queue holding at most `capacity` characters.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(InputShared {
                queue: Mutex::new(CharQueue::with_capacity(capacity)),
                available: Condvar::new(),
            }),
        }
    }

    /// Queues a character typed by the user.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] when the queue has no room; the character is
    /// dropped.
    pub fn push(&self, byte: u8) -> Result<(), QueueFull> {
        let result = self.lock().enqueue(byte);
        match result {
            Ok(()) => self.shared.available.notify_one(),
            Err(full) => warn!("{full}"),
        }
        result
    }

    /// Answers the workload's "input available" query.
    #[must_use]
    pub fn has_input(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Takes the next character without waiting.
    #[must_use]
    pub fn try_next(&self) -> Option<u8> {
        self.lock().dequeue()
    }

    /// Takes the next character, blocking until one is pushed.
    #[must_use]
    pub fn next_blocking(&self) -> u8 {
        let mut queue = self.lock();
        loop {
            if let Some(byte) = queue.dequeue() {
                debug!("console input {byte:#04x}");
                return byte;
            }
            queue = self
                .shared
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CharQueue> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-shot latch raised when the workload requests a halt.
///
/// Clones share the latch.
#[derive(Debug, Clone, Default)]
pub struct HaltSignal {
    shared: Arc<(Mutex<bool>, Condvar)>,
}

impl HaltSignal {
    /// Creates a lowered latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the latch and wakes every waiter.
    ///
    /// Returns `false` when it was already raised.
    pub fn raise(&self) -> bool {
        let (raised, waiters) = &*self.shared;
        let mut raised = raised.lock().unwrap_or_else(PoisonError::into_inner);
        if *raised {
            warn!("halt requested again after the latch was raised");
            return false;
        }
        *raised = true;
        waiters.notify_all();
        debug!("workload requested halt");
        true
    }

    /// Returns `true` once the latch is raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the latch is raised.
    pub fn wait(&self) {
        let (raised, waiters) = &*self.shared;
        let guard = raised.lock().unwrap_or_else(PoisonError::into_inner);
        let _raised = waiters
            .wait_while(guard, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::{ConsoleInput, HaltSignal, QueueFull};

    #[test]
    fn input_reports_availability_in_order() {
        let input = ConsoleInput::default();
        assert!(!input.has_input());

        input.push(b'h').expect("room left");
        input.push(b'i').expect("room left");
        assert!(input.has_input());
        assert_eq!(input.try_next(), Some(b'h'));
        assert_eq!(input.next_blocking(), b'i');
        assert_eq!(input.try_next(), None);
    }

    #[test]
    fn full_input_drops_the_character() {
        let input = ConsoleInput::with_capacity(1);
        input.push(b'a').expect("room left");
        assert_eq!(input.push(b'b'), Err(QueueFull { byte: b'b' }));
        assert_eq!(input.try_next(), Some(b'a'));
    }

    #[test]
    fn blocked_reader_wakes_on_push() {
        let input = ConsoleInput::default();
        let reader = {
            let input = input.clone();
            thread::spawn(move || input.next_blocking())
        };

        input.push(b'z').expect("room left");
        assert_eq!(reader.join().expect("reader thread"), b'z');
    }

    #[test]
    fn halt_latch_is_one_shot() {
        let signal = HaltSignal::new();
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };

        assert!(!signal.is_raised());
        assert!(signal.raise());
        assert!(!signal.raise());
        waiter.join().expect("waiter thread");
        assert!(signal.is_raised());
    }
}
