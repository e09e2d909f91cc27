//! Console words printed by the running workload.

use std::fmt;
use std::io::{self, Write};

use log::{info, warn};

const INTEGER_FLAG: u64 = 1 << 32;
const CHAR_BITS: u32 = 8;
const STATUS_SHIFT: u32 = 9;

/// Decoded 64-bit console word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleMessage {
    /// Signed 32-bit integer from the low word; bit 32 was set.
    Integer(i32),
    /// Single character; no bits above the low byte were set.
    Char(u8),
    /// Workload finished successfully.
    Pass,
    /// Workload finished with a failure code.
    Fail(u64),
}

impl ConsoleMessage {
    /// Decodes a console word.
    #[must_use]
    pub fn decode(word: u64) -> Self {
        if word & INTEGER_FLAG != 0 {
            let low = u32::try_from(word & u64::from(u32::MAX)).unwrap_or(u32::MAX);
            return Self::Integer(i32::from_ne_bytes(low.to_ne_bytes()));
        }
        if word >> CHAR_BITS == 0 {
            return Self::Char(u8::try_from(word).unwrap_or(u8::MAX));
        }
        match word >> STATUS_SHIFT {
            0 => Self::Pass,
            code => Self::Fail(code),
        }
    }

    /// Pass and fail end the workload.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Pass | Self::Fail(_))
    }
}

impl fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Char(byte) => write!(f, "{}", char::from(*byte)),
            Self::Pass => f.write_str(" PASS"),
            Self::Fail(code) => write!(f, " FAIL ({code})"),
        }
    }
}

/// Renders console output and remembers how the workload ended.
#[derive(Debug)]
pub struct ConsoleOutput<W> {
    out: W,
    outcome: Option<ConsoleMessage>,
}

impl<W: Write> ConsoleOutput<W> {
    /// Writes console output to `out`.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out, outcome: None }
    }

    /// Decodes and renders one console word.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn write_word(&mut self, word: u64) -> io::Result<ConsoleMessage> {
        let message = ConsoleMessage::decode(word);
        write!(self.out, "{message}")?;
        if message.is_terminal() {
            writeln!(self.out)?;
            self.out.flush()?;
            match message {
                ConsoleMessage::Pass => info!("workload passed"),
                _ => warn!("workload{message}"),
            }
            self.outcome = Some(message);
        }
        Ok(message)
    }

    /// Writes one raw UART byte.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn write_uart(&mut self, byte: u8) -> io::Result<()> {
        self.out.write_all(&[byte])
    }

    /// Terminal message, once the workload has reported one.
    #[must_use]
    pub const fn outcome(&self) -> Option<ConsoleMessage> {
        self.outcome
    }

    /// Returns `true` once a pass or fail word has been seen.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Releases the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
