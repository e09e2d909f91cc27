//! Word-width conversion between the host line view and the transport vector.
//!
//! The host handles every value as eight 64-bit words (`HostLine`, word 0 is
//! the least significant). The hardware transport only accepts sixteen 32-bit
//! words (`HardwareVector`) with the host words in reverse order: host word 7
//! occupies hardware words 0 and 1, host word 0 occupies hardware words 14 and
//! 15. Each host word is split high half first.

/// Number of 64-bit words in a host line.
pub const HOST_WORDS: usize = 8;

/// Number of 32-bit words in a hardware transport vector.
pub const HARDWARE_WORDS: usize = 16;

/// A 512-bit value as eight 64-bit words, least significant word first.
pub type HostLine = [u64; HOST_WORDS];

/// A 512-bit value in the transport's native sixteen-word layout.
pub type HardwareVector = [u32; HARDWARE_WORDS];

/// All-zero host line.
pub const ZERO_LINE: HostLine = [0; HOST_WORDS];

/// Converts a host line into the transport word vector.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn to_hardware(line: &HostLine) -> HardwareVector {
    let mut vector = [0_u32; HARDWARE_WORDS];
    let mut index = 0;
    while index < HOST_WORDS {
        let word = line[HOST_WORDS - 1 - index];
        vector[2 * index] = (word >> 32) as u32;
        vector[2 * index + 1] = word as u32;
        index += 1;
    }
    vector
}

/// Converts a transport word vector back into a host line.
#[must_use]
pub const fn to_host(vector: &HardwareVector) -> HostLine {
    let mut line = [0_u64; HOST_WORDS];
    let mut index = 0;
    while index < HOST_WORDS {
        let high = vector[2 * index] as u64;
        let low = vector[2 * index + 1] as u64;
        line[HOST_WORDS - 1 - index] = (high << 32) | low;
        index += 1;
    }
    line
}

/// Places a single register value in host word 0 of an otherwise zero line.
#[must_use]
pub const fn register_to_line(value: u64) -> HostLine {
    let mut line = ZERO_LINE;
    line[0] = value;
    line
}

/// Extracts a register value from host word 0; the remaining words carry
/// nothing for single-word resources.
#[must_use]
pub const fn line_to_register(line: &HostLine) -> u64 {
    line[0]
}
