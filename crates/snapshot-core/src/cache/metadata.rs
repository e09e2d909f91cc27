//! Tag/state metadata word of one cache way.

/// Number of low bits holding the line state.
pub const STATE_BITS: u32 = 2;

/// Mask selecting the line state from a metadata word.
pub const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

/// Largest tag that shares a word with the state bits.
pub const MAX_TAG: u64 = u64::MAX >> STATE_BITS;

/// Validity and dirtiness of one cache way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LineState {
    /// Way holds no line.
    #[default]
    Invalid = 0,
    /// Way holds a line identical to the next level.
    Clean = 1,
    /// Way holds a modified line.
    Dirty = 2,
}

impl LineState {
    /// Decodes the two state bits. The value 3 has no meaning.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            0 => Some(Self::Invalid),
            1 => Some(Self::Clean),
            2 => Some(Self::Dirty),
            _ => None,
        }
    }

    /// Builds a state from document flags. A dirty line must be valid.
    #[must_use]
    pub const fn from_flags(valid: bool, dirty: bool) -> Option<Self> {
        match (valid, dirty) {
            (false, false) => Some(Self::Invalid),
            (true, false) => Some(Self::Clean),
            (true, true) => Some(Self::Dirty),
            (false, true) => None,
        }
    }

    /// Two-bit wire encoding.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self as u64
    }

    /// `true` for clean and dirty lines.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// `true` only for dirty lines.
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Dirty)
    }
}

/// Decoded metadata word: `tag << 2 | state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WayMetadata {
    /// Line tag.
    pub tag: u64,
    /// Line state.
    pub state: LineState,
}

impl WayMetadata {
    /// Decodes a raw metadata word, rejecting the illegal state value.
    #[must_use]
    pub const fn decode(word: u64) -> Option<Self> {
        match LineState::from_bits(word & STATE_MASK) {
            Some(state) => Some(Self {
                tag: word >> STATE_BITS,
                state,
            }),
            None => None,
        }
    }

    /// Encodes the metadata word. Tags above [`MAX_TAG`] lose their top bits.
    #[must_use]
    pub const fn encode(self) -> u64 {
        debug_assert!(self.tag <= MAX_TAG);
        (self.tag << STATE_BITS) | self.state.bits()
    }
}
