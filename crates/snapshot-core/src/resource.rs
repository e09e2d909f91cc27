use std::fmt;

/// Hardware structure targeted by a resource access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Core control state; address 0 holds the program counter.
    CoreControl,
    /// Integer register file.
    RegisterFile,
    /// Level-1 instruction cache.
    L1i,
    /// Level-1 data cache.
    L1d,
    /// Unified level-2 cache.
    L2,
    /// Main memory, addressed in cache-line units.
    MainMemory,
}

impl Resource {
    /// Cache levels in snapshot order.
    pub const CACHES: [Self; 3] = [Self::L1i, Self::L1d, Self::L2];

    /// Wire id carried in the access request.
    ///
    /// Core control and the register file share id 0: register 0 is hardwired
    /// to zero, so the hardware reuses that slot for the program counter.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::CoreControl | Self::RegisterFile => 0,
            Self::L1i => 1,
            Self::L1d => 2,
            Self::L2 => 3,
            Self::MainMemory => 4,
        }
    }

    /// Returns `true` for the three cache levels.
    #[must_use]
    pub const fn is_cache(self) -> bool {
        matches!(self, Self::L1i | Self::L1d | Self::L2)
    }

    /// Section name used for this resource in the snapshot document.
    #[must_use]
    pub const fn section(self) -> &'static str {
        match self {
            Self::CoreControl => "PC",
            Self::RegisterFile => "RegisterFile",
            Self::L1i => "L1i",
            Self::L1d => "L1d",
            Self::L2 => "L2",
            Self::MainMemory => "MainMem",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}
