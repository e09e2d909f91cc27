//! Hardware build parameters and controller policy.

use serde::{Deserialize, Serialize};

use crate::{CacheGeometry, ConfigError, Resource};

/// Register-file size of the hardware build, including the zero register.
pub const DEFAULT_RF_SIZE: u64 = 32;

/// Main-memory size of the hardware build, in 512-bit lines.
pub const DEFAULT_MAIN_MEM_SIZE: u64 = 1_048_576;

/// Largest main memory, in lines, that a snapshot document may hold.
pub const MAX_MAIN_MEM_SIZE: u64 = 1 << 32;

/// L1 instruction cache of the hardware build: 64 sets x 2 ways.
pub const DEFAULT_L1I_GEOMETRY: CacheGeometry = CacheGeometry::new(6, 1);

/// L1 data cache of the hardware build: 64 sets x 2 ways.
pub const DEFAULT_L1D_GEOMETRY: CacheGeometry = CacheGeometry::new(6, 1);

/// L2 cache of the hardware build: 256 sets x 4 ways.
pub const DEFAULT_L2_GEOMETRY: CacheGeometry = CacheGeometry::new(8, 2);

/// Sizes of every resource walked by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreParameters {
    /// Register-file size including register 0, which is not snapshotted.
    pub rf_size: u64,
    /// Main-memory size in lines.
    pub main_mem_size: u64,
    /// L1 instruction cache geometry.
    pub l1i: CacheGeometry,
    /// L1 data cache geometry.
    pub l1d: CacheGeometry,
    /// L2 cache geometry.
    pub l2: CacheGeometry,
}

impl Default for CoreParameters {
    fn default() -> Self {
        Self {
            rf_size: DEFAULT_RF_SIZE,
            main_mem_size: DEFAULT_MAIN_MEM_SIZE,
            l1i: DEFAULT_L1I_GEOMETRY,
            l1d: DEFAULT_L1D_GEOMETRY,
            l2: DEFAULT_L2_GEOMETRY,
        }
    }
}

impl CoreParameters {
    /// Returns the configured geometry of a cache level.
    ///
    /// Non-cache resources have no geometry.
    #[must_use]
    pub const fn geometry(&self, resource: Resource) -> Option<CacheGeometry> {
        match resource {
            Resource::L1i => Some(self.l1i),
            Resource::L1d => Some(self.l1d),
            Resource::L2 => Some(self.l2),
            Resource::CoreControl | Resource::RegisterFile | Resource::MainMemory => None,
        }
    }

    /// Number of registers stored in a snapshot (register 0 is skipped).
    #[must_use]
    pub const fn snapshot_registers(&self) -> u64 {
        self.rf_size.saturating_sub(1)
    }

    /// Validates that every resource is representable by the protocol.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyRegisterFile`] for a zero-sized register
    /// file, [`ConfigError::MainMemoryTooLarge`] past [`MAX_MAIN_MEM_SIZE`],
    /// or the first cache geometry error.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.rf_size == 0 {
            return Err(ConfigError::EmptyRegisterFile);
        }
        if self.main_mem_size > MAX_MAIN_MEM_SIZE {
            return Err(ConfigError::MainMemoryTooLarge {
                lines: self.main_mem_size,
                limit: MAX_MAIN_MEM_SIZE,
            });
        }
        if let Err(error) = self.l1i.validate() {
            return Err(error);
        }
        if let Err(error) = self.l1d.validate() {
            return Err(error);
        }
        self.l2.validate()
    }
}

/// Whether export and import quiesce the core themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuiescePolicy {
    /// The caller halts and canonicalizes before walking and restarts after.
    #[default]
    CallerManaged,
    /// Export and import halt and canonicalize first and restart when done.
    Automatic,
}

/// Top-level configuration for a snapshot controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Resource sizes of the attached hardware.
    pub parameters: CoreParameters,
    /// Quiesce discipline around export and import.
    pub quiesce: QuiescePolicy,
}
