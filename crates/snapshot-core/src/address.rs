//! Flat address encoding for the register file, main memory, and cache arrays.
//!
//! Cache structures are exposed by the hardware as if they were memory-mapped
//! registers. The low two bits select the region, then the set index, then the
//! way index:
//!
//! ```text
//! address = region | (set << 2) | (way << (2 + log2_sets))
//! ```

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Address of the program counter within the core-control resource.
pub const CTRL_REG_ADDRESS: u64 = 0;

/// Number of low address bits used by the region selector.
pub const REGION_BITS: u32 = 2;

/// Ways per set must stay below this bound so an LRU word can describe them.
pub const MAX_WAYS: u64 = 64;

/// Region selector for a cache address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CacheRegion {
    /// Per-set replacement (LRU) word.
    Lru = 0,
    /// Per-way tag and state metadata word.
    Metadata = 1,
    /// Per-way 512-bit data line.
    Data = 2,
}

impl CacheRegion {
    /// Ordered list of all addressable regions.
    pub const ALL: [Self; 3] = [Self::Lru, Self::Metadata, Self::Data];

    /// Returns the two-bit selector value.
    #[must_use]
    pub const fn selector(self) -> u64 {
        self as u64
    }
}

/// Address of register `index` within the register-file resource.
#[must_use]
pub const fn register_address(index: u64) -> u64 {
    index
}

/// Address of line `index` within the main-memory resource.
#[must_use]
pub const fn memory_address(index: u64) -> u64 {
    index
}

/// Packs a region, set, and way into a cache address.
///
/// Callers must keep `set < 2^log2_sets`; a larger set index would spill into
/// the way field.
#[must_use]
pub const fn cache_address(region: CacheRegion, set: u64, way: u64, log2_sets: u32) -> u64 {
    debug_assert!(log2_sets >= 64 || set >> log2_sets == 0);
    region.selector() | (set << REGION_BITS) | (way << (REGION_BITS + log2_sets))
}

/// Set/way geometry of one cache level, stored as base-2 logarithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheGeometry {
    /// Base-2 logarithm of the set count.
    pub log2_sets: u32,
    /// Base-2 logarithm of the way count.
    pub log2_ways: u32,
}

impl CacheGeometry {
    /// Creates a geometry from base-2 logarithms.
    #[must_use]
    pub const fn new(log2_sets: u32, log2_ways: u32) -> Self {
        Self {
            log2_sets,
            log2_ways,
        }
    }

    /// Derives a geometry from set and way counts, rounding each count up to
    /// the smallest power of two that holds it.
    #[must_use]
    pub const fn from_counts(sets: u64, ways: u64) -> Self {
        Self {
            log2_sets: ceil_log2(sets),
            log2_ways: ceil_log2(ways),
        }
    }

    /// Number of sets.
    #[must_use]
    pub const fn sets(self) -> u64 {
        1 << self.log2_sets
    }

    /// Number of ways per set.
    #[must_use]
    pub const fn ways(self) -> u64 {
        1 << self.log2_ways
    }

    /// Address of `region` for `(set, way)` in this geometry.
    #[must_use]
    pub const fn address(self, region: CacheRegion, set: u64, way: u64) -> u64 {
        debug_assert!(way < self.ways());
        cache_address(region, set, way, self.log2_sets)
    }

    /// Address of the LRU word of `set`. The way field is always zero.
    #[must_use]
    pub const fn lru_address(self, set: u64) -> u64 {
        self.address(CacheRegion::Lru, set, 0)
    }

    /// Checks that the way count fits the LRU word and that every address of
    /// this geometry fits in 64 bits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooManyWays`] when the way count is 64 or more,
    /// and [`ConfigError::AddressOverflow`] when the packed address would need
    /// more than 64 bits or the way field would start past bit 63.
    pub const fn validate(self) -> Result<(), ConfigError> {
        if self.log2_ways >= 6 {
            return Err(ConfigError::TooManyWays {
                log2_ways: self.log2_ways,
            });
        }
        // The way field starts at bit `2 + log2_sets`, which must itself be a
        // valid shift even when there is a single way.
        let way_shift = REGION_BITS.saturating_add(self.log2_sets);
        if way_shift >= u64::BITS || way_shift + self.log2_ways > u64::BITS {
            return Err(ConfigError::AddressOverflow {
                log2_sets: self.log2_sets,
                log2_ways: self.log2_ways,
            });
        }
        Ok(())
    }
}

const fn ceil_log2(count: u64) -> u32 {
    let mut log2 = 0;
    while log2 < u64::BITS - 1 && (1_u64 << log2) < count {
        log2 += 1;
    }
    log2
}

#[cfg(test)]
mod tests {
    use super::{
        cache_address, memory_address, register_address, CacheGeometry, CacheRegion,
        CTRL_REG_ADDRESS, MAX_WAYS, REGION_BITS,
    };
    use crate::ConfigError;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn linear_resources_use_identity_addresses() {
        assert_eq!(CTRL_REG_ADDRESS, 0);
        assert_eq!(register_address(31), 31);
        assert_eq!(memory_address(1_048_575), 1_048_575);
    }

    #[test]
    fn packing_matches_hardware_layout() {
        // 64 sets, way 1: way field starts at bit 8.
        assert_eq!(cache_address(CacheRegion::Lru, 0, 0, 6), 0x000);
        assert_eq!(cache_address(CacheRegion::Metadata, 3, 0, 6), 0x00D);
        assert_eq!(cache_address(CacheRegion::Data, 63, 1, 6), 0x1FE);
    }

    #[rstest]
    #[case(1, 1, 0, 0)]
    #[case(2, 2, 1, 1)]
    #[case(3, 2, 2, 1)]
    #[case(64, 2, 6, 1)]
    #[case(256, 4, 8, 2)]
    #[case(257, 5, 9, 3)]
    fn counts_round_up_to_powers_of_two(
        #[case] sets: u64,
        #[case] ways: u64,
        #[case] log2_sets: u32,
        #[case] log2_ways: u32,
    ) {
        assert_eq!(
            CacheGeometry::from_counts(sets, ways),
            CacheGeometry::new(log2_sets, log2_ways)
        );
    }

    #[test]
    fn way_count_must_stay_below_lru_width() {
        assert_eq!(CacheGeometry::new(8, 5).validate(), Ok(()));
        assert_eq!(CacheGeometry::new(8, 5).ways(), MAX_WAYS / 2);
        assert_eq!(
            CacheGeometry::new(8, 6).validate(),
            Err(ConfigError::TooManyWays { log2_ways: 6 })
        );
    }

    #[rstest]
    #[case(60, 3)]
    #[case(62, 0)]
    #[case(63, 0)]
    #[case(61, 2)]
    #[case(u32::MAX, 0)]
    fn oversized_geometry_is_rejected(#[case] log2_sets: u32, #[case] log2_ways: u32) {
        assert_eq!(
            CacheGeometry::new(log2_sets, log2_ways).validate(),
            Err(ConfigError::AddressOverflow {
                log2_sets,
                log2_ways
            })
        );
    }

    #[rstest]
    #[case(61, 1)]
    #[case(61, 0)]
    #[case(58, 4)]
    fn geometry_filling_all_64_bits_is_addressable(
        #[case] log2_sets: u32,
        #[case] log2_ways: u32,
    ) {
        let geometry = CacheGeometry::new(log2_sets, log2_ways);
        assert_eq!(geometry.validate(), Ok(()));

        let last_set = geometry.sets() - 1;
        let last_way = geometry.ways() - 1;
        assert_eq!(geometry.address(CacheRegion::Data, 0, 0), 2);
        let top = geometry.address(CacheRegion::Data, last_set, last_way);
        assert_eq!((top >> REGION_BITS) & last_set, last_set);
        assert_eq!(top >> (REGION_BITS + log2_sets), last_way);
    }

    #[test]
    fn every_address_of_a_small_geometry_is_distinct() {
        let geometry = CacheGeometry::new(4, 2);
        let mut seen = HashSet::new();
        for region in CacheRegion::ALL {
            for set in 0..geometry.sets() {
                for way in 0..geometry.ways() {
                    assert!(seen.insert(geometry.address(region, set, way)));
                }
            }
        }
        assert_eq!(seen.len(), 3 * 16 * 4);
    }

    fn region_strategy() -> impl Strategy<Value = CacheRegion> {
        prop::sample::select(CacheRegion::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn cache_addresses_never_alias(
            log2_sets in 0_u32..12,
            log2_ways in 0_u32..6,
            a in (region_strategy(), any::<u64>(), any::<u64>()),
            b in (region_strategy(), any::<u64>(), any::<u64>()),
        ) {
            let geometry = CacheGeometry::new(log2_sets, log2_ways);
            let (r1, s1, w1) = (a.0, a.1 % geometry.sets(), a.2 % geometry.ways());
            let (r2, s2, w2) = (b.0, b.1 % geometry.sets(), b.2 % geometry.ways());

            let same_address = geometry.address(r1, s1, w1) == geometry.address(r2, s2, w2);
            prop_assert_eq!(same_address, (r1, s1, w1) == (r2, s2, w2));
        }
    }
}
