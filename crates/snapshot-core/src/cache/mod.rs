//! Set-associative cache state as captured in a snapshot.

/// Cache walk over the request gate.
pub mod codec;
/// Tag/state metadata word encoding.
pub mod metadata;

pub use codec::{extract, load};
pub use metadata::{LineState, WayMetadata, MAX_TAG, STATE_BITS, STATE_MASK};

use serde::{Deserialize, Serialize};

use crate::{CacheGeometry, DocumentError, HostLine};

/// One cache level: geometry plus every set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Set count.
    #[serde(rename = "set")]
    pub sets: u64,
    /// Way count.
    #[serde(rename = "way")]
    pub ways: u64,
    /// Sets in index order.
    pub data: Vec<SetSnapshot>,
}

/// One set: its replacement word and its ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSnapshot {
    /// Opaque LRU bit pattern.
    pub lru: u64,
    /// Ways in index order.
    pub lines: Vec<LineSnapshot>,
}

/// One way: state flags, tag, and the 512-bit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    /// Line holds data.
    pub valid: bool,
    /// Line was modified.
    pub dirty: bool,
    /// Line tag.
    pub tag: u64,
    /// Line contents, least significant word first.
    pub data: HostLine,
}

impl LineSnapshot {
    /// Builds a way entry from decoded metadata and its data line.
    #[must_use]
    pub const fn from_parts(metadata: WayMetadata, data: HostLine) -> Self {
        Self {
            valid: metadata.state.is_valid(),
            dirty: metadata.state.is_dirty(),
            tag: metadata.tag,
            data,
        }
    }

    /// Metadata word contents, or `None` for a dirty line that is not valid.
    #[must_use]
    pub const fn metadata(&self) -> Option<WayMetadata> {
        match LineState::from_flags(self.valid, self.dirty) {
            Some(state) => Some(WayMetadata {
                tag: self.tag,
                state,
            }),
            None => None,
        }
    }
}

impl CacheSnapshot {
    /// Geometry implied by the stored counts, rounded up to powers of two.
    #[must_use]
    pub const fn geometry(&self) -> CacheGeometry {
        CacheGeometry::from_counts(self.sets, self.ways)
    }

    /// Number of valid lines across all sets.
    #[must_use]
    pub fn valid_lines(&self) -> usize {
        self.lines().filter(|line| line.valid).count()
    }

    /// Number of dirty lines across all sets.
    #[must_use]
    pub fn dirty_lines(&self) -> usize {
        self.lines().filter(|line| line.dirty).count()
    }

    fn lines(&self) -> impl Iterator<Item = &LineSnapshot> {
        self.data.iter().flat_map(|set| set.lines.iter())
    }

    /// Checks the stored counts against `expected` and then the shape of
    /// every set and way.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::GeometryMismatch`] when the counts differ and
    /// the first shape error otherwise.
    pub fn validate(
        &self,
        cache: &'static str,
        expected: CacheGeometry,
    ) -> Result<(), DocumentError> {
        if self.sets != expected.sets() || self.ways != expected.ways() {
            return Err(DocumentError::GeometryMismatch {
                cache,
                expected_sets: expected.sets(),
                expected_ways: expected.ways(),
                found_sets: self.sets,
                found_ways: self.ways,
            });
        }
        self.check_shape(cache)
    }

    /// Checks that the stored sets and ways match the stored counts and that
    /// every line has a metadata encoding.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Length`], [`DocumentError::DirtyWithoutValid`]
    /// or [`DocumentError::TagOutOfRange`] naming the first offending field.
    pub fn check_shape(&self, cache: &str) -> Result<(), DocumentError> {
        check_len(format!("{cache}.data"), self.sets, self.data.len())?;

        for (set_index, set) in self.data.iter().enumerate() {
            let set_path = format!("{cache}.data[{set_index}]");
            check_len(format!("{set_path}.lines"), self.ways, set.lines.len())?;

            for (way_index, line) in set.lines.iter().enumerate() {
                let line_path = format!("{set_path}.lines[{way_index}]");
                if line.metadata().is_none() {
                    return Err(DocumentError::DirtyWithoutValid { field: line_path });
                }
                if line.tag > MAX_TAG {
                    return Err(DocumentError::TagOutOfRange {
                        field: format!("{line_path}.tag"),
                        tag: line.tag,
                    });
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn check_len(field: String, expected: u64, found: usize) -> Result<(), DocumentError> {
    let found = found as u64;
    if found == expected {
        Ok(())
    } else {
        Err(DocumentError::Length {
            field,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheSnapshot, LineSnapshot, SetSnapshot, MAX_TAG};
    use crate::{CacheGeometry, DocumentError, LineState, WayMetadata};

    fn empty_line() -> LineSnapshot {
        LineSnapshot {
            valid: false,
            dirty: false,
            tag: 0,
            data: [0; 8],
        }
    }

    fn blank(sets: u64, ways: u64) -> CacheSnapshot {
        CacheSnapshot {
            sets,
            ways,
            data: (0..sets)
                .map(|_| SetSnapshot {
                    lru: 0,
                    lines: (0..ways).map(|_| empty_line()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn line_entry_mirrors_metadata() {
        let line = LineSnapshot::from_parts(
            WayMetadata {
                tag: 9,
                state: LineState::Clean,
            },
            [1; 8],
        );
        assert!(line.valid && !line.dirty);
        assert_eq!(
            line.metadata(),
            Some(WayMetadata {
                tag: 9,
                state: LineState::Clean
            })
        );
    }

    #[test]
    fn matching_geometry_validates() {
        assert!(blank(2, 2).validate("L1d", CacheGeometry::new(1, 1)).is_ok());
    }

    #[test]
    fn geometry_mismatch_is_detected_before_shape() {
        let error = blank(4, 2)
            .validate("L1i", CacheGeometry::new(1, 1))
            .expect_err("4 sets against a 2-set cache");
        assert!(matches!(
            error,
            DocumentError::GeometryMismatch {
                cache: "L1i",
                expected_sets: 2,
                found_sets: 4,
                ..
            }
        ));
    }

    #[test]
    fn short_way_list_names_the_set() {
        let mut cache = blank(2, 2);
        cache.data[1].lines.pop();

        let error = cache.check_shape("L2").expect_err("missing way");
        assert_eq!(
            error.to_string(),
            "`L2.data[1].lines` has 1 entries, expected 2"
        );
    }

    #[test]
    fn dirty_invalid_line_and_wide_tag_are_rejected() {
        let mut cache = blank(1, 2);
        cache.data[0].lines[1].dirty = true;
        assert!(matches!(
            cache.check_shape("L1d"),
            Err(DocumentError::DirtyWithoutValid { field }) if field == "L1d.data[0].lines[1]"
        ));

        let mut cache = blank(1, 1);
        cache.data[0].lines[0].tag = MAX_TAG + 1;
        assert!(matches!(
            cache.check_shape("L1d"),
            Err(DocumentError::TagOutOfRange { field, .. }) if field == "L1d.data[0].lines[0].tag"
        ));
    }

    #[test]
    fn line_counters_follow_flags() {
        let mut cache = blank(2, 2);
        cache.data[0].lines[0].valid = true;
        cache.data[0].lines[0].dirty = true;
        cache.data[1].lines[1].valid = true;

        assert_eq!(cache.valid_lines(), 2);
        assert_eq!(cache.dirty_lines(), 1);
    }
}
