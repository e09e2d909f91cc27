//! Walks one cache level through the request gate.
//!
//! Per set the walk touches the LRU word, then for every way the metadata
//! word followed by the data line. Import writes in exactly the same order.

use log::{debug, error, info};

use crate::{
    register_to_line, CacheGeometry, CacheRegion, CacheSnapshot, DocumentError,
    HardwareTransport, LineSnapshot, RequestGate, Resource, SetSnapshot, SnapshotError,
    WayMetadata,
};

/// Reads every set and way of `resource` into a snapshot.
///
/// # Errors
///
/// Returns [`SnapshotError::Config`] before any read when `geometry` is not
/// addressable, [`SnapshotError::CorruptMetadata`] when a metadata word
/// carries the illegal state, or any gate error.
pub fn extract<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    resource: Resource,
    geometry: CacheGeometry,
) -> Result<CacheSnapshot, SnapshotError> {
    geometry.validate()?;
    info!(
        "extracting {resource}: {} sets x {} ways",
        geometry.sets(),
        geometry.ways()
    );

    let mut data = Vec::new();
    for set in 0..geometry.sets() {
        let lru = gate.read_word(resource, geometry.lru_address(set))?;

        let mut lines = Vec::new();
        for way in 0..geometry.ways() {
            let metadata_address = geometry.address(CacheRegion::Metadata, set, way);
            let word = gate.read_word(resource, metadata_address)?;
            let Some(metadata) = WayMetadata::decode(word) else {
                error!("{resource} set {set} way {way}: illegal line state in {word:#x}");
                return Err(SnapshotError::CorruptMetadata {
                    resource,
                    set,
                    way,
                    word,
                });
            };
            let line = gate.read_line(resource, geometry.address(CacheRegion::Data, set, way))?;
            lines.push(LineSnapshot::from_parts(metadata, line));
        }

        data.push(SetSnapshot { lru, lines });
    }

    debug!("extracted {} sets from {resource}", data.len());
    Ok(CacheSnapshot {
        sets: geometry.sets(),
        ways: geometry.ways(),
        data,
    })
}

/// Writes a cache snapshot back into `resource`.
///
/// Addresses use the geometry implied by the snapshot's own counts. Callers
/// that need the counts to match the hardware validate the snapshot first.
///
/// # Errors
///
/// Returns a [`DocumentError`] before any write when the snapshot's sets and
/// ways disagree with its counts, [`SnapshotError::Config`] when the implied
/// geometry is not addressable, or any gate error.
pub fn load<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    snapshot: &CacheSnapshot,
    resource: Resource,
) -> Result<(), SnapshotError> {
    snapshot.check_shape(resource.section())?;
    let geometry = snapshot.geometry();
    geometry.validate()?;
    info!(
        "loading {resource}: {} sets x {} ways",
        snapshot.sets, snapshot.ways
    );

    for (set, entry) in (0_u64..).zip(&snapshot.data) {
        gate.write_word(resource, geometry.lru_address(set), entry.lru)?;

        for (way, line) in (0_u64..).zip(&entry.lines) {
            let metadata = line
                .metadata()
                .ok_or_else(|| DocumentError::DirtyWithoutValid {
                    field: format!("{resource}.data[{set}].lines[{way}]"),
                })?;
            gate.write_line(
                resource,
                geometry.address(CacheRegion::Metadata, set, way),
                &register_to_line(metadata.encode()),
            )?;
            gate.write_line(
                resource,
                geometry.address(CacheRegion::Data, set, way),
                &line.data,
            )?;
        }
    }

    debug!("loaded {} sets into {resource}", snapshot.data.len());
    Ok(())
}
