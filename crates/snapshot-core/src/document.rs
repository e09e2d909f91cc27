//! Persisted snapshot document.
//!
//! The document is JSON with the hardware tooling's field names:
//!
//! ```text
//! { "PC": .., "RegisterFile": [..], "MainMem": [[8 words], ..],
//!   "L1i": { "set": .., "way": .., "data": [{ "lru": .., "lines": [
//!       { "valid": .., "dirty": .., "tag": .., "data": [8 words] }, ..] }, ..] },
//!   "L1d": {..}, "L2": {..} }
//! ```
//!
//! It is written pretty-printed with a four-space indent.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::{check_len, CacheSnapshot, CoreParameters, DocumentError, HostLine, Resource};

/// Complete architectural and cache state of the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Program counter.
    #[serde(rename = "PC")]
    pub pc: u64,
    /// Registers 1 through `rf_size - 1`.
    #[serde(rename = "RegisterFile")]
    pub register_file: Vec<u64>,
    /// Main-memory lines in address order.
    #[serde(rename = "MainMem")]
    pub main_mem: Vec<HostLine>,
    /// L1 instruction cache.
    #[serde(rename = "L1i")]
    pub l1i: CacheSnapshot,
    /// L1 data cache.
    #[serde(rename = "L1d")]
    pub l1d: CacheSnapshot,
    /// L2 cache.
    #[serde(rename = "L2")]
    pub l2: CacheSnapshot,
}

impl SnapshotDocument {
    /// Cache section for a cache resource.
    #[must_use]
    pub const fn cache(&self, resource: Resource) -> Option<&CacheSnapshot> {
        match resource {
            Resource::L1i => Some(&self.l1i),
            Resource::L1d => Some(&self.l1d),
            Resource::L2 => Some(&self.l2),
            Resource::CoreControl | Resource::RegisterFile | Resource::MainMemory => None,
        }
    }

    /// Checks every section against the configured parameters.
    ///
    /// Import runs this before issuing any request, so a mismatched document
    /// never leaves the hardware partially overwritten.
    ///
    /// # Errors
    ///
    /// Returns the first [`DocumentError`] found, naming the offending field.
    pub fn validate(&self, parameters: &CoreParameters) -> Result<(), DocumentError> {
        check_len(
            Resource::RegisterFile.section().to_owned(),
            parameters.snapshot_registers(),
            self.register_file.len(),
        )?;
        check_len(
            Resource::MainMemory.section().to_owned(),
            parameters.main_mem_size,
            self.main_mem.len(),
        )?;
        for resource in Resource::CACHES {
            if let (Some(cache), Some(geometry)) =
                (self.cache(resource), parameters.geometry(resource))
            {
                cache.validate(resource.section(), geometry)?;
            }
        }
        Ok(())
    }

    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] naming the missing or malformed field.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses a document from a reader.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] naming the missing or malformed field.
    pub fn from_reader(reader: impl Read) -> Result<Self, DocumentError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes the document as indented JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] or [`DocumentError::Io`] when
    /// serialization or the write fails.
    pub fn to_writer(&self, writer: impl Write) -> Result<(), DocumentError> {
        let mut serializer =
            serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)?;
        let mut writer = serializer.into_inner();
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Renders the document as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] when serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Reads a document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] when the file cannot be opened, or
    /// [`DocumentError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Writes a document to a file, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] when the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        self.to_writer(BufWriter::new(File::create(path)?))
    }

    /// Condensed view for reporting.
    #[must_use]
    pub fn summary(&self) -> SnapshotSummary {
        let cache = |resource: Resource, snapshot: &CacheSnapshot| CacheSummary {
            resource,
            sets: snapshot.sets,
            ways: snapshot.ways,
            valid_lines: snapshot.valid_lines(),
            dirty_lines: snapshot.dirty_lines(),
        };
        SnapshotSummary {
            pc: self.pc,
            registers: self.register_file.len(),
            memory_lines: self.main_mem.len(),
            nonzero_memory_lines: self
                .main_mem
                .iter()
                .filter(|line| line.iter().any(|word| *word != 0))
                .count(),
            caches: [
                cache(Resource::L1i, &self.l1i),
                cache(Resource::L1d, &self.l1d),
                cache(Resource::L2, &self.l2),
            ],
        }
    }
}

/// Occupancy of one cache level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSummary {
    /// Cache level.
    pub resource: Resource,
    /// Set count.
    pub sets: u64,
    /// Way count.
    pub ways: u64,
    /// Valid lines.
    pub valid_lines: usize,
    /// Dirty lines.
    pub dirty_lines: usize,
}

/// Condensed view of a snapshot document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Program counter.
    pub pc: u64,
    /// Stored register count.
    pub registers: usize,
    /// Stored main-memory lines.
    pub memory_lines: usize,
    /// Main-memory lines with any non-zero word.
    pub nonzero_memory_lines: usize,
    /// Cache levels in document order.
    pub caches: [CacheSummary; 3],
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PC: {:#018x}", self.pc)?;
        writeln!(f, "RegisterFile: {} registers", self.registers)?;
        write!(
            f,
            "MainMem: {} lines ({} non-zero)",
            self.memory_lines, self.nonzero_memory_lines
        )?;
        for cache in &self.caches {
            write!(
                f,
                "\n{}: {}x{}, {} valid, {} dirty",
                cache.resource, cache.sets, cache.ways, cache.valid_lines, cache.dirty_lines
            )?;
        }
        Ok(())
    }
}
