//! Full-state export and import over a request gate.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{info, warn};

use crate::cache::{extract, load};
use crate::{
    read_main_memory, read_program_counter, read_register_file, register_address,
    write_main_memory, write_program_counter, write_register_file, AckSink, ConfigError,
    ControllerConfig, CoreParameters, DocumentError, HardwareTransport, QuiescePolicy, RequestGate,
    Resource, SnapshotDocument, SnapshotError,
};

/// Drives snapshot export and import for one attached core.
#[derive(Debug)]
pub struct SnapshotController<T> {
    gate: RequestGate<T>,
    config: ControllerConfig,
}

impl<T: HardwareTransport> SnapshotController<T> {
    /// Wraps an existing gate once `config` has been validated.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] reported by
    /// [`CoreParameters::validate`].
    pub fn new(gate: RequestGate<T>, config: ControllerConfig) -> Result<Self, ConfigError> {
        config.parameters.validate()?;
        Ok(Self { gate, config })
    }

    /// Creates a link, builds the transport around its sink and wraps both.
    ///
    /// The transport is only built for a valid `config`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] reported by
    /// [`CoreParameters::validate`].
    pub fn connect(
        config: ControllerConfig,
        build: impl FnOnce(AckSink) -> T,
    ) -> Result<Self, ConfigError> {
        config.parameters.validate()?;
        Self::new(RequestGate::connect(build), config)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Resource sizes of the attached core.
    #[must_use]
    pub const fn parameters(&self) -> &CoreParameters {
        &self.config.parameters
    }

    /// Underlying request gate.
    #[must_use]
    pub const fn gate(&self) -> &RequestGate<T> {
        &self.gate
    }

    /// Underlying request gate, mutably.
    pub fn gate_mut(&mut self) -> &mut RequestGate<T> {
        &mut self.gate
    }

    /// Releases the gate.
    #[must_use]
    pub fn into_gate(self) -> RequestGate<T> {
        self.gate
    }

    /// Halts the core.
    ///
    /// # Errors
    ///
    /// Propagates any gate error.
    pub fn halt(&mut self) -> Result<(), SnapshotError> {
        Ok(self.gate.halt()?)
    }

    /// Resumes the core.
    ///
    /// # Errors
    ///
    /// Propagates any gate error.
    pub fn restart(&mut self) -> Result<(), SnapshotError> {
        Ok(self.gate.restart()?)
    }

    /// Drains in-flight core activity so the walk sees consistent state.
    ///
    /// # Errors
    ///
    /// Propagates any gate error.
    pub fn canonicalize(&mut self) -> Result<(), SnapshotError> {
        Ok(self.gate.canonicalize()?)
    }

    /// Reads one snapshotted register.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RegisterOutOfRange`] for register 0 or an
    /// index past the register file, or any gate error.
    pub fn read_register(&mut self, index: u64) -> Result<u64, SnapshotError> {
        self.check_register(index)?;
        Ok(self
            .gate
            .read_word(Resource::RegisterFile, register_address(index))?)
    }

    /// Writes one snapshotted register.
    ///
    /// Register 0 shares its address with the program counter and is
    /// rejected; use [`write_program_counter`](crate::write_program_counter).
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RegisterOutOfRange`] for register 0 or an
    /// index past the register file, or any gate error.
    pub fn write_register(&mut self, index: u64, value: u64) -> Result<(), SnapshotError> {
        self.check_register(index)?;
        Ok(self
            .gate
            .write_word(Resource::RegisterFile, register_address(index), value)?)
    }

    /// Reads the complete core state.
    ///
    /// Walk order is PC, register file, main memory, then L1i, L1d and L2.
    ///
    /// # Errors
    ///
    /// Returns the first gate error or [`SnapshotError::CorruptMetadata`].
    pub fn export_snapshot(&mut self) -> Result<SnapshotDocument, SnapshotError> {
        info!("exporting snapshot");
        self.quiesced(|gate, parameters| {
            let pc = read_program_counter(gate)?;
            let register_file = read_register_file(gate, parameters)?;
            let main_mem = read_main_memory(gate, parameters)?;
            let l1i = extract(gate, Resource::L1i, parameters.l1i)?;
            let l1d = extract(gate, Resource::L1d, parameters.l1d)?;
            let l2 = extract(gate, Resource::L2, parameters.l2)?;
            Ok(SnapshotDocument {
                pc,
                register_file,
                main_mem,
                l1i,
                l1d,
                l2,
            })
        })
    }

    /// Writes a complete core state, in export walk order.
    ///
    /// The document is validated against the configured parameters before
    /// the first request, so a rejected document issues nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] when validation fails, or the first gate
    /// error.
    pub fn import_snapshot(&mut self, document: &SnapshotDocument) -> Result<(), SnapshotError> {
        document.validate(&self.config.parameters)?;
        info!("importing snapshot");
        self.quiesced(|gate, parameters| {
            write_program_counter(gate, document.pc)?;
            write_register_file(gate, parameters, &document.register_file)?;
            write_main_memory(gate, parameters, &document.main_mem)?;
            load(gate, &document.l1i, Resource::L1i)?;
            load(gate, &document.l1d, Resource::L1d)?;
            load(gate, &document.l2, Resource::L2)?;
            Ok(())
        })
    }

    /// Exports the core state into a file.
    ///
    /// # Errors
    ///
    /// Returns any export error or [`DocumentError::Io`].
    pub fn save_to_path(&mut self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let document = self.export_snapshot()?;
        let file = File::create(path).map_err(DocumentError::from)?;
        document.to_writer(BufWriter::new(file))?;
        info!("snapshot written to {}", path.display());
        Ok(())
    }

    /// Imports the core state from a file.
    ///
    /// # Errors
    ///
    /// Returns any load, validation or import error.
    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(DocumentError::from)?;
        let document = SnapshotDocument::from_reader(BufReader::new(file))?;
        info!("snapshot read from {}", path.display());
        self.import_snapshot(&document)
    }

    fn check_register(&self, index: u64) -> Result<(), SnapshotError> {
        let rf_size = self.config.parameters.rf_size;
        if index == 0 || index >= rf_size {
            return Err(SnapshotError::RegisterOutOfRange { index, rf_size });
        }
        Ok(())
    }

    /// Runs `walk`, halting and canonicalizing first and restarting after a
    /// successful walk when the policy is [`QuiescePolicy::Automatic`].
    ///
    /// A failed walk leaves the core halted.
    fn quiesced<R>(
        &mut self,
        walk: impl FnOnce(&mut RequestGate<T>, &CoreParameters) -> Result<R, SnapshotError>,
    ) -> Result<R, SnapshotError> {
        let automatic = self.config.quiesce == QuiescePolicy::Automatic;
        if automatic {
            self.gate.halt()?;
            self.gate.canonicalize()?;
        }

        let result = walk(&mut self.gate, &self.config.parameters);
        match &result {
            Ok(_) if automatic => self.gate.restart()?,
            Ok(_) => {}
            Err(error) if automatic => warn!("walk failed, core left halted: {error}"),
            Err(_) => {}
        }
        result
    }
}
