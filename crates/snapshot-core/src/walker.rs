//! Linear walks over the program counter, register file, and main memory.
//!
//! Every walk covers the full configured range in ascending address order;
//! there are no partial-range walks.

use log::{debug, info};

use crate::{
    check_len, memory_address, register_address, CoreParameters, HardwareTransport, HostLine,
    RequestGate, Resource, SnapshotError, CTRL_REG_ADDRESS,
};

const PROGRESS_INTERVAL: u64 = 4096;

/// Reads the program counter from the core-control resource.
///
/// # Errors
///
/// Propagates any gate error.
pub fn read_program_counter<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
) -> Result<u64, SnapshotError> {
    Ok(gate.read_word(Resource::CoreControl, CTRL_REG_ADDRESS)?)
}

/// Writes the program counter into the core-control resource.
///
/// # Errors
///
/// Propagates any gate error.
pub fn write_program_counter<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    pc: u64,
) -> Result<(), SnapshotError> {
    Ok(gate.write_word(Resource::CoreControl, CTRL_REG_ADDRESS, pc)?)
}

/// Reads registers `1..rf_size`. Register 0 is hardwired to zero and skipped.
///
/// # Errors
///
/// Propagates any gate error.
pub fn read_register_file<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    parameters: &CoreParameters,
) -> Result<Vec<u64>, SnapshotError> {
    let registers = (1..parameters.rf_size)
        .map(|index| gate.read_word(Resource::RegisterFile, register_address(index)))
        .collect::<Result<Vec<_>, _>>()?;
    info!("read {} registers", registers.len());
    Ok(registers)
}

/// Writes `values` into registers `1..rf_size`, in order.
///
/// # Errors
///
/// Returns [`DocumentError::Length`](crate::DocumentError::Length) before any
/// write when `values` does not hold exactly `rf_size - 1` entries, or any
/// gate error.
pub fn write_register_file<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    parameters: &CoreParameters,
    values: &[u64],
) -> Result<(), SnapshotError> {
    check_len(
        Resource::RegisterFile.section().to_owned(),
        parameters.snapshot_registers(),
        values.len(),
    )?;
    for (index, value) in (1..parameters.rf_size).zip(values) {
        gate.write_word(Resource::RegisterFile, register_address(index), *value)?;
    }
    info!("wrote {} registers", values.len());
    Ok(())
}

/// Reads main-memory lines `0..main_mem_size`.
///
/// # Errors
///
/// Propagates any gate error.
pub fn read_main_memory<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    parameters: &CoreParameters,
) -> Result<Vec<HostLine>, SnapshotError> {
    let total = parameters.main_mem_size;
    let mut lines = Vec::new();
    for index in 0..total {
        lines.push(gate.read_line(Resource::MainMemory, memory_address(index))?);
        report_progress("read", index, total);
    }
    info!("read {total} main-memory lines");
    Ok(lines)
}

/// Writes `lines` into main-memory lines `0..main_mem_size`, in order.
///
/// # Errors
///
/// Returns [`DocumentError::Length`](crate::DocumentError::Length) before any
/// write when `lines` does not hold exactly `main_mem_size` entries, or any
/// gate error.
pub fn write_main_memory<T: HardwareTransport>(
    gate: &mut RequestGate<T>,
    parameters: &CoreParameters,
    lines: &[HostLine],
) -> Result<(), SnapshotError> {
    let total = parameters.main_mem_size;
    check_len(
        Resource::MainMemory.section().to_owned(),
        total,
        lines.len(),
    )?;
    for (index, line) in (0..total).zip(lines) {
        gate.write_line(Resource::MainMemory, memory_address(index), line)?;
        report_progress("wrote", index, total);
    }
    info!("wrote {total} main-memory lines");
    Ok(())
}

fn report_progress(verb: &str, index: u64, total: u64) {
    let done = index + 1;
    if done % PROGRESS_INTERVAL == 0 {
        debug!("{verb} main memory {done}/{total}");
    }
}
