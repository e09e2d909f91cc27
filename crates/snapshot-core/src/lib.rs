//! Host-side snapshot protocol engine for a hardware processor core.
//!
//! Captures and restores the complete architectural and cache state of a
//! core (program counter, register file, main memory, L1i, L1d and L2)
//! through a single-outstanding-request protocol.

/// Host line and hardware vector word-width conversion.
pub mod codec;
pub use codec::{
    line_to_register, register_to_line, to_hardware, to_host, HardwareVector, HostLine,
    HARDWARE_WORDS, HOST_WORDS, ZERO_LINE,
};

/// Flat address packing for registers, memory lines and cache arrays.
pub mod address;
pub use address::{
    cache_address, memory_address, register_address, CacheGeometry, CacheRegion,
    CTRL_REG_ADDRESS, MAX_WAYS, REGION_BITS,
};

/// Hardware resource identifiers.
pub mod resource;
pub use resource::Resource;

/// Fault taxonomy and error types.
pub mod fault;
pub use fault::{
    ConfigError, DocumentError, FaultClass, GateError, SnapshotError, TransportError,
};

/// Request and acknowledgement types and the transport contract.
pub mod transport;
pub use transport::{
    AccessKind, AccessRequest, AckKind, Acknowledgement, ControlOp, HardwareTransport,
};

/// Single-flight request gate.
pub mod gate;
pub use gate::{ack_channel, AckReceiver, AckSink, RequestGate};

/// Hardware build parameters and controller policy.
pub mod config;
pub use config::{
    ControllerConfig, CoreParameters, QuiescePolicy, DEFAULT_L1D_GEOMETRY, DEFAULT_L1I_GEOMETRY,
    DEFAULT_L2_GEOMETRY, DEFAULT_MAIN_MEM_SIZE, DEFAULT_RF_SIZE, MAX_MAIN_MEM_SIZE,
};

/// Cache snapshot types, metadata encoding and cache walks.
pub mod cache;
pub(crate) use cache::check_len;
pub use cache::{
    CacheSnapshot, LineSnapshot, LineState, SetSnapshot, WayMetadata, MAX_TAG, STATE_BITS,
    STATE_MASK,
};

/// Program counter, register file and main-memory walks.
pub mod walker;
pub use walker::{
    read_main_memory, read_program_counter, read_register_file, write_main_memory,
    write_program_counter, write_register_file,
};

/// Persisted snapshot document.
pub mod document;
pub use document::{CacheSummary, SnapshotDocument, SnapshotSummary};

/// Export and import orchestration.
pub mod controller;
pub use controller::SnapshotController;

/// In-process simulated core.
pub mod sim;
pub use sim::{Delivery, IssuedCommand, SimRunState, SimulatedCore};

/// Workload console input, output and halt requests.
pub mod console;
pub use console::{
    CharQueue, ConsoleInput, ConsoleMessage, ConsoleOutput, HaltSignal, QueueFull,
    CHAR_QUEUE_CAPACITY,
};
