use thiserror::Error;

use crate::{AckKind, ControlOp, Resource};

/// Fault classes used for reporting and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// Request/acknowledgement handshake violation.
    Protocol,
    /// Cache metadata carried the illegal line state.
    CorruptState,
    /// Snapshot document is missing data or has the wrong shape.
    Shape,
    /// Snapshot geometry disagrees with the configured hardware.
    Geometry,
    /// Hardware transport refused to carry a request.
    Transport,
    /// Core parameters are not representable by the protocol.
    Config,
    /// Reading or writing the snapshot file failed.
    Io,
}

/// Failures reported by a [`HardwareTransport`](crate::HardwareTransport)
/// when a request cannot be handed to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TransportError {
    /// Control opcode could not be sent.
    #[error("transport rejected {0} request")]
    ControlRejected(ControlOp),
    /// Resource access could not be sent.
    #[error("transport rejected access to resource {resource} at {address:#x}")]
    AccessRejected {
        /// Wire id of the targeted resource.
        resource: u8,
        /// Requested address.
        address: u64,
    },
    /// The link to the hardware is gone.
    #[error("hardware link is down")]
    LinkDown,
}

/// Request-gate handshake failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum GateError {
    /// A request was issued while another one is still awaiting acknowledgement.
    #[error("request issued while {pending} request is awaiting acknowledgement")]
    Busy {
        /// Kind of the request already in flight.
        pending: AckKind,
    },
    /// An acknowledgement was awaited with no request in flight.
    #[error("no request is awaiting acknowledgement")]
    Idle,
    /// The hardware acknowledged something that was never requested.
    #[error("{received} acknowledgement arrived with no request in flight")]
    UnexpectedAcknowledgement {
        /// Kind of the stray acknowledgement.
        received: AckKind,
    },
    /// The hardware acknowledged a different request than the one in flight.
    #[error("expected {expected} acknowledgement, received {received}")]
    MismatchedAcknowledgement {
        /// Kind of the request in flight.
        expected: AckKind,
        /// Kind of the acknowledgement delivered.
        received: AckKind,
    },
    /// The request could not be handed to the hardware.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Every notification handle was dropped.
    #[error("hardware notification path is disconnected")]
    Disconnected,
    /// An earlier fatal violation left host and hardware uncorrelated.
    #[error("request gate is poisoned by an earlier protocol violation")]
    Poisoned,
}

impl GateError {
    /// Returns the fault class for this error.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::Transport(_) => FaultClass::Transport,
            Self::Busy { .. }
            | Self::Idle
            | Self::UnexpectedAcknowledgement { .. }
            | Self::MismatchedAcknowledgement { .. }
            | Self::Disconnected
            | Self::Poisoned => FaultClass::Protocol,
        }
    }

    /// Errors after which the gate refuses all further traffic.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Idle | Self::Transport(_))
    }
}

/// Core parameter validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// Way count does not fit in the LRU word.
    #[error("2^{log2_ways} ways exceed the 64-way limit")]
    TooManyWays {
        /// Offending base-2 way count.
        log2_ways: u32,
    },
    /// Packed cache address would exceed 64 bits.
    #[error("cache of 2^{log2_sets} sets x 2^{log2_ways} ways is not addressable")]
    AddressOverflow {
        /// Offending base-2 set count.
        log2_sets: u32,
        /// Offending base-2 way count.
        log2_ways: u32,
    },
    /// Register file must include at least the hardwired zero register.
    #[error("register file size must be at least 1")]
    EmptyRegisterFile,
    /// Main memory is larger than a snapshot document can hold.
    #[error("main memory of {lines} lines exceeds the {limit}-line limit")]
    MainMemoryTooLarge {
        /// Configured line count.
        lines: u64,
        /// Largest accepted line count.
        limit: u64,
    },
}

/// Snapshot document load and shape failures.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Document is not valid JSON or lacks a required field.
    #[error("malformed snapshot document: {0}")]
    Parse(#[from] serde_json::Error),
    /// A sequence has the wrong number of entries.
    #[error("`{field}` has {found} entries, expected {expected}")]
    Length {
        /// Path of the offending field.
        field: String,
        /// Entry count required by the configured parameters.
        expected: u64,
        /// Entry count present in the document.
        found: u64,
    },
    /// A tag is too wide to share a word with the two state bits.
    #[error("`{field}` value {tag:#x} does not fit in 62 bits")]
    TagOutOfRange {
        /// Path of the offending field.
        field: String,
        /// Offending tag.
        tag: u64,
    },
    /// A line is marked dirty but not valid, which has no hardware encoding.
    #[error("`{field}` is dirty but not valid")]
    DirtyWithoutValid {
        /// Path of the offending line.
        field: String,
    },
    /// Cache geometry differs from the configured hardware.
    #[error(
        "`{cache}` geometry {found_sets}x{found_ways} does not match configured {expected_sets}x{expected_ways}"
    )]
    GeometryMismatch {
        /// Cache section name.
        cache: &'static str,
        /// Configured set count.
        expected_sets: u64,
        /// Configured way count.
        expected_ways: u64,
        /// Set count in the document.
        found_sets: u64,
        /// Way count in the document.
        found_ways: u64,
    },
    /// Snapshot file could not be read or written.
    #[error("snapshot file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    /// Returns the fault class for this error.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            Self::Parse(_)
            | Self::Length { .. }
            | Self::TagOutOfRange { .. }
            | Self::DirtyWithoutValid { .. } => FaultClass::Shape,
            Self::GeometryMismatch { .. } => FaultClass::Geometry,
            Self::Io(_) => FaultClass::Io,
        }
    }
}

/// Top-level error for export and import operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Request gate failure.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// Cache metadata word carried the illegal line state.
    #[error("{resource} set {set} way {way}: illegal line state in metadata word {word:#x}")]
    CorruptMetadata {
        /// Cache that returned the word.
        resource: Resource,
        /// Set index.
        set: u64,
        /// Way index.
        way: u64,
        /// Raw metadata word.
        word: u64,
    },
    /// Snapshot document failure.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// Core parameters rejected before any request was issued.
    #[error("invalid core parameters: {0}")]
    Config(#[from] ConfigError),
    /// Single-register access outside the snapshotted registers.
    #[error("register {index} is outside 1..{rf_size}")]
    RegisterOutOfRange {
        /// Requested register index.
        index: u64,
        /// Configured register-file size.
        rf_size: u64,
    },
}

impl SnapshotError {
    /// Returns the fault class for this error.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            Self::Gate(error) => error.class(),
            Self::CorruptMetadata { .. } => FaultClass::CorruptState,
            Self::Document(error) => error.class(),
            Self::Config(_) | Self::RegisterOutOfRange { .. } => FaultClass::Config,
        }
    }

    /// Errors that leave host and hardware state uncorrelated.
    ///
    /// Document, parameter and range errors are raised before any request is
    /// issued and are never fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Gate(error) => error.is_fatal(),
            Self::CorruptMetadata { .. } => true,
            Self::Document(_) | Self::Config(_) | Self::RegisterOutOfRange { .. } => false,
        }
    }
}
