//! Hardware transport contract consumed by the request gate.
//!
//! The transport only carries requests toward the hardware. Acknowledgements
//! travel back on a separate notification path through an
//! [`AckSink`](crate::AckSink) held by the hardware integration layer.

use std::fmt;

use crate::{HardwareVector, TransportError};

/// Core control opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    /// Stop further pipeline progress.
    Halt,
    /// Resume execution.
    Restart,
    /// Drain in-flight state to an architecturally consistent point.
    Canonicalize,
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Halt => "halt",
            Self::Restart => "restart",
            Self::Canonicalize => "canonicalize",
        })
    }
}

/// Direction of a resource access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Read the addressed word or line.
    Read,
    /// Overwrite the addressed word or line.
    Write,
}

impl AccessKind {
    /// Wire flag: `true` for writes.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

/// One resource access as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessRequest {
    /// Read or write.
    pub kind: AccessKind,
    /// Wire id of the targeted resource.
    pub resource: u8,
    /// Flat address within the resource.
    pub address: u64,
    /// Encoded payload; all zero for reads.
    pub payload: HardwareVector,
}

/// Hardware-originated completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Acknowledgement {
    /// A control opcode completed.
    Control(ControlOp),
    /// A resource access completed; carries the addressed value for reads.
    Access(HardwareVector),
}

impl Acknowledgement {
    /// Returns the request kind this acknowledgement completes.
    #[must_use]
    pub const fn kind(&self) -> AckKind {
        match self {
            Self::Control(op) => AckKind::Control(*op),
            Self::Access(_) => AckKind::Access,
        }
    }
}

/// Request kind used to pair acknowledgements with the request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckKind {
    /// Control opcode.
    Control(ControlOp),
    /// Resource access.
    Access,
}

impl fmt::Display for AckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(op) => write!(f, "{op}"),
            Self::Access => f.write_str("access"),
        }
    }
}

/// Outbound half of the hardware link.
///
/// Implementations hand the request to the hardware and return immediately;
/// they must not wait for the acknowledgement.
pub trait HardwareTransport {
    /// Sends a control opcode.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request could not be sent. The
    /// hardware must not acknowledge a request that was rejected.
    fn issue_control(&mut self, op: ControlOp) -> Result<(), TransportError>;

    /// Sends a resource access.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request could not be sent. The
    /// hardware must not acknowledge a request that was rejected.
    fn issue_access(&mut self, request: &AccessRequest) -> Result<(), TransportError>;
}

impl<T: HardwareTransport + ?Sized> HardwareTransport for &mut T {
    fn issue_control(&mut self, op: ControlOp) -> Result<(), TransportError> {
        (**self).issue_control(op)
    }

    fn issue_access(&mut self, request: &AccessRequest) -> Result<(), TransportError> {
        (**self).issue_access(request)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessKind, AckKind, Acknowledgement, ControlOp};

    #[test]
    fn acknowledgement_kind_pairs_with_request() {
        assert_eq!(
            Acknowledgement::Control(ControlOp::Canonicalize).kind(),
            AckKind::Control(ControlOp::Canonicalize)
        );
        assert_eq!(Acknowledgement::Access([0; 16]).kind(), AckKind::Access);
    }

    #[test]
    fn kinds_render_for_diagnostics() {
        assert_eq!(AckKind::Control(ControlOp::Halt).to_string(), "halt");
        assert_eq!(AckKind::Access.to_string(), "access");
        assert!(AccessKind::Write.is_write());
        assert!(!AccessKind::Read.is_write());
    }
}
