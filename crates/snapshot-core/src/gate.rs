//! Single-outstanding-request gate between the host and the hardware core.
//!
//! Three capacity-1 channels carry the handshake:
//!
//! - the in-flight slot, owned by the gate, holds the kind of the request that
//!   is awaiting acknowledgement; a second issue finds it full and fails,
//! - the expectation channel tells the notification path which
//!   acknowledgement it should see next,
//! - the completion channel carries the acknowledgement (or the violation the
//!   notification path detected) back to the blocked caller.
//!
//! There is no timeout. A request the hardware never acknowledges blocks the
//! caller forever.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use log::{error, trace};

use crate::{
    line_to_register, register_to_line, to_hardware, to_host, AccessKind, AccessRequest, AckKind,
    Acknowledgement, ControlOp, GateError, HardwareTransport, HostLine, Resource, TransportError,
    ZERO_LINE,
};

type Completion = Result<Acknowledgement, GateError>;

/// Creates the gate-side receiver and the hardware-side sink of one link.
#[must_use]
pub fn ack_channel() -> (AckReceiver, AckSink) {
    let (expect_tx, expect_rx) = channel::bounded(1);
    let (completion_tx, completion_rx) = channel::bounded(1);
    (
        AckReceiver {
            expect_tx,
            expect_rx: expect_rx.clone(),
            completions: completion_rx,
        },
        AckSink {
            expect: expect_rx,
            completions: completion_tx,
        },
    )
}

/// Gate-side end of the notification path. Consumed by [`RequestGate::new`].
#[derive(Debug)]
pub struct AckReceiver {
    expect_tx: Sender<AckKind>,
    expect_rx: Receiver<AckKind>,
    completions: Receiver<Completion>,
}

/// Hardware-side end of the notification path.
///
/// The hardware integration layer calls [`AckSink::deliver`] from whatever
/// thread receives the hardware's completion notifications.
#[derive(Debug, Clone)]
pub struct AckSink {
    expect: Receiver<AckKind>,
    completions: Sender<Completion>,
}

impl AckSink {
    /// Delivers a hardware acknowledgement to the waiting caller.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::UnexpectedAcknowledgement`] when no request is in
    /// flight and [`GateError::MismatchedAcknowledgement`] when the
    /// acknowledgement completes a different request. Both are also forwarded
    /// to the gate, which poisons itself. Returns [`GateError::Disconnected`]
    /// when the gate is gone.
    pub fn deliver(&self, ack: Acknowledgement) -> Result<(), GateError> {
        let received = ack.kind();
        let outcome = match self.expect.try_recv() {
            Ok(expected) if expected == received => Ok(ack),
            Ok(expected) => Err(GateError::MismatchedAcknowledgement { expected, received }),
            Err(TryRecvError::Empty) => Err(GateError::UnexpectedAcknowledgement { received }),
            Err(TryRecvError::Disconnected) => return Err(GateError::Disconnected),
        };

        if let Err(violation) = outcome {
            error!("hardware notification rejected: {violation}");
        }

        match self.completions.try_send(outcome) {
            Ok(()) => outcome.map(|_| ()),
            Err(TrySendError::Disconnected(_)) => Err(GateError::Disconnected),
            // A completion is already queued and unconsumed, so this
            // acknowledgement cannot belong to anything in flight.
            Err(TrySendError::Full(_)) => {
                error!("{received} acknowledgement arrived while a completion is still queued");
                Err(GateError::UnexpectedAcknowledgement { received })
            }
        }
    }
}

/// Serializes every control and access request to the hardware.
#[derive(Debug)]
pub struct RequestGate<T> {
    transport: T,
    slot_tx: Sender<AckKind>,
    slot_rx: Receiver<AckKind>,
    link: AckReceiver,
    poisoned: bool,
}

impl<T: HardwareTransport> RequestGate<T> {
    /// Creates an idle gate over `transport`.
    #[must_use]
    pub fn new(transport: T, link: AckReceiver) -> Self {
        let (slot_tx, slot_rx) = channel::bounded(1);
        Self {
            transport,
            slot_tx,
            slot_rx,
            link,
            poisoned: false,
        }
    }

    /// Creates a link and builds the transport around its sink.
    #[must_use]
    pub fn connect(build: impl FnOnce(AckSink) -> T) -> Self {
        let (link, sink) = ack_channel();
        Self::new(build(sink), link)
    }

    /// Returns `true` when no request is awaiting acknowledgement.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.slot_rx.is_empty()
    }

    /// Returns `true` after a fatal protocol violation.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Shared access to the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Halts the core and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn halt(&mut self) -> Result<(), GateError> {
        self.control(ControlOp::Halt)
    }

    /// Resumes the core and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn restart(&mut self) -> Result<(), GateError> {
        self.control(ControlOp::Restart)
    }

    /// Drains the core to an architecturally consistent state and waits for
    /// the acknowledgement.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn canonicalize(&mut self) -> Result<(), GateError> {
        self.control(ControlOp::Canonicalize)
    }

    /// Issues one resource access and waits for its completion.
    ///
    /// Writes send `data` through the codec; reads send a zero payload. The
    /// decoded response is returned in both cases.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn access(
        &mut self,
        kind: AccessKind,
        resource: Resource,
        address: u64,
        data: Option<&HostLine>,
    ) -> Result<HostLine, GateError> {
        let request = AccessRequest {
            kind,
            resource: resource.id(),
            address,
            payload: to_hardware(data.unwrap_or(&ZERO_LINE)),
        };
        self.issue_access(&request)?;
        match self.await_ack()? {
            Acknowledgement::Access(vector) => Ok(to_host(&vector)),
            Acknowledgement::Control(op) => Err(self.poison(GateError::MismatchedAcknowledgement {
                expected: AckKind::Access,
                received: AckKind::Control(op),
            })),
        }
    }

    /// Reads a full line from `resource` at `address`.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn read_line(&mut self, resource: Resource, address: u64) -> Result<HostLine, GateError> {
        self.access(AccessKind::Read, resource, address, None)
    }

    /// Writes a full line to `resource` at `address`.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn write_line(
        &mut self,
        resource: Resource,
        address: u64,
        line: &HostLine,
    ) -> Result<(), GateError> {
        self.access(AccessKind::Write, resource, address, Some(line))
            .map(|_| ())
    }

    /// Reads a single-word value from `resource` at `address`.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn read_word(&mut self, resource: Resource, address: u64) -> Result<u64, GateError> {
        self.read_line(resource, address)
            .map(|line| line_to_register(&line))
    }

    /// Writes a single-word value to `resource` at `address`.
    ///
    /// # Errors
    ///
    /// Propagates any [`GateError`] from the handshake.
    pub fn write_word(
        &mut self,
        resource: Resource,
        address: u64,
        value: u64,
    ) -> Result<(), GateError> {
        self.write_line(resource, address, &register_to_line(value))
    }

    /// Sends a control opcode without waiting for its acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Busy`] when a request is already in flight, plus
    /// the errors described on [`RequestGate::await_ack`].
    pub fn issue_control(&mut self, op: ControlOp) -> Result<(), GateError> {
        trace!("issue {op}");
        self.issue(AckKind::Control(op), |transport| transport.issue_control(op))
    }

    /// Sends a resource access without waiting for its acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Busy`] when a request is already in flight, plus
    /// the errors described on [`RequestGate::await_ack`].
    pub fn issue_access(&mut self, request: &AccessRequest) -> Result<(), GateError> {
        trace!(
            "issue {:?} resource={} address={:#x}",
            request.kind,
            request.resource,
            request.address
        );
        self.issue(AckKind::Access, |transport| transport.issue_access(request))
    }

    /// Blocks until the request in flight is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Idle`] when nothing is in flight, the violation
    /// reported by the notification path, or [`GateError::Disconnected`] when
    /// every [`AckSink`] was dropped.
    pub fn await_ack(&mut self) -> Result<Acknowledgement, GateError> {
        if self.poisoned {
            return Err(GateError::Poisoned);
        }
        if self.is_idle() {
            return Err(GateError::Idle);
        }

        let completion = self
            .link
            .completions
            .recv()
            .unwrap_or(Err(GateError::Disconnected));
        let _ = self.slot_rx.try_recv();

        completion.map_err(|violation| self.poison(violation))
    }

    fn control(&mut self, op: ControlOp) -> Result<(), GateError> {
        self.issue_control(op)?;
        match self.await_ack()? {
            Acknowledgement::Control(done) if done == op => Ok(()),
            other => Err(self.poison(GateError::MismatchedAcknowledgement {
                expected: AckKind::Control(op),
                received: other.kind(),
            })),
        }
    }

    fn issue(
        &mut self,
        kind: AckKind,
        send: impl FnOnce(&mut T) -> Result<(), TransportError>,
    ) -> Result<(), GateError> {
        if self.poisoned {
            return Err(GateError::Poisoned);
        }

        match self.slot_tx.try_send(kind) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let pending = self.slot_rx.try_recv().unwrap_or(kind);
                let _ = self.slot_tx.try_send(pending);
                return Err(self.poison(GateError::Busy { pending }));
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(self.poison(GateError::Disconnected));
            }
        }

        // Anything already queued arrived while the gate was idle.
        match self.link.completions.try_recv() {
            Ok(stale) => {
                let violation = stale.err().unwrap_or(GateError::UnexpectedAcknowledgement {
                    received: AckKind::Access,
                });
                return Err(self.poison(violation));
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => return Err(self.poison(GateError::Disconnected)),
        }

        if self.link.expect_tx.try_send(kind).is_err() {
            return Err(self.poison(GateError::Disconnected));
        }

        if let Err(rejected) = send(&mut self.transport) {
            let _ = self.link.expect_rx.try_recv();
            let _ = self.slot_rx.try_recv();
            return Err(GateError::Transport(rejected));
        }
        Ok(())
    }

    fn poison(&mut self, violation: GateError) -> GateError {
        if violation.is_fatal() && !self.poisoned {
            error!("request gate poisoned: {violation}");
            self.poisoned = true;
        }
        violation
    }
}
