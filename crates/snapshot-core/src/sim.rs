//! In-process stand-in for the hardware core.
//!
//! `SimulatedCore` answers the same requests as the real core from a sparse
//! word store, so snapshots can be replayed and checked without hardware. It
//! acknowledges through an [`AckSink`] exactly like the hardware integration
//! layer would, on one of three delivery paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam::channel::{self, Sender};
use log::{debug, warn};

use crate::{
    to_hardware, to_host, AccessKind, AccessRequest, AckSink, Acknowledgement, ControlOp,
    HardwareTransport, HardwareVector, HostLine, Resource, TransportError,
};

/// How the simulated core acknowledges requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Delivery {
    /// Acknowledge before `issue_*` returns.
    #[default]
    Inline,
    /// Acknowledge from a background notification thread.
    Worker,
    /// Queue acknowledgements until [`SimulatedCore::release_held`].
    Held,
}

/// Execution state tracked from control opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimRunState {
    /// Core is executing.
    #[default]
    Running,
    /// Core is halted.
    Halted,
}

/// A request as received by the simulated core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuedCommand {
    /// Control opcode.
    Control(ControlOp),
    /// Resource access.
    Access(AccessRequest),
}

#[derive(Debug, Default)]
struct SimState {
    store: HashMap<(u8, u64), HardwareVector>,
    run_state: SimRunState,
    canonical: bool,
    held: VecDeque<Acknowledgement>,
    log: Option<Vec<IssuedCommand>>,
}

/// Simulated hardware peer. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SimulatedCore {
    state: Arc<Mutex<SimState>>,
    sink: AckSink,
    delivery: Delivery,
    worker: Option<Sender<Acknowledgement>>,
}

impl SimulatedCore {
    /// Creates a zeroed core acknowledging through `sink`.
    #[must_use]
    pub fn new(sink: AckSink, delivery: Delivery) -> Self {
        let worker = (delivery == Delivery::Worker).then(|| {
            let (tx, rx) = channel::unbounded::<Acknowledgement>();
            let notify = sink.clone();
            thread::spawn(move || {
                for ack in rx {
                    if let Err(violation) = notify.deliver(ack) {
                        warn!("simulated notification rejected: {violation}");
                    }
                }
            });
            tx
        });

        Self {
            state: Arc::default(),
            sink,
            delivery,
            worker,
        }
    }

    /// Starts recording every received request.
    #[must_use]
    pub fn with_command_log(self) -> Self {
        self.lock().log = Some(Vec::new());
        self
    }

    /// Requests received so far, oldest first. Empty unless recording.
    #[must_use]
    pub fn commands(&self) -> Vec<IssuedCommand> {
        self.lock().log.clone().unwrap_or_default()
    }

    /// Current run state.
    #[must_use]
    pub fn run_state(&self) -> SimRunState {
        self.lock().run_state
    }

    /// `true` after a canonicalize with no restart since.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.lock().canonical
    }

    /// Reads stored state directly, bypassing the protocol.
    #[must_use]
    pub fn peek(&self, resource: Resource, address: u64) -> HostLine {
        self.lock()
            .store
            .get(&(resource.id(), address))
            .map_or([0; 8], to_host)
    }

    /// Overwrites stored state directly, bypassing the protocol.
    pub fn poke(&self, resource: Resource, address: u64, line: &HostLine) {
        self.lock()
            .store
            .insert((resource.id(), address), to_hardware(line));
    }

    /// Number of acknowledgements waiting in [`Delivery::Held`] mode.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.lock().held.len()
    }

    /// Delivers every held acknowledgement and returns how many were sent.
    pub fn release_held(&self) -> usize {
        let held: Vec<_> = self.lock().held.drain(..).collect();
        for ack in &held {
            if let Err(violation) = self.sink.deliver(*ack) {
                warn!("held acknowledgement rejected: {violation}");
            }
        }
        held.len()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acknowledge(&self, ack: Acknowledgement) -> Result<(), TransportError> {
        match self.delivery {
            Delivery::Inline => {
                if let Err(violation) = self.sink.deliver(ack) {
                    warn!("simulated acknowledgement rejected: {violation}");
                }
                Ok(())
            }
            Delivery::Worker => self
                .worker
                .as_ref()
                .ok_or(TransportError::LinkDown)?
                .send(ack)
                .map_err(|_| TransportError::LinkDown),
            Delivery::Held => {
                self.lock().held.push_back(ack);
                Ok(())
            }
        }
    }
}

impl HardwareTransport for SimulatedCore {
    fn issue_control(&mut self, op: ControlOp) -> Result<(), TransportError> {
        {
            let mut state = self.lock();
            if let Some(log) = state.log.as_mut() {
                log.push(IssuedCommand::Control(op));
            }
            match op {
                ControlOp::Halt => state.run_state = SimRunState::Halted,
                ControlOp::Restart => {
                    state.run_state = SimRunState::Running;
                    state.canonical = false;
                }
                ControlOp::Canonicalize => state.canonical = true,
            }
        }
        debug!("simulated core: {op}");
        self.acknowledge(Acknowledgement::Control(op))
    }

    fn issue_access(&mut self, request: &AccessRequest) -> Result<(), TransportError> {
        let response = {
            let mut state = self.lock();
            if let Some(log) = state.log.as_mut() {
                log.push(IssuedCommand::Access(*request));
            }
            let key = (request.resource, request.address);
            match request.kind {
                AccessKind::Read => state.store.get(&key).copied().unwrap_or([0; 16]),
                AccessKind::Write => {
                    state.store.insert(key, request.payload);
                    request.payload
                }
            }
        };
        self.acknowledge(Acknowledgement::Access(response))
    }
}
