//! Transport seam between the engine and the realtime server.

use crate::protocol::{ClientEvent, ServerEvent};

/// What the transport reports back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BusSignal {
    Connected,
    Disconnected,
    Event(ServerEvent),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    #[error("outbound queue is full")]
    Full,
    #[error("bus is closed")]
    Closed,
}

/// Fire-and-forget publisher of client events.
pub trait RealtimeBus {
    fn emit(&mut self, event: ClientEvent) -> Result<(), BusError>;
}

/// Bus that records what was emitted. Used headless and in tests, where the
/// caller plays the server by feeding [`BusSignal`]s back to the engine.
#[derive(Debug, Default)]
pub struct MemoryBus {
    sent: Vec<ClientEvent>,
    closed: bool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[ClientEvent] {
        &self.sent
    }

    /// Drain everything emitted so far.
    pub fn take(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.sent)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl RealtimeBus for MemoryBus {
    fn emit(&mut self, event: ClientEvent) -> Result<(), BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        self.sent.push(event);
        Ok(())
    }
}
