//! Message Bus (spec §4.6, §5): typed in-process messages between the
//! Sensor Task, the Gateway FSM / cloud control task, and the BLE RX
//! thread.
//!
//! Messages carry a small header and a payload; large payloads reference a
//! [`crate::pool::Buffer`] rather than embedding bytes inline. The
//! ownership contract mirrors [`crate::shadow::delta::IngestOutcome`] but
//! is the general-purpose version every message handler obeys: free the
//! payload unless `DoNotFree` is returned, in which case the handler has
//! taken ownership (used by retry paths that park a command back in the
//! table).

use crate::diag::BurstCounter;

/// Message codes. The bus does not interpret payloads by code — handlers
/// do — this just gives producers/consumers a cheap way to route without
/// downcasting a trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    Advertisement,
    ScanResponse,
    ConnectRequest,
    ConfigRequest,
    ConfigAck,
    ConfigRetry,
    GreenlistUpdate,
    ShadowInit,
    CloudConnect,
    CloudDisconnect,
    Subscribe,
    SubscriptionAck,
}

/// Fixed task identifiers for `rx_id`/`tx_id` routing (spec §5's five
/// long-lived threads, minus the BLE RX thread which only ever produces).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    SensorTask,
    GatewayFsm,
    MqttFacade,
}

/// Every message's fixed-size header (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub code: MessageCode,
    pub rx_id: TaskId,
    pub tx_id: TaskId,
}

/// What a handler did with a message's pool-backed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The handler is done; the bus frees the payload buffer.
    Free,
    /// The handler took ownership (e.g. parked the command for retry); the
    /// bus must not free it.
    DoNotFree,
}

/// A bounded queue of `(header, pool slot index)` pairs. The payload bytes
/// live in a [`crate::pool::SizedPool`] owned by whichever task reads this
/// queue; the queue itself only carries routing metadata plus the slot
/// index, keeping `Envelope` `Copy` and cheap to move between threads.
pub struct Queue<const DEPTH: usize> {
    items: heapless::Deque<Envelope, DEPTH>,
    high_water_logged: BurstCounter,
}

/// One queued message: header plus the index of its payload in the
/// relevant buffer pool (`usize::MAX` for header-only messages with no
/// payload, e.g. `CloudConnect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub header: MessageHeader,
    pub payload_index: usize,
}

pub const NO_PAYLOAD: usize = usize::MAX;

impl<const DEPTH: usize> Queue<DEPTH> {
    pub fn new() -> Self {
        Self { items: heapless::Deque::new(), high_water_logged: BurstCounter::new("message queue above 50%") }
    }

    /// Push a message, logging a warning the first time the queue crosses
    /// 50% utilization (spec §4.6) and returning `false` if the queue is
    /// completely full (the caller should free the payload itself in that
    /// case — the bus never silently drops a payload index without telling
    /// the caller).
    pub fn push(&mut self, envelope: Envelope) -> bool {
        if self.items.len() * 2 >= DEPTH {
            self.high_water_logged.bump();
        } else {
            self.high_water_logged.resolve();
        }
        self.items.push_back(envelope).is_ok()
    }

    pub fn pop(&mut self) -> Option<Envelope> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        DEPTH
    }
}

impl<const DEPTH: usize> Default for Queue<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(code: MessageCode) -> Envelope {
        Envelope { header: MessageHeader { code, rx_id: TaskId::SensorTask, tx_id: TaskId::GatewayFsm }, payload_index: NO_PAYLOAD }
    }

    #[test]
    fn fifo_ordering_is_preserved() {
        let mut q: Queue<4> = Queue::new();
        q.push(env(MessageCode::Advertisement));
        q.push(env(MessageCode::ConfigAck));
        assert_eq!(q.pop().unwrap().header.code, MessageCode::Advertisement);
        assert_eq!(q.pop().unwrap().header.code, MessageCode::ConfigAck);
    }

    #[test]
    fn push_fails_once_full() {
        let mut q: Queue<2> = Queue::new();
        assert!(q.push(env(MessageCode::Advertisement)));
        assert!(q.push(env(MessageCode::Advertisement)));
        assert!(!q.push(env(MessageCode::Advertisement)));
    }
}
