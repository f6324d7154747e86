//! Sensor Task connection state machine (spec §4.5).
//!
//! Drives exactly one BLE connection at a time. The state enum and
//! transition function are pure; the actual BLE operations (create
//! connection, discover, write, subscribe) are invoked by the firmware
//! binding through the [`Central`] trait seam — this module only decides
//! *what* should happen next and tracks timeouts/backpressure.

use crate::bracket::BracketMatcher;
use heapless::String;

/// Connection-create timeout base; firmware adds `BT_CREATE_CONN_TIMEOUT`
/// (stack-specific) before applying the spec's `+2` seconds on top.
pub const CONN_TIMEOUT_MARGIN_SECONDS: u32 = 2;
pub const ENCRYPTION_TIMEOUT_SECONDS: u32 = 3;
pub const RESET_DELAY_MILLIS: u32 = 1500;
pub const RESET_ACK_TO_DUMP_SECONDS: u32 = 10;

/// VSP GATT service characteristic IDs (spec §6).
pub const VSP_TX_CHAR: u16 = 0x2000;
pub const VSP_RX_CHAR: u16 = 0x2001;
pub const DEFAULT_PASSKEY: u32 = 123456;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connecting,
    ExchangingMtu,
    Discovering,
    AwaitingPair,
    Writing,
}

/// What the sensor task needs to write once pairing completes, and what
/// to do once the sensor acknowledges it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// A `set` command; once acked, may require `setEpoch` or `reboot` follow-ups.
    Config { needs_set_epoch: bool, needs_reset: bool },
    Dump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ConnectRequest,
    Connected,
    ConnectFailed,
    ConnectTimeout,
    MtuExchanged,
    DiscoveredRxChar,
    DiscoveredTxChar,
    DiscoveredCccd,
    PairingComplete,
    PairingFailed,
    ResponseBracketMatched,
    ResetTimerFired,
    Disconnected,
}

/// What the caller should do as a result of a transition. Several actions
/// may logically apply in sequence (e.g. disconnect-then-resume-scan); the
/// caller matches on the returned variant and performs the corresponding
/// BLE/bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    StopScanAndCreateConnection,
    StartMtuExchange,
    DiscoverRxChar,
    DiscoverTxChar,
    DiscoverCccd,
    SubscribeNotifications,
    WriteNextChunk,
    SendSetEpoch,
    ArmResetTimer,
    PublishShadowAndDisconnect,
    DisconnectPart1Complete,
    WriteReboot,
    RequestDisconnect,
    RetryAndResumeScan,
    AckAndResumeScan,
}

/// Per-connection state, including the chunked write cursor and the
/// bracket-matched response buffer.
pub struct SensorTask<const RESPONSE_N: usize> {
    state: State,
    pending: Option<PendingKind>,
    response: BracketMatcher<RESPONSE_N>,
    config_complete: bool,
    ads_outstanding: u32,
    ads_dropped: u32,
}

/// Half of `QUEUE_DEPTH` (spec §4.5 backpressure threshold); kept in sync
/// with [`crate::bus::Queue`]'s default depth.
pub const BACKPRESSURE_THRESHOLD: u32 = 16;

impl<const RESPONSE_N: usize> SensorTask<RESPONSE_N> {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            pending: None,
            response: BracketMatcher::new(),
            config_complete: false,
            ads_outstanding: 0,
            ads_dropped: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Set what this connection is for, before issuing `ConnectRequest`.
    pub fn begin(&mut self, pending: PendingKind) {
        self.pending = Some(pending);
        self.config_complete = false;
    }

    /// Advance the state machine. `Disconnected` is valid from any state
    /// (spec's "Any" row).
    pub fn on_event(&mut self, event: Event) -> Action {
        if event == Event::Disconnected {
            self.state = State::Idle;
            return if self.config_complete { Action::AckAndResumeScan } else { Action::RetryAndResumeScan };
        }

        match (self.state, event) {
            (State::Idle, Event::ConnectRequest) => {
                self.state = State::Connecting;
                Action::StopScanAndCreateConnection
            }
            (State::Connecting, Event::Connected) => {
                self.state = State::ExchangingMtu;
                Action::StartMtuExchange
            }
            (State::Connecting, Event::ConnectTimeout) | (State::Connecting, Event::ConnectFailed) => {
                Action::RequestDisconnect
            }
            (State::ExchangingMtu, Event::MtuExchanged) => {
                self.state = State::Discovering;
                Action::DiscoverRxChar
            }
            (State::Discovering, Event::DiscoveredRxChar) => Action::DiscoverTxChar,
            (State::Discovering, Event::DiscoveredTxChar) => Action::DiscoverCccd,
            (State::Discovering, Event::DiscoveredCccd) => {
                self.state = State::AwaitingPair;
                Action::SubscribeNotifications
            }
            (State::AwaitingPair, Event::PairingComplete) => {
                self.state = State::Writing;
                Action::WriteNextChunk
            }
            (State::AwaitingPair, Event::PairingFailed) => Action::RequestDisconnect,
            (State::Writing, Event::ResponseBracketMatched) => self.handle_response(),
            (State::Writing, Event::ResetTimerFired) => Action::WriteReboot,
            _ => Action::None,
        }
    }

    fn handle_response(&mut self) -> Action {
        match self.pending {
            Some(PendingKind::Config { needs_set_epoch: true, .. }) => {
                self.pending = Some(PendingKind::Config { needs_set_epoch: false, needs_reset: false });
                Action::SendSetEpoch
            }
            Some(PendingKind::Config { needs_reset: true, .. }) => {
                self.pending = None;
                Action::ArmResetTimer
            }
            Some(PendingKind::Dump) => {
                self.config_complete = true;
                Action::PublishShadowAndDisconnect
            }
            _ => {
                self.config_complete = true;
                Action::DisconnectPart1Complete
            }
        }
    }

    /// Feed one byte of a GATT notification into the response framer;
    /// returns `true` exactly when a complete object is ready in
    /// [`Self::response_bytes`] (the caller should then call `on_event`
    /// with [`Event::ResponseBracketMatched`]).
    pub fn feed_notification_byte(&mut self, byte: u8) -> bool {
        self.response.feed(byte)
    }

    pub fn response_bytes(&mut self) -> &[u8] {
        self.response.take_object()
    }

    pub fn reset_response_framer(&mut self) {
        self.response.reset();
    }

    /// Chunk a command into `mtu - header_overhead`-sized writes (spec
    /// §4.5 "Flow control").
    pub fn chunk_command<'a>(command: &'a str, mtu: usize, header_overhead: usize) -> impl Iterator<Item = &'a [u8]> {
        let chunk_size = mtu.saturating_sub(header_overhead).max(1);
        command.as_bytes().chunks(chunk_size)
    }

    /// A scan callback arriving on the BLE RX thread (spec §4.5
    /// "Backpressure"): returns `true` if the advertisement should be
    /// pushed to the task queue, `false` if it must be dropped.
    pub fn admit_advertisement(&mut self) -> bool {
        if self.ads_outstanding > BACKPRESSURE_THRESHOLD {
            self.ads_dropped += 1;
            false
        } else {
            self.ads_outstanding += 1;
            true
        }
    }

    /// Call once the queued advertisement has been processed. Logs (via
    /// the returned count) and clears the drop counter once the backlog
    /// fully drains.
    pub fn complete_advertisement(&mut self) -> Option<u32> {
        self.ads_outstanding = self.ads_outstanding.saturating_sub(1);
        if self.ads_outstanding == 0 && self.ads_dropped > 0 {
            let dropped = self.ads_dropped;
            self.ads_dropped = 0;
            Some(dropped)
        } else {
            None
        }
    }
}

impl<const RESPONSE_N: usize> Default for SensorTask<RESPONSE_N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait seam for the BLE central role the sensor task drives (spec §1
/// "explicitly out of scope": concrete BLE stack is supplied by
/// `firmware`, e.g. via `esp32-nimble`'s `BLEClient`).
pub trait Central {
    fn create_connection(&mut self, addr: &crate::ad::Addr, use_coded_phy: bool);
    fn request_disconnect(&mut self);
    fn exchange_mtu(&mut self);
    fn discover_characteristic(&mut self, uuid16: u16);
    fn discover_cccd(&mut self);
    fn subscribe(&mut self);
    fn write_chunk(&mut self, chunk: &[u8]);
    fn mtu(&self) -> usize;
}

/// A small scratch buffer type for a command being written out in chunks;
/// `512` matches [`crate::table::PendingCmd`].
pub type CommandBuffer = String<512>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_turnup_walks_every_state() {
        let mut t: SensorTask<128> = SensorTask::new();
        t.begin(PendingKind::Dump);
        assert_eq!(t.on_event(Event::ConnectRequest), Action::StopScanAndCreateConnection);
        assert_eq!(t.state(), State::Connecting);
        assert_eq!(t.on_event(Event::Connected), Action::StartMtuExchange);
        assert_eq!(t.on_event(Event::MtuExchanged), Action::DiscoverRxChar);
        assert_eq!(t.on_event(Event::DiscoveredRxChar), Action::DiscoverTxChar);
        assert_eq!(t.on_event(Event::DiscoveredTxChar), Action::DiscoverCccd);
        assert_eq!(t.on_event(Event::DiscoveredCccd), Action::SubscribeNotifications);
        assert_eq!(t.state(), State::AwaitingPair);
        assert_eq!(t.on_event(Event::PairingComplete), Action::WriteNextChunk);
        assert_eq!(t.state(), State::Writing);
        assert_eq!(t.on_event(Event::ResponseBracketMatched), Action::PublishShadowAndDisconnect);
    }

    #[test]
    fn disconnect_from_any_state_returns_to_idle() {
        let mut t: SensorTask<128> = SensorTask::new();
        t.begin(PendingKind::Dump);
        t.on_event(Event::ConnectRequest);
        t.on_event(Event::Connected);
        assert_eq!(t.on_event(Event::Disconnected), Action::RetryAndResumeScan);
        assert_eq!(t.state(), State::Idle);
    }

    #[test]
    fn config_with_set_epoch_then_reset_sequences_correctly() {
        let mut t: SensorTask<128> = SensorTask::new();
        t.begin(PendingKind::Config { needs_set_epoch: true, needs_reset: true });
        t.on_event(Event::ConnectRequest);
        t.on_event(Event::Connected);
        t.on_event(Event::MtuExchanged);
        t.on_event(Event::DiscoveredRxChar);
        t.on_event(Event::DiscoveredTxChar);
        t.on_event(Event::DiscoveredCccd);
        t.on_event(Event::PairingComplete);
        assert_eq!(t.on_event(Event::ResponseBracketMatched), Action::SendSetEpoch);
        assert_eq!(t.on_event(Event::ResponseBracketMatched), Action::ArmResetTimer);
        assert_eq!(t.on_event(Event::ResetTimerFired), Action::WriteReboot);
    }

    #[test]
    fn backpressure_drops_once_threshold_exceeded() {
        let mut t: SensorTask<128> = SensorTask::new();
        for _ in 0..=BACKPRESSURE_THRESHOLD {
            assert!(t.admit_advertisement());
        }
        assert!(!t.admit_advertisement());
    }

    #[test]
    fn drop_count_reported_once_backlog_drains() {
        let mut t: SensorTask<128> = SensorTask::new();
        for _ in 0..=BACKPRESSURE_THRESHOLD {
            t.admit_advertisement();
        }
        t.admit_advertisement();
        let mut reported = None;
        for _ in 0..=BACKPRESSURE_THRESHOLD + 1 {
            if let Some(n) = t.complete_advertisement() {
                reported = Some(n);
            }
        }
        assert_eq!(reported, Some(1));
    }
}
