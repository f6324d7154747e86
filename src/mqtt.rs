//! MQTT Facade (spec §4.9, C9): connect/publish/keepalive/watchdog wrapper.
//!
//! The wire client itself is a trait seam ([`MqttClient`], spec §1
//! "explicitly out of scope" — `firmware` binds this to `esp-idf-svc`'s
//! `EspMqttClient`); this module owns only the policy the source's
//! `lcz_mqtt.c` layers on top: bounded connect retries, QoS1 ack
//! bookkeeping by message id, the keepalive schedule, and the publish
//! watchdog.

use heapless::Vec;

pub const CONNECT_TRIES: u8 = 3;
/// Sleep between connect attempts, per spec §4.9.
pub const CONNECT_RETRY_DELAY_MILLIS: u32 = 500;

/// Outcome of a PUBACK or a disconnect, delivered to a registered user
/// node (spec §4.9 `publish`, mirroring `lcz_mqtt_user::ack_callback`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Acked,
    NotConnected,
}

/// Wire-level seam the facade drives (spec §1 "MQTT client library").
pub trait MqttClient {
    /// Resolve the broker and open a TLS connection; `true` on CONNACK.
    fn connect(&mut self) -> bool;
    fn disconnect(&mut self);
    fn publish(&mut self, topic: &str, payload: &[u8], message_id: u16) -> bool;
    fn subscribe(&mut self, topic: &str, subscribe: bool) -> bool;
    /// Drive the underlying protocol state machine (poll socket, process
    /// incoming PUBACKs/PINGRESPs). Firmware calls this from the MQTT RX
    /// thread (spec §5).
    fn mqtt_live(&mut self);
    /// Milliseconds remaining in the current keepalive window.
    fn keepalive_time_left_millis(&self) -> u32;
}

const MAX_OUTSTANDING: usize = 16;

/// One in-flight QoS1 publish awaiting a PUBACK.
#[derive(Debug, Clone, Copy)]
struct Outstanding {
    message_id: u16,
}

/// The MQTT Facade. `random_message_id` is supplied by the caller (a
/// `() -> u16` generator that must avoid zero, per spec §4.9 "random
/// 16-bit non-zero message id") so this stays testable without a real RNG.
pub struct MqttFacade<const WATCHDOG_SECONDS: u32> {
    connected: bool,
    consecutive_failures: u32,
    reset_threshold: u32,
    outstanding: Vec<Outstanding, MAX_OUTSTANDING>,
    published_at_least_once: bool,
    seconds_since_last_publish: u32,
}

/// Result of [`MqttFacade::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    Connected,
    /// All `CONNECT_TRIES` attempts failed; `consecutive_failures` is the
    /// running total across calls (spec §4.9 "Tracks consecutive connection
    /// failures").
    Failed { consecutive_failures: u32 },
    /// `consecutive_failures` crossed `reset_threshold`; spec §7 "Fatal"
    /// — caller should assert-and-reset unless its opt-out predicate fires.
    ResetRequested,
}

impl<const WATCHDOG_SECONDS: u32> MqttFacade<WATCHDOG_SECONDS> {
    pub fn new(reset_threshold: u32) -> Self {
        Self {
            connected: false,
            consecutive_failures: 0,
            reset_threshold,
            outstanding: Vec::new(),
            published_at_least_once: false,
            seconds_since_last_publish: 0,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn published(&self) -> bool {
        self.published_at_least_once
    }

    /// Up to `CONNECT_TRIES` attempts with an inter-attempt sleep (spec
    /// §4.9 `connect`). The actual sleep is the caller's responsibility
    /// (`sleep` is invoked between attempts so this stays synchronous and
    /// testable); real callers pass a real delay function, tests pass a no-op.
    pub fn connect(&mut self, client: &mut impl MqttClient, mut sleep: impl FnMut(u32)) -> ConnectResult {
        for attempt in 0..CONNECT_TRIES {
            if client.connect() {
                self.connected = true;
                self.consecutive_failures = 0;
                return ConnectResult::Connected;
            }
            if attempt + 1 < CONNECT_TRIES {
                sleep(CONNECT_RETRY_DELAY_MILLIS);
            }
        }
        self.connected = false;
        self.consecutive_failures += 1;
        if self.reset_threshold != 0 && self.consecutive_failures >= self.reset_threshold {
            ConnectResult::ResetRequested
        } else {
            ConnectResult::Failed { consecutive_failures: self.consecutive_failures }
        }
    }

    /// QoS1 publish: records `message_id` as outstanding so a later
    /// [`Self::on_puback`] can resolve it (spec §4.9 `publish`).
    pub fn publish(&mut self, client: &mut impl MqttClient, topic: &str, payload: &[u8], message_id: u16) -> bool {
        debug_assert_ne!(message_id, 0, "message id must be non-zero");
        if !client.publish(topic, payload, message_id) {
            return false;
        }
        let _ = self.outstanding.push(Outstanding { message_id });
        true
    }

    /// Called when the underlying client reports a PUBACK for `message_id`
    /// (spec §4.9: "the matching node's callback is invoked"). Returns the
    /// status to deliver to the caller's registered user, or `None` if no
    /// matching outstanding publish was found (duplicate/late ack).
    pub fn on_puback(&mut self, message_id: u16) -> Option<PublishStatus> {
        let pos = self.outstanding.iter().position(|o| o.message_id == message_id)?;
        self.outstanding.swap_remove(pos);
        self.published_at_least_once = true;
        self.seconds_since_last_publish = 0;
        Some(PublishStatus::Acked)
    }

    /// On disconnect, every outstanding publish is resolved as
    /// `NotConnected` (spec §4.9 `publish`) and the link is marked down.
    pub fn on_disconnect(&mut self, client: &mut impl MqttClient) -> heapless::Vec<u16, MAX_OUTSTANDING> {
        client.disconnect();
        self.connected = false;
        let ids: heapless::Vec<u16, MAX_OUTSTANDING> = self.outstanding.iter().map(|o| o.message_id).collect();
        self.outstanding.clear();
        ids
    }

    /// Keepalive delayed-work tick (spec §4.9 `keepalive`): runs
    /// `mqtt_live()` if the window has expired, and returns the next
    /// delay to reschedule for.
    pub fn keepalive_tick(&mut self, client: &mut impl MqttClient) -> u32 {
        if client.keepalive_time_left_millis() == 0 {
            client.mqtt_live();
        }
        client.keepalive_time_left_millis()
    }

    /// Publish watchdog (spec §4.9, §7 "Fatal"): call once per second with
    /// whether a publish succeeded this tick. Returns `true` once
    /// `WATCHDOG_SECONDS` have elapsed without a successful publish
    /// (`0` disables the watchdog, matching the spec's "0 disables").
    pub fn watchdog_tick(&mut self, published_this_tick: bool) -> bool {
        if published_this_tick {
            self.seconds_since_last_publish = 0;
            return false;
        }
        if WATCHDOG_SECONDS == 0 {
            return false;
        }
        self.seconds_since_last_publish += 1;
        self.seconds_since_last_publish >= WATCHDOG_SECONDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeClient {
        connect_results: heapless::Vec<bool, 8>,
        keepalive_left: u32,
        live_calls: u32,
    }
    impl MqttClient for FakeClient {
        fn connect(&mut self) -> bool {
            self.connect_results.pop().unwrap_or(false)
        }
        fn disconnect(&mut self) {}
        fn publish(&mut self, _topic: &str, _payload: &[u8], _message_id: u16) -> bool {
            true
        }
        fn subscribe(&mut self, _topic: &str, _subscribe: bool) -> bool {
            true
        }
        fn mqtt_live(&mut self) {
            self.live_calls += 1;
        }
        fn keepalive_time_left_millis(&self) -> u32 {
            self.keepalive_left
        }
    }

    #[test]
    fn connect_succeeds_on_first_try() {
        let mut client = FakeClient { connect_results: heapless::Vec::from_slice(&[true]).unwrap(), ..Default::default() };
        let mut facade: MqttFacade<0> = MqttFacade::new(5);
        assert_eq!(facade.connect(&mut client, |_| {}), ConnectResult::Connected);
        assert!(facade.connected());
    }

    #[test]
    fn connect_exhausts_retries_then_fails() {
        let mut client = FakeClient::default(); // every connect() returns false
        let mut facade: MqttFacade<0> = MqttFacade::new(5);
        assert_eq!(facade.connect(&mut client, |_| {}), ConnectResult::Failed { consecutive_failures: 1 });
    }

    #[test]
    fn consecutive_failures_past_threshold_requests_reset() {
        let mut client = FakeClient::default();
        let mut facade: MqttFacade<0> = MqttFacade::new(2);
        facade.connect(&mut client, |_| {});
        assert_eq!(facade.connect(&mut client, |_| {}), ConnectResult::ResetRequested);
    }

    #[test]
    fn puback_resolves_matching_outstanding_publish() {
        let mut client = FakeClient::default();
        let mut facade: MqttFacade<0> = MqttFacade::new(0);
        facade.publish(&mut client, "t", b"{}", 7);
        assert_eq!(facade.on_puback(7), Some(PublishStatus::Acked));
        assert!(facade.published());
        assert_eq!(facade.on_puback(7), None, "duplicate ack should not match again");
    }

    #[test]
    fn disconnect_resolves_all_outstanding_as_not_connected() {
        let mut client = FakeClient::default();
        let mut facade: MqttFacade<0> = MqttFacade::new(0);
        facade.publish(&mut client, "t", b"{}", 1);
        facade.publish(&mut client, "t", b"{}", 2);
        let resolved = facade.on_disconnect(&mut client);
        assert_eq!(resolved.len(), 2);
        assert!(!facade.connected());
    }

    #[test]
    fn watchdog_fires_after_configured_seconds_without_publish() {
        let mut facade: MqttFacade<3> = MqttFacade::new(0);
        assert!(!facade.watchdog_tick(false));
        assert!(!facade.watchdog_tick(false));
        assert!(facade.watchdog_tick(false));
    }

    #[test]
    fn watchdog_disabled_when_zero() {
        let mut facade: MqttFacade<0> = MqttFacade::new(0);
        for _ in 0..100 {
            assert!(!facade.watchdog_tick(false));
        }
    }

    #[test]
    fn publish_success_resets_watchdog() {
        let mut facade: MqttFacade<2> = MqttFacade::new(0);
        facade.watchdog_tick(false);
        assert!(!facade.watchdog_tick(true));
        assert!(!facade.watchdog_tick(false));
    }
}
