//! Configuration attribute store contract (spec §1 "explicitly out of
//! scope", §6 "Configuration attributes").
//!
//! The core never owns persisted configuration; it reads/writes through
//! an [`AttributeStore`] the firmware binds to a real key/value database
//! (e.g. `attr.c`'s flash-backed store in the original, `EspNvs` in this
//! crate's firmware binding). [`MemoryAttributeStore`] is the in-process
//! double used by tests and as the default when nothing has been
//! persisted yet.

use heapless::{FnvIndexMap, String};

/// Attribute names used by the core (spec §6). Values are read/written as
/// strings; numeric attributes are stored as their decimal text the way
/// the source's attribute shell does, so one store implementation covers
/// every attribute type without a tagged union.
pub mod names {
    pub const ENDPOINT: &str = "endpoint";
    pub const PORT: &str = "port";
    pub const CLIENT_ID: &str = "client_id";
    pub const ROOT_CA_NAME: &str = "root_ca_name";
    pub const CLIENT_CERT_NAME: &str = "client_cert_name";
    pub const CLIENT_KEY_NAME: &str = "client_key_name";
    pub const PEER_VERIFY: &str = "peer_verify";

    pub const JOIN_DELAY: &str = "join_delay";
    pub const JOIN_MIN: &str = "join_min";
    pub const JOIN_MAX: &str = "join_max";
    pub const JOIN_INTERVAL: &str = "join_interval";

    pub const TOPIC_PREFIX: &str = "topic_prefix";

    pub const COMMISSIONED: &str = "commissioned";
    pub const GATEWAY_ID: &str = "gateway_id";
    pub const BLUETOOTH_ADDRESS: &str = "bluetooth_address";
    pub const NAME: &str = "name";

    /// LwM2M builds only; the MQTT/cert path in this crate does not read
    /// it directly, but it's recorded here because it governs how the
    /// Certificate Loader / MQTT Facade derive a client identity in some
    /// builds of the original (spec §6, SPEC_FULL supplement).
    pub const GENERATE_PSK: &str = "generate_psk";
}

/// `generate_psk` enum values (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratePsk {
    Default,
    Random,
}

impl GeneratePsk {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "random" => Some(Self::Random),
            _ => None,
        }
    }
}

/// Maximum length of an attribute value as stored by this crate's typed
/// accessors. Generous enough for hostnames, topic prefixes, and 12-hex
/// gateway IDs.
pub const VALUE_MAX: usize = 96;
pub type AttrValue = String<VALUE_MAX>;

/// Key/value configuration store, serialized internally (spec §5 "Shared
/// resources": "readers observe last committed value").
pub trait AttributeStore {
    fn get_str(&self, name: &str) -> Option<AttrValue>;
    fn set_str(&mut self, name: &str, value: &str) -> bool;

    /// Numeric attributes are stored as decimal text; this is a
    /// convenience parse over [`Self::get_str`].
    fn get_u32(&self, name: &str) -> Option<u32> {
        self.get_str(name)?.parse().ok()
    }

    fn set_u32(&mut self, name: &str, value: u32) -> bool {
        let mut buf = AttrValue::new();
        // `u32::MAX` is 10 digits; `VALUE_MAX` is far larger.
        let _ = core::fmt::write(&mut Writer(&mut buf), format_args!("{}", value));
        self.set_str(name, &buf)
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get_str(name)?.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    fn set_bool(&mut self, name: &str, value: bool) -> bool {
        self.set_str(name, if value { "1" } else { "0" })
    }
}

struct Writer<'a>(&'a mut AttrValue);

impl<'a> core::fmt::Write for Writer<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.push_str(s).map_err(|_| core::fmt::Error)
    }
}

/// Randomized join backoff (spec §6 "join_delay, join_min, join_max,
/// join_interval"): `delay == 0` triggers `RAND(min,max) * interval`.
///
/// `rand_0_to_range` is supplied by the caller (a `u32 -> u32` uniform
/// generator over `0..=range`) so this stays testable without a real RNG.
pub fn resolve_join_delay_seconds(
    delay: u32,
    min: u32,
    max: u32,
    interval: u32,
    rand_0_to_range: impl FnOnce(u32) -> u32,
) -> u32 {
    if delay != 0 {
        return delay;
    }
    let span = max.saturating_sub(min);
    (min + rand_0_to_range(span)).saturating_mul(interval)
}

/// An in-memory [`AttributeStore`] backed by a bounded map, used by tests
/// and as the documented default when no persisted value exists yet
/// (SPEC_FULL "Configuration" ambient-stack note).
pub struct MemoryAttributeStore<const N: usize> {
    map: FnvIndexMap<String<32>, AttrValue, N>,
}

impl<const N: usize> MemoryAttributeStore<N> {
    pub fn new() -> Self {
        Self { map: FnvIndexMap::new() }
    }
}

impl<const N: usize> Default for MemoryAttributeStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AttributeStore for MemoryAttributeStore<N> {
    fn get_str(&self, name: &str) -> Option<AttrValue> {
        self.map.get(name).cloned()
    }

    fn set_str(&mut self, name: &str, value: &str) -> bool {
        let Ok(key) = String::<32>::try_from(name) else { return false };
        let Ok(val) = AttrValue::try_from(value) else { return false };
        self.map.insert(key, val).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_string_and_numeric_attributes() {
        let mut store: MemoryAttributeStore<8> = MemoryAttributeStore::new();
        assert!(store.set_str(names::ENDPOINT, "mqtt.example.com"));
        assert_eq!(store.get_str(names::ENDPOINT).unwrap().as_str(), "mqtt.example.com");

        assert!(store.set_u32(names::PORT, 8883));
        assert_eq!(store.get_u32(names::PORT), Some(8883));

        assert!(store.set_bool(names::COMMISSIONED, true));
        assert_eq!(store.get_bool(names::COMMISSIONED), Some(true));
    }

    #[test]
    fn missing_attribute_is_none() {
        let store: MemoryAttributeStore<8> = MemoryAttributeStore::new();
        assert!(store.get_str(names::ENDPOINT).is_none());
    }

    #[test]
    fn join_delay_zero_randomizes_within_range() {
        let delay = resolve_join_delay_seconds(0, 5, 15, 2, |span| span / 2);
        // min(5) + span/2(5) = 10, * interval(2) = 20
        assert_eq!(delay, 20);
    }

    #[test]
    fn nonzero_join_delay_passes_through() {
        assert_eq!(resolve_join_delay_seconds(42, 5, 15, 2, |_| 0), 42);
    }

    #[test]
    fn generate_psk_parses_known_values() {
        assert_eq!(GeneratePsk::parse("default"), Some(GeneratePsk::Default));
        assert_eq!(GeneratePsk::parse("random"), Some(GeneratePsk::Random));
        assert_eq!(GeneratePsk::parse("bogus"), None);
    }
}
