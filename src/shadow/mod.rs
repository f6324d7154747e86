//! Shadow document assembly and parsing (spec §4.2-§4.4, C2/C3/C4).
//!
//! [`builder`] and [`parser`] are the two general-purpose primitives; the
//! remaining submodules use them to implement the specific shadow documents
//! the gateway exchanges with the sensor table: the per-sensor reported
//! state ([`maker`]), the gateway's own collection shadow ([`gateway`]),
//! inbound deltas and event-log replay ([`delta`]), and the FOTA/telemetry
//! read-only parsers ([`fota`]).

pub mod builder;
pub mod delta;
pub mod fota;
pub mod gateway;
pub mod maker;
pub mod parser;

/// Which key convention and unit scale the per-sensor shadow maker uses.
///
/// `Classic` is the default: one topic per sensor, full key names,
/// temperature in hundredths of a degree. `SingleTopic` is a compile-time
/// alternative used when many sensors must be multiplexed onto one shadow
/// topic — keys become `"<name>-<key>"` and temperature is reported in
/// whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMode {
    Classic,
    SingleTopic,
}

impl Default for ShadowMode {
    fn default() -> Self {
        if cfg!(feature = "single-topic") {
            ShadowMode::SingleTopic
        } else {
            ShadowMode::Classic
        }
    }
}
