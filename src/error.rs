//! Error taxonomy for the sensor aggregation core (spec §7).
//!
//! Kinds map directly onto the recovery policy the caller must apply:
//! capacity errors drop new work and log once per burst (see [`crate::diag`]),
//! protocol errors drop the offending message without retrying, and policy
//! errors (low battery) are not really errors — they are accepted silently
//! by the caller, which is why [`GatewayError`] does not have a variant for
//! that case at all.

use core::fmt;

/// Errors surfaced by the core's public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    /// The sensor table already holds `TABLE_SIZE` entries.
    TableFull,
    /// The greenlist already holds `GREENLIST_SIZE` entries.
    GreenlistFull,
    /// A message queue is at capacity.
    QueueFull,
    /// The buffer pool has no free buffer of the requested size class.
    PoolExhausted,
    /// No entry exists for the given address.
    UnknownSensor,
    /// A shadow/command payload did not parse or was missing a required field.
    Protocol(&'static str),
    /// A caller-provided buffer was too small to hold the output.
    BufferTooSmall,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::TableFull => write!(f, "sensor table full"),
            GatewayError::GreenlistFull => write!(f, "greenlist full"),
            GatewayError::QueueFull => write!(f, "message queue full"),
            GatewayError::PoolExhausted => write!(f, "buffer pool exhausted"),
            GatewayError::UnknownSensor => write!(f, "unknown sensor address"),
            GatewayError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            GatewayError::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

pub type Result<T> = core::result::Result<T, GatewayError>;
