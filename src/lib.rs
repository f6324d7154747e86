//! Sensor Aggregation Core — the BLE-to-MQTT device-shadow gateway logic
//! described in `SPEC_FULL.md`.
//!
//! `no_std`, no allocator: every bounded structure (the sensor table, ring
//! logs, message queues, the buffer pool, the JSON builder/parser token
//! array) is sized by a const generic chosen by the binary that
//! instantiates it. Platform binaries (the ESP-IDF `firmware` crate in
//! this workspace) are thin consumers that provide the BLE stack,
//! attribute store, filesystem, TLS, and MQTT client this crate only
//! describes as trait seams.
//!
//! Subsystems, matching `SPEC_FULL.md` §4:
//! - [`ad`] — BLE advertisement/scan-response wire formats (§4.4 step 1, §6).
//! - [`flags`] / [`sensor_event`] / [`sensor_cmd`] — sensor wire vocabulary.
//! - [`log_ring`] — per-sensor ring log (C1).
//! - [`shadow`] — shadow JSON builder/parser and the per-sensor, gateway,
//!   delta, and FOTA document logic built on them (C2/C3/C4).
//! - [`table`] — the Sensor Table (C4).
//! - [`bracket`] / [`sensor_task`] — the BLE central connection state
//!   machine (C5).
//! - [`bus`] / [`pool`] — the inter-task message bus and buffer pool (C6).
//! - [`fsm`] — the Gateway FSM (C7).
//! - [`cert`] — the Certificate Loader (C8).
//! - [`mqtt`] — the MQTT Facade (C9).
//! - [`attr`] — the configuration attribute store contract (§6).
//! - [`time`] — the wall-clock seam shared by table/FSM ticking.
//! - [`diag`] — bucketed diagnostic counters (§7 Capacity taxonomy).
//! - [`error`] — the error taxonomy returned at `firmware`'s boundary.
#![cfg_attr(not(test), no_std)]

pub mod ad;
pub mod attr;
pub mod bracket;
pub mod bus;
pub mod cert;
pub mod diag;
pub mod error;
pub mod flags;
pub mod fsm;
pub mod log_ring;
pub mod mqtt;
pub mod pool;
pub mod sensor_cmd;
pub mod sensor_event;
pub mod sensor_task;
pub mod shadow;
pub mod table;
pub mod time;
