//! Per-sensor reported-state shadow maker (spec §4.4).
//!
//! Builds the `state.reported` fragment for one [`crate::table::SensorEntry`]
//! into a caller-supplied [`ShadowBuilder`]. Callers own the buffer sizing
//! and the `state`/`reported` group nesting; this module only fills in the
//! fields.

use super::builder::ShadowBuilder;
use super::ShadowMode;
use crate::ad::{AddrString, EventAd, ScanRsp};
use crate::flags::{self, FIELD_ORDER};
use crate::log_ring::RingLog;
use crate::sensor_event;

/// Everything the maker needs to know about one sensor, decoupled from
/// [`crate::table::SensorEntry`] so this module stays testable without
/// pulling in the whole table.
pub struct MakerInput<'a, const LOG_N: usize> {
    pub addr_string: &'a AddrString,
    pub name: &'a str,
    pub rssi: i8,
    pub valid_ad: bool,
    pub valid_rsp: bool,
    pub ad: EventAd,
    pub rsp: ScanRsp,
    pub updated_rsp: bool,
    pub updated_name: bool,
    pub last_flags: u16,
    pub log: &'a RingLog<LOG_N>,
    pub gateway_id: &'a str,
}

/// Mangle a key for single-topic mode: `"<name>-<key>"`. Classic mode
/// returns the key unchanged — callers pass the result straight to the
/// builder, so no allocation is needed either way beyond the fixed buffer.
fn mangled<'a, const M: usize>(
    mode: ShadowMode,
    name: &str,
    key: &'static str,
    scratch: &'a mut heapless::String<M>,
) -> &'a str {
    match mode {
        ShadowMode::Classic => key,
        ShadowMode::SingleTopic => {
            scratch.clear();
            let _ = scratch.push_str(name);
            let _ = scratch.push('-');
            let _ = scratch.push_str(key);
            scratch.as_str()
        }
    }
}

/// Longest mangled key this module ever builds: `NAME_MAX` (32, see
/// `crate::table`) plus a separating `-` plus the longest field name
/// (`rateOfChangeTemperatureAlarm`, 28 bytes).
const KEY_SCRATCH: usize = 64;

fn emit_int<const N: usize>(b: &mut ShadowBuilder<N>, mode: ShadowMode, name: &str, key: &'static str, value: i64) {
    let mut scratch: heapless::String<KEY_SCRATCH> = heapless::String::new();
    b.add_int(mangled(mode, name, key, &mut scratch), value);
}

fn emit_uint<const N: usize>(b: &mut ShadowBuilder<N>, mode: ShadowMode, name: &str, key: &'static str, value: u64) {
    let mut scratch: heapless::String<KEY_SCRATCH> = heapless::String::new();
    b.add_uint(mangled(mode, name, key, &mut scratch), value);
}

fn emit_str<const N: usize>(b: &mut ShadowBuilder<N>, mode: ShadowMode, name: &str, key: &'static str, value: &str) {
    let mut scratch: heapless::String<KEY_SCRATCH> = heapless::String::new();
    b.add_str(mangled(mode, name, key, &mut scratch), value);
}

fn emit_version<const N: usize>(b: &mut ShadowBuilder<N>, mode: ShadowMode, name: &str, key: &'static str, version: (u8, u8, u8)) {
    let mut scratch: heapless::String<KEY_SCRATCH> = heapless::String::new();
    b.add_version(mangled(mode, name, key, &mut scratch), version);
}

/// Write `bluetoothAddress` and `rssi` — unconditional, the one pair of
/// fields a shadow always carries so an empty temperature/flags update
/// never publishes a bare `{}`.
fn bt_handler<const N: usize, const LOG_N: usize>(b: &mut ShadowBuilder<N>, input: &MakerInput<LOG_N>, mode: ShadowMode) {
    emit_str(b, mode, input.name, "bluetoothAddress", input.addr_string.as_str());
    emit_int(b, mode, input.name, "rssi", input.rssi as i64);
}

fn temperature_handler<const N: usize, const LOG_N: usize>(
    b: &mut ShadowBuilder<N>,
    input: &MakerInput<LOG_N>,
    mode: ShadowMode,
) {
    if !sensor_event::carries_temperature(input.ad.record_type) {
        return;
    }
    let mut centi = sensor_event::temperature_centidegrees(input.ad.data) as i64;
    let key: &'static str = match mode {
        ShadowMode::Classic => "tempCc",
        ShadowMode::SingleTopic => {
            centi /= 100;
            "temperature"
        }
    };
    emit_int(b, mode, input.name, key, centi);
}

fn event_handler<const N: usize, const LOG_N: usize>(b: &mut ShadowBuilder<N>, input: &MakerInput<LOG_N>, mode: ShadowMode) {
    match input.ad.record_type {
        sensor_event::BATTERY_GOOD | sensor_event::BATTERY_BAD => {
            emit_uint(b, mode, input.name, "batteryVoltageMv", sensor_event::data_unsigned(input.ad.data) as u64);
        }
        sensor_event::RESET => {
            emit_str(b, mode, input.name, "resetReason", sensor_event::reset_reason_string(input.ad.data));
        }
        _ => {}
    }
}

/// Duplicate terminal-alarm/battery fields under a fixed "IG60-generated"
/// name, so the last-seen value survives even after the ring log wraps
/// (spec §4.4).
fn ig60_event_handler<const N: usize, const LOG_N: usize>(b: &mut ShadowBuilder<N>, input: &MakerInput<LOG_N>, mode: ShadowMode) {
    let t = || sensor_event::temperature_centidegrees(input.ad.data) as i64;
    let battery = || sensor_event::data_unsigned(input.ad.data) as u64;
    match input.ad.record_type {
        sensor_event::ALARM_HIGH_TEMP_1 => emit_int(b, mode, input.name, "alarmHighTemp1", t()),
        sensor_event::ALARM_HIGH_TEMP_2 => emit_int(b, mode, input.name, "alarmHighTemp2", t()),
        sensor_event::ALARM_HIGH_TEMP_CLEAR => emit_int(b, mode, input.name, "alarmHighTempClear", t()),
        sensor_event::ALARM_LOW_TEMP_1 => emit_int(b, mode, input.name, "alarmLowTemp1", t()),
        sensor_event::ALARM_LOW_TEMP_2 => emit_int(b, mode, input.name, "alarmLowTemp2", t()),
        sensor_event::ALARM_LOW_TEMP_CLEAR => emit_int(b, mode, input.name, "alarmLowTempClear", t()),
        sensor_event::ALARM_DELTA_TEMP => emit_int(b, mode, input.name, "alarmDeltaTemp", t()),
        sensor_event::BATTERY_GOOD => emit_uint(b, mode, input.name, "batteryGood", battery()),
        sensor_event::BATTERY_BAD => emit_uint(b, mode, input.name, "batteryBad", battery()),
        sensor_event::ADV_ON_BUTTON => emit_uint(b, mode, input.name, "advertiseOnButton", battery()),
        _ => {}
    }
}

/// Emit the ten flag fields, only when `flags` has changed since the last
/// call. Returns the flags value the caller should cache as `last_flags`.
fn flag_handler<const N: usize, const LOG_N: usize>(b: &mut ShadowBuilder<N>, input: &MakerInput<LOG_N>, mode: ShadowMode) -> u16 {
    let current = input.ad.flags;
    if current != input.last_flags {
        for (key, field) in FIELD_ORDER {
            emit_uint(b, mode, input.name, key, flags::get(current, *field) as u64);
        }
    }
    current
}

fn rsp_handler<const N: usize, const LOG_N: usize>(b: &mut ShadowBuilder<N>, input: &MakerInput<LOG_N>, mode: ShadowMode) {
    if !input.valid_rsp {
        return;
    }
    if input.updated_rsp {
        emit_uint(b, mode, input.name, "productId", input.rsp.product_id as u64);
        emit_version(b, mode, input.name, "firmwareVersion", (input.rsp.fw_major, input.rsp.fw_minor, input.rsp.fw_patch));
        emit_version(b, mode, input.name, "bootloaderVersion", (input.rsp.bl_major, input.rsp.bl_minor, input.rsp.bl_patch));
        emit_uint(b, mode, input.name, "configVersion", input.rsp.config_version as u64);
        let (_, hw_minor) = crate::ad::hw_version_parts(input.rsp.hw_version);
        emit_uint(b, mode, input.name, "hardwareMinorVersion", hw_minor as u64);
    }
    if input.updated_name {
        emit_str(b, mode, input.name, "sensorName", input.name);
    }
}

fn special_handler<const N: usize, const LOG_N: usize>(b: &mut ShadowBuilder<N>, input: &MakerInput<LOG_N>, mode: ShadowMode) {
    emit_str(b, mode, input.name, "gatewayId", input.gateway_id);
    emit_uint(b, mode, input.name, "eventLogSize", input.log.size() as u64);
}

/// Build the `state.reported` fragment for one sensor into `b`. `b` must
/// already be positioned inside the `reported` group (the caller opens
/// `state`/`reported` so it can add its own top-level fields, e.g. the
/// gateway's own `eventLogSize` totals, around several sensors in one
/// document).
///
/// In [`ShadowMode::SingleTopic`] every key below is mangled as
/// `"<name>-<key>"` instead of nested under a per-sensor group, but the
/// field set emitted is otherwise identical to classic mode.
///
/// Returns the `flags` value the caller should store as the entry's new
/// `last_flags`; the caller only updates it if the handler actually ran
/// (i.e. `flags` had changed) — see the `flag_handler` doc.
pub fn build<const N: usize, const LOG_N: usize>(
    b: &mut ShadowBuilder<N>,
    input: &MakerInput<LOG_N>,
    mode: ShadowMode,
) -> u16 {
    bt_handler(b, input, mode);
    if !input.valid_ad {
        rsp_handler(b, input, mode);
        special_handler(b, input, mode);
        return input.last_flags;
    }
    emit_uint(b, mode, input.name, "networkId", input.ad.network_id as u64);
    emit_uint(b, mode, input.name, "flags", input.ad.flags as u64);
    emit_uint(b, mode, input.name, "resetCount", input.ad.reset_count as u64);
    temperature_handler(b, input, mode);
    event_handler(b, input, mode);
    let new_flags = flag_handler(b, input, mode);
    ig60_event_handler(b, input, mode);
    rsp_handler(b, input, mode);
    let mut log_key_scratch: heapless::String<KEY_SCRATCH> = heapless::String::new();
    input.log.generate_json(b, mangled(mode, input.name, "eventLog", &mut log_key_scratch));
    special_handler(b, input, mode);
    new_flags
}
