//! Gateway collection shadow: maker and parser (spec §4.4).
//!
//! Distinct from the per-sensor shadow in [`super::maker`] — this is the
//! single document describing every in-use table entry, published under
//! the gateway's own `deviceId-<gateway_id>` topic.

use super::builder::ShadowBuilder;
use super::parser::{ParentMode, ShadowParser, TokenType};
use crate::ad::AddrString;
use heapless::Vec;

/// One row the maker needs per in-use entry.
pub struct GatewayEntry<'a> {
    pub addr_string: &'a AddrString,
    pub rx_epoch: u32,
    pub greenlisted: bool,
}

/// Build `state.[desired:null,]reported.bt510.sensors[...]` into `b`.
///
/// `desired_ack` is set when the maker is triggered by a greenlist update
/// originating from the cloud; it emits `state.desired: null` to
/// acknowledge that the request was processed.
pub fn build<'a, const N: usize>(
    b: &mut ShadowBuilder<N>,
    entries: impl Iterator<Item = GatewayEntry<'a>>,
    desired_ack: bool,
) {
    b.begin_group("state");
    if desired_ack {
        b.add_null("desired");
    }
    b.begin_group("reported");
    b.begin_group("bt510");
    b.begin_array("sensors");
    for e in entries {
        b.sensor_table_array_entry(e.addr_string.as_str(), e.rx_epoch, e.greenlisted);
    }
    b.end_array();
    b.end_group();
    b.end_group();
    b.end_group();
}

/// One greenlist row decoded from the cloud's desired/reported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreenlistRow {
    pub addr: crate::ad::Addr,
    pub epoch: u32,
    pub greenlisted: bool,
}

/// Descend `state -> [reported ->] bt510 -> sensors` and decode each
/// `["addr",epoch,greenlisted]` triple. Accepts either a `reported` or
/// bare `state` document since the cloud may echo either shape back.
pub fn parse_greenlist<const N: usize>(json: &str, out: &mut Vec<GreenlistRow, N>) -> usize {
    let mut p: ShadowParser<256> = ShadowParser::parse(json);
    let Some(_state) = p.find_type("state", TokenType::Object, ParentMode::Any) else {
        return 0;
    };
    let reported =
        p.find_type("reported", TokenType::Object, ParentMode::NextParent).or(Some(_state));
    let Some(reported) = reported else {
        return 0;
    };
    let _ = reported;
    let Some(bt510) = p.find_type("bt510", TokenType::Object, ParentMode::NextParent) else {
        return 0;
    };
    let _ = bt510;
    let Some(sensors) = p.find_type("sensors", TokenType::Array, ParentMode::NextParent) else {
        return 0;
    };

    let mut added = 0;
    let count = p.size(sensors);
    for n in 0..count {
        let Some(elem) = p.array_element(sensors, n) else {
            break;
        };
        if p.token_type(elem) != TokenType::Array || p.size(elem) != 3 {
            continue;
        }
        let (Some(addr_tok), Some(epoch_tok), Some(flag_tok)) =
            (p.array_element(elem, 0), p.array_element(elem, 1), p.array_element(elem, 2))
        else {
            continue;
        };
        let Some(addr) = crate::ad::parse_address(p.string(addr_tok)) else {
            continue;
        };
        let Some(epoch) = p.convert_uint(epoch_tok) else {
            continue;
        };
        let greenlisted = p.string(flag_tok) == "true";
        if out.push(GreenlistRow { addr, epoch: epoch as u32, greenlisted }).is_err() {
            break;
        }
        added += 1;
    }
    added
}
