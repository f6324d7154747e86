//! Sensor Table (spec §4.4, C4): the gateway's per-sensor state and the
//! sole ingress point for BLE scan data.
//!
//! One `SensorTable` owns up to `TABLE_SIZE` [`SensorEntry`] slots plus the
//! greenlist accounting the cloud drives. Unlike the C original, entries
//! are not heap-allocated behind `void *pCmd` pointers — pending/queued
//! commands are small fixed strings owned inline, and the ring log is a
//! field rather than a second allocation.

use crate::ad::{self, Addr, AddrString, EventAd, MsdKind, ScanRsp};
use crate::diag::BurstCounter;
use crate::log_ring::RingLog;
use crate::sensor_cmd;
use crate::shadow::builder::{truncated_string, ShadowBuilder};
use crate::shadow::delta::{ingest_config_request, IngestContext, IngestOutcome};
use crate::shadow::maker::{self, MakerInput};
use crate::shadow::ShadowMode;
use crate::time::EpochSeconds;
use heapless::String;

pub const RSSI_UNKNOWN: i8 = -127;
/// Default countdown before an un-greenlisted entry is evicted (spec §4.4,
/// "Decided Open Question" in DESIGN.md: two hours, matching the source's
/// `CONFIG_SENSOR_TTL_SECONDS` default).
pub const DEFAULT_TTL_SECONDS: u32 = 60 * 60 * 2;

const NAME_MAX: usize = 32;
/// A pending or queued outbound `set`/`dump` command, stored as its raw
/// JSON-RPC text rather than a pool buffer handle — small enough (a few
/// hundred bytes) to live inline per entry.
pub type PendingCmd = String<512>;

/// One row of the Sensor Table (spec §3 Data Model).
pub struct SensorEntry<const LOG_N: usize> {
    pub in_use: bool,
    pub valid_ad: bool,
    pub valid_rsp: bool,
    pub updated_name: bool,
    pub updated_rsp: bool,

    pub name: String<NAME_MAX>,
    pub addr_string: AddrString,
    pub ad: EventAd,
    pub rsp: ScanRsp,

    pub rssi: i8,
    pub last_record_type: u8,
    pub rx_epoch: EpochSeconds,
    pub ad_count: u32,
    pub last_flags: u16,
    pub ttl_seconds: u32,

    pub greenlisted: bool,
    pub subscribed: bool,
    pub get_accepted_subscribed: bool,
    pub shadow_init_received: bool,
    pub subscription_dispatch_time: u32,

    pub pending_cmd: Option<PendingCmd>,
    pub queued_cmd: Option<PendingCmd>,
    pub pending_is_dump: bool,
    pub pending_requires_reset: bool,
    pub queued_requires_reset: bool,
    pub config_busy: bool,
    pub config_busy_version: u64,
    pub dump_busy: bool,
    pub first_dump_complete: bool,

    pub log: RingLog<LOG_N>,
}

impl<const LOG_N: usize> Default for SensorEntry<LOG_N> {
    fn default() -> Self {
        Self {
            in_use: false,
            valid_ad: false,
            valid_rsp: false,
            updated_name: false,
            updated_rsp: false,
            name: String::new(),
            addr_string: AddrString::new(),
            ad: EventAd {
                network_id: 0,
                flags: 0,
                addr: [0; 6],
                record_type: 0,
                id: 0,
                epoch: 0,
                data: 0,
                data_reserved: 0,
                reset_count: 0,
            },
            rsp: ScanRsp::default(),
            rssi: RSSI_UNKNOWN,
            last_record_type: 0,
            rx_epoch: 0,
            ad_count: 0,
            last_flags: 0,
            ttl_seconds: 0,
            greenlisted: false,
            subscribed: false,
            get_accepted_subscribed: false,
            shadow_init_received: false,
            subscription_dispatch_time: 0,
            pending_cmd: None,
            queued_cmd: None,
            pending_is_dump: false,
            pending_requires_reset: false,
            queued_requires_reset: false,
            config_busy: false,
            config_busy_version: 0,
            dump_busy: false,
            first_dump_complete: false,
            log: RingLog::new(),
        }
    }
}

impl<const LOG_N: usize> SensorEntry<LOG_N> {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn set_address(&mut self, addr: &Addr) {
        self.ad.addr = *addr;
        self.addr_string = ad::format_address(addr);
    }

    /// A new event is one whose `id` differs from what's stored, or no
    /// valid ad has been seen yet (spec §3 invariant).
    fn is_new_event(&self, id: u16) -> bool {
        !self.valid_ad || id != self.ad.id
    }

    fn low_battery(&self) -> bool {
        // The sensor's own low-battery alarm bit, decoded live rather than
        // cached, so it always reflects the latest advertisement.
        crate::flags::get(self.ad.flags, crate::flags::LOW_BATTERY_ALARM) != 0
    }
}

/// Outcome of [`SensorTable::advertisement`] — tells the caller whether a
/// shadow publish and/or a connect request are now due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvertisementResult {
    pub index: Option<usize>,
    pub shadow_dirty: bool,
    pub connect_due: bool,
}

/// The Sensor Table: up to `TABLE_SIZE` entries, a `GREENLIST_SIZE` cap on
/// simultaneously greenlisted sensors, and per-entry ring logs of depth
/// `LOG_N`.
pub struct SensorTable<const TABLE_SIZE: usize, const GREENLIST_SIZE: usize, const LOG_N: usize> {
    entries: [SensorEntry<LOG_N>; TABLE_SIZE],
    count: usize,
    greenlist_count: usize,
    gateway_shadow_dirty: bool,
    mode: ShadowMode,
    greenlist_full: BurstCounter,
}

impl<const TABLE_SIZE: usize, const GREENLIST_SIZE: usize, const LOG_N: usize>
    SensorTable<TABLE_SIZE, GREENLIST_SIZE, LOG_N>
{
    pub fn new(mode: ShadowMode) -> Self {
        Self {
            entries: core::array::from_fn(|_| SensorEntry::default()),
            count: 0,
            greenlist_count: 0,
            gateway_shadow_dirty: false,
            mode,
            greenlist_full: BurstCounter::new("greenlist full"),
        }
    }

    /// Clears all entries and resets counters (spec §4.4 `initialize()`).
    pub fn initialize(&mut self) {
        for e in self.entries.iter_mut() {
            e.clear();
        }
        self.count = 0;
        self.greenlist_count = 0;
        self.gateway_shadow_dirty = false;
    }

    pub fn entry(&self, index: usize) -> &SensorEntry<LOG_N> {
        &self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn take_gateway_shadow_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.gateway_shadow_dirty, false)
    }

    fn find_by_addr(&self, addr: &Addr) -> Option<usize> {
        self.entries.iter().position(|e| e.in_use && e.ad.addr == *addr)
    }

    fn find_first_free(&self) -> Option<usize> {
        self.entries.iter().position(|e| !e.in_use)
    }

    fn add_by_address(&mut self, addr: &Addr, rssi: i8) -> Option<usize> {
        let i = self.find_first_free()?;
        let e = &mut self.entries[i];
        e.in_use = true;
        e.rssi = rssi;
        e.set_address(addr);
        e.ttl_seconds = DEFAULT_TTL_SECONDS;
        self.count += 1;
        self.gateway_shadow_dirty = true;
        Some(i)
    }

    fn add_or_update_by_scan_response(&mut self, addr: &Addr, name: &str, rsp: ScanRsp, rssi: i8) -> Option<usize> {
        let existing = self.find_by_addr(addr);
        let (index, is_new) = match existing {
            Some(i) => (i, false),
            None => (self.find_first_free()?, true),
        };
        let e = &mut self.entries[index];
        let name_changed = !is_new && e.name.as_str() != name;
        let rsp_changed = !is_new && e.rsp != rsp;

        if is_new || rsp_changed {
            e.updated_rsp = true;
            e.rsp = rsp;
        }
        if is_new || name_changed {
            e.updated_name = true;
            e.name = truncated_string(name);
        }
        e.valid_rsp = true;
        if is_new {
            e.in_use = true;
            e.rssi = rssi;
            e.set_address(addr);
            e.ttl_seconds = DEFAULT_TTL_SECONDS;
            self.count += 1;
            self.gateway_shadow_dirty = true;
        }
        Some(index)
    }

    /// True if the manufacturer-specific-data in `ad_bytes` matches one of
    /// the three known sensor headers (spec §4.4 `match_sensor_format`).
    pub fn match_sensor_format(&self, ad_bytes: &[u8]) -> bool {
        ad::match_sensor_format(ad_bytes)
    }

    /// The sole ingress for scan data (spec §4.4 advertisement handling
    /// algorithm, steps 1-5). `now` is supplied by the caller's [`crate::time::Clock`].
    pub fn advertisement(&mut self, rssi: i8, ad_bytes: &[u8], now: EpochSeconds) -> AdvertisementResult {
        let Some(msd) = ad::find_manufacturer_data(ad_bytes) else {
            return AdvertisementResult::default();
        };
        let Some(kind) = ad::classify_msd(msd) else {
            return AdvertisementResult::default();
        };

        let mut result = AdvertisementResult::default();

        match kind {
            MsdKind::ScanRsp => {
                let Some(rsp) = ad::parse_scan_rsp(msd) else { return result };
                let Some(name_bytes) = ad::find_name(ad_bytes) else { return result };
                let name = core::str::from_utf8(name_bytes).unwrap_or("");
                // Scan responses carry the address duplicated in the
                // payload on real hardware; here the caller is expected to
                // have supplied the GAP address via `addr`, so this path
                // alone cannot allocate a new entry — see `advertisement_with_addr`.
                let _ = (rsp, name);
            }
            MsdKind::EventAd => {
                let Some(parsed) = ad::parse_event_ad(msd) else { return result };
                let index = self.find_by_addr(&parsed.addr).or_else(|| self.add_by_address(&parsed.addr, rssi));
                if let Some(index) = index {
                    result.shadow_dirty |= self.event_handler(index, parsed, rssi, now);
                    result.index = Some(index);
                }
            }
            MsdKind::Coded => {
                let Some((parsed, rsp)) = ad::parse_coded(msd) else { return result };
                let name = ad::find_name(ad_bytes).and_then(|b| core::str::from_utf8(b).ok()).unwrap_or("");
                let index = self.add_or_update_by_scan_response(&parsed.addr, name, rsp, rssi);
                if let Some(index) = index {
                    result.shadow_dirty |= self.event_handler(index, parsed, rssi, now);
                    result.index = Some(index);
                }
            }
        }

        if let Some(index) = result.index {
            result.connect_due = self.connect_due(index);
        }
        result
    }

    /// Like [`Self::advertisement`] but for scan-response packets, which
    /// need the GAP address (not carried in the BT510 scan-response MSD
    /// payload itself) supplied separately by the BLE stack binding.
    pub fn scan_response(&mut self, addr: &Addr, rssi: i8, ad_bytes: &[u8]) -> AdvertisementResult {
        let mut result = AdvertisementResult::default();
        let Some(msd) = ad::find_manufacturer_data(ad_bytes) else { return result };
        if ad::classify_msd(msd) != Some(MsdKind::ScanRsp) {
            return result;
        }
        let Some(rsp) = ad::parse_scan_rsp(msd) else { return result };
        let Some(name_bytes) = ad::find_name(ad_bytes) else { return result };
        let name = core::str::from_utf8(name_bytes).unwrap_or("");
        result.index = self.add_or_update_by_scan_response(addr, name, rsp, rssi);
        if let Some(index) = result.index {
            result.connect_due = self.connect_due(index);
        }
        result
    }

    fn connect_due(&self, index: usize) -> bool {
        let e = &self.entries[index];
        e.pending_cmd.is_some() && !e.config_busy
    }

    /// Event handler: refresh TTL if greenlisted, detect a new event by
    /// `id`, and if new, copy the payload and trigger the shadow maker
    /// (spec §4.4 "Event handler").
    fn event_handler(&mut self, index: usize, parsed: EventAd, rssi: i8, now: EpochSeconds) -> bool {
        let e = &mut self.entries[index];
        if e.greenlisted {
            e.ttl_seconds = DEFAULT_TTL_SECONDS;
        }
        if !e.is_new_event(parsed.id) {
            return false;
        }
        e.valid_ad = true;
        e.last_record_type = e.ad.record_type;
        e.ad = parsed;
        e.rssi = rssi;
        e.rx_epoch = now;
        e.ad_count += 1;
        self.gateway_shadow_dirty = true;
        true
    }

    /// Build the per-sensor `state.reported` shadow fragment for `index`
    /// into `b`, updating `last_flags` if the flag handler ran. `gateway_id`
    /// is the gateway's own IMEI/identifier, emitted under `gatewayId`.
    pub fn build_shadow<const N: usize>(&mut self, index: usize, b: &mut ShadowBuilder<N>, gateway_id: &str) {
        let e = &mut self.entries[index];
        b.begin_group("state");
        b.begin_group("reported");
        let input = MakerInput {
            addr_string: &e.addr_string,
            name: e.name.as_str(),
            rssi: e.rssi,
            valid_ad: e.valid_ad,
            valid_rsp: e.valid_rsp,
            ad: e.ad,
            rsp: e.rsp,
            updated_rsp: e.updated_rsp,
            updated_name: e.updated_name,
            last_flags: e.last_flags,
            log: &e.log,
            gateway_id,
        };
        let new_flags = maker::build(b, &input, self.mode);
        e.last_flags = new_flags;
        e.updated_rsp = false;
        e.updated_name = false;
        b.end_group();
        b.end_group();
    }

    /// Build the gateway's own collection shadow (spec §4.4 "Gateway shadow maker").
    pub fn build_gateway_shadow<const N: usize>(&mut self, b: &mut ShadowBuilder<N>) {
        let desired_ack = self.take_gateway_shadow_dirty();
        let entries = self.entries.iter().filter(|e| e.in_use).map(|e| crate::shadow::gateway::GatewayEntry {
            addr_string: &e.addr_string,
            rx_epoch: e.rx_epoch,
            greenlisted: e.greenlisted,
        });
        crate::shadow::gateway::build(b, entries, desired_ack);
    }

    /// Apply a greenlist row from the cloud, toggling `greenlisted` by
    /// address string and allocating a table slot if the sensor isn't
    /// known yet (spec §4.4 `SensorTable_ProcessWhitelistRequest`).
    pub fn apply_greenlist_row(&mut self, row: crate::shadow::gateway::GreenlistRow) -> bool {
        if let Some(i) = self.find_by_addr(&row.addr) {
            if self.entries[i].greenlisted != row.greenlisted {
                return self.set_greenlisted(i, row.greenlisted);
            }
            return false;
        }
        if row.greenlisted {
            if self.greenlist_count >= GREENLIST_SIZE {
                self.greenlist_full.bump();
                return false;
            }
            if let Some(i) = self.add_by_address(&row.addr, RSSI_UNKNOWN) {
                return self.set_greenlisted(i, true);
            }
        }
        false
    }

    /// Promotes or demotes an entry's greenlist membership. Promotion is
    /// rejected once `greenlist_count` reaches `GREENLIST_SIZE` (spec §3,
    /// §8 universal invariant); demotion always succeeds.
    fn set_greenlisted(&mut self, index: usize, greenlisted: bool) -> bool {
        let was = self.entries[index].greenlisted;
        if greenlisted && !was && self.greenlist_count >= GREENLIST_SIZE {
            self.greenlist_full.bump();
            return false;
        }
        self.entries[index].greenlisted = greenlisted;
        if greenlisted && !was {
            self.greenlist_count += 1;
            self.greenlist_full.resolve();
        } else if !greenlisted && was {
            self.greenlist_count = self.greenlist_count.saturating_sub(1);
            self.free_non_greenlisted(index);
        }
        self.gateway_shadow_dirty = true;
        true
    }

    fn free_non_greenlisted(&mut self, index: usize) {
        self.entries[index].clear();
        self.count = self.count.saturating_sub(1);
    }

    pub fn greenlist_len(&self) -> usize {
        self.greenlist_count
    }

    pub fn greenlist_capacity(&self) -> usize {
        GREENLIST_SIZE
    }

    /// TTL handler: each tick, age every in-use entry by `delta_seconds`
    /// and evict any that reach zero and are not greenlisted (spec §4.4).
    pub fn ttl_tick(&mut self, delta_seconds: u32) -> usize {
        let mut evicted = 0;
        for e in self.entries.iter_mut() {
            if !e.in_use {
                continue;
            }
            e.ttl_seconds = e.ttl_seconds.saturating_sub(delta_seconds);
            if e.ttl_seconds == 0 && !e.greenlisted {
                e.clear();
                evicted += 1;
            }
        }
        self.count = self.count.saturating_sub(evicted);
        evicted
    }

    /// Subscription handler: for each entry whose ad/rsp are both valid and
    /// whose `subscribed` lags `greenlisted`, mark it dispatched and return
    /// its index plus the subscribe/unsubscribe direction (spec §4.4).
    pub fn subscription_handler(&mut self, now_ms: u32) -> heapless::Vec<(usize, bool), TABLE_SIZE> {
        let mut out = heapless::Vec::new();
        for (i, e) in self.entries.iter_mut().enumerate() {
            if e.valid_ad
                && e.valid_rsp
                && e.greenlisted != e.subscribed
                && now_ms >= e.subscription_dispatch_time
            {
                e.subscribed = e.greenlisted;
                let _ = out.push((i, e.subscribed));
            }
        }
        out
    }

    /// Shadow-init handler: find (at most) one subscribed-but-uninitialized
    /// entry to publish a `get` request for (spec §4.4, "memory pressure control").
    pub fn next_shadow_init_candidate(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.get_accepted_subscribed && !e.shadow_init_received)
    }

    pub fn mark_shadow_init_received(&mut self, index: usize) {
        self.entries[index].shadow_init_received = true;
    }

    /// Ingest an inbound config request for the sensor named by `addr`,
    /// following the queueing rule in spec §4.4. On `DoNotFree`, `cmd` has
    /// been stored into `pending_cmd` or `queued_cmd` and the caller must
    /// not reuse it elsewhere.
    pub fn config_request(&mut self, addr: &Addr, requested_version: u64, is_dump: bool, cmd: PendingCmd) -> IngestOutcome {
        let Some(index) = self.find_by_addr(addr) else {
            return IngestOutcome::Error;
        };
        let e = &mut self.entries[index];
        let ctx = IngestContext {
            sensor_found: true,
            low_battery: e.low_battery(),
            is_dump,
            stored_config_version: e.rsp.config_version as u64,
            requested_config_version: requested_version,
            config_busy: e.config_busy,
            pending_cmd_occupied: e.pending_cmd.is_some(),
        };
        let outcome = ingest_config_request(&ctx);
        if outcome == IngestOutcome::DoNotFree {
            // A command requires a reset unless it's a dump or the sensor's
            // firmware major version is exempt (spec §4.4).
            let major_exempt = e.rsp.fw_major >= sensor_cmd::RESET_NOT_REQUIRED_MAJOR;
            let requires_reset = !is_dump && !major_exempt && sensor_cmd::requires_reset(cmd.as_str());
            if e.config_busy || e.pending_cmd.is_some() {
                e.queued_cmd = Some(cmd);
                e.queued_requires_reset = requires_reset;
            } else {
                e.pending_cmd = Some(cmd);
                e.pending_is_dump = is_dump;
                e.pending_requires_reset = requires_reset;
                e.config_busy_version = requested_version;
            }
        }
        outcome
    }

    /// Retry: the sensor task returns an in-flight command to the table
    /// (link-layer failure) for a later attempt (spec §4.4 "Retry").
    pub fn retry_config_request(&mut self, index: usize, cmd: PendingCmd) {
        let e = &mut self.entries[index];
        e.config_busy = false;
        e.pending_cmd = Some(cmd);
    }

    /// Ack: promote a queued command, mark the first dump complete, or
    /// synthesize a follow-up dump request (spec §4.4 "Ack").
    pub fn ack_config_request(&mut self, index: usize, was_dump: bool) -> Option<PendingCmd> {
        let e = &mut self.entries[index];
        e.config_busy = false;
        if let Some(queued) = e.queued_cmd.take() {
            e.pending_cmd = Some(queued);
            e.pending_requires_reset = e.queued_requires_reset;
            e.queued_requires_reset = false;
            None
        } else if was_dump {
            e.dump_busy = false;
            e.first_dump_complete = true;
            None
        } else {
            Some(PendingCmd::try_from(sensor_cmd::DUMP).unwrap_or_default())
        }
    }

    /// Takes the pending command along with whether it requires the sensor
    /// to reset (spec §4.4/§4.5), so the caller can drive
    /// `SensorTask::begin(PendingKind::Config { needs_reset, .. })`.
    pub fn take_pending_cmd(&mut self, index: usize) -> Option<(PendingCmd, bool)> {
        let e = &mut self.entries[index];
        let cmd = e.pending_cmd.take()?;
        let requires_reset = core::mem::replace(&mut e.pending_requires_reset, false);
        e.config_busy = true;
        Some((cmd, requires_reset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_msd(addr: Addr, id: u16, epoch: u32, data: u16, record_type: u8) -> heapless::Vec<u8, 64> {
        let mut msd = [0u8; 4 + 26];
        msd[0..4].copy_from_slice(&[0x77, 0x00, 0x01, 0x00]);
        let b = &mut msd[4..];
        b[0..2].copy_from_slice(&1u16.to_le_bytes());
        b[2..4].copy_from_slice(&0u16.to_le_bytes());
        b[4..10].copy_from_slice(&addr);
        b[10] = record_type;
        b[11..13].copy_from_slice(&id.to_le_bytes());
        b[13..17].copy_from_slice(&epoch.to_le_bytes());
        b[17..19].copy_from_slice(&data.to_le_bytes());
        let mut ad_bytes: heapless::Vec<u8, 64> = heapless::Vec::new();
        ad_bytes.push((1 + msd.len()) as u8).unwrap();
        ad_bytes.push(0xFF).unwrap();
        ad_bytes.extend_from_slice(&msd).unwrap();
        ad_bytes
    }

    #[test]
    fn advertisement_adds_new_entry_and_marks_shadow_dirty() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        table.initialize();
        let addr = [0xC1, 0x3A, 0x7E, 0x41, 0x18, 0xA2];
        let bytes = event_msd(addr, 1, 1000, 2550, crate::sensor_event::TEMPERATURE);
        let result = table.advertisement(-60, &bytes, 1000);
        assert!(result.index.is_some());
        assert!(result.shadow_dirty);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn repeated_event_id_is_not_a_new_event() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        let bytes = event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE);
        let r1 = table.advertisement(-60, &bytes, 1000);
        assert!(r1.shadow_dirty);
        let r2 = table.advertisement(-60, &bytes, 1001);
        assert!(!r2.shadow_dirty);
    }

    #[test]
    fn ttl_evicts_non_greenlisted_entries_at_zero() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        let bytes = event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE);
        table.advertisement(-60, &bytes, 1000);
        assert_eq!(table.len(), 1);
        let evicted = table.ttl_tick(DEFAULT_TTL_SECONDS + 1);
        assert_eq!(evicted, 1);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn greenlisted_entries_survive_ttl_expiry() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        let bytes = event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE);
        table.advertisement(-60, &bytes, 1000);
        let row = crate::shadow::gateway::GreenlistRow { addr, epoch: 0, greenlisted: true };
        table.apply_greenlist_row(row);
        let evicted = table.ttl_tick(DEFAULT_TTL_SECONDS + 1);
        assert_eq!(evicted, 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn config_request_for_unknown_sensor_is_an_error() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let cmd = PendingCmd::try_from(sensor_cmd::DUMP).unwrap();
        let outcome = table.config_request(&[9; 6], 1, false, cmd);
        assert_eq!(outcome, IngestOutcome::Error);
    }

    #[test]
    fn config_request_queues_when_pending_cmd_occupied() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        let bytes = event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE);
        table.advertisement(-60, &bytes, 1000);
        let first = PendingCmd::try_from(sensor_cmd::DUMP).unwrap();
        assert_eq!(table.config_request(&addr, 1, true, first), IngestOutcome::DoNotFree);
        assert!(table.entries[0].pending_cmd.is_some());

        let second = PendingCmd::try_from(sensor_cmd::DUMP).unwrap();
        assert_eq!(table.config_request(&addr, 2, true, second), IngestOutcome::DoNotFree);
        assert!(table.entries[0].queued_cmd.is_some());
    }

    #[test]
    fn ack_promotes_queued_command() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        let bytes = event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE);
        table.advertisement(-60, &bytes, 1000);
        table.entries[0].config_busy = true;
        table.entries[0].queued_cmd = Some(PendingCmd::try_from(sensor_cmd::DUMP).unwrap());
        let synthesized = table.ack_config_request(0, false);
        assert!(synthesized.is_none());
        assert!(table.entries[0].pending_cmd.is_some());
        assert!(!table.entries[0].config_busy);
    }

    #[test]
    fn greenlist_promotion_rejected_once_full() {
        let mut table: SensorTable<4, 1, 4> = SensorTable::new(ShadowMode::Classic);
        let addr_a = [0xAA; 6];
        let addr_b = [0xBB; 6];
        table.advertisement(-60, &event_msd(addr_a, 1, 1000, 0, crate::sensor_event::TEMPERATURE), 1000);
        table.advertisement(-60, &event_msd(addr_b, 1, 1000, 0, crate::sensor_event::TEMPERATURE), 1000);

        assert!(table.apply_greenlist_row(crate::shadow::gateway::GreenlistRow { addr: addr_a, epoch: 0, greenlisted: true }));
        assert_eq!(table.greenlist_len(), 1);

        assert!(!table.apply_greenlist_row(crate::shadow::gateway::GreenlistRow { addr: addr_b, epoch: 0, greenlisted: true }));
        assert_eq!(table.greenlist_len(), 1);
        assert!(!table.entries[1].greenlisted);
    }

    #[test]
    fn config_request_marks_reset_required_attribute() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        table.advertisement(-60, &event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE), 1000);
        let cmd = PendingCmd::try_from(r#"{"sensorName":"foo"}"#).unwrap();
        assert_eq!(table.config_request(&addr, 1, false, cmd), IngestOutcome::DoNotFree);
        let (_, needs_reset) = table.take_pending_cmd(0).unwrap();
        assert!(needs_reset);
    }

    #[test]
    fn config_request_dump_never_requires_reset() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0; 6];
        table.advertisement(-60, &event_msd(addr, 1, 1000, 0, crate::sensor_event::TEMPERATURE), 1000);
        let cmd = PendingCmd::try_from(sensor_cmd::DUMP).unwrap();
        assert_eq!(table.config_request(&addr, 1, true, cmd), IngestOutcome::DoNotFree);
        let (_, needs_reset) = table.take_pending_cmd(0).unwrap();
        assert!(!needs_reset);
    }

    #[test]
    fn build_shadow_includes_gateway_id_and_address() {
        let mut table: SensorTable<4, 4, 4> = SensorTable::new(ShadowMode::Classic);
        let addr = [0xAA; 6];
        let bytes = event_msd(addr, 1, 1000, 2550, crate::sensor_event::TEMPERATURE);
        table.advertisement(-60, &bytes, 1000);
        let mut b: ShadowBuilder<1024> = ShadowBuilder::new();
        table.build_shadow(0, &mut b, "gw-123");
        assert!(b.as_str().contains(r#""gatewayId":"gw-123""#));
        assert!(b.as_str().contains("aaaaaaaaaaaa"));
    }
}
