//! The singleton store: ordered call list, active-call list, Call-ID
//! index, options, rotation, change flag, ingestion entry points.
//!
//! Grounded on `rvoip-call-engine`'s `orchestrator/core.rs`
//! (`CallCenterState` holding `DashMap<SessionId, CallInfo>` plus
//! supporting collections) for the overall "one struct owns every
//! collection" shape, and on `rvoip-dialog-core`'s `manager/dialog_operations.rs`
//! `DialogStore`/`DialogLookup` traits for the CRUD surface — adapted here
//! to a single-threaded cooperative model: no `async`, no `DashMap` on the
//! hot path (a plain `HashMap` behind `&mut self` is both simpler and
//! correct for a store with no internal suspension points).

mod stats;
mod streams;

pub use stats::Stats;

use std::collections::HashMap;
use std::sync::Once;

use slotmap::SlotMap;
use tracing::warn;

use crate::attribute::CallAttribute;
use crate::call::{Call, CallId};
use crate::config::{CaptureOptions, MatchOptions, SortOptions};
use crate::error::{ConfigResult, IngestDrop, IngestResult};
use crate::filter::MatchFilter;
use crate::message::Message;
use crate::packet::{Endpoint, SipPacket};
use crate::stream::StreamId;

/// One counter per [`IngestDrop`] reason, for the admission-drop and
/// correlation-miss tallies.
#[derive(Debug, Clone, Default)]
pub struct DropCounters {
    pub no_match: u64,
    pub not_invite: u64,
    pub not_complete: u64,
    pub all_calls_locked: u64,
    pub capture_full: u64,
    pub no_stream: u64,
    pub stream_cap_reached: u64,
    pub rtp_disabled: u64,
    pub missing_field: u64,
}

impl DropCounters {
    fn record(&mut self, reason: &IngestDrop) {
        match reason {
            IngestDrop::NoMatch => self.no_match += 1,
            IngestDrop::NotInvite => self.not_invite += 1,
            IngestDrop::NotComplete => self.not_complete += 1,
            IngestDrop::AllCallsLocked => self.all_calls_locked += 1,
            IngestDrop::CaptureFull => self.capture_full += 1,
            IngestDrop::NoStream { .. } => self.no_stream += 1,
            IngestDrop::StreamCapReached { .. } => self.stream_cap_reached += 1,
            IngestDrop::RtpDisabled => self.rtp_disabled += 1,
            IngestDrop::MissingField { .. } => self.missing_field += 1,
        }
    }
}

/// One-shot diagnostic for a dissector inconsistency: the first
/// occurrence of a missing `field` is logged, subsequent ones are only
/// counted in [`DropCounters`].
fn warn_missing_field_once(field: &'static str) {
    static CALLID_ONCE: Once = Once::new();
    match field {
        "callid" => CALLID_ONCE.call_once(|| warn!(field, "dissector omitted a required field; packet dropped")),
        _ => warn!(field, "dissector omitted a required field; packet dropped"),
    }
}

/// The call-and-stream correlation store.
///
/// Single-threaded cooperative by design: every public method takes
/// `&mut self` (or `&self` for read-only queries) and returns before
/// the next call begins. For multi-threaded embedding, wrap the whole
/// value in one `parking_lot::RwLock` — readers must not hold a guard
/// across an `await` or otherwise retain call/stream references across a
/// lock drop, since rotation can destroy them.
pub struct Storage {
    calls: SlotMap<CallId, Call>,
    /// `L`: ordered by the current sort comparator.
    order: Vec<CallId>,
    /// `A` ⊆ `L`: currently-active calls, insertion order.
    active: Vec<CallId>,
    /// `H`: Call-ID -> CallId.
    index: HashMap<String, CallId>,
    /// Secondary index for `stream_find_by_format`: destination endpoint
    /// -> candidate `(CallId, StreamId)` refs.
    by_dst: HashMap<Endpoint, Vec<(CallId, StreamId)>>,
    last_index: u64,
    changed: bool,
    capture: CaptureOptions,
    match_opts: MatchOptions,
    match_filter: MatchFilter,
    sort: SortOptions,
    drops: DropCounters,
}

impl Storage {
    /// Compiles the match expression; a bad expression is fatal to
    /// initialization.
    pub fn new(capture: CaptureOptions, match_opts: MatchOptions, sort: SortOptions) -> ConfigResult<Self> {
        let match_filter = match_opts.compile()?;
        Ok(Self {
            calls: SlotMap::with_key(),
            order: Vec::new(),
            active: Vec::new(),
            index: HashMap::new(),
            by_dst: HashMap::new(),
            last_index: 0,
            changed: false,
            capture,
            match_opts,
            match_filter,
            sort,
            drops: DropCounters::default(),
        })
    }

    // ---- accessors -----------------------------------------------------

    pub fn call(&self, id: CallId) -> Option<&Call> {
        self.calls.get(id)
    }

    pub fn find_by_callid(&self, callid: &str) -> Option<&Call> {
        self.index.get(callid).and_then(|&id| self.call(id))
    }

    /// Resolve a Call-ID to its arena key, e.g. for [`Storage::set_locked`].
    pub fn find_call_id(&self, callid: &str) -> Option<CallId> {
        self.index.get(callid).copied()
    }

    pub fn calls_count(&self) -> usize {
        self.order.len()
    }

    /// Ordered call list, in current sort order.
    pub fn calls_iterator(&self) -> impl Iterator<Item = &Call> {
        self.order.iter().filter_map(move |&id| self.call(id))
    }

    /// Active calls, insertion order.
    pub fn active_calls_iterator(&self) -> impl Iterator<Item = &Call> {
        self.active.iter().filter_map(move |&id| self.call(id))
    }

    pub fn drop_counters(&self) -> &DropCounters {
        &self.drops
    }

    pub fn capture_options(&self) -> &CaptureOptions {
        &self.capture
    }

    pub fn match_expr(&self) -> Option<&str> {
        self.match_opts.expr.as_deref()
    }

    pub fn sort_options(&self) -> SortOptions {
        self.sort
    }

    /// Read-and-reset: `true` at most once per ingestion that mutated
    /// `L`, `A`, or any call.
    pub fn calls_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    // ---- sort / clear / rotate ------------------------------------------

    /// Assign new sort options and stably re-sort `L`.
    pub fn set_sort_options(&mut self, sort: SortOptions) {
        self.sort = sort;
        self.resort();
    }

    fn resort(&mut self) {
        let calls = &self.calls;
        let sort = self.sort;
        self.order.sort_by(|&a, &b| {
            let ord = sort.by.compare(&calls[a], &calls[b]);
            if sort.asc {
                ord
            } else {
                ord.reverse()
            }
        });
    }

    /// Binary-search insertion into the sorted `order` list; `Vec::sort_by`
    /// is stable, so repeated calls preserve insertion order among equal
    /// keys — this insertion does the same by always landing after the
    /// last equal element.
    fn insert_sorted(&mut self, id: CallId) {
        let sort = self.sort;
        let pos = self.order.partition_point(|&other| {
            let ord = sort.by.compare(&self.calls[other], &self.calls[id]);
            let ord = if sort.asc { ord } else { ord.reverse() };
            ord != std::cmp::Ordering::Greater
        });
        self.order.insert(pos, id);
    }

    /// Destroy every call.
    pub fn calls_clear(&mut self) {
        self.calls.clear();
        self.order.clear();
        self.active.clear();
        self.index.clear();
        self.by_dst.clear();
        self.changed = true;
    }

    /// Keep only calls that satisfy `keep`, destroying the rest.
    pub fn calls_clear_soft(&mut self, keep: impl Fn(&Call) -> bool) {
        let survivors: Vec<CallId> = self.order.iter().copied().filter(|&id| keep(&self.calls[id])).collect();
        let survivor_set: std::collections::HashSet<CallId> = survivors.iter().copied().collect();

        let doomed: Vec<CallId> = self.order.iter().copied().filter(|id| !survivor_set.contains(id)).collect();
        for id in doomed {
            self.purge_call(id);
        }

        self.order = survivors;
        self.active.retain(|id| survivor_set.contains(id));
        self.changed = true;
    }

    /// Evict the oldest unlocked call. No-op (idempotent) if every call is
    /// locked.
    pub fn rotate(&mut self) {
        if let Some(&id) = self.order.iter().find(|&&id| !self.calls[id].locked) {
            self.purge_call(id);
            self.order.retain(|&o| o != id);
            self.active.retain(|&o| o != id);
        }
    }

    /// Remove every trace of `id` from the secondary indexes and drop the
    /// `Call` itself. Does not touch `order`/`active` — callers that are
    /// iterating those lists retain them separately.
    fn purge_call(&mut self, id: CallId) {
        if let Some(call) = self.calls.get(id) {
            self.index.remove(&call.callid);
            for (_, stream) in call.streams.iter() {
                if let Some(refs) = self.by_dst.get_mut(&stream.dst) {
                    refs.retain(|&(c, _)| c != id);
                }
            }
        }
        self.calls.remove(id);
    }

    // ---- ingestion -------------------------------------------------------

    /// Never panics; returns the accepted message or the reason it was
    /// dropped.
    pub fn ingest_sip(&mut self, packet: &SipPacket) -> IngestResult<Message> {
        let result = self.ingest_sip_inner(packet);
        if let Err(reason) = &result {
            self.drops.record(reason);
        }
        result
    }

    fn ingest_sip_inner(&mut self, packet: &SipPacket) -> IngestResult<Message> {
        if packet.callid.is_empty() {
            warn_missing_field_once("callid");
            return Err(IngestDrop::MissingField { field: "callid" });
        }

        let msg = Message::from_packet(packet);

        let (call_id, is_new) = match self.index.get(&packet.callid).copied() {
            Some(id) => (id, false),
            None => (self.admit_new_call(packet)?, true),
        };

        // Dissect first call message exactly once: xcall linkage.
        if self.calls[call_id].messages.is_empty() {
            if let Some(xcallid) = &packet.xcallid {
                if let Some(&parent_id) = self.index.get(xcallid) {
                    self.calls[parent_id].add_xcall(call_id);
                    self.calls[call_id].xcall_parent = Some(parent_id);
                }
            }
        }

        let msg_idx = self.calls[call_id].add_message(call_id, msg);
        self.calls[call_id].msg_retrans_check(msg_idx);

        if self.calls[call_id].is_invite() {
            if self.capture.rtp {
                if let Some(medias) = &packet.sdp {
                    self.register_streams(call_id, msg_idx, medias);
                }
            }
            self.sync_active_membership(call_id);
        }

        if is_new {
            self.insert_sorted(call_id);
        }

        self.changed = true;
        Ok(self.calls[call_id].messages[msg_idx].clone())
    }

    fn admit_new_call(&mut self, packet: &SipPacket) -> IngestResult<CallId> {
        if !self.match_filter.check(&packet.payload) {
            return Err(IngestDrop::NoMatch);
        }
        if self.match_opts.invite_only && !matches!(packet.reqresp, crate::packet::ReqResp::Invite) {
            return Err(IngestDrop::NotInvite);
        }
        if self.match_opts.complete_only && !packet.reqresp.is_starting_request() {
            return Err(IngestDrop::NotComplete);
        }

        if self.order.len() as u32 == self.capture.limit {
            if !self.capture.rotate {
                return Err(IngestDrop::CaptureFull);
            }
            self.rotate();
            if self.order.len() as u32 == self.capture.limit {
                return Err(IngestDrop::AllCallsLocked);
            }
        }

        self.last_index += 1;
        let call = Call::new(packet.callid.clone(), packet.xcallid.clone(), self.last_index, packet.timestamp);
        let id = self.calls.insert(call);
        self.index.insert(packet.callid.clone(), id);
        Ok(id)
    }

    fn sync_active_membership(&mut self, call_id: CallId) {
        let is_active = self.calls[call_id].is_active();
        let present = self.active.contains(&call_id);
        match (is_active, present) {
            (true, false) => self.active.push(call_id),
            (false, true) => self.active.retain(|&id| id != call_id),
            _ => {}
        }
    }

    /// Lock or unlock a call, excluding/re-including it from rotation.
    pub fn set_locked(&mut self, id: CallId, locked: bool) {
        if let Some(call) = self.calls.get_mut(id) {
            call.locked = locked;
        }
    }
}
