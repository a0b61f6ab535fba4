//! One SIP dialog and everything it owns.
//!
//! Grounded on `rvoip-dialog-core`'s `dialog::Dialog` for the shape of a
//! stateful SIP entity: a `Call` owns its `Message`s (plain `Vec`,
//! insertion order) and `Stream`s (a slot map for stable identity under
//! replacement), and refers to its xcall parent/children and to the store
//! only by `CallId` — never by pointer or `Rc`.

pub mod state;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use slotmap::SlotMap;

use crate::message::{Message, MessageIndex};
use crate::packet::Endpoint;
use crate::stream::{Stream, StreamId, StreamKind};

pub use state::CallState;

slotmap::new_key_type! {
    /// Arena key into [`crate::store::Storage`]'s call slot map.
    ///
    /// `CallId::default()` is the null key: a placeholder used only before
    /// a [`Message`]/[`Stream`] has been attached to its owning call, never
    /// a valid lookup key.
    pub struct CallId;
}

/// One SIP dialog: the messages and streams exchanged under a single
/// Call-ID.
#[derive(Debug)]
pub struct Call {
    pub callid: String,
    pub xcallid: Option<String>,
    /// 1-based, dense, assigned by `Storage` and never reused.
    pub index: u64,
    pub state: CallState,
    pub locked: bool,
    pub messages: Vec<Message>,
    pub streams: SlotMap<StreamId, Stream>,
    /// `(src, dst, kind) -> StreamId`, the non-exact lookup key.
    stream_index: HashMap<(Endpoint, Endpoint, StreamKind), StreamId>,
    pub xcall_parent: Option<CallId>,
    pub children: Vec<CallId>,
    pub setup_time: DateTime<Utc>,
    pub answer_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Per-call bound on format-mismatch stream cloning: caps the number of
/// streams a single pathological PT-toggling peer can create.
pub const MAX_STREAMS_PER_CALL: usize = 64;

impl Call {
    pub fn new(callid: String, xcallid: Option<String>, index: u64, setup_time: DateTime<Utc>) -> Self {
        Self {
            callid,
            xcallid,
            index,
            state: CallState::CallSetup,
            locked: false,
            messages: Vec::new(),
            streams: SlotMap::with_key(),
            stream_index: HashMap::new(),
            xcall_parent: None,
            children: Vec::new(),
            setup_time,
            answer_time: None,
            end_time: None,
        }
    }

    /// Append `m` in arrival order, stamp its back-reference, and feed it
    /// through the INVITE state machine — only for INVITE dialogs; a
    /// non-INVITE call's `state` stays at `CallSetup` for its whole life.
    pub fn add_message(&mut self, self_id: CallId, mut m: Message) -> MessageIndex {
        m.call = self_id;
        let is_invite = self.messages.first().map(|msg| msg.reqresp).unwrap_or(m.reqresp) == crate::packet::ReqResp::Invite;
        if is_invite {
            let prev_state = self.state;
            self.state = state::next_state(self.state, &m);
            if prev_state == CallState::CallSetup && self.state == CallState::InCall {
                self.answer_time = Some(m.timestamp);
            }
            if !prev_state.is_terminal() && self.state.is_terminal() {
                self.end_time = Some(m.timestamp);
            }
        }
        self.messages.push(m);
        self.messages.len() - 1
    }

    /// Mark `messages[idx]` as a retransmission if an earlier message with
    /// the same `(cseq, reqresp)` carries an identical payload hash.
    pub fn msg_retrans_check(&mut self, idx: MessageIndex) {
        let (cseq, reqresp, hash) = {
            let m = &self.messages[idx];
            (m.cseq, m.reqresp, m.payload_hash)
        };
        let is_retrans = self.messages[..idx]
            .iter()
            .any(|prev| prev.cseq == cseq && prev.reqresp == reqresp && prev.payload_hash == hash);
        self.messages[idx].retransmission = is_retrans;
    }

    /// Insert a stream, refusing once [`MAX_STREAMS_PER_CALL`] is reached.
    pub fn add_stream(&mut self, s: Stream) -> Option<StreamId> {
        if self.streams.len() >= MAX_STREAMS_PER_CALL {
            return None;
        }
        let key = (s.src, s.dst, s.kind);
        let id = self.streams.insert(s);
        self.stream_index.insert(key, id);
        Some(id)
    }

    /// Non-exact lookup: `src`/`dst` + `kind`. `dst` may be zero-valued,
    /// matching the pre-registration state where only destination is
    /// known.
    pub fn find_stream(&self, src: Endpoint, dst: Endpoint, kind: StreamKind) -> Option<StreamId> {
        if let Some(&id) = self.stream_index.get(&(src, dst, kind)) {
            return Some(id);
        }
        self.streams
            .iter()
            .find(|(_, s)| s.matches(src, dst, kind))
            .map(|(id, _)| id)
    }

    pub fn find_stream_exact(&self, src: Endpoint, dst: Endpoint, kind: StreamKind, fmtcode: u8) -> Option<StreamId> {
        self.streams
            .iter()
            .find(|(_, s)| s.matches_exact(src, dst, kind, fmtcode))
            .map(|(id, _)| id)
    }

    /// Re-key a stream in the secondary index after its `src`/`dst`
    /// changed (used once a pre-registered stream is completed).
    pub fn reindex_stream(&mut self, id: StreamId, old_key: (Endpoint, Endpoint, StreamKind)) {
        if let Some(s) = self.streams.get(id) {
            self.stream_index.remove(&old_key);
            self.stream_index.insert((s.src, s.dst, s.kind), id);
        }
    }

    /// Record `child` as an xcall child. Idempotent — called exactly once
    /// per child by the store, but safe to call more than once.
    pub fn add_xcall(&mut self, child: CallId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    /// True iff the first accepted message is INVITE.
    pub fn is_invite(&self) -> bool {
        matches!(self.messages.first().map(|m| m.reqresp), Some(crate::packet::ReqResp::Invite))
    }

    /// True iff `state` is non-terminal. A recency grace window would be a
    /// reasonable extension but is not enabled here: activity is purely
    /// state-based.
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn first_src(&self) -> Endpoint {
        self.messages.first().map(|m| m.src).unwrap_or(Endpoint::UNSPECIFIED)
    }

    pub fn first_dst(&self) -> Endpoint {
        self.messages.first().map(|m| m.dst).unwrap_or(Endpoint::UNSPECIFIED)
    }

    pub fn first_from(&self) -> &str {
        self.messages.first().map(|m| m.from.as_str()).unwrap_or("")
    }

    pub fn first_to(&self) -> &str {
        self.messages.first().map(|m| m.to.as_str()).unwrap_or("")
    }

    pub fn first_method(&self) -> String {
        self.messages.first().map(|m| m.reqresp.label()).unwrap_or_default()
    }

    pub fn first_transport(&self) -> &str {
        self.messages.first().map(|m| m.transport.as_str()).unwrap_or("")
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.setup_time
    }

    pub fn total_duration(&self) -> Duration {
        let end = self.end_time.or_else(|| self.messages.last().map(|m| m.timestamp)).unwrap_or(self.setup_time);
        (end - self.setup_time).to_std().unwrap_or_default()
    }

    pub fn conversation_duration(&self) -> Duration {
        match (self.answer_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }
}
