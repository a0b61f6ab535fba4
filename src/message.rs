//! Immutable record of one accepted SIP packet.

use chrono::{DateTime, Utc};

use crate::call::CallId;
use crate::packet::{Endpoint, ReqResp, SdpMedia, SipPacket};

/// Index of a [`Message`] within its owning [`crate::call::Call`]'s
/// message vector. Messages are never removed individually — only the
/// whole call goes away — so a plain `usize` is a stable identity for the
/// call's lifetime: insertion order always equals arrival order.
pub type MessageIndex = usize;

/// One parsed SIP packet, owned by its [`crate::call::Call`] for the
/// call's lifetime. Immutable after insertion.
#[derive(Debug, Clone)]
pub struct Message {
    pub call: CallId,
    pub cseq: u32,
    pub from: String,
    pub to: String,
    pub reqresp: ReqResp,
    pub resp_str: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub src: Endpoint,
    pub dst: Endpoint,
    pub transport: String,
    /// SDP media descriptors carried by this message, in `m=` line order.
    pub medias: Vec<SdpMedia>,
    /// Owned raw frame, for later display/export.
    pub frame: Vec<u8>,
    /// Hash of `payload`, used by [`crate::call::Call::msg_retrans_check`].
    pub payload_hash: u64,
    /// Set by `msg_retrans_check` when an earlier message in the same call
    /// shares `(cseq, reqresp, payload_hash)`.
    pub retransmission: bool,
}

impl Message {
    /// Build a tentative message from dissected SIP fields. The message is
    /// not yet associated with a call (`call` is set by
    /// [`crate::call::Call::add_message`] on insertion) — callers that
    /// never insert it (an admission drop) simply let it drop.
    pub fn from_packet(packet: &SipPacket) -> Self {
        Self {
            call: CallId::default(),
            cseq: packet.cseq,
            from: packet.from.clone(),
            to: packet.to.clone(),
            reqresp: packet.reqresp,
            resp_str: packet.resp_str.clone(),
            timestamp: packet.timestamp,
            src: packet.src,
            dst: packet.dst,
            transport: packet.transport.clone(),
            medias: Vec::new(),
            frame: packet.frame.clone(),
            payload_hash: hash_payload(&packet.payload),
            retransmission: false,
        }
    }
}

fn hash_payload(payload: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}
