//! Mutable record of one RTP or RTCP flow.

use chrono::{DateTime, Utc};

use crate::call::CallId;
use crate::message::MessageIndex;
use crate::packet::{Endpoint, FormatDescriptor, SdpMedia};

slotmap::new_key_type! {
    /// Local identity of a [`Stream`] within its owning call's slot map.
    pub struct StreamId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StreamKind {
    Rtp,
    Rtcp,
}

/// One RTP or RTCP flow, owned by a [`crate::call::Call`] for the call's
/// lifetime.
///
/// Identity for index lookup is `(src, dst, kind)`; [`Call::find_stream_exact`](crate::call::Call::find_stream_exact)
/// additionally requires `fmtcode` to match.
#[derive(Debug, Clone)]
pub struct Stream {
    pub call: CallId,
    pub kind: StreamKind,
    pub media: SdpMedia,
    /// Source endpoint. Unset (`Endpoint::UNSPECIFIED`) until `complete`.
    pub src: Endpoint,
    pub dst: Endpoint,
    /// RTP payload type (7-bit). `0` until the first packet sets it, which
    /// is indistinguishable from PT 0 (PCMU) by design — callers gate on
    /// `complete`, not on `fmtcode != 0`.
    pub fmtcode: u8,
    pub encoding: Option<FormatDescriptor>,
    pub packet_count: u64,
    pub first_ts: Option<DateTime<Utc>>,
    pub last_ts: Option<DateTime<Utc>>,
    /// Set once `src` has been observed on the wire. Idempotent: further
    /// calls to `complete` after the first are no-ops.
    pub complete: bool,
    /// The signaling message that negotiated this stream.
    pub msg: MessageIndex,
}

impl Stream {
    /// `stream_create(packet, media)`: a stream pre-registered from an SDP
    /// media line, destination known, source not yet observed.
    pub fn create(call: CallId, msg: MessageIndex, media: SdpMedia, kind: StreamKind, dst: Endpoint) -> Self {
        Self {
            call,
            kind,
            media,
            src: Endpoint::UNSPECIFIED,
            dst,
            fmtcode: 0,
            encoding: None,
            packet_count: 0,
            first_ts: None,
            last_ts: None,
            complete: false,
            msg,
        }
    }

    /// Key used for non-exact index lookup: `(src, dst, kind)`. A
    /// `dst.is_unspecified()` stream never matches anything — only the
    /// reverse is true, pre-registration leaves `src` unspecified and `dst`
    /// set, which `find_stream` treats as a wildcard on `src`.
    pub fn matches(&self, src: Endpoint, dst: Endpoint, kind: StreamKind) -> bool {
        self.kind == kind
            && self.dst == dst
            && (self.src.is_unspecified() || self.src == src)
    }

    pub fn matches_exact(&self, src: Endpoint, dst: Endpoint, kind: StreamKind, fmtcode: u8) -> bool {
        self.matches(src, dst, kind) && self.fmtcode == fmtcode
    }

    /// Set `src` and flip `complete`. Idempotent: no-op if already
    /// complete.
    pub fn complete(&mut self, src: Endpoint) {
        if self.complete {
            return;
        }
        self.src = src;
        self.complete = true;
    }

    pub fn set_format(&mut self, fmtcode: u8, encoding: Option<FormatDescriptor>) {
        self.fmtcode = fmtcode;
        self.encoding = encoding;
    }

    pub fn add_packet(&mut self, timestamp: DateTime<Utc>) {
        self.packet_count += 1;
        if self.first_ts.is_none() {
            self.first_ts = Some(timestamp);
        }
        self.last_ts = Some(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ep(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), port)
    }

    #[test]
    fn complete_is_idempotent() {
        let media = SdpMedia {
            address: ep(16000).ip,
            rtp_port: 16000,
            rtcp_port: None,
            format_list: vec![],
        };
        let mut s = Stream::create(CallId::default(), 0, media, StreamKind::Rtp, ep(16000));
        s.complete(ep(24000));
        assert_eq!(s.src, ep(24000));
        s.complete(ep(9999));
        assert_eq!(s.src, ep(24000), "second complete() call must be a no-op");
    }

    #[test]
    fn wildcard_src_matches_until_complete() {
        let media = SdpMedia {
            address: ep(16000).ip,
            rtp_port: 16000,
            rtcp_port: None,
            format_list: vec![],
        };
        let s = Stream::create(CallId::default(), 0, media, StreamKind::Rtp, ep(16000));
        assert!(s.matches(ep(24000), ep(16000), StreamKind::Rtp));
        assert!(!s.matches(ep(24000), ep(16001), StreamKind::Rtp));
    }
}
