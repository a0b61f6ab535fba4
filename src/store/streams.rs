//! SDP-driven stream pre-registration and RTP/RTCP correlation.
//!
//! `register_streams` and `ingest_rtp`/`ingest_rtcp` are split out of
//! `mod.rs` because together they are the single largest chunk of the
//! store's logic — the reverse-stream heuristic and the global `by_dst`
//! index are both concentrated here. Grounded on `rvoip-rtp-core`'s
//! `session/rtcp/mod.rs` for the shape of "resolve a stream, then update
//! its counters" as two separate steps, adapted to endpoint+format
//! correlation instead of an RTP session handle.

use tracing::debug;

use crate::call::{CallId, MAX_STREAMS_PER_CALL};
use crate::error::{IngestDrop, IngestResult};
use crate::message::MessageIndex;
use crate::packet::{Endpoint, FormatDescriptor, RtcpPacket, RtpPacket, SdpMedia};
use crate::stream::{Stream, StreamId, StreamKind};

use super::Storage;

impl Storage {
    /// `register_streams(msg)`: pre-register up to three Streams per SDP
    /// media line.
    pub(super) fn register_streams(&mut self, call_id: CallId, msg_idx: MessageIndex, medias: &[SdpMedia]) {
        let msg_src = self.calls[call_id].messages[msg_idx].src;

        for media in medias {
            self.calls[call_id].messages[msg_idx].medias.push(media.clone());

            let rtp_dst = media.rtp_endpoint();
            let rtcp_dst = media.rtcp_endpoint();
            let reverse_dst = Endpoint::new(msg_src.ip, media.rtp_port);

            self.preregister(call_id, msg_idx, media, StreamKind::Rtp, rtp_dst);
            self.preregister(call_id, msg_idx, media, StreamKind::Rtcp, rtcp_dst);
            // (iii): anticipates peers that send RTP back to the signaling
            // source rather than the SDP-advertised address.
            self.preregister(call_id, msg_idx, media, StreamKind::Rtp, reverse_dst);
        }
    }

    fn preregister(&mut self, call_id: CallId, msg_idx: MessageIndex, media: &SdpMedia, kind: StreamKind, dst: Endpoint) {
        let call = &mut self.calls[call_id];
        if call.find_stream(Endpoint::UNSPECIFIED, dst, kind).is_some() {
            return;
        }
        let stream = Stream::create(call_id, msg_idx, media.clone(), kind, dst);
        if let Some(stream_id) = call.add_stream(stream) {
            debug!(?call_id, ?dst, ?kind, "pre-registered stream from SDP");
            self.by_dst.entry(dst).or_default().push((call_id, stream_id));
        }
    }

    /// `ingest_rtp`: resolve the observed `(src, dst, fmtcode)` to a
    /// pre-registered or already-resolved stream, apply the reverse-stream
    /// heuristic, and record the packet.
    pub fn ingest_rtp(&mut self, packet: &RtpPacket) -> IngestResult<StreamId> {
        if !self.capture.rtp {
            return Err(IngestDrop::RtpDisabled);
        }
        let result = self.ingest_rtp_inner(packet);
        if let Err(reason) = &result {
            self.drops.record(reason);
        }
        result
    }

    fn ingest_rtp_inner(&mut self, packet: &RtpPacket) -> IngestResult<StreamId> {
        let fmtcode = packet.encoding.id;
        let (call_id, stream_id) = self
            .stream_find_by_format(packet.src, packet.dst, StreamKind::Rtp, fmtcode)
            .ok_or(IngestDrop::NoStream { src: packet.src, dst: packet.dst })?;

        let (was_complete, existing_fmt) = {
            let s = &self.calls[call_id].streams[stream_id];
            (s.complete, s.fmtcode)
        };

        let target = if was_complete && existing_fmt != fmtcode {
            // Format-mismatch clone, capped per call.
            match self.clone_for_new_format(call_id, stream_id, fmtcode, packet.src, packet.encoding.clone()) {
                Some(cloned) => cloned,
                None => {
                    self.drops.record(&IngestDrop::StreamCapReached { call: call_id });
                    stream_id
                }
            }
        } else {
            stream_id
        };

        if !was_complete {
            let dst_before;
            {
                let call = &mut self.calls[call_id];
                let s = &mut call.streams[target];
                dst_before = (s.src, s.dst, s.kind);
                s.complete(packet.src);
                s.set_format(fmtcode, Some(packet.encoding.clone()));
            }
            self.calls[call_id].reindex_stream(target, dst_before);
            self.reverse_stream_heuristic(call_id, target, fmtcode, packet.encoding.clone());
        }

        self.calls[call_id].streams[target].add_packet(packet.timestamp);
        self.changed = true;
        Ok(target)
    }

    /// `ingest_rtcp`: resolved independently of the RTP branch — no
    /// `stream` value is carried over from an RTP lookup, since RTCP
    /// control traffic is not guaranteed to share a port pair with its
    /// RTP counterpart.
    pub fn ingest_rtcp(&mut self, packet: &RtcpPacket) -> IngestResult<StreamId> {
        if !self.capture.rtp {
            return Err(IngestDrop::RtpDisabled);
        }
        let result = self.ingest_rtcp_inner(packet);
        if let Err(reason) = &result {
            self.drops.record(reason);
        }
        result
    }

    fn ingest_rtcp_inner(&mut self, packet: &RtcpPacket) -> IngestResult<StreamId> {
        let (call_id, stream_id) = self
            .by_dst
            .get(&packet.dst)
            .into_iter()
            .flatten()
            .find(|&&(call_id, stream_id)| {
                self.calls[call_id].streams.get(stream_id).is_some_and(|s| s.matches(packet.src, packet.dst, StreamKind::Rtcp))
            })
            .copied()
            .ok_or(IngestDrop::NoStream { src: packet.src, dst: packet.dst })?;

        let call = &mut self.calls[call_id];
        let dst_before = {
            let s = &call.streams[stream_id];
            (s.src, s.dst, s.kind)
        };
        call.streams[stream_id].complete(packet.src);
        call.reindex_stream(stream_id, dst_before);
        call.streams[stream_id].add_packet(packet.timestamp);
        self.changed = true;
        Ok(stream_id)
    }

    /// `stream_find_by_format`: global lookup across every call's streams,
    /// keyed by endpoint pair and restricted to `kind`, via the `by_dst`
    /// secondary index rather than a full scan of every call.
    fn stream_find_by_format(&self, src: Endpoint, dst: Endpoint, kind: StreamKind, fmtcode: u8) -> Option<(CallId, StreamId)> {
        let candidates = self.by_dst.get(&dst)?;
        // Prefer an already-resolved exact match; fall back to a
        // not-yet-complete pre-registration (fmtcode still 0) so the first
        // packet of a stream can bind it.
        candidates
            .iter()
            .find(|&&(call_id, stream_id)| {
                self.calls[call_id]
                    .streams
                    .get(stream_id)
                    .is_some_and(|s| s.kind == kind && s.matches_exact(src, dst, kind, fmtcode))
            })
            .or_else(|| {
                candidates.iter().find(|&&(call_id, stream_id)| {
                    self.calls[call_id]
                        .streams
                        .get(stream_id)
                        .is_some_and(|s| !s.complete && s.matches(src, dst, kind))
                })
            })
            .copied()
    }

    /// Step 3 of `ingest_rtp`: the existing stream is complete but its
    /// format disagrees with the observed packet — clone it under the new
    /// format rather than overwrite, so both encodings remain addressable.
    fn clone_for_new_format(
        &mut self,
        call_id: CallId,
        template: StreamId,
        fmtcode: u8,
        src: Endpoint,
        encoding: FormatDescriptor,
    ) -> Option<StreamId> {
        let call = &mut self.calls[call_id];
        if call.streams.len() >= MAX_STREAMS_PER_CALL {
            return None;
        }
        let (media, dst, kind, msg) = {
            let s = &call.streams[template];
            (s.media.clone(), s.dst, s.kind, s.msg)
        };
        let mut cloned = Stream::create(call_id, msg, media, kind, dst);
        cloned.complete(src);
        cloned.set_format(fmtcode, Some(encoding));
        let new_id = call.add_stream(cloned)?;
        self.by_dst.entry(dst).or_default().push((call_id, new_id));
        Some(new_id)
    }

    /// Reverse-stream heuristic: a peer that received RTP on
    /// `(S.dst -> S.src)` may echo back to the signaling source rather
    /// than to `S.src` directly; pre-register a reverse stream so that
    /// echo is still correlated.
    fn reverse_stream_heuristic(&mut self, call_id: CallId, resolved: StreamId, fmtcode: u8, encoding: FormatDescriptor) {
        let (s_src, s_dst, kind, msg, media) = {
            let s = &self.calls[call_id].streams[resolved];
            (s.src, s.dst, s.kind, s.msg, s.media.clone())
        };

        let existing = self.calls[call_id].find_stream(s_dst, s_src, kind);

        let needs_new = match existing {
            None => true,
            Some(r_id) => {
                let r = &self.calls[call_id].streams[r_id];
                if r.src.is_unspecified() {
                    false
                } else if r.src != s_src {
                    self.calls[call_id].find_stream_exact(s_dst, s_src, kind, fmtcode).is_none()
                } else {
                    false
                }
            }
        };

        if !needs_new {
            return;
        }

        let call = &mut self.calls[call_id];
        if call.streams.len() >= MAX_STREAMS_PER_CALL {
            self.drops.record(&IngestDrop::StreamCapReached { call: call_id });
            return;
        }
        // A reverse stream's dst is the original stream's src: the peer
        // echoes media back to where it last saw traffic originate from.
        let mut reverse = Stream::create(call_id, msg, media, kind, s_src);
        reverse.complete(s_dst);
        reverse.set_format(fmtcode, Some(encoding));
        if let Some(reverse_id) = call.add_stream(reverse) {
            debug!(?call_id, src = %s_dst, dst = %s_src, "created reverse stream");
            self.by_dst.entry(s_src).or_default().push((call_id, reverse_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureOptions, MatchOptions, SortOptions};
    use crate::packet::{Endpoint, FormatDescriptor, ReqResp, SipPacket};
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};

    fn ep(host: u8, port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, host)), port)
    }

    fn invite_with_sdp() -> SipPacket {
        SipPacket {
            callid: "x".into(),
            xcallid: None,
            from: "a".into(),
            to: "b".into(),
            cseq: 1,
            reqresp: ReqResp::Invite,
            resp_str: None,
            payload: b"INVITE".to_vec(),
            timestamp: Utc::now(),
            src: ep(2, 5060),
            dst: ep(1, 5060),
            transport: "UDP".into(),
            sdp: Some(vec![SdpMedia {
                address: ep(1, 16000).ip,
                rtp_port: 16000,
                rtcp_port: None,
                format_list: vec![FormatDescriptor { id: 0, name: "PCMU".into(), clock_rate: 8000 }],
            }]),
            frame: b"INVITE".to_vec(),
        }
    }

    fn rtp(src: Endpoint, dst: Endpoint, pt: u8) -> RtpPacket {
        RtpPacket {
            src,
            dst,
            timestamp: Utc::now(),
            encoding: FormatDescriptor { id: pt, name: "PCMU".into(), clock_rate: 8000 },
            frame: vec![],
        }
    }

    #[test]
    fn reverse_rtp_stream_scenario() {
        let mut s = Storage::new(CaptureOptions::default(), MatchOptions::default(), SortOptions::default()).unwrap();
        s.ingest_sip(&invite_with_sdp()).unwrap();

        let stream_id = s.ingest_rtp(&rtp(ep(2, 24000), ep(1, 16000), 0)).unwrap();
        let call_id = s.index[&"x".to_string()];
        let call = &s.calls[call_id];

        let forward = &call.streams[stream_id];
        assert!(forward.complete);
        assert_eq!(forward.src, ep(2, 24000));
        assert_eq!(forward.dst, ep(1, 16000));
        assert_eq!(forward.fmtcode, 0);

        let reverse_id = call.find_stream(ep(1, 16000), ep(2, 24000), StreamKind::Rtp).unwrap();
        let reverse = &call.streams[reverse_id];
        assert!(reverse.complete);
        assert_eq!(reverse.src, ep(1, 16000));
        assert_eq!(reverse.dst, ep(2, 24000));
        assert_eq!(reverse.fmtcode, 0);
    }

    #[test]
    fn rtp_with_no_registered_stream_is_a_correlation_miss() {
        let mut s = Storage::new(CaptureOptions::default(), MatchOptions::default(), SortOptions::default()).unwrap();
        let err = s.ingest_rtp(&rtp(ep(9, 1000), ep(9, 2000), 0)).unwrap_err();
        assert!(matches!(err, IngestDrop::NoStream { .. }));
        assert_eq!(s.drop_counters().no_stream, 1);
    }

    #[test]
    fn rtp_disabled_by_capture_options_is_dropped() {
        let mut s = Storage::new(CaptureOptions::default().with_limit(10), MatchOptions::default(), SortOptions::default()).unwrap();
        s.capture.rtp = false;
        let err = s.ingest_rtp(&rtp(ep(2, 24000), ep(1, 16000), 0)).unwrap_err();
        assert_eq!(err, IngestDrop::RtpDisabled);
    }

    #[test]
    fn rtcp_resolves_independently_of_rtp() {
        let mut s = Storage::new(CaptureOptions::default(), MatchOptions::default(), SortOptions::default()).unwrap();
        s.ingest_sip(&invite_with_sdp()).unwrap();

        let rtcp = RtcpPacket {
            src: ep(2, 24001),
            dst: ep(1, 16001),
            timestamp: Utc::now(),
            reports: vec![],
            frame: vec![],
        };
        let stream_id = s.ingest_rtcp(&rtcp).unwrap();
        let call_id = s.index[&"x".to_string()];
        let stream = &s.calls[call_id].streams[stream_id];
        assert_eq!(stream.kind, StreamKind::Rtcp);
        assert!(stream.complete);
    }
}
