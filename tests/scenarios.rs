//! End-to-end scenarios driven against the public `Storage` API, in the
//! style of `dialog-core`'s "spin up the real type, drive it, assert on
//! snapshots" integration tests — no async runtime, since ingestion has no
//! suspension points.

use std::net::{IpAddr, Ipv4Addr};

use chrono::Utc;
use voxtrace_core::{
    CaptureOptions, Endpoint, FormatDescriptor, IngestDrop, MatchOptions, ReqResp, SdpMedia, SipPacket, SortOptions, Storage,
};

fn ep(host: u8, port: u16) -> Endpoint {
    Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, host)), port)
}

fn sip(callid: &str, reqresp: ReqResp, payload: &[u8]) -> SipPacket {
    SipPacket {
        callid: callid.to_string(),
        xcallid: None,
        from: "sip:alice@example.com".into(),
        to: "sip:bob@example.com".into(),
        cseq: 1,
        reqresp,
        resp_str: None,
        payload: payload.to_vec(),
        timestamp: Utc::now(),
        src: ep(2, 5060),
        dst: ep(1, 5060),
        transport: "UDP".into(),
        sdp: None,
        frame: payload.to_vec(),
    }
}

fn store(capture: CaptureOptions) -> Storage {
    Storage::new(capture, MatchOptions::default(), SortOptions::default()).unwrap()
}

/// Scenario 1: basic dialog.
#[test]
fn basic_dialog() {
    let mut s = store(CaptureOptions::default());
    for reqresp in [
        ReqResp::Invite,
        ReqResp::Response(100),
        ReqResp::Response(180),
        ReqResp::Response(200),
        ReqResp::Ack,
        ReqResp::Bye,
        ReqResp::Response(200),
    ] {
        s.ingest_sip(&sip("X", reqresp, b"payload")).unwrap();
    }

    assert_eq!(s.calls_count(), 1);
    let call = s.find_by_callid("X").unwrap();
    assert_eq!(call.messages.len(), 7);
    assert_eq!(call.state, voxtrace_core::CallState::Completed);
    assert!(!call.is_active());
}

/// Scenario 2: rotation under lock.
#[test]
fn rotation_under_lock() {
    let mut s = store(CaptureOptions::default().with_limit(2));
    s.ingest_sip(&sip("A", ReqResp::Invite, b"a")).unwrap();
    s.ingest_sip(&sip("B", ReqResp::Invite, b"b")).unwrap();

    let a_id = s.find_call_id("A").unwrap();
    s.set_locked(a_id, true);

    s.ingest_sip(&sip("C", ReqResp::Invite, b"c")).unwrap();

    assert_eq!(s.calls_count(), 2);
    assert!(s.find_by_callid("B").is_none(), "B is the oldest unlocked call and must be rotated out");
    assert!(s.find_by_callid("A").is_some());
    assert!(s.find_by_callid("C").is_some());
}

/// Scenario 3: reverse RTP stream.
#[test]
fn reverse_rtp_stream() {
    let mut s = store(CaptureOptions::default());
    let mut invite = sip("X", ReqResp::Invite, b"INVITE");
    invite.sdp = Some(vec![SdpMedia {
        address: ep(1, 16000).ip,
        rtp_port: 16000,
        rtcp_port: None,
        format_list: vec![FormatDescriptor { id: 0, name: "PCMU".into(), clock_rate: 8000 }],
    }]);
    s.ingest_sip(&invite).unwrap();

    let rtp = voxtrace_core::RtpPacket {
        src: ep(2, 24000),
        dst: ep(1, 16000),
        timestamp: Utc::now(),
        encoding: FormatDescriptor { id: 0, name: "PCMU".into(), clock_rate: 8000 },
        frame: vec![],
    };
    s.ingest_rtp(&rtp).unwrap();

    let call = s.find_by_callid("X").unwrap();
    let streams: Vec<_> = call.streams.iter().map(|(_, st)| (st.src, st.dst, st.fmtcode, st.complete)).collect();

    assert!(streams.contains(&(ep(2, 24000), ep(1, 16000), 0, true)), "forward stream missing: {streams:?}");
    assert!(streams.contains(&(ep(1, 16000), ep(2, 24000), 0, true)), "reverse stream missing: {streams:?}");
}

/// Scenario 4: match invert.
#[test]
fn match_invert() {
    let mut s = Storage::new(
        CaptureOptions::default(),
        MatchOptions::default().with_expr("sip:alice@").with_invert(true),
        SortOptions::default(),
    )
    .unwrap();

    let dropped = s.ingest_sip(&sip("A", ReqResp::Invite, b"INVITE sip:alice@example.com SIP/2.0"));
    assert_eq!(dropped, Err(IngestDrop::NoMatch));
    assert!(s.find_by_callid("A").is_none());

    let accepted = s.ingest_sip(&sip("B", ReqResp::Invite, b"INVITE sip:bob@example.com SIP/2.0"));
    assert!(accepted.is_ok());
    assert!(s.find_by_callid("B").is_some());
}

/// Scenario 5: xcall linkage.
#[test]
fn xcall_linkage() {
    let mut s = store(CaptureOptions::default());
    s.ingest_sip(&sip("P", ReqResp::Invite, b"p")).unwrap();

    let mut child = sip("C", ReqResp::Invite, b"c");
    child.xcallid = Some("P".to_string());
    s.ingest_sip(&child).unwrap();

    let parent = s.find_by_callid("P").unwrap();
    let child_ref = s.find_by_callid("C").unwrap();
    assert_eq!(parent.children.len(), 1);
    assert!(child_ref.xcall_parent.is_some());
}

/// Scenario 6: sort change.
#[test]
fn sort_change() {
    let mut s = store(CaptureOptions::default());
    let mut first = sip("first", ReqResp::Invite, b"x");
    first.from = "b".into();
    let mut second = sip("second", ReqResp::Invite, b"y");
    second.from = "a".into();
    s.ingest_sip(&first).unwrap();
    s.ingest_sip(&second).unwrap();

    s.set_sort_options(SortOptions { by: voxtrace_core::CallAttribute::From, asc: true });
    let order: Vec<&str> = s.calls_iterator().map(|c| c.first_from()).collect();
    assert_eq!(order, vec!["a", "b"]);

    s.set_sort_options(SortOptions { by: voxtrace_core::CallAttribute::From, asc: false });
    let order: Vec<&str> = s.calls_iterator().map(|c| c.first_from()).collect();
    assert_eq!(order, vec!["b", "a"]);
}

/// Diagnostic traces from ingestion (e.g. the one-shot missing-field
/// warning) are visible when a scenario is run with `--nocapture`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("voxtrace_core=debug").with_test_writer().try_init();
}

/// Settings a UI layer persists (`CaptureOptions`, `SortOptions`) and a
/// snapshot it reads back (`Stats`) must round-trip through the JSON an
/// embedding application actually stores/serves them as.
#[test]
fn config_and_stats_round_trip_through_json() {
    init_tracing();

    let capture = CaptureOptions::default().with_limit(500);
    let json = serde_json::to_string(&capture).unwrap();
    let restored: CaptureOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.limit, 500);

    let mut s = store(CaptureOptions::default());
    s.ingest_sip(&sip("A", ReqResp::Invite, b"a")).unwrap();
    s.ingest_sip(&sip("B", ReqResp::Invite, b"b")).unwrap();
    let stats = s.calls_stats(|c| c.callid == "A");

    let stats_json = serde_json::to_string(&stats).unwrap();
    assert_eq!(stats_json, r#"{"total":2,"displayed":1}"#);
}
