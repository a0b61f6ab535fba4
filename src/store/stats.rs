//! Statistics view: totals and display-filtered counts.
//!
//! The display filter itself is an external collaborator — callers
//! supply it as a predicate, so `Storage` never depends on the UI's
//! filter-expression grammar.

use crate::call::Call;
use crate::store::Storage;

/// `{total, displayed}` as returned by `calls_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Stats {
    pub total: usize,
    pub displayed: usize,
}

impl Storage {
    /// `calls_stats`: `total = |L|`, `displayed` = count of calls in `L`
    /// for which `filter_check_call` holds.
    pub fn calls_stats(&self, filter_check_call: impl Fn(&Call) -> bool) -> Stats {
        Stats {
            total: self.calls_count(),
            displayed: self.calls_iterator().filter(|c| filter_check_call(c)).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureOptions, MatchOptions, SortOptions};
    use crate::packet::{Endpoint, ReqResp, SipPacket};
    use chrono::Utc;

    fn sip(callid: &str) -> SipPacket {
        SipPacket {
            callid: callid.to_string(),
            xcallid: None,
            from: "a".into(),
            to: "b".into(),
            cseq: 1,
            reqresp: ReqResp::Invite,
            resp_str: None,
            payload: b"x".to_vec(),
            timestamp: Utc::now(),
            src: Endpoint::UNSPECIFIED,
            dst: Endpoint::UNSPECIFIED,
            transport: "UDP".into(),
            sdp: None,
            frame: b"x".to_vec(),
        }
    }

    #[test]
    fn stats_counts_total_and_displayed() {
        let mut s = Storage::new(CaptureOptions::default(), MatchOptions::default(), SortOptions::default()).unwrap();
        s.ingest_sip(&sip("A")).unwrap();
        s.ingest_sip(&sip("B")).unwrap();

        let stats = s.calls_stats(|c| c.callid == "A");
        assert_eq!(stats, Stats { total: 2, displayed: 1 });
    }
}
