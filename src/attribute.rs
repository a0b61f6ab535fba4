//! Sortable/comparable call attributes.
//!
//! A closed enum plus a total order over [`Call`](crate::call::Call)
//! projected through it, used by [`crate::store::Storage`] to keep the
//! ordered call list consistent with whatever sort the caller has
//! configured.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::call::{Call, CallState};

/// A sortable/comparable SIP call attribute.
///
/// Unknown attribute names fall back to [`CallAttribute::CallIndex`]
/// ascending, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CallAttribute {
    CallIndex,
    CallId,
    XCallId,
    Src,
    Dst,
    From,
    To,
    Method,
    State,
    ConvDur,
    TotalDur,
    MsgCnt,
    StartDate,
    StartTime,
    Transport,
}

impl CallAttribute {
    /// Canonical name, as used in configuration and display.
    pub fn name(self) -> &'static str {
        match self {
            Self::CallIndex => "CALLINDEX",
            Self::CallId => "CALLID",
            Self::XCallId => "XCALLID",
            Self::Src => "SRC",
            Self::Dst => "DST",
            Self::From => "FROM",
            Self::To => "TO",
            Self::Method => "METHOD",
            Self::State => "STATE",
            Self::ConvDur => "CONVDUR",
            Self::TotalDur => "TOTALDUR",
            Self::MsgCnt => "MSGCNT",
            Self::StartDate => "STARTDATE",
            Self::StartTime => "STARTTIME",
            Self::Transport => "TRANSPORT",
        }
    }

    /// Compare two calls by this attribute, ascending.
    pub fn compare(self, a: &Call, b: &Call) -> Ordering {
        match self {
            Self::CallIndex => a.index.cmp(&b.index),
            Self::CallId => a.callid.cmp(&b.callid),
            Self::XCallId => a.xcallid.cmp(&b.xcallid),
            Self::Src => a.first_src().cmp(&b.first_src()),
            Self::Dst => a.first_dst().cmp(&b.first_dst()),
            Self::From => a.first_from().cmp(&b.first_from()),
            Self::To => a.first_to().cmp(&b.first_to()),
            Self::Method => a.first_method().cmp(&b.first_method()),
            Self::State => state_rank(a.state).cmp(&state_rank(b.state)),
            Self::ConvDur => a.conversation_duration().cmp(&b.conversation_duration()),
            Self::TotalDur => a.total_duration().cmp(&b.total_duration()),
            Self::MsgCnt => a.messages.len().cmp(&b.messages.len()),
            Self::StartDate | Self::StartTime => a.start_time().cmp(&b.start_time()),
            Self::Transport => a.first_transport().cmp(&b.first_transport()),
        }
        // CALLINDEX is strictly increasing and unique, so it always breaks ties
        // the same way the source's CALLINDEX-ascending fallback does.
        .then_with(|| a.index.cmp(&b.index))
    }
}

impl FromStr for CallAttribute {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CALLINDEX" => Self::CallIndex,
            "CALLID" => Self::CallId,
            "XCALLID" => Self::XCallId,
            "SRC" => Self::Src,
            "DST" => Self::Dst,
            "FROM" => Self::From,
            "TO" => Self::To,
            "METHOD" => Self::Method,
            "STATE" => Self::State,
            "CONVDUR" => Self::ConvDur,
            "TOTALDUR" => Self::TotalDur,
            "MSGCNT" => Self::MsgCnt,
            "STARTDATE" => Self::StartDate,
            "STARTTIME" => Self::StartTime,
            "TRANSPORT" => Self::Transport,
            _ => return Err(()),
        })
    }
}

/// `CallAttribute::from_str`, but mapping unknown names to the documented
/// fallback instead of an error, as required by spec.
pub fn attribute_from_name_or_default(name: &str) -> CallAttribute {
    CallAttribute::from_str(name).unwrap_or(CallAttribute::CallIndex)
}

fn state_rank(state: CallState) -> u8 {
    match state {
        CallState::CallSetup => 0,
        CallState::InCall => 1,
        CallState::Cancelled => 2,
        CallState::Busy => 3,
        CallState::Rejected => 4,
        CallState::Diverted => 5,
        CallState::Completed => 6,
    }
}
