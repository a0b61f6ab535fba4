//! INVITE dialog state machine.

use crate::message::Message;
use crate::packet::ReqResp;

/// INVITE dialog state, derived from message sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CallState {
    CallSetup,
    InCall,
    Completed,
    Cancelled,
    Rejected,
    Busy,
    Diverted,
}

impl CallState {
    /// Terminal states are sticky: once reached, later messages never
    /// move the call out of them.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::CallSetup | Self::InCall)
    }
}

/// Feed `msg` through the state machine, starting from `current`.
///
/// Transitions: any `1xx` keeps `CallSetup`; `200` to the initial INVITE
/// transaction moves `CallSetup -> InCall`; `3xx -> Diverted`; `4xx`
/// (excluding `486`) `-> Rejected`; `486 -> Busy`; `BYE` from `InCall ->
/// Completed`; `CANCEL` before `200` (i.e. while still in `CallSetup`)
/// `-> Cancelled`. A terminal state never regresses.
pub fn next_state(current: CallState, msg: &Message) -> CallState {
    if current.is_terminal() {
        return current;
    }

    match msg.reqresp {
        ReqResp::Response(code) => match code {
            100..=199 => CallState::CallSetup,
            200 if current == CallState::CallSetup => CallState::InCall,
            486 => CallState::Busy,
            400..=499 => CallState::Rejected,
            300..=399 => CallState::Diverted,
            _ => current,
        },
        ReqResp::Bye if current == CallState::InCall => CallState::Completed,
        ReqResp::Cancel if current == CallState::CallSetup => CallState::Cancelled,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Endpoint;
    use chrono::Utc;

    fn msg(reqresp: ReqResp) -> Message {
        Message {
            call: crate::call::CallId::default(),
            cseq: 1,
            from: String::new(),
            to: String::new(),
            reqresp,
            resp_str: None,
            timestamp: Utc::now(),
            src: Endpoint::UNSPECIFIED,
            dst: Endpoint::UNSPECIFIED,
            transport: String::new(),
            medias: Vec::new(),
            frame: Vec::new(),
            payload_hash: 0,
            retransmission: false,
        }
    }

    #[test]
    fn basic_dialog_progression() {
        let mut state = CallState::CallSetup;
        state = next_state(state, &msg(ReqResp::Invite));
        assert_eq!(state, CallState::CallSetup);
        state = next_state(state, &msg(ReqResp::Response(100)));
        assert_eq!(state, CallState::CallSetup);
        state = next_state(state, &msg(ReqResp::Response(180)));
        assert_eq!(state, CallState::CallSetup);
        state = next_state(state, &msg(ReqResp::Response(200)));
        assert_eq!(state, CallState::InCall);
        state = next_state(state, &msg(ReqResp::Ack));
        assert_eq!(state, CallState::InCall);
        state = next_state(state, &msg(ReqResp::Bye));
        assert_eq!(state, CallState::Completed);
        state = next_state(state, &msg(ReqResp::Response(200)));
        assert_eq!(state, CallState::Completed, "terminal state must be sticky");
    }

    #[test]
    fn busy_takes_precedence_over_generic_4xx() {
        let state = next_state(CallState::CallSetup, &msg(ReqResp::Response(486)));
        assert_eq!(state, CallState::Busy);
        let state = next_state(CallState::CallSetup, &msg(ReqResp::Response(404)));
        assert_eq!(state, CallState::Rejected);
    }

    #[test]
    fn cancel_only_before_200() {
        let state = next_state(CallState::CallSetup, &msg(ReqResp::Cancel));
        assert_eq!(state, CallState::Cancelled);
        let state = next_state(CallState::InCall, &msg(ReqResp::Cancel));
        assert_eq!(state, CallState::InCall, "CANCEL after 200 has no effect on state");
    }
}
