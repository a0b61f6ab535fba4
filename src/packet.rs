//! Inputs handed to the store by the (out-of-scope) dissector layer.
//!
//! These are plain data: the dissectors have already done the parsing, so
//! everything here is `Clone`/`Debug` structs with no behavior of their own.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

/// An IP/port pair, comparable so it can be used as a map key and as a
/// [`crate::attribute::CallAttribute::Src`]/`Dst` sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub const UNSPECIFIED: Endpoint = Endpoint {
        ip: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
        port: 0,
    };

    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// True for the zero-valued placeholder used by pre-registered streams
    /// whose source has not yet been observed.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// SIP request method, or 0..999 for a numeric response status.
///
/// A single enum domain as specified: `reqresp` values below 1000 are
/// response status codes, at or above 1000 are method tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReqResp {
    Response(u16),
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Info,
    Message,
    Refer,
    Notify,
    Subscribe,
    Prack,
    Update,
    Other(u32),
}

impl ReqResp {
    /// True for anything that is a method rather than a response code.
    pub fn is_request(self) -> bool {
        !matches!(self, Self::Response(_))
    }

    /// True for a method that can legitimately start a dialog: excludes
    /// `Response`, `Ack`, and `Message`, none of which open a new
    /// transaction on their own. Used to gate `complete_only` admission,
    /// which drops a call whose first-seen packet is not one of these.
    pub fn is_starting_request(self) -> bool {
        !matches!(self, Self::Response(_) | Self::Ack | Self::Message)
    }

    /// Display form used for the `METHOD` sort attribute and diagnostics.
    pub fn label(self) -> String {
        match self {
            Self::Response(code) => code.to_string(),
            Self::Invite => "INVITE".into(),
            Self::Ack => "ACK".into(),
            Self::Bye => "BYE".into(),
            Self::Cancel => "CANCEL".into(),
            Self::Register => "REGISTER".into(),
            Self::Options => "OPTIONS".into(),
            Self::Info => "INFO".into(),
            Self::Message => "MESSAGE".into(),
            Self::Refer => "REFER".into(),
            Self::Notify => "NOTIFY".into(),
            Self::Subscribe => "SUBSCRIBE".into(),
            Self::Prack => "PRACK".into(),
            Self::Update => "UPDATE".into(),
            Self::Other(code) => format!("METHOD({code})"),
        }
    }
}

/// One SDP media line (`m=` plus the address it negotiates).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SdpMedia {
    pub address: IpAddr,
    pub rtp_port: u16,
    pub rtcp_port: Option<u16>,
    pub format_list: Vec<FormatDescriptor>,
}

impl SdpMedia {
    pub fn rtp_endpoint(&self) -> Endpoint {
        Endpoint::new(self.address, self.rtp_port)
    }

    pub fn rtcp_endpoint(&self) -> Endpoint {
        Endpoint::new(self.address, self.rtcp_port.unwrap_or(self.rtp_port + 1))
    }
}

/// RTP payload format, as advertised in SDP or observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FormatDescriptor {
    /// 7-bit RTP payload type.
    pub id: u8,
    pub name: String,
    pub clock_rate: u32,
}

/// A decoded SIP packet, as handed over by the dissector layer.
#[derive(Debug, Clone)]
pub struct SipPacket {
    pub callid: String,
    pub xcallid: Option<String>,
    pub from: String,
    pub to: String,
    pub cseq: u32,
    pub reqresp: ReqResp,
    pub resp_str: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub src: Endpoint,
    pub dst: Endpoint,
    pub transport: String,
    pub sdp: Option<Vec<SdpMedia>>,
    /// Raw frame, owned by the resulting [`crate::message::Message`] once
    /// accepted.
    pub frame: Vec<u8>,
}

/// A decoded RTP packet.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub timestamp: DateTime<Utc>,
    pub encoding: FormatDescriptor,
    pub frame: Vec<u8>,
}

/// A decoded RTCP packet (SR/RR/XR reports, already parsed).
#[derive(Debug, Clone)]
pub struct RtcpPacket {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub timestamp: DateTime<Utc>,
    pub reports: Vec<RtcpReport>,
    pub frame: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RtcpReport {
    SenderReport,
    ReceiverReport,
    ExtendedReportVoip,
}
