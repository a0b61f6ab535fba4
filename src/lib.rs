//! Call-and-stream correlation core for a passive SIP/RTP traffic
//! analyzer.
//!
//! Ingests already-dissected SIP/RTP/RTCP packets one at a time and
//! maintains an ordered, filterable, bounded collection of [`Call`]s, each
//! owning its [`Message`]s and media [`Stream`]s. Packet capture, link-layer
//! decoding, protocol dissection, the terminal UI, settings loading, and
//! PCAP/text export are all external collaborators — this crate only owns
//! the in-memory store.
//!
//! The store ([`store::Storage`]) is single-threaded cooperative: every
//! ingestion call runs to completion with no internal suspension points.
//! For multi-threaded embedding, wrap a [`store::Storage`] in one
//! `parking_lot::RwLock` rather than trying to make the store itself
//! concurrent — see [`store`] for the reasoning.

pub mod attribute;
pub mod call;
pub mod config;
pub mod error;
pub mod filter;
pub mod message;
pub mod packet;
pub mod shared;
pub mod store;
pub mod stream;

pub use attribute::CallAttribute;
pub use call::{Call, CallId, CallState};
pub use config::{CaptureOptions, MatchOptions, SortOptions};
pub use error::{ConfigError, ConfigResult, IngestDrop, IngestResult};
pub use filter::MatchFilter;
pub use message::{Message, MessageIndex};
pub use packet::{Endpoint, FormatDescriptor, ReqResp, RtcpPacket, RtcpReport, RtpPacket, SdpMedia, SipPacket};
pub use shared::SharedStorage;
pub use store::{DropCounters, Stats, Storage};
pub use stream::{Stream, StreamId, StreamKind};
