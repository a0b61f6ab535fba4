//! Error types, grounded on `rvoip-dialog-core`'s `errors/dialog_errors.rs`:
//! a `thiserror` enum per error kind, one `Result` alias per kind, no
//! ad-hoc `String` errors.

use thiserror::Error;

use crate::call::CallId;
use crate::packet::Endpoint;

/// Configuration error kind. Fatal to initialization.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid match expression {expr:?}: {source}")]
    InvalidMatchExpr {
        expr: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown sort attribute: {name:?}")]
    UnknownSortAttribute { name: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reason a packet was not admitted: a capture-time filter rejection, a
/// full FIFO with no evictable slot, a correlation miss, or a dissector
/// inconsistency.
///
/// Never panics the caller; ingestion returns this as an `Err` arm instead
/// of raising, and [`crate::store::Storage`] tallies each variant in its
/// [`crate::store::DropCounters`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestDrop {
    /// Payload failed the capture-time match expression.
    #[error("payload did not satisfy the match expression")]
    NoMatch,

    /// `match.invite_only` is set and this is not an INVITE.
    #[error("match.invite_only set and first message is not INVITE")]
    NotInvite,

    /// `match.complete_only` is set and the first message is not a request.
    #[error("match.complete_only set and first message is not a request")]
    NotComplete,

    /// The FIFO is full and every call in it is locked, so rotation could
    /// not free a slot.
    #[error("capture limit reached and all calls are locked")]
    AllCallsLocked,

    /// The FIFO is full and `capture.rotate` is disabled, so no eviction
    /// was attempted.
    #[error("capture limit reached and rotation is disabled")]
    CaptureFull,

    /// An RTP/RTCP packet matched no pre-registered or known stream.
    #[error("no stream registered for {src} -> {dst}")]
    NoStream { src: Endpoint, dst: Endpoint },

    /// `capture.rtp` is disabled; media packets are not tracked at all.
    #[error("RTP/RTCP tracking is disabled by capture options")]
    RtpDisabled,

    /// The owning call already holds the per-call stream cap.
    #[error("call {call:?} has reached the per-call stream cap")]
    StreamCapReached { call: CallId },

    /// The dissector omitted a field this module requires.
    #[error("dissector packet missing required field: {field}")]
    MissingField { field: &'static str },
}

pub type IngestResult<T> = Result<T, IngestDrop>;
