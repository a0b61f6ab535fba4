//! Store configuration structs, validated at init.
//!
//! Builder-ish `with_*` methods in the style of `rvoip-dialog-core`'s
//! `config/unified.rs` rather than public field mutation — the fields are
//! public for the embedding application's settings layer to serialize, but
//! the happy path is construct-then-validate.

use serde::{Deserialize, Serialize};

use crate::attribute::{attribute_from_name_or_default, CallAttribute};
use crate::error::{ConfigError, ConfigResult};
use crate::filter::MatchFilter;

/// Bounded-FIFO and media-tracking knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// FIFO capacity; rotation evicts the oldest unlocked call once
    /// reached.
    pub limit: u32,
    /// Whether rotation is permitted at all (if `false`, the FIFO simply
    /// stops admitting new calls once full).
    pub rotate: bool,
    /// Whether RTP/RTCP ingestion is enabled.
    pub rtp: bool,
    pub save_path: Option<String>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            limit: 10_000,
            rotate: true,
            rtp: true,
            save_path: None,
        }
    }
}

impl CaptureOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Capture-time match options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    pub expr: Option<String>,
    pub icase: bool,
    pub invert: bool,
    pub invite_only: bool,
    pub complete_only: bool,
}

impl MatchOptions {
    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_complete_only(mut self, complete_only: bool) -> Self {
        self.complete_only = complete_only;
        self
    }

    /// Compile the match expression, surfacing a [`ConfigError`] if it
    /// fails — fatal to initialization.
    pub fn compile(&self) -> ConfigResult<MatchFilter> {
        Ok(MatchFilter::compile(self.expr.as_deref(), self.icase)?.with_invert(self.invert))
    }
}

/// Sort options: which attribute to order calls by, and direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SortOptions {
    pub by: CallAttribute,
    pub asc: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            by: CallAttribute::CallIndex,
            asc: true,
        }
    }
}

impl SortOptions {
    /// Build from a raw attribute name, falling back to `CALLINDEX`
    /// ascending for an unrecognized name rather than erroring, matching
    /// `CallAttribute`'s own name-lookup fallback; use
    /// [`SortOptions::validated`] when an unknown name should be a hard
    /// [`ConfigError`] instead.
    pub fn from_name(name: &str, asc: bool) -> Self {
        Self {
            by: attribute_from_name_or_default(name),
            asc,
        }
    }

    /// As [`SortOptions::from_name`], but an unrecognized attribute name
    /// is a [`ConfigError::UnknownSortAttribute`] instead of a silent
    /// fallback — for settings validation at startup, where a typo'd sort
    /// field should fail loudly.
    pub fn validated(name: &str, asc: bool) -> ConfigResult<Self> {
        use std::str::FromStr;
        let by = CallAttribute::from_str(name).map_err(|()| ConfigError::UnknownSortAttribute {
            name: name.to_string(),
        })?;
        Ok(Self { by, asc })
    }
}
