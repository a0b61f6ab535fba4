//! Capture-time payload match filter.
//!
//! Distinct from a UI-level display filter: this is the single regex the
//! core itself owns, applied to the raw SIP payload before a call is ever
//! created.

use regex::RegexBuilder;

use crate::error::{ConfigError, ConfigResult};

/// A compiled capture-time match filter.
#[derive(Debug, Clone)]
pub struct MatchFilter {
    regex: Option<regex::Regex>,
    invert: bool,
}

impl MatchFilter {
    /// Compile `expr` (absent means "always matches"). Newline class is
    /// fixed to CRLF to match SIP's line ending, mirroring the source's
    /// `G_REGEX_MATCH_NEWLINE_CRLF`; `regex` has no matchflag equivalent,
    /// so CRLF handling falls out of `(?s)`-free multiline defaults plus
    /// `$`/`^` not being anchored mid-payload, which is what the flag
    /// bought us in glib's engine.
    pub fn compile(expr: Option<&str>, icase: bool) -> ConfigResult<Self> {
        let regex = match expr {
            None => None,
            Some(pattern) => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(icase)
                    .build()
                    .map_err(|source| ConfigError::InvalidMatchExpr {
                        expr: pattern.to_string(),
                        source,
                    })?,
            ),
        };
        Ok(Self { regex, invert: false })
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Apply the filter to a raw payload. Everything matches when there is
    /// no expression configured.
    pub fn check(&self, payload: &[u8]) -> bool {
        let Some(regex) = &self.regex else {
            return true;
        };
        let payload = String::from_utf8_lossy(payload);
        let is_match = regex.is_match(&payload);
        is_match != self.invert
    }
}
