//! Parsing for symbolic address strings (spec.md §4.3): `@<content_id>` or
//! `@<content_id>.<step>(.<step>)*`.

use encr_core::{ContentId, EncrError, EncrResult};

/// A parsed, not-yet-resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Content id the address starts from.
    pub content_id: ContentId,
    /// Path steps after the leading content id, in order. A step is either
    /// a payload field name or, once navigation has entered a container, a
    /// position token (an integer sequence index or a mapping key).
    pub steps: Vec<String>,
}

impl Address {
    /// Parse an address string.
    ///
    /// # Errors
    ///
    /// Returns [`EncrError::BadPath`] if the string does not start with
    /// `@`, the content id portion does not decode, or any step is empty.
    pub fn parse(s: &str) -> EncrResult<Self> {
        let rest = s
            .strip_prefix('@')
            .ok_or_else(|| EncrError::bad_path(format!("address `{s}` must start with `@`")))?;
        if rest.is_empty() {
            return Err(EncrError::bad_path("address is missing a content id"));
        }
        let mut parts = rest.split('.');
        let cid_str = parts.next().expect("split always yields at least one item");
        let content_id: ContentId = cid_str
            .parse()
            .map_err(|e| EncrError::bad_path(format!("invalid content id `{cid_str}`: {e}")))?;
        let steps: Vec<String> = parts.map(str::to_string).collect();
        if steps.iter().any(String::is_empty) {
            return Err(EncrError::bad_path(format!("address `{s}` contains an empty path step")));
        }
        Ok(Address { content_id, steps })
    }
}
