//! Opaque entry identifiers.
//!
//! Ids double as index keys and storage directory names, so they are
//! limited to lowercase hex digits and hyphens.

use uuid::Uuid;

/// Length of a hyphenated UUID.
pub const ID_LEN: usize = 36;

/// A fresh random (v4) identifier in hyphenated lowercase form.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Whether `raw` has the shape produced by [`new_id`].
#[must_use]
pub fn is_entry_id(raw: &str) -> bool {
    raw.len() == ID_LEN
        && Uuid::parse_str(raw).is_ok()
        && raw.bytes().all(|b| b == b'-' || b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
