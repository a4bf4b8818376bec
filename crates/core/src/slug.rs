//! Display name to path-segment encoding.
//!
//! Every entity folder is named `<slug>-<id>`. The slug is derived from the entity's display
//! name, so it must be stable: the same name always yields the same slug, whatever machine
//! or locale produced it. The output alphabet is `[a-z0-9-]`, which is safe in every object
//! store path and needs no escaping.

use crate::constants::SLUG_SENTINEL;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Encodes a display name as a filesystem-safe token.
///
/// - Compatibility-decomposes the input (NFKD) and drops combining marks, so `"Café"` becomes
///   `"cafe"`.
/// - Lowercases ASCII letters and keeps ASCII digits.
/// - Collapses every run of any other characters into a single hyphen.
/// - Never starts or ends with a hyphen.
///
/// Absent input, empty input and input with no surviving characters all yield `"unnamed"`.
pub fn slugify(name: Option<&str>) -> String {
    let Some(name) = name else {
        return SLUG_SENTINEL.to_string();
    };

    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        SLUG_SENTINEL.to_string()
    } else {
        slug
    }
}
